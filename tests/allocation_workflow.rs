//! End-to-end specifications for the allocation lifecycle, driven through the
//! public service facade and the HTTP router so the eligibility rules,
//! inventory handover, and withdrawal restoration are validated together.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use bto_allocator::allocation::{
    allocation_router, AllocationState, ApplicationLifecycleService, ApplicationStatus,
    FlatInventory, FlatType, MaritalStatus, MemoryStore, Nric, ProjectAdminService, ProjectDraft,
    ProjectStore, RegistrationLifecycleService, RegistrationStatus, User, UserDirectory, UserRole,
};

const MANAGER_NRIC: &str = "S5000001A";
const OFFICER_NRIC: &str = "T7000001C";
const APPLICANT_NRIC: &str = "S8000001E";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn today() -> NaiveDate {
    date(2024, 2, 15)
}

fn nric(raw: &str) -> Nric {
    Nric::parse(raw).expect("valid nric")
}

fn user(name: &str, raw: &str, age: u32, marital_status: MaritalStatus, role: UserRole) -> User {
    User::new(name, nric(raw), age, marital_status, "secret", role).expect("valid user")
}

fn manager() -> User {
    user(
        "Priya Nair",
        MANAGER_NRIC,
        47,
        MaritalStatus::Married,
        UserRole::Manager,
    )
}

fn officer() -> User {
    user(
        "Aisha Rahman",
        OFFICER_NRIC,
        33,
        MaritalStatus::Single,
        UserRole::Officer,
    )
}

fn applicant() -> User {
    user(
        "Daniel Lim",
        APPLICANT_NRIC,
        25,
        MaritalStatus::Married,
        UserRole::Applicant,
    )
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for seeded in [manager(), officer(), applicant()] {
        store.insert_user(seeded).expect("seed user");
    }
    store
}

fn draft() -> ProjectDraft {
    ProjectDraft {
        name: "Acacia Breeze".to_string(),
        neighborhood: "Tampines".to_string(),
        two_room: FlatInventory {
            units: 1,
            price: 118_000,
        },
        three_room: FlatInventory {
            units: 3,
            price: 221_000,
        },
        open_date: date(2024, 1, 1),
        close_date: date(2024, 3, 31),
        officer_capacity: 1,
    }
}

#[test]
fn full_allocation_lifecycle_round_trip() {
    let store = seeded_store();
    let admin = ProjectAdminService::new(store.clone());
    let applications = ApplicationLifecycleService::new(store.clone());
    let registrations = RegistrationLifecycleService::new(store.clone());

    admin
        .create_project(&manager(), draft())
        .expect("project created");

    let registration = registrations
        .register(&officer(), "Acacia Breeze")
        .expect("registration accepted");
    assert_eq!(registration.status(), RegistrationStatus::Pending);

    let registration = registrations
        .manager_approve(&manager(), &nric(OFFICER_NRIC), "Acacia Breeze")
        .expect("registration approved");
    assert_eq!(registration.status(), RegistrationStatus::Approved);

    let application = applications
        .apply(&applicant(), "Acacia Breeze", FlatType::TwoRoom, today())
        .expect("application accepted");
    assert_eq!(application.status(), ApplicationStatus::Pending);

    let application = applications
        .manager_approve(&manager(), &nric(APPLICANT_NRIC))
        .expect("application approved");
    assert_eq!(application.status(), ApplicationStatus::Successful);

    let receipt = applications
        .book_flat(&officer(), &nric(APPLICANT_NRIC))
        .expect("booking succeeds");
    assert_eq!(receipt.applicant_name, "Daniel Lim");
    assert_eq!(receipt.project, "Acacia Breeze");
    assert_eq!(receipt.price, 118_000);

    let project = store
        .fetch_project("Acacia Breeze")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 0);

    applications
        .request_withdrawal(&nric(APPLICANT_NRIC))
        .expect("withdrawal flagged");
    let application = applications
        .manager_approve_withdrawal(&manager(), &nric(APPLICANT_NRIC))
        .expect("withdrawal approved");
    assert_eq!(application.status(), ApplicationStatus::Unsuccessful);

    let project = store
        .fetch_project("Acacia Breeze")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 1);

    // The concluded application no longer blocks a fresh submission.
    applications
        .apply(&applicant(), "Acacia Breeze", FlatType::TwoRoom, today())
        .expect("new application accepted");
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

fn post(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("valid request")
}

#[tokio::test]
async fn router_drives_the_lifecycle_end_to_end() {
    let store = seeded_store();
    ProjectAdminService::new(store.clone())
        .create_project(&manager(), draft())
        .expect("project created");
    let registrations = RegistrationLifecycleService::new(store.clone());
    registrations
        .register(&officer(), "Acacia Breeze")
        .expect("registration accepted");
    registrations
        .manager_approve(&manager(), &nric(OFFICER_NRIC), "Acacia Breeze")
        .expect("registration approved");

    let router = allocation_router(Arc::new(AllocationState::new(store)));

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/applications",
            json!({
                "applicant_nric": APPLICANT_NRIC,
                "project": "Acacia Breeze",
                "flat_type": "two_room",
            }),
        ))
        .await
        .expect("apply request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "PENDING");

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/applicants/{APPLICANT_NRIC}/application/approval"),
            json!({ "manager_nric": MANAGER_NRIC }),
        ))
        .await
        .expect("approval request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "SUCCESSFUL");

    let response = router
        .clone()
        .oneshot(post(
            &format!("/api/v1/applicants/{APPLICANT_NRIC}/application/booking"),
            json!({ "officer_nric": OFFICER_NRIC }),
        ))
        .await
        .expect("booking request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["price"], 118_000);
    assert_eq!(body["project"], "Acacia Breeze");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/applicants/{APPLICANT_NRIC}/application"))
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("status request");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "BOOKED");

    // A second application for the same household is refused while one is live.
    let response = router
        .oneshot(post(
            "/api/v1/applications",
            json!({
                "applicant_nric": APPLICANT_NRIC,
                "project": "Acacia Breeze",
                "flat_type": "two_room",
            }),
        ))
        .await
        .expect("duplicate apply request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "an active application already exists");
}

#[tokio::test]
async fn router_reports_overlapping_registrations() {
    let store = seeded_store();
    let admin = ProjectAdminService::new(store.clone());
    admin
        .create_project(&manager(), draft())
        .expect("project created");
    // Overlapping window handled by a different manager.
    store
        .insert_user(user(
            "Marcus Chen",
            "S5000002B",
            51,
            MaritalStatus::Married,
            UserRole::Manager,
        ))
        .expect("seed user");
    admin
        .create_project(
            &user(
                "Marcus Chen",
                "S5000002B",
                51,
                MaritalStatus::Married,
                UserRole::Manager,
            ),
            ProjectDraft {
                name: "Pine Vale".to_string(),
                open_date: date(2024, 3, 1),
                close_date: date(2024, 4, 30),
                ..draft()
            },
        )
        .expect("project created");

    let registrations = RegistrationLifecycleService::new(store.clone());
    registrations
        .register(&officer(), "Acacia Breeze")
        .expect("registration accepted");
    registrations
        .manager_approve(&manager(), &nric(OFFICER_NRIC), "Acacia Breeze")
        .expect("registration approved");

    let router = allocation_router(Arc::new(AllocationState::new(store)));
    let response = router
        .oneshot(post(
            "/api/v1/registrations",
            json!({
                "officer_nric": OFFICER_NRIC,
                "project": "Pine Vale",
            }),
        ))
        .await
        .expect("register request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(
        body["error"],
        "window overlaps approved registration for 'Acacia Breeze'"
    );
}
