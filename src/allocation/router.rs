use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{Application, FlatType, Nric, Registration, User};
use super::registration::RegistrationLifecycleService;
use super::service::{ApplicationLifecycleService, LifecycleError};
use super::store::{AllocationStores, IntegrityError, StoreError};
use super::views::{ApplicationView, RegistrationView};

/// Shared handler state: the registry plus the two lifecycle services.
pub struct AllocationState<S> {
    pub store: Arc<S>,
    pub applications: ApplicationLifecycleService<S>,
    pub registrations: RegistrationLifecycleService<S>,
}

impl<S> AllocationState<S>
where
    S: AllocationStores,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            applications: ApplicationLifecycleService::new(store.clone()),
            registrations: RegistrationLifecycleService::new(store.clone()),
            store,
        }
    }
}

/// Router exposing the application and registration lifecycle operations.
pub fn allocation_router<S>(state: Arc<AllocationState<S>>) -> Router
where
    S: AllocationStores + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(apply_handler::<S>))
        .route(
            "/api/v1/applicants/:nric/application",
            get(application_status_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/withdrawal",
            post(request_withdrawal_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/approval",
            post(approve_application_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/rejection",
            post(reject_application_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/withdrawal/approval",
            post(approve_withdrawal_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/withdrawal/rejection",
            post(reject_withdrawal_handler::<S>),
        )
        .route(
            "/api/v1/applicants/:nric/application/booking",
            post(book_flat_handler::<S>),
        )
        .route("/api/v1/registrations", post(register_handler::<S>))
        .route(
            "/api/v1/projects/:project/registrations/:officer/approval",
            post(approve_registration_handler::<S>),
        )
        .route(
            "/api/v1/projects/:project/registrations/:officer/rejection",
            post(reject_registration_handler::<S>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ApplyRequest {
    applicant_nric: String,
    project: String,
    flat_type: FlatType,
}

#[derive(Debug, Deserialize)]
struct ManagerRequest {
    manager_nric: String,
}

#[derive(Debug, Deserialize)]
struct OfficerRequest {
    officer_nric: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    officer_nric: String,
    project: String,
}

async fn apply_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    let applicant = match resolve_user(&state, &request.applicant_nric) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let today = Local::now().date_naive();
    match state
        .applications
        .apply(&applicant, &request.project, request.flat_type, today)
    {
        Ok(application) => application_created(&application),
        Err(err) => error_response(err),
    }
}

async fn application_status_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
) -> Response
where
    S: AllocationStores + 'static,
{
    let nric = match parse_nric(&nric) {
        Ok(nric) => nric,
        Err(response) => return response,
    };

    match state.applications.active_application(&nric) {
        Ok(Some(application)) => {
            (StatusCode::OK, Json(ApplicationView::from(&application))).into_response()
        }
        Ok(None) => {
            let payload = json!({ "error": "no active application" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn request_withdrawal_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
) -> Response
where
    S: AllocationStores + 'static,
{
    let nric = match parse_nric(&nric) {
        Ok(nric) => nric,
        Err(response) => return response,
    };

    respond_with_application(state.applications.request_withdrawal(&nric))
}

async fn approve_application_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    manager_decision(&state, &nric, &request.manager_nric, |service, manager, nric| {
        service.manager_approve(manager, nric)
    })
}

async fn reject_application_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    manager_decision(&state, &nric, &request.manager_nric, |service, manager, nric| {
        service.manager_reject(manager, nric)
    })
}

async fn approve_withdrawal_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    manager_decision(&state, &nric, &request.manager_nric, |service, manager, nric| {
        service.manager_approve_withdrawal(manager, nric)
    })
}

async fn reject_withdrawal_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    manager_decision(&state, &nric, &request.manager_nric, |service, manager, nric| {
        service.manager_reject_withdrawal(manager, nric)
    })
}

async fn book_flat_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path(nric): Path<String>,
    Json(request): Json<OfficerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    let applicant = match parse_nric(&nric) {
        Ok(nric) => nric,
        Err(response) => return response,
    };
    let officer = match resolve_user(&state, &request.officer_nric) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.applications.book_flat(&officer, &applicant) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn register_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Json(request): Json<RegisterRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    let officer = match resolve_user(&state, &request.officer_nric) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match state.registrations.register(&officer, &request.project) {
        Ok(registration) => {
            (StatusCode::CREATED, Json(RegistrationView::from(&registration))).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn approve_registration_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path((project, officer)): Path<(String, String)>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    registration_decision(
        &state,
        &project,
        &officer,
        &request.manager_nric,
        |service, manager, officer, project| service.manager_approve(manager, officer, project),
    )
}

async fn reject_registration_handler<S>(
    State(state): State<Arc<AllocationState<S>>>,
    Path((project, officer)): Path<(String, String)>,
    Json(request): Json<ManagerRequest>,
) -> Response
where
    S: AllocationStores + 'static,
{
    registration_decision(
        &state,
        &project,
        &officer,
        &request.manager_nric,
        |service, manager, officer, project| service.manager_reject(manager, officer, project),
    )
}

fn manager_decision<S, F>(
    state: &AllocationState<S>,
    applicant: &str,
    manager: &str,
    decide: F,
) -> Response
where
    S: AllocationStores + 'static,
    F: FnOnce(&ApplicationLifecycleService<S>, &User, &Nric) -> Result<Application, LifecycleError>,
{
    let applicant = match parse_nric(applicant) {
        Ok(nric) => nric,
        Err(response) => return response,
    };
    let manager = match resolve_user(state, manager) {
        Ok(user) => user,
        Err(response) => return response,
    };

    respond_with_application(decide(&state.applications, &manager, &applicant))
}

fn registration_decision<S, F>(
    state: &AllocationState<S>,
    project: &str,
    officer: &str,
    manager: &str,
    decide: F,
) -> Response
where
    S: AllocationStores + 'static,
    F: FnOnce(
        &RegistrationLifecycleService<S>,
        &User,
        &Nric,
        &str,
    ) -> Result<Registration, LifecycleError>,
{
    let officer = match parse_nric(officer) {
        Ok(nric) => nric,
        Err(response) => return response,
    };
    let manager = match resolve_user(state, manager) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match decide(&state.registrations, &manager, &officer, project) {
        Ok(registration) => {
            (StatusCode::OK, Json(RegistrationView::from(&registration))).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn respond_with_application(result: Result<Application, LifecycleError>) -> Response {
    match result {
        Ok(application) => {
            (StatusCode::OK, Json(ApplicationView::from(&application))).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn application_created(application: &Application) -> Response {
    (StatusCode::CREATED, Json(ApplicationView::from(application))).into_response()
}

fn parse_nric(raw: &str) -> Result<Nric, Response> {
    Nric::parse(raw).map_err(|err| {
        let payload = json!({ "error": err.to_string() });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

fn resolve_user<S>(state: &AllocationState<S>, raw: &str) -> Result<User, Response>
where
    S: AllocationStores,
{
    let nric = parse_nric(raw)?;
    match state.store.find_user_by_nric(&nric) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            let payload = json!({ "error": format!("no user found for '{nric}'") });
            Err((StatusCode::NOT_FOUND, Json(payload)).into_response())
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response())
        }
    }
}

fn error_response(err: LifecycleError) -> Response {
    let payload = json!({ "error": err.to_string() });
    let status = match &err {
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::Rule(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Integrity(IntegrityError::Store(StoreError::Conflict)) => {
            StatusCode::CONFLICT
        }
        LifecycleError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LifecycleError::Compensation { .. } => {
            error!(%err, "inconsistent registry state requires operator attention");
            let payload = json!({
                "error": err.to_string(),
                "critical": true,
            });
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    };

    (status, Json(payload)).into_response()
}
