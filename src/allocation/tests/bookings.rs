use super::common::*;
use crate::allocation::domain::{ApplicationStatus, FlatType, RuleViolation};
use crate::allocation::service::LifecycleError;
use crate::allocation::store::{ApplicationStore, ProjectStore};

#[test]
fn booking_consumes_the_last_unit_and_later_bookings_conclude_unsuccessful() {
    let store = seeded_store();
    store.insert_project(oak(1)).expect("seed project");
    assign_officer(&store, "Oak", OFFICER_NRIC);
    let service = application_service(&store);

    let first = married_applicant();
    let second = second_applicant();
    for applicant in [&first, &second] {
        service
            .apply(applicant, "Oak", FlatType::TwoRoom, today())
            .expect("application accepted");
        service
            .manager_approve(&manager(), &applicant.nric)
            .expect("application approved");
    }

    let receipt = service
        .book_flat(&officer(), &first.nric)
        .expect("first booking succeeds");
    assert_eq!(receipt.applicant_name, first.name);
    assert_eq!(receipt.flat_type, FlatType::TwoRoom);
    assert_eq!(receipt.price, 118_000);

    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 0);
    let booked = store
        .active_for_applicant(&first.nric)
        .expect("query application")
        .expect("application present");
    assert_eq!(booked.status(), ApplicationStatus::Booked);

    let result = service.book_flat(&officer(), &second.nric);
    assert!(matches!(
        result,
        Err(LifecycleError::Rule(RuleViolation::NoUnitsAvailable { .. }))
    ));

    let concluded = store
        .applications_for_applicant(&second.nric)
        .expect("query applications");
    assert_eq!(concluded[0].status(), ApplicationStatus::Unsuccessful);
    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 0);
}

#[test]
fn approved_withdrawal_of_a_booked_flat_restores_the_unit() {
    let store = seeded_store();
    store.insert_project(oak(1)).expect("seed project");
    assign_officer(&store, "Oak", OFFICER_NRIC);
    let service = application_service(&store);
    let applicant = married_applicant();

    service
        .apply(&applicant, "Oak", FlatType::TwoRoom, today())
        .expect("application accepted");
    service
        .manager_approve(&manager(), &applicant.nric)
        .expect("application approved");
    service
        .book_flat(&officer(), &applicant.nric)
        .expect("booking succeeds");
    service
        .request_withdrawal(&applicant.nric)
        .expect("withdrawal flagged");

    let application = service
        .manager_approve_withdrawal(&manager(), &applicant.nric)
        .expect("withdrawal approved");
    assert_eq!(application.status(), ApplicationStatus::Unsuccessful);
    assert!(!application.withdrawal_requested());

    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 1);
}

#[test]
fn booking_requires_an_assigned_officer_and_a_successful_status() {
    let store = seeded_store();
    store.insert_project(oak(2)).expect("seed project");
    assign_officer(&store, "Oak", OFFICER_NRIC);
    let service = application_service(&store);
    let applicant = married_applicant();

    service
        .apply(&applicant, "Oak", FlatType::TwoRoom, today())
        .expect("application accepted");

    // Still pending: booking must be refused before any inventory mutation.
    let result = service.book_flat(&officer(), &applicant.nric);
    assert!(matches!(
        result,
        Err(LifecycleError::Rule(
            RuleViolation::ApplicationNotSuccessful(ApplicationStatus::Pending)
        ))
    ));

    service
        .manager_approve(&manager(), &applicant.nric)
        .expect("application approved");

    let result = service.book_flat(&second_officer(), &applicant.nric);
    assert!(matches!(
        result,
        Err(LifecycleError::Rule(RuleViolation::NotAssignedOfficer))
    ));

    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 2);
}

#[test]
fn failed_application_persistence_rolls_back_the_booking() {
    let (store, service) = booking_fixture();
    store.fail_next_application_updates(1);

    let result = service.book_flat(&officer(), &nric(APPLICANT_NRIC));
    assert!(matches!(result, Err(LifecycleError::Integrity(_))));

    // Rollback restored both records: the unit is back and the application
    // remains bookable.
    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 1);
    let application = store
        .active_for_applicant(&nric(APPLICANT_NRIC))
        .expect("query application")
        .expect("application present");
    assert_eq!(application.status(), ApplicationStatus::Successful);

    service
        .book_flat(&officer(), &nric(APPLICANT_NRIC))
        .expect("retry succeeds once the store recovers");
}

#[test]
fn failed_project_persistence_rolls_back_the_booking() {
    let (store, service) = booking_fixture();
    store.fail_next_project_updates(1);

    let result = service.book_flat(&officer(), &nric(APPLICANT_NRIC));
    assert!(matches!(result, Err(LifecycleError::Integrity(_))));

    let project = store
        .fetch_project("Oak")
        .expect("fetch project")
        .expect("project present");
    assert_eq!(project.units(FlatType::TwoRoom), 1);
    let application = store
        .active_for_applicant(&nric(APPLICANT_NRIC))
        .expect("query application")
        .expect("application present");
    assert_eq!(application.status(), ApplicationStatus::Successful);
}

#[test]
fn rollback_failures_escalate_to_a_critical_outcome() {
    let (store, service) = booking_fixture();
    store.fail_next_application_updates(2);

    let result = service.book_flat(&officer(), &nric(APPLICANT_NRIC));
    match result {
        Err(LifecycleError::Compensation {
            original,
            rollback_failures,
        }) => {
            assert!(matches!(*original, LifecycleError::Integrity(_)));
            assert_eq!(rollback_failures.len(), 1);
            assert!(rollback_failures[0].contains("restore application status"));
        }
        other => panic!("expected compensation failure, got {other:?}"),
    }
}
