//! Allocation lifecycle engine: eligibility rules, application and
//! registration state machines, and the guarded project inventory they share.

pub mod auth;
pub mod codec;
pub mod domain;
pub mod eligibility;
pub mod enquiry;
pub mod project;
pub mod projects;
pub mod registration;
pub mod report;
pub mod router;
pub mod service;
pub mod store;
pub mod views;

#[cfg(test)]
mod tests;

pub use auth::AuthService;
pub use domain::{
    Application, ApplicationStatus, Enquiry, FlatType, MaritalStatus, Nric, Registration,
    RegistrationStatus, RuleViolation, User, UserRole, ValidationError,
};
pub use eligibility::{
    check_applicant_eligibility, check_officer_registration_eligibility, ApprovedWindow,
};
pub use enquiry::EnquiryService;
pub use project::{FlatInventory, Project, ProjectUpdate};
pub use projects::{ProjectAdminService, ProjectDraft};
pub use registration::RegistrationLifecycleService;
pub use report::{booking_report, BookingReceipt, BookingReportFilter, BookingReportRow};
pub use router::{allocation_router, AllocationState};
pub use service::{ApplicationLifecycleService, LifecycleError};
pub use store::{
    AllocationStores, ApplicationStore, EnquiryStore, IntegrityError, MemoryStore, ProjectStore,
    RegistrationStore, StoreError, UserDirectory,
};
pub use views::{ApplicationView, RegistrationView};
