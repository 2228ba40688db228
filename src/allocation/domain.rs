use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors raised when constructing an entity from raw data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid NRIC format: {0}")]
    InvalidNric(String),
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("closing date {close} precedes opening date {open}")]
    WindowOrder {
        open: chrono::NaiveDate,
        close: chrono::NaiveDate,
    },
    #[error("officer slots must be between 0 and {max}, got {got}")]
    OfficerSlotRange { got: u8, max: u8 },
    #[error("{assigned} assigned officers exceed {capacity} available slots")]
    OfficersExceedSlots { assigned: usize, capacity: u8 },
    #[error("officer '{0}' listed more than once")]
    DuplicateOfficer(Nric),
}

/// Rejection reasons for operations that violate an allocation rule.
///
/// These are always recoverable: the initiating actor sees the message and no
/// partial mutation remains except where a transition explicitly specifies one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("project '{0}' is not open for applications")]
    ProjectNotOpen(String),
    #[error("an active application already exists")]
    ActiveApplicationExists,
    #[error("managers cannot apply for projects")]
    ManagerCannotApply,
    #[error("officers cannot apply for a project they have registered for")]
    RegisteredAsOfficer,
    #[error("single applicants must be at least 35 and may only apply for a 2-Room flat")]
    SingleApplicantIneligible,
    #[error("married applicants must be at least 21 years old")]
    MarriedApplicantTooYoung,
    #[error("no {flat_type} units available in '{project}'")]
    NoUnitsAvailable { project: String, flat_type: FlatType },
    #[error("no active application found")]
    NoActiveApplication,
    #[error("you do not manage this project")]
    NotProjectManager,
    #[error("application status is {0}, expected {}", ApplicationStatus::Pending)]
    ApplicationNotPending(ApplicationStatus),
    #[error("application status is {0}, expected {}", ApplicationStatus::Successful)]
    ApplicationNotSuccessful(ApplicationStatus),
    #[error("a withdrawal request is pending on this application")]
    WithdrawalPending,
    #[error("withdrawal already requested")]
    WithdrawalAlreadyRequested,
    #[error("no withdrawal request is pending")]
    NoWithdrawalRequested,
    #[error("cannot request withdrawal while the application is {0}")]
    WithdrawalNotAllowed(ApplicationStatus),
    #[error("invalid application transition {from} -> {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("you do not handle this project")]
    NotAssignedOfficer,
    #[error("already registered for project '{0}'")]
    AlreadyRegistered(String),
    #[error("managers cannot register as officers for their own project")]
    OwnProjectRegistration,
    #[error("cannot register for a project you have applied for")]
    AppliedToProject,
    #[error("window overlaps approved registration for '{0}'")]
    OverlappingRegistration(String),
    #[error("registration status is {0}, expected {}", RegistrationStatus::Pending)]
    RegistrationNotPending(RegistrationStatus),
    #[error("no available officer slots in project '{0}'")]
    NoOfficerSlots(String),
    #[error("only officers may register for projects")]
    NotAnOfficer,
    #[error("only managers may administer projects")]
    NotAManager,
    #[error("project name '{0}' already exists")]
    DuplicateProjectName(String),
    #[error("manager already handles overlapping project '{0}'")]
    ManagerWindowOverlap(String),
    #[error("enquiry text cannot be empty")]
    EmptyEnquiryText,
    #[error("you can only modify your own enquiries")]
    NotEnquiryOwner,
    #[error("enquiry has already been replied to")]
    EnquiryAlreadyReplied,
    #[error("not authorized to reply to enquiries for this project")]
    NotEnquiryResponder,
    #[error("no project named '{0}'")]
    UnknownProject(String),
    #[error("no user found for the given identifier")]
    UnknownUser,
    #[error("credential check failed")]
    BadCredential,
}

/// National identity string keying every person record.
///
/// Format: one of `S`/`T`, seven digits, one trailing uppercase letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nric(String);

impl Nric {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == 9
            && matches!(bytes[0], b'S' | b'T')
            && bytes[1..8].iter().all(u8::is_ascii_digit)
            && bytes[8].is_ascii_uppercase();

        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidNric(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Nric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Nric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Nric::parse(&raw).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
}

impl MaritalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
        }
    }
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Applicant,
    Officer,
    Manager,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Applicant => "Applicant",
            UserRole::Officer => "Officer",
            UserRole::Manager => "Manager",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Person record. Role-specific behavior dispatches on the `role` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub nric: Nric,
    pub age: u32,
    pub marital_status: MaritalStatus,
    credential: String,
    pub role: UserRole,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        nric: Nric,
        age: u32,
        marital_status: MaritalStatus,
        credential: impl Into<String>,
        role: UserRole,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let credential = credential.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if credential.is_empty() {
            return Err(ValidationError::EmptyField("credential"));
        }

        Ok(Self {
            name,
            nric,
            age,
            marital_status,
            credential,
            role,
        })
    }

    pub fn verify_credential(&self, attempt: &str) -> bool {
        self.credential == attempt
    }

    /// The only way to mutate the credential; identity fields stay immutable.
    pub fn change_credential(&mut self, new_credential: &str) -> Result<(), ValidationError> {
        if new_credential.is_empty() {
            return Err(ValidationError::EmptyField("credential"));
        }
        self.credential = new_credential.to_string();
        Ok(())
    }

    pub fn credential_for_storage(&self) -> &str {
        &self.credential
    }
}

/// Unit-size category; each carries its own inventory and price in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatType {
    TwoRoom,
    ThreeRoom,
}

impl FlatType {
    pub const fn label(self) -> &'static str {
        match self {
            FlatType::TwoRoom => "2-Room",
            FlatType::ThreeRoom => "3-Room",
        }
    }

    /// Numeric code used in flat-file rows.
    pub const fn code(self) -> u8 {
        match self {
            FlatType::TwoRoom => 2,
            FlatType::ThreeRoom => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(FlatType::TwoRoom),
            3 => Some(FlatType::ThreeRoom),
            _ => None,
        }
    }

    /// The smallest category, the only one single applicants may request.
    pub const fn smallest() -> Self {
        FlatType::TwoRoom
    }
}

impl fmt::Display for FlatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Successful,
    Unsuccessful,
    Booked,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Successful => "SUCCESSFUL",
            ApplicationStatus::Unsuccessful => "UNSUCCESSFUL",
            ApplicationStatus::Booked => "BOOKED",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(Self::Pending),
            "SUCCESSFUL" => Some(Self::Successful),
            "UNSUCCESSFUL" => Some(Self::Unsuccessful),
            "BOOKED" => Some(Self::Booked),
            _ => None,
        }
    }

    /// Legal transitions: same-status writes are no-ops, every status may be
    /// concluded as Unsuccessful, and the forward path is
    /// Pending -> Successful -> Booked.
    pub fn can_transition_to(self, next: Self) -> bool {
        next == self
            || next == ApplicationStatus::Unsuccessful
            || matches!(
                (self, next),
                (ApplicationStatus::Pending, ApplicationStatus::Successful)
                    | (ApplicationStatus::Successful, ApplicationStatus::Booked)
            )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A flat application. Keyed by applicant; at most one non-Unsuccessful
/// application exists per applicant at any time (the store enforces this).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub applicant: Nric,
    pub project: String,
    pub flat_type: FlatType,
    status: ApplicationStatus,
    withdrawal_requested: bool,
}

impl Application {
    pub fn new(
        applicant: Nric,
        project: impl Into<String>,
        flat_type: FlatType,
    ) -> Result<Self, ValidationError> {
        Self::from_parts(
            applicant,
            project,
            flat_type,
            ApplicationStatus::Pending,
            false,
        )
    }

    /// Rehydrate a record with explicit state, e.g. from a decoded row.
    pub fn from_parts(
        applicant: Nric,
        project: impl Into<String>,
        flat_type: FlatType,
        status: ApplicationStatus,
        withdrawal_requested: bool,
    ) -> Result<Self, ValidationError> {
        let project = project.into();
        if project.trim().is_empty() {
            return Err(ValidationError::EmptyField("project name"));
        }

        Ok(Self {
            applicant,
            project,
            flat_type,
            status,
            withdrawal_requested,
        })
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn withdrawal_requested(&self) -> bool {
        self.withdrawal_requested
    }

    pub fn is_active(&self) -> bool {
        self.status != ApplicationStatus::Unsuccessful
    }

    pub fn transition_to(&mut self, next: ApplicationStatus) -> Result<(), RuleViolation> {
        if !self.status.can_transition_to(next) {
            return Err(RuleViolation::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn request_withdrawal(&mut self) -> Result<(), RuleViolation> {
        if self.withdrawal_requested {
            return Err(RuleViolation::WithdrawalAlreadyRequested);
        }
        if self.status == ApplicationStatus::Unsuccessful {
            return Err(RuleViolation::WithdrawalNotAllowed(self.status));
        }
        self.withdrawal_requested = true;
        Ok(())
    }

    pub fn clear_withdrawal(&mut self) {
        self.withdrawal_requested = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Approved => "APPROVED",
            RegistrationStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An officer's request to administer a project. Keyed by (officer, project);
/// Approved and Rejected are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub officer: Nric,
    pub project: String,
    status: RegistrationStatus,
}

impl Registration {
    pub fn new(officer: Nric, project: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_parts(officer, project, RegistrationStatus::Pending)
    }

    pub fn from_parts(
        officer: Nric,
        project: impl Into<String>,
        status: RegistrationStatus,
    ) -> Result<Self, ValidationError> {
        let project = project.into();
        if project.trim().is_empty() {
            return Err(ValidationError::EmptyField("project name"));
        }

        Ok(Self {
            officer,
            project,
            status,
        })
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn transition_to(&mut self, next: RegistrationStatus) -> Result<(), RuleViolation> {
        if next != self.status && self.status != RegistrationStatus::Pending {
            return Err(RuleViolation::RegistrationNotPending(self.status));
        }
        self.status = next;
        Ok(())
    }
}

/// An applicant's question about a project, optionally answered by staff.
/// An empty reply means the enquiry is still open for edit and deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: u32,
    pub applicant: Nric,
    pub project: String,
    text: String,
    reply: String,
}

impl Enquiry {
    pub fn new(
        id: u32,
        applicant: Nric,
        project: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::from_parts(id, applicant, project, text, String::new())
    }

    pub fn from_parts(
        id: u32,
        applicant: Nric,
        project: impl Into<String>,
        text: impl Into<String>,
        reply: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let project = project.into();
        let text = text.into();
        if project.trim().is_empty() {
            return Err(ValidationError::EmptyField("project name"));
        }
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyField("enquiry text"));
        }

        Ok(Self {
            id,
            applicant,
            project,
            text,
            reply: reply.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn is_replied(&self) -> bool {
        !self.reply.is_empty()
    }

    pub fn edit_text(&mut self, new_text: &str) -> Result<(), RuleViolation> {
        if self.is_replied() {
            return Err(RuleViolation::EnquiryAlreadyReplied);
        }
        if new_text.trim().is_empty() {
            return Err(RuleViolation::EmptyEnquiryText);
        }
        self.text = new_text.to_string();
        Ok(())
    }

    pub fn set_reply(&mut self, reply: &str) -> Result<(), RuleViolation> {
        if self.is_replied() {
            return Err(RuleViolation::EnquiryAlreadyReplied);
        }
        if reply.trim().is_empty() {
            return Err(RuleViolation::EmptyEnquiryText);
        }
        self.reply = reply.to_string();
        Ok(())
    }
}
