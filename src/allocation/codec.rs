//! Flat-file encoding of the registry entities.
//!
//! Each entity maps to one CSV row shape; decoding reproduces the entity
//! field-for-field. Malformed rows surface as data errors naming the entity,
//! never as rule rejections.

use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationStatus, Enquiry, FlatType, MaritalStatus, Nric, Registration,
    RegistrationStatus, User, UserRole,
};
use super::project::{FlatInventory, Project};

const DATE_FORMAT: &str = "%Y-%m-%d";
const OFFICER_SEPARATOR: char = ';';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed {entity} row: {detail}")]
    Row { entity: &'static str, detail: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

fn row_error(entity: &'static str, detail: impl std::fmt::Display) -> CodecError {
    CodecError::Row {
        entity,
        detail: detail.to_string(),
    }
}

fn parse_date(entity: &'static str, raw: &str) -> Result<NaiveDate, CodecError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|err| row_error(entity, format!("date '{raw}': {err}")))
}

fn parse_nric(entity: &'static str, raw: &str) -> Result<Nric, CodecError> {
    Nric::parse(raw.trim()).map_err(|err| row_error(entity, err))
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    #[serde(rename = "Project Name")]
    name: String,
    #[serde(rename = "Neighborhood")]
    neighborhood: String,
    #[serde(rename = "Type 1")]
    type1: String,
    #[serde(rename = "Number of units for Type 1")]
    units1: u32,
    #[serde(rename = "Selling price for Type 1")]
    price1: u32,
    #[serde(rename = "Type 2")]
    type2: String,
    #[serde(rename = "Number of units for Type 2")]
    units2: u32,
    #[serde(rename = "Selling price for Type 2")]
    price2: u32,
    #[serde(rename = "Application opening date")]
    open_date: String,
    #[serde(rename = "Application closing date")]
    close_date: String,
    #[serde(rename = "Manager")]
    manager: String,
    #[serde(rename = "Officer Slot")]
    officer_slot: u8,
    #[serde(rename = "Officer")]
    officers: String,
    #[serde(rename = "Visibility")]
    visibility: bool,
}

pub fn write_projects<W: Write>(writer: W, projects: &[Project]) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for project in projects {
        csv_writer.serialize(ProjectRow {
            name: project.name.clone(),
            neighborhood: project.neighborhood.clone(),
            type1: FlatType::TwoRoom.label().to_string(),
            units1: project.units(FlatType::TwoRoom),
            price1: project.price(FlatType::TwoRoom),
            type2: FlatType::ThreeRoom.label().to_string(),
            units2: project.units(FlatType::ThreeRoom),
            price2: project.price(FlatType::ThreeRoom),
            open_date: project.open_date.format(DATE_FORMAT).to_string(),
            close_date: project.close_date.format(DATE_FORMAT).to_string(),
            manager: project.manager.to_string(),
            officer_slot: project.officer_capacity(),
            officers: project
                .officers()
                .iter()
                .map(Nric::as_str)
                .collect::<Vec<_>>()
                .join(&OFFICER_SEPARATOR.to_string()),
            visibility: project.visible,
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_projects<R: Read>(reader: R) -> Result<Vec<Project>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut projects = Vec::new();

    for record in csv_reader.deserialize::<ProjectRow>() {
        let row = record?;
        for (column, expected) in [
            (&row.type1, FlatType::TwoRoom.label()),
            (&row.type2, FlatType::ThreeRoom.label()),
        ] {
            if column != expected {
                return Err(row_error(
                    "project",
                    format!("unexpected flat type column '{column}'"),
                ));
            }
        }

        let officers = row
            .officers
            .split(OFFICER_SEPARATOR)
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_nric("project", part))
            .collect::<Result<Vec<_>, _>>()?;

        let project = Project::new(
            row.name,
            row.neighborhood,
            FlatInventory {
                units: row.units1,
                price: row.price1,
            },
            FlatInventory {
                units: row.units2,
                price: row.price2,
            },
            parse_date("project", &row.open_date)?,
            parse_date("project", &row.close_date)?,
            parse_nric("project", &row.manager)?,
            row.officer_slot,
            officers,
            row.visibility,
        )
        .map_err(|err| row_error("project", err))?;
        projects.push(project);
    }

    Ok(projects)
}

#[derive(Debug, Serialize, Deserialize)]
struct ApplicationRow {
    #[serde(rename = "ApplicantNRIC")]
    applicant: String,
    #[serde(rename = "ProjectName")]
    project: String,
    #[serde(rename = "FlatType")]
    flat_type: u8,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "RequestWithdrawal")]
    withdrawal_requested: bool,
}

pub fn write_applications<W: Write>(
    writer: W,
    applications: &[Application],
) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for application in applications {
        csv_writer.serialize(ApplicationRow {
            applicant: application.applicant.to_string(),
            project: application.project.clone(),
            flat_type: application.flat_type.code(),
            status: application.status().label().to_string(),
            withdrawal_requested: application.withdrawal_requested(),
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_applications<R: Read>(reader: R) -> Result<Vec<Application>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut applications = Vec::new();

    for record in csv_reader.deserialize::<ApplicationRow>() {
        let row = record?;
        let flat_type = FlatType::from_code(row.flat_type)
            .ok_or_else(|| row_error("application", format!("flat type code {}", row.flat_type)))?;
        let status = ApplicationStatus::from_label(&row.status)
            .ok_or_else(|| row_error("application", format!("status '{}'", row.status)))?;

        let application = Application::from_parts(
            parse_nric("application", &row.applicant)?,
            row.project,
            flat_type,
            status,
            row.withdrawal_requested,
        )
        .map_err(|err| row_error("application", err))?;
        applications.push(application);
    }

    Ok(applications)
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationRow {
    #[serde(rename = "OfficerNRIC")]
    officer: String,
    #[serde(rename = "ProjectName")]
    project: String,
    #[serde(rename = "Status")]
    status: String,
}

pub fn write_registrations<W: Write>(
    writer: W,
    registrations: &[Registration],
) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for registration in registrations {
        csv_writer.serialize(RegistrationRow {
            officer: registration.officer.to_string(),
            project: registration.project.clone(),
            status: registration.status().label().to_string(),
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_registrations<R: Read>(reader: R) -> Result<Vec<Registration>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut registrations = Vec::new();

    for record in csv_reader.deserialize::<RegistrationRow>() {
        let row = record?;
        let status = RegistrationStatus::from_label(&row.status)
            .ok_or_else(|| row_error("registration", format!("status '{}'", row.status)))?;

        let registration =
            Registration::from_parts(parse_nric("registration", &row.officer)?, row.project, status)
                .map_err(|err| row_error("registration", err))?;
        registrations.push(registration);
    }

    Ok(registrations)
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NRIC")]
    nric: String,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "MaritalStatus")]
    marital_status: String,
    #[serde(rename = "Password")]
    credential: String,
}

/// Users are stored in one file per role; `role` names the file being read.
pub fn read_users<R: Read>(reader: R, role: UserRole) -> Result<Vec<User>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut users = Vec::new();

    for record in csv_reader.deserialize::<UserRow>() {
        let row = record?;
        let marital_status = match row.marital_status.as_str() {
            "Single" => MaritalStatus::Single,
            "Married" => MaritalStatus::Married,
            other => {
                return Err(row_error("user", format!("marital status '{other}'")));
            }
        };

        let user = User::new(
            row.name,
            parse_nric("user", &row.nric)?,
            row.age,
            marital_status,
            row.credential,
            role,
        )
        .map_err(|err| row_error("user", err))?;
        users.push(user);
    }

    Ok(users)
}

pub fn write_users<W: Write>(writer: W, users: &[User]) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for user in users {
        csv_writer.serialize(UserRow {
            name: user.name.clone(),
            nric: user.nric.to_string(),
            age: user.age,
            marital_status: user.marital_status.label().to_string(),
            credential: user.credential_for_storage().to_string(),
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct EnquiryRow {
    #[serde(rename = "EnquiryID")]
    id: u32,
    #[serde(rename = "ApplicantNRIC")]
    applicant: String,
    #[serde(rename = "ProjectName")]
    project: String,
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "Reply")]
    reply: String,
}

pub fn write_enquiries<W: Write>(writer: W, enquiries: &[Enquiry]) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for enquiry in enquiries {
        csv_writer.serialize(EnquiryRow {
            id: enquiry.id,
            applicant: enquiry.applicant.to_string(),
            project: enquiry.project.clone(),
            text: enquiry.text().to_string(),
            reply: enquiry.reply().to_string(),
        })?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_enquiries<R: Read>(reader: R) -> Result<Vec<Enquiry>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut enquiries = Vec::new();

    for record in csv_reader.deserialize::<EnquiryRow>() {
        let row = record?;
        let enquiry = Enquiry::from_parts(
            row.id,
            parse_nric("enquiry", &row.applicant)?,
            row.project,
            row.text,
            row.reply,
        )
        .map_err(|err| row_error("enquiry", err))?;
        enquiries.push(enquiry);
    }

    Ok(enquiries)
}
