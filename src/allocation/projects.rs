use std::sync::Arc;

use chrono::NaiveDate;

use super::domain::{
    Application, FlatType, MaritalStatus, Nric, RuleViolation, User, UserRole,
};
use super::project::{FlatInventory, Project, ProjectUpdate};
use super::service::{ensure_manages, integrity, LifecycleError};
use super::store::ProjectStore;

/// Attributes for a new project listing.
#[derive(Debug, Clone)]
pub struct ProjectDraft {
    pub name: String,
    pub neighborhood: String,
    pub two_room: FlatInventory,
    pub three_room: FlatInventory,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub officer_capacity: u8,
}

/// Manager-facing project administration: creation, edits, visibility, and
/// the read paths officers and applicants browse.
pub struct ProjectAdminService<S> {
    store: Arc<S>,
}

impl<S> ProjectAdminService<S>
where
    S: ProjectStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn find_project(&self, name: &str) -> Result<Option<Project>, LifecycleError> {
        self.store.fetch_project(name).map_err(integrity)
    }

    pub fn all_projects(&self) -> Result<Vec<Project>, LifecycleError> {
        self.store.all_projects().map_err(integrity)
    }

    pub fn projects_by_manager(&self, manager: &Nric) -> Result<Vec<Project>, LifecycleError> {
        Ok(self
            .all_projects()?
            .into_iter()
            .filter(|project| &project.manager == manager)
            .collect())
    }

    /// Names of the projects an officer currently administers.
    pub fn handled_project_names(&self, officer: &Nric) -> Result<Vec<String>, LifecycleError> {
        Ok(self
            .all_projects()?
            .into_iter()
            .filter(|project| project.is_assigned_officer(officer))
            .map(|project| project.name)
            .collect())
    }

    /// Projects an applicant may browse: everything open they are eligible
    /// for, plus the project behind their current application regardless of
    /// visibility.
    pub fn viewable_projects(
        &self,
        applicant: &User,
        current_application: Option<&Application>,
        today: NaiveDate,
    ) -> Result<Vec<Project>, LifecycleError> {
        let applied_to = current_application.map(|app| app.project.as_str());
        let mut viewable = Vec::new();

        for project in self.all_projects()? {
            if Some(project.name.as_str()) == applied_to {
                viewable.push(project);
                continue;
            }
            if !project.is_open(today) {
                continue;
            }

            let two_room = project.units(FlatType::TwoRoom);
            let three_room = project.units(FlatType::ThreeRoom);
            let eligible = match applicant.marital_status {
                MaritalStatus::Single => applicant.age >= 35 && two_room > 0,
                MaritalStatus::Married => applicant.age >= 21 && (two_room > 0 || three_room > 0),
            };
            if eligible {
                viewable.push(project);
            }
        }

        Ok(viewable)
    }

    pub fn create_project(
        &self,
        manager: &User,
        draft: ProjectDraft,
    ) -> Result<Project, LifecycleError> {
        if manager.role != UserRole::Manager {
            return Err(RuleViolation::NotAManager.into());
        }
        if self.find_project(&draft.name)?.is_some() {
            return Err(RuleViolation::DuplicateProjectName(draft.name).into());
        }
        self.ensure_no_manager_overlap(&manager.nric, draft.open_date, draft.close_date, None)?;

        let project = Project::new(
            draft.name,
            draft.neighborhood,
            draft.two_room,
            draft.three_room,
            draft.open_date,
            draft.close_date,
            manager.nric.clone(),
            draft.officer_capacity,
            Vec::new(),
            true,
        )?;
        self.store.insert_project(project).map_err(integrity)
    }

    /// Apply edits to a managed project; a rename re-keys the stored record.
    pub fn edit_project(
        &self,
        manager: &User,
        name: &str,
        update: ProjectUpdate,
    ) -> Result<Project, LifecycleError> {
        let mut project = self.require_project(name)?;
        ensure_manages(manager, &project)?;

        if update.name != name && self.find_project(&update.name)?.is_some() {
            return Err(RuleViolation::DuplicateProjectName(update.name).into());
        }
        if update.open_date != project.open_date || update.close_date != project.close_date {
            self.ensure_no_manager_overlap(
                &manager.nric,
                update.open_date,
                update.close_date,
                Some(name),
            )?;
        }

        let renamed = update.name != name;
        project.update_details(update)?;

        if renamed {
            self.store.delete_project(name).map_err(integrity)?;
            self.store.insert_project(project).map_err(integrity)
        } else {
            self.store
                .update_project(project.clone())
                .map_err(integrity)?;
            Ok(project)
        }
    }

    pub fn delete_project(&self, manager: &User, name: &str) -> Result<(), LifecycleError> {
        let project = self.require_project(name)?;
        ensure_manages(manager, &project)?;
        self.store.delete_project(name).map_err(integrity)
    }

    /// Flip the visibility flag, returning the new state.
    pub fn toggle_visibility(&self, manager: &User, name: &str) -> Result<bool, LifecycleError> {
        let mut project = self.require_project(name)?;
        ensure_manages(manager, &project)?;

        project.set_visibility(!project.visible);
        let visible = project.visible;
        self.store.update_project(project).map_err(integrity)?;
        Ok(visible)
    }

    fn ensure_no_manager_overlap(
        &self,
        manager: &Nric,
        open_date: NaiveDate,
        close_date: NaiveDate,
        exclude: Option<&str>,
    ) -> Result<(), LifecycleError> {
        for project in self.projects_by_manager(manager)? {
            if exclude == Some(project.name.as_str()) {
                continue;
            }
            if super::project::windows_overlap(
                open_date,
                close_date,
                project.open_date,
                project.close_date,
            ) {
                return Err(RuleViolation::ManagerWindowOverlap(project.name).into());
            }
        }
        Ok(())
    }

    fn require_project(&self, name: &str) -> Result<Project, LifecycleError> {
        self.find_project(name)?
            .ok_or_else(|| RuleViolation::UnknownProject(name.to_string()).into())
    }
}
