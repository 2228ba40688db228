use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{FlatType, Nric, RuleViolation, ValidationError};

pub const MAX_OFFICER_SLOTS: u8 = 10;

/// Unit count and selling price for one flat type within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatInventory {
    pub units: u32,
    pub price: u32,
}

/// Closed-interval overlap: `[s1, e1]` and `[s2, e2]` share at least one day.
pub fn windows_overlap(s1: NaiveDate, e1: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s1 <= e2 && s2 <= e1
}

/// A housing project and its inventory.
///
/// Unit counts and the officer list are mutated exclusively through the
/// guarded methods below, which keep `units >= 0` and
/// `officers.len() <= officer_capacity` structurally true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub neighborhood: String,
    two_room: FlatInventory,
    three_room: FlatInventory,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub manager: Nric,
    officer_capacity: u8,
    officers: Vec<Nric>,
    pub visible: bool,
}

/// Replacement attribute set applied through [`Project::update_details`].
#[derive(Debug, Clone)]
pub struct ProjectUpdate {
    pub name: String,
    pub neighborhood: String,
    pub two_room: FlatInventory,
    pub three_room: FlatInventory,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub officer_capacity: u8,
}

impl Project {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        neighborhood: impl Into<String>,
        two_room: FlatInventory,
        three_room: FlatInventory,
        open_date: NaiveDate,
        close_date: NaiveDate,
        manager: Nric,
        officer_capacity: u8,
        officers: Vec<Nric>,
        visible: bool,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let neighborhood = neighborhood.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField("project name"));
        }
        if neighborhood.trim().is_empty() {
            return Err(ValidationError::EmptyField("neighborhood"));
        }
        if close_date < open_date {
            return Err(ValidationError::WindowOrder {
                open: open_date,
                close: close_date,
            });
        }
        if officer_capacity > MAX_OFFICER_SLOTS {
            return Err(ValidationError::OfficerSlotRange {
                got: officer_capacity,
                max: MAX_OFFICER_SLOTS,
            });
        }
        if officers.len() > officer_capacity as usize {
            return Err(ValidationError::OfficersExceedSlots {
                assigned: officers.len(),
                capacity: officer_capacity,
            });
        }
        if let Some(dup) = first_duplicate(&officers) {
            return Err(ValidationError::DuplicateOfficer(dup.clone()));
        }

        Ok(Self {
            name,
            neighborhood,
            two_room,
            three_room,
            open_date,
            close_date,
            manager,
            officer_capacity,
            officers,
            visible,
        })
    }

    pub fn inventory(&self, flat_type: FlatType) -> FlatInventory {
        match flat_type {
            FlatType::TwoRoom => self.two_room,
            FlatType::ThreeRoom => self.three_room,
        }
    }

    pub fn units(&self, flat_type: FlatType) -> u32 {
        self.inventory(flat_type).units
    }

    pub fn price(&self, flat_type: FlatType) -> u32 {
        self.inventory(flat_type).price
    }

    pub fn officers(&self) -> &[Nric] {
        &self.officers
    }

    pub fn officer_capacity(&self) -> u8 {
        self.officer_capacity
    }

    pub fn is_assigned_officer(&self, nric: &Nric) -> bool {
        self.officers.contains(nric)
    }

    pub fn available_officer_slots(&self) -> u8 {
        self.officer_capacity - self.officers.len() as u8
    }

    pub fn can_add_officer(&self) -> bool {
        self.available_officer_slots() > 0
    }

    /// Whether applicants may currently apply: visible and inside the window.
    pub fn is_open(&self, today: NaiveDate) -> bool {
        self.visible && self.open_date <= today && today <= self.close_date
    }

    pub fn window_overlaps(&self, other: &Project) -> bool {
        windows_overlap(
            self.open_date,
            self.close_date,
            other.open_date,
            other.close_date,
        )
    }

    /// Takes one unit of `flat_type` if any remain. Returns false (and leaves
    /// the count untouched) when the inventory is exhausted.
    pub fn decrement_units(&mut self, flat_type: FlatType) -> bool {
        let inventory = match flat_type {
            FlatType::TwoRoom => &mut self.two_room,
            FlatType::ThreeRoom => &mut self.three_room,
        };
        if inventory.units == 0 {
            return false;
        }
        inventory.units -= 1;
        true
    }

    /// Returns one unit of `flat_type` to the inventory.
    pub fn increment_units(&mut self, flat_type: FlatType) {
        let inventory = match flat_type {
            FlatType::TwoRoom => &mut self.two_room,
            FlatType::ThreeRoom => &mut self.three_room,
        };
        inventory.units += 1;
    }

    /// Assigns an officer, consuming a slot. Adding an already-assigned
    /// officer is a no-op success.
    pub fn add_officer(&mut self, nric: &Nric) -> Result<(), RuleViolation> {
        if self.officers.contains(nric) {
            return Ok(());
        }
        if !self.can_add_officer() {
            return Err(RuleViolation::NoOfficerSlots(self.name.clone()));
        }
        self.officers.push(nric.clone());
        Ok(())
    }

    pub fn remove_officer(&mut self, nric: &Nric) -> bool {
        let before = self.officers.len();
        self.officers.retain(|assigned| assigned != nric);
        self.officers.len() < before
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Replaces editable attributes after re-validating them against the
    /// current officer assignment.
    pub fn update_details(&mut self, update: ProjectUpdate) -> Result<(), ValidationError> {
        if update.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("project name"));
        }
        if update.neighborhood.trim().is_empty() {
            return Err(ValidationError::EmptyField("neighborhood"));
        }
        if update.close_date < update.open_date {
            return Err(ValidationError::WindowOrder {
                open: update.open_date,
                close: update.close_date,
            });
        }
        if update.officer_capacity > MAX_OFFICER_SLOTS {
            return Err(ValidationError::OfficerSlotRange {
                got: update.officer_capacity,
                max: MAX_OFFICER_SLOTS,
            });
        }
        if (update.officer_capacity as usize) < self.officers.len() {
            return Err(ValidationError::OfficersExceedSlots {
                assigned: self.officers.len(),
                capacity: update.officer_capacity,
            });
        }

        self.name = update.name;
        self.neighborhood = update.neighborhood;
        self.two_room = update.two_room;
        self.three_room = update.three_room;
        self.open_date = update.open_date;
        self.close_date = update.close_date;
        self.officer_capacity = update.officer_capacity;
        Ok(())
    }
}

fn first_duplicate(officers: &[Nric]) -> Option<&Nric> {
    officers
        .iter()
        .enumerate()
        .find(|(index, nric)| officers[..*index].contains(nric))
        .map(|(_, nric)| nric)
}
