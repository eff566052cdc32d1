//! Semester record

use chrono::NaiveDate;
use planner_sync::{EntityId, PatchError, SyncEntity};
use serde::{Deserialize, Serialize};

/// A term within a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    /// Record id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Owning program
    pub program_id: EntityId,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Average course percentage (server-computed)
    pub average_percentage: f64,
    /// Average scaled grade (server-computed)
    pub average_scaled: f64,
}

impl Semester {
    /// Create semester with a fresh id
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program_id: impl Into<EntityId>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            program_id: program_id.into(),
            start_date,
            end_date,
            average_percentage: 0.0,
            average_scaled: 0.0,
        }
    }

    /// Number of days covered, both ends included
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

impl SyncEntity for Semester {
    const KIND: &'static str = "semester";
    const READ_ONLY_FIELDS: &'static [&'static str] =
        &["id", "program_id", "average_percentage", "average_scaled"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> Result<(), PatchError> {
        if self.start_date > self.end_date {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_SEMESTER_DATE_RANGE",
                "start_date must be earlier than or equal to end_date",
            ));
        }
        Ok(())
    }
}
