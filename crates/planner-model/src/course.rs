//! Course record

use planner_sync::{EntityId, PatchError, SyncEntity};
use serde::{Deserialize, Serialize};

/// A course taken in a program, optionally placed in a semester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Record id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Short alias shown next to the name
    pub alias: Option<String>,
    /// Category code, e.g. a department prefix
    pub category: Option<String>,
    /// Owning program
    pub program_id: Option<EntityId>,
    /// Semester placement; `None` while unassigned
    pub semester_id: Option<EntityId>,
    /// Credit weight
    pub credits: f64,
    /// Final or running grade in percent
    pub grade_percentage: f64,
    /// Grade on the program's scale (server-computed)
    pub grade_scaled: f64,
    /// Count toward GPA
    pub include_in_gpa: bool,
    /// Hide GPA figures in the UI
    pub hide_gpa: bool,
}

impl Course {
    /// Create course with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, credits: f64) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            alias: None,
            category: None,
            program_id: None,
            semester_id: None,
            credits,
            grade_percentage: 0.0,
            grade_scaled: 0.0,
            include_in_gpa: true,
            hide_gpa: false,
        }
    }

    /// With explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = id.into();
        self
    }

    /// With owning program
    #[must_use]
    pub fn with_program(mut self, program_id: impl Into<EntityId>) -> Self {
        self.program_id = Some(program_id.into());
        self
    }

    /// With semester placement
    #[must_use]
    pub fn with_semester(mut self, semester_id: impl Into<EntityId>) -> Self {
        self.semester_id = Some(semester_id.into());
        self
    }
}

impl SyncEntity for Course {
    const KIND: &'static str = "course";
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "program_id", "grade_scaled"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> Result<(), PatchError> {
        if !self.credits.is_finite() || self.credits < 0.0 {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_CREDITS",
                "credits must be a non-negative number",
            ));
        }
        Ok(())
    }
}
