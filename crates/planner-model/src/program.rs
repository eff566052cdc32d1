//! Program record

use planner_sync::{EntityId, PatchError, SyncEntity};
use serde::{Deserialize, Serialize};

/// Default timezone for new programs
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// A degree program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Record id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// IANA timezone used for schedules
    pub program_timezone: String,
    /// Cumulative GPA on the scaled table (server-computed)
    pub cgpa_scaled: f64,
    /// Cumulative average percentage (server-computed)
    pub cgpa_percentage: f64,
    /// Percentage band to scaled grade table, as stored JSON text
    pub gpa_scaling_table: Option<String>,
    /// Credits required to graduate
    pub grad_requirement_credits: f64,
    /// Hide GPA figures in the UI
    pub hide_gpa: bool,
}

impl Program {
    /// Create program with defaults and a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate(),
            name: name.into(),
            program_timezone: DEFAULT_TIMEZONE.to_string(),
            cgpa_scaled: 0.0,
            cgpa_percentage: 0.0,
            gpa_scaling_table: None,
            grad_requirement_credits: 0.0,
            hide_gpa: false,
        }
    }

    /// With explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = id.into();
        self
    }
}

impl SyncEntity for Program {
    const KIND: &'static str = "program";
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "cgpa_scaled", "cgpa_percentage"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> Result<(), PatchError> {
        if self.program_timezone.trim().is_empty() {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_TIMEZONE",
                "program_timezone must not be empty",
            ));
        }
        if self.grad_requirement_credits < 0.0 {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_CREDITS",
                "grad_requirement_credits must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_sync::Patch;

    #[test]
    fn new_program_defaults() {
        let program = Program::new("CS");
        assert_eq!(program.program_timezone, "UTC");
        assert!(!program.hide_gpa);
        assert!(program.validate().is_ok());
    }

    #[test]
    fn cgpa_is_read_only() {
        let mut program = Program::new("CS");
        let err = program.apply_local(&Patch::new().set("cgpa_scaled", 4.0)).unwrap_err();
        assert!(matches!(err, PatchError::ReadOnlyField { .. }));
    }

    #[test]
    fn empty_timezone_rejected() {
        let mut program = Program::new("CS");
        let err = program.apply_local(&Patch::new().set("program_timezone", " ")).unwrap_err();
        assert!(matches!(err, PatchError::Invalid { code: "INVALID_TIMEZONE", .. }));
        assert_eq!(program.program_timezone, "UTC");
    }

    #[test]
    fn scaling_table_is_editable() {
        let mut program = Program::new("CS");
        program
            .apply_local(&Patch::new().set("gpa_scaling_table", r#"{"90-100": 4.0}"#))
            .unwrap();
        assert!(program.gpa_scaling_table.is_some());
    }
}
