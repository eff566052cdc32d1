//! Dashboard tabs with typed settings
//!
//! Tabs share the widget parent rule: each sits on exactly one semester or
//! course. The stored `settings` text is parsed once, in [`TabRecord::parse`].

use crate::error::SettingsError;
use crate::widget::WidgetContext;
use planner_sync::{EntityId, PatchError, SyncEntity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tab type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabKind {
    /// Widget grid
    Dashboard,
    /// Free-form notes
    Notes,
    /// Weekly timetable
    Schedule,
}

impl TabKind {
    /// All built-in kinds
    pub const ALL: [Self; 3] = [Self::Dashboard, Self::Notes, Self::Schedule];

    /// Stored type name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Notes => "notes",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for TabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownKind(s.to_string()))
    }
}

/// Notes tab content
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesSettings {
    /// Note text
    pub content: String,
}

/// Schedule tab options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Show Saturday and Sunday columns
    pub show_weekends: bool,
}

/// Settings payload, one variant per tab kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TabSettings {
    /// No options
    Dashboard,
    /// Notes content
    Notes(NotesSettings),
    /// Schedule options
    Schedule(ScheduleSettings),
}

impl TabSettings {
    /// Defaults for `kind`
    #[must_use]
    pub fn default_for(kind: TabKind) -> Self {
        match kind {
            TabKind::Dashboard => Self::Dashboard,
            TabKind::Notes => Self::Notes(NotesSettings::default()),
            TabKind::Schedule => Self::Schedule(ScheduleSettings::default()),
        }
    }

    /// Kind this payload belongs to
    #[must_use]
    pub fn kind(&self) -> TabKind {
        match self {
            Self::Dashboard => TabKind::Dashboard,
            Self::Notes(_) => TabKind::Notes,
            Self::Schedule(_) => TabKind::Schedule,
        }
    }

    /// Parse a stored blob for `kind`
    ///
    /// Empty text is `{}`; missing keys take their defaults.
    ///
    /// # Errors
    /// `SettingsError::Malformed` when the text is not valid for `kind`.
    pub fn from_blob(kind: TabKind, blob: &str) -> Result<Self, SettingsError> {
        let blob = if blob.trim().is_empty() { "{}" } else { blob };
        let malformed = |source| SettingsError::Malformed {
            kind: kind.to_string(),
            field: "settings",
            source,
        };

        Ok(match kind {
            TabKind::Dashboard => {
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(blob).map_err(malformed)?;
                Self::Dashboard
            }
            TabKind::Notes => Self::Notes(serde_json::from_str(blob).map_err(malformed)?),
            TabKind::Schedule => Self::Schedule(serde_json::from_str(blob).map_err(malformed)?),
        })
    }

    /// Serialize to the stored blob form (no kind tag)
    #[must_use]
    pub fn to_blob(&self) -> String {
        let blob = match self {
            Self::Dashboard => Ok("{}".to_string()),
            Self::Notes(settings) => serde_json::to_string(settings),
            Self::Schedule(settings) => serde_json::to_string(settings),
        };
        blob.unwrap_or_else(|_| "{}".to_string())
    }
}

/// A tab in typed form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Record id
    pub id: EntityId,
    /// Tab type
    pub tab_type: TabKind,
    /// Kind-specific payload
    pub settings: TabSettings,
    /// Position among the parent's tabs
    pub order_index: i32,
    /// User may delete it
    pub is_removable: bool,
    /// User may reorder it
    pub is_draggable: bool,
    /// Parent dashboard
    pub context: WidgetContext,
}

impl Tab {
    /// Create a tab with default settings
    #[must_use]
    pub fn new(id: impl Into<EntityId>, tab_type: TabKind, context: WidgetContext, order_index: i32) -> Self {
        Self {
            id: id.into(),
            tab_type,
            settings: TabSettings::default_for(tab_type),
            order_index,
            is_removable: true,
            is_draggable: true,
            context,
        }
    }

    /// Position for a tab appended to `context`: one past the highest in use
    #[must_use]
    pub fn next_order_index<'a>(tabs: impl IntoIterator<Item = &'a Tab>, context: &WidgetContext) -> i32 {
        tabs.into_iter()
            .filter(|tab| &tab.context == context)
            .map(|tab| tab.order_index)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Convert back to the stored shape
    #[must_use]
    pub fn to_record(&self) -> TabRecord {
        let (semester_id, course_id) = match &self.context {
            WidgetContext::Semester(id) => (Some(id.clone()), None),
            WidgetContext::Course(id) => (None, Some(id.clone())),
        };
        TabRecord {
            id: self.id.clone(),
            tab_type: self.tab_type.to_string(),
            settings: self.settings.to_blob(),
            order_index: self.order_index,
            is_removable: self.is_removable,
            is_draggable: self.is_draggable,
            semester_id,
            course_id,
        }
    }
}

impl SyncEntity for Tab {
    const KIND: &'static str = "tab";
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "tab_type", "context", "is_removable"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> Result<(), PatchError> {
        if self.settings.kind() != self.tab_type {
            return Err(PatchError::invalid(
                Self::KIND,
                "SETTINGS_KIND_MISMATCH",
                format!("{} settings on a {} tab", self.settings.kind(), self.tab_type),
            ));
        }
        if self.order_index < 0 {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_ORDER_INDEX",
                "tab order_index must not be negative",
            ));
        }
        Ok(())
    }
}

/// A tab as stored, with a JSON text settings blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRecord {
    /// Record id
    pub id: EntityId,
    /// Type name
    pub tab_type: String,
    /// Settings JSON
    #[serde(default)]
    pub settings: String,
    /// Position among the parent's tabs
    #[serde(default)]
    pub order_index: i32,
    /// User may delete it
    #[serde(default = "default_true")]
    pub is_removable: bool,
    /// User may reorder it
    #[serde(default = "default_true")]
    pub is_draggable: bool,
    /// Semester parent
    pub semester_id: Option<EntityId>,
    /// Course parent
    pub course_id: Option<EntityId>,
}

fn default_true() -> bool {
    true
}

impl TabRecord {
    /// Parse the stored blob into a typed tab
    ///
    /// # Errors
    /// - `UnknownKind` if the type name is not a known tab kind
    /// - `Context` if not attached to exactly one parent
    /// - `Malformed` if the settings blob is not valid JSON for its kind
    pub fn parse(self) -> Result<Tab, SettingsError> {
        let tab_type: TabKind = self.tab_type.parse()?;
        let context = WidgetContext::from_parts(self.semester_id, self.course_id)?;
        let settings = TabSettings::from_blob(tab_type, &self.settings)?;

        tracing::trace!(id = %self.id, kind = %tab_type, "tab record parsed");
        Ok(Tab {
            id: self.id,
            tab_type,
            settings,
            order_index: self.order_index,
            is_removable: self.is_removable,
            is_draggable: self.is_draggable,
            context,
        })
    }
}
