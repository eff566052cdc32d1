//! Dashboard widgets with typed settings
//!
//! The store keeps `settings` and `layout_config` as JSON text. They are
//! parsed exactly once, in [`WidgetRecord::parse`], into [`WidgetSettings`]
//! and [`LayoutConfig`]; a bad blob is an error, never an empty default.

use crate::catalog::WidgetCatalog;
use crate::error::SettingsError;
use planner_sync::{EntityId, PatchError, SyncEntity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widget type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    /// Courses of a semester
    CourseList,
    /// Grade breakdown of a course
    GradeCalculator,
    /// Free-standing numeric counter
    Counter,
}

impl WidgetKind {
    /// All built-in kinds
    pub const ALL: [Self; 3] = [Self::CourseList, Self::GradeCalculator, Self::Counter];

    /// Stored type name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CourseList => "course-list",
            Self::GradeCalculator => "grade-calculator",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownKind(s.to_string()))
    }
}

/// Grid placement in layout units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Column
    pub x: u32,
    /// Row
    pub y: u32,
    /// Width
    pub w: u32,
    /// Height
    pub h: u32,
}

impl LayoutConfig {
    /// Size at the origin
    #[inline]
    #[must_use]
    pub const fn sized(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w, h }
    }
}

/// Grade calculator options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeCalculatorSettings {
    /// Show the scaled grade next to the percentage
    pub show_scaled: bool,
}

/// Counter state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterSettings {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Current value
    pub value: f64,
    /// Increment per click
    pub step: f64,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 10.0,
            value: 0.0,
            step: 1.0,
        }
    }
}

impl CounterSettings {
    /// Check `min <= value <= max` and a positive step
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min <= self.value && self.value <= self.max && self.step > 0.0
    }

    /// Move by `steps` increments, clamped to the bounds
    #[must_use]
    pub fn stepped(mut self, steps: i32) -> Self {
        self.value = (self.value + f64::from(steps) * self.step).clamp(self.min, self.max);
        self
    }
}

/// Settings payload, one variant per widget kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WidgetSettings {
    /// No options
    CourseList,
    /// Grade calculator options
    GradeCalculator(GradeCalculatorSettings),
    /// Counter state
    Counter(CounterSettings),
}

impl WidgetSettings {
    /// Kind this payload belongs to
    #[must_use]
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::CourseList => WidgetKind::CourseList,
            Self::GradeCalculator(_) => WidgetKind::GradeCalculator,
            Self::Counter(_) => WidgetKind::Counter,
        }
    }

    /// Parse a stored blob for `kind`
    ///
    /// Empty text and `{}` both yield the kind's defaults; missing keys are
    /// filled from defaults as well.
    ///
    /// # Errors
    /// `SettingsError::Malformed` when the text is not valid for `kind`.
    pub fn from_blob(kind: WidgetKind, blob: &str) -> Result<Self, SettingsError> {
        let blob = if blob.trim().is_empty() { "{}" } else { blob };
        let malformed = |source| SettingsError::Malformed {
            kind: kind.to_string(),
            field: "settings",
            source,
        };

        Ok(match kind {
            WidgetKind::CourseList => {
                serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(blob).map_err(malformed)?;
                Self::CourseList
            }
            WidgetKind::GradeCalculator => Self::GradeCalculator(serde_json::from_str(blob).map_err(malformed)?),
            WidgetKind::Counter => Self::Counter(serde_json::from_str(blob).map_err(malformed)?),
        })
    }

    /// Serialize to the stored blob form (no kind tag)
    #[must_use]
    pub fn to_blob(&self) -> String {
        let blob = match self {
            Self::CourseList => Ok("{}".to_string()),
            Self::GradeCalculator(settings) => serde_json::to_string(settings),
            Self::Counter(settings) => serde_json::to_string(settings),
        };
        // Plain structs of bools and floats always serialize
        blob.unwrap_or_else(|_| "{}".to_string())
    }
}

/// Parent a widget or tab is placed on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum WidgetContext {
    /// Semester dashboard
    Semester(EntityId),
    /// Course dashboard
    Course(EntityId),
}

impl WidgetContext {
    /// Parent kind name
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Semester(_) => "semester",
            Self::Course(_) => "course",
        }
    }

    /// Parent id
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Semester(id) | Self::Course(id) => id,
        }
    }

    /// Build from the stored pair of nullable foreign keys
    ///
    /// # Errors
    /// `SettingsError::Context` unless exactly one is set.
    pub fn from_parts(
        semester_id: Option<EntityId>,
        course_id: Option<EntityId>,
    ) -> Result<Self, SettingsError> {
        match (semester_id, course_id) {
            (Some(id), None) => Ok(Self::Semester(id)),
            (None, Some(id)) => Ok(Self::Course(id)),
            _ => Err(SettingsError::Context),
        }
    }
}

/// A widget in typed form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    /// Record id
    pub id: EntityId,
    /// Widget type
    pub widget_type: WidgetKind,
    /// Grid placement
    pub layout: LayoutConfig,
    /// Kind-specific payload
    pub settings: WidgetSettings,
    /// User may delete it
    pub is_removable: bool,
    /// Parent dashboard
    pub context: WidgetContext,
}

impl Widget {
    /// Convert back to the stored shape
    #[must_use]
    pub fn to_record(&self) -> WidgetRecord {
        let (semester_id, course_id) = match &self.context {
            WidgetContext::Semester(id) => (Some(id.clone()), None),
            WidgetContext::Course(id) => (None, Some(id.clone())),
        };
        WidgetRecord {
            id: self.id.clone(),
            widget_type: self.widget_type.to_string(),
            layout_config: serde_json::to_string(&self.layout).unwrap_or_else(|_| "{}".to_string()),
            settings: self.settings.to_blob(),
            is_removable: self.is_removable,
            semester_id,
            course_id,
        }
    }
}

impl SyncEntity for Widget {
    const KIND: &'static str = "widget";
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "widget_type", "context", "is_removable"];

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn validate(&self) -> Result<(), PatchError> {
        if self.settings.kind() != self.widget_type {
            return Err(PatchError::invalid(
                Self::KIND,
                "SETTINGS_KIND_MISMATCH",
                format!("{} settings on a {} widget", self.settings.kind(), self.widget_type),
            ));
        }
        if let WidgetSettings::Counter(counter) = &self.settings {
            if !counter.is_valid() {
                return Err(PatchError::invalid(
                    Self::KIND,
                    "COUNTER_OUT_OF_RANGE",
                    "counter needs min <= value <= max and a positive step",
                ));
            }
        }
        if self.layout.w == 0 || self.layout.h == 0 {
            return Err(PatchError::invalid(
                Self::KIND,
                "INVALID_LAYOUT",
                "widget width and height must be positive",
            ));
        }
        Ok(())
    }
}

/// A widget as stored, with JSON text blobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetRecord {
    /// Record id
    pub id: EntityId,
    /// Type name
    pub widget_type: String,
    /// Grid placement JSON
    #[serde(default)]
    pub layout_config: String,
    /// Settings JSON
    #[serde(default)]
    pub settings: String,
    /// User may delete it
    pub is_removable: bool,
    /// Semester parent
    pub semester_id: Option<EntityId>,
    /// Course parent
    pub course_id: Option<EntityId>,
}

impl WidgetRecord {
    /// Parse the stored blobs into a typed widget
    ///
    /// # Errors
    /// - `UnknownKind` if the catalog has no descriptor for the type
    /// - `Context` if not attached to exactly one parent
    /// - `Malformed` if either blob is not valid JSON for its kind
    pub fn parse(self, catalog: &WidgetCatalog) -> Result<Widget, SettingsError> {
        let widget_type: WidgetKind = self.widget_type.parse()?;
        let descriptor = catalog
            .get(widget_type)
            .ok_or_else(|| SettingsError::UnknownKind(self.widget_type.clone()))?;
        let context = WidgetContext::from_parts(self.semester_id, self.course_id)?;

        let layout = match self.layout_config.trim() {
            "" | "{}" => descriptor.default_layout,
            text => serde_json::from_str(text).map_err(|source| SettingsError::Malformed {
                kind: widget_type.to_string(),
                field: "layout_config",
                source,
            })?,
        };
        let settings = match self.settings.trim() {
            "" | "{}" => descriptor.default_settings,
            text => WidgetSettings::from_blob(widget_type, text)?,
        };

        tracing::trace!(id = %self.id, kind = %widget_type, "widget record parsed");
        Ok(Widget {
            id: self.id,
            widget_type,
            layout,
            settings,
            is_removable: self.is_removable,
            context,
        })
    }
}
