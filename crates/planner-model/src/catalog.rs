//! Widget catalog
//!
//! An explicit registry object created at application startup and passed by
//! reference. It knows, per kind, the default size and settings, where the
//! widget may be placed and whether users may remove it.

use crate::error::SettingsError;
use crate::widget::{
    CounterSettings, GradeCalculatorSettings, LayoutConfig, Widget, WidgetContext, WidgetKind,
    WidgetSettings,
};
use planner_sync::EntityId;
use std::collections::BTreeMap;

/// Parent kinds a widget can be placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Allowed on semester dashboards
    pub semester: bool,
    /// Allowed on course dashboards
    pub course: bool,
}

impl Placement {
    /// Semester dashboards only
    pub const SEMESTER: Self = Self {
        semester: true,
        course: false,
    };
    /// Course dashboards only
    pub const COURSE: Self = Self {
        semester: false,
        course: true,
    };
    /// Anywhere
    pub const ANY: Self = Self {
        semester: true,
        course: true,
    };

    /// Check `context` is allowed
    #[must_use]
    pub fn allows(&self, context: &WidgetContext) -> bool {
        match context {
            WidgetContext::Semester(_) => self.semester,
            WidgetContext::Course(_) => self.course,
        }
    }
}

/// Per-kind catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetDescriptor {
    /// Kind described
    pub kind: WidgetKind,
    /// Human-readable name
    pub label: String,
    /// Size for new instances and for records with no layout
    pub default_layout: LayoutConfig,
    /// Settings for new instances and for records with no settings
    pub default_settings: WidgetSettings,
    /// Allowed parents
    pub placement: Placement,
    /// New instances can be deleted by the user
    pub removable: bool,
}

impl WidgetDescriptor {
    /// Descriptor with the kind's default settings, removable, placeable anywhere
    #[must_use]
    pub fn new(kind: WidgetKind, label: impl Into<String>, default_layout: LayoutConfig) -> Self {
        let default_settings = match kind {
            WidgetKind::CourseList => WidgetSettings::CourseList,
            WidgetKind::GradeCalculator => WidgetSettings::GradeCalculator(GradeCalculatorSettings::default()),
            WidgetKind::Counter => WidgetSettings::Counter(CounterSettings::default()),
        };
        Self {
            kind,
            label: label.into(),
            default_layout,
            default_settings,
            placement: Placement::ANY,
            removable: true,
        }
    }

    /// With allowed parents
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// With removability
    #[must_use]
    pub fn with_removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    /// With default settings
    #[must_use]
    pub fn with_default_settings(mut self, settings: WidgetSettings) -> Self {
        self.default_settings = settings;
        self
    }
}

/// Registry of widget kinds
#[derive(Debug, Clone, Default)]
pub struct WidgetCatalog {
    descriptors: BTreeMap<WidgetKind, WidgetDescriptor>,
}

impl WidgetCatalog {
    /// Create empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in kinds
    ///
    /// Course lists live on semesters and grade calculators on courses;
    /// both are created automatically and cannot be removed.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            WidgetDescriptor::new(WidgetKind::CourseList, "Course List", LayoutConfig::sized(6, 4))
                .with_placement(Placement::SEMESTER)
                .with_removable(false),
        );
        catalog.register(
            WidgetDescriptor::new(WidgetKind::GradeCalculator, "Grade Calculator", LayoutConfig::sized(4, 4))
                .with_placement(Placement::COURSE)
                .with_removable(false),
        );
        catalog.register(WidgetDescriptor::new(WidgetKind::Counter, "Counter", LayoutConfig::sized(2, 2)));
        catalog
    }

    /// Add or replace a descriptor
    ///
    /// Returns the descriptor it replaced.
    pub fn register(&mut self, descriptor: WidgetDescriptor) -> Option<WidgetDescriptor> {
        tracing::debug!(kind = %descriptor.kind, "widget kind registered");
        self.descriptors.insert(descriptor.kind, descriptor)
    }

    /// Descriptor for `kind`
    #[must_use]
    pub fn get(&self, kind: WidgetKind) -> Option<&WidgetDescriptor> {
        self.descriptors.get(&kind)
    }

    /// Registered kinds in stable order
    pub fn kinds(&self) -> impl Iterator<Item = WidgetKind> + '_ {
        self.descriptors.keys().copied()
    }

    /// Default settings for `kind`
    #[must_use]
    pub fn default_settings(&self, kind: WidgetKind) -> Option<WidgetSettings> {
        self.get(kind).map(|d| d.default_settings)
    }

    /// New widget of `kind` on `context`, with catalog defaults
    ///
    /// # Errors
    /// `UnknownKind` if not registered, `ContextNotAllowed` if the kind may
    /// not be placed there.
    pub fn create(&self, kind: WidgetKind, context: WidgetContext) -> Result<Widget, SettingsError> {
        let descriptor = self
            .get(kind)
            .ok_or_else(|| SettingsError::UnknownKind(kind.to_string()))?;
        if !descriptor.placement.allows(&context) {
            return Err(SettingsError::ContextNotAllowed {
                kind: kind.to_string(),
                context: context.kind(),
            });
        }
        Ok(Widget {
            id: EntityId::generate(),
            widget_type: kind,
            layout: descriptor.default_layout,
            settings: descriptor.default_settings,
            is_removable: descriptor.removable,
            context,
        })
    }

    /// Widgets every new parent starts with
    ///
    /// Non-removable kinds allowed on that parent.
    #[must_use]
    pub fn starter_widgets(&self, context: &WidgetContext) -> Vec<Widget> {
        self.descriptors
            .values()
            .filter(|d| !d.removable && d.placement.allows(context))
            .filter_map(|d| self.create(d.kind, context.clone()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_registered() {
        let catalog = WidgetCatalog::with_builtins();
        assert_eq!(
            catalog.kinds().collect::<Vec<_>>(),
            vec![WidgetKind::CourseList, WidgetKind::GradeCalculator, WidgetKind::Counter]
        );
        assert_eq!(
            catalog.default_settings(WidgetKind::Counter),
            Some(WidgetSettings::Counter(CounterSettings::default()))
        );
    }

    #[test]
    fn empty_catalog_knows_nothing() {
        let catalog = WidgetCatalog::new();
        assert!(catalog.get(WidgetKind::Counter).is_none());
        let err = catalog
            .create(WidgetKind::Counter, WidgetContext::Course(EntityId::new("c1")))
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownKind(_)));
    }

    #[test]
    fn placement_enforced() {
        let catalog = WidgetCatalog::with_builtins();
        let err = catalog
            .create(WidgetKind::GradeCalculator, WidgetContext::Semester(EntityId::new("s1")))
            .unwrap_err();
        assert!(matches!(err, SettingsError::ContextNotAllowed { context: "semester", .. }));

        let widget = catalog
            .create(WidgetKind::Counter, WidgetContext::Semester(EntityId::new("s1")))
            .unwrap();
        assert!(widget.is_removable);
    }

    #[test]
    fn starter_widgets_per_parent() {
        let catalog = WidgetCatalog::with_builtins();

        let semester = catalog.starter_widgets(&WidgetContext::Semester(EntityId::new("s1")));
        assert_eq!(semester.len(), 1);
        assert_eq!(semester[0].widget_type, WidgetKind::CourseList);
        assert!(!semester[0].is_removable);

        let course = catalog.starter_widgets(&WidgetContext::Course(EntityId::new("c1")));
        assert_eq!(course.len(), 1);
        assert_eq!(course[0].widget_type, WidgetKind::GradeCalculator);
    }

    #[test]
    fn register_replaces() {
        let mut catalog = WidgetCatalog::with_builtins();
        let previous = catalog.register(
            WidgetDescriptor::new(WidgetKind::Counter, "Tally", LayoutConfig::sized(3, 1))
                .with_default_settings(WidgetSettings::Counter(CounterSettings {
                    max: 100.0,
                    ..CounterSettings::default()
                })),
        );
        assert_eq!(previous.map(|d| d.label), Some("Counter".to_string()));
        assert_eq!(catalog.get(WidgetKind::Counter).unwrap().default_layout.w, 3);
    }
}
