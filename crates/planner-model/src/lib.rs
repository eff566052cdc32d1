//! Planner Model
//!
//! Records managed by the sync engine and the typed widget and tab layer.
//!
//! # Core Concepts
//!
//! - [`Program`], [`Semester`], [`Course`]: academic records, each a
//!   [`SyncEntity`](planner_sync::SyncEntity) with its own read-only fields
//!   and invariants
//! - [`Widget`]: dashboard widget with typed [`WidgetSettings`]
//! - [`WidgetRecord`]: stored shape; parsed once at the boundary
//! - [`WidgetCatalog`]: registry of widget kinds, passed by reference
//! - [`Tab`]: ordered dashboard tab with typed [`TabSettings`], parsed from
//!   [`TabRecord`]; shares the single-parent rule with widgets
//!
//! # Example
//!
//! ```rust,ignore
//! use planner_model::{WidgetCatalog, WidgetRecord};
//!
//! let catalog = WidgetCatalog::with_builtins();
//! let widget = record.parse(&catalog)?;   // Malformed blobs are errors
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod catalog;
mod course;
mod error;
mod program;
mod semester;
mod tab;
mod widget;

// Re-exports
pub use catalog::{Placement, WidgetCatalog, WidgetDescriptor};
pub use course::Course;
pub use error::SettingsError;
pub use program::{Program, DEFAULT_TIMEZONE};
pub use semester::Semester;
pub use tab::{NotesSettings, ScheduleSettings, Tab, TabKind, TabRecord, TabSettings};
pub use widget::{
    CounterSettings, GradeCalculatorSettings, LayoutConfig, Widget, WidgetContext, WidgetKind,
    WidgetRecord, WidgetSettings,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
