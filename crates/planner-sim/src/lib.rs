//! Planner Sync Simulator
//!
//! Seeded simulation of concurrent course edits against a remote store that
//! drops requests and responses. Used to check the sync engine end to end:
//! nothing the user typed is lost silently, and an idle view always matches
//! the store.

#![warn(missing_docs)]

pub mod simulator;
pub mod store;

pub use simulator::{run_simulator, SimulatorConfig, SimulatorReport, SimulatorStats, Violation};
pub use store::{Fate, FlakyStore, StoreStats};

/// Simulator setup errors
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Config file is not valid TOML for [`SimulatorConfig`]
    #[error("failed to parse simulator config: {0}")]
    Config(#[from] toml::de::Error),

    /// Engine settings derived from the config were refused
    #[error(transparent)]
    Sync(#[from] planner_sync::ConfigError),

    /// Value out of range
    #[error("invalid simulator config: {0}")]
    Invalid(String),
}
