//! Planner Sync
//!
//! Optimistic synchronization of remote records for the planner client.
//! Edits apply to the local snapshot immediately and are coalesced into
//! background writes; slow responses never clobber fresher local state and
//! failed writes are folded back into the next one.
//!
//! # Core Concepts
//!
//! - [`EntitySync`]: one entity view (`value`, `mutate`, `refresh`, `is_loading`)
//! - [`SyncEntity`]: contract for records the engine can manage
//! - [`RemoteAccessor`]: `fetch` / `update` boundary supplied by the integrator
//! - [`FetchCache`]: snapshot storage with stale-response rejection
//! - [`PendingBuffer`]: edits waiting to be flushed
//! - [`DebounceTimer`]: restartable quiet-period timer
//! - [`StalenessGuard`]: flush sequence counter
//! - [`SyncHub`]: explicit registry of open views with `flush_all`
//!
//! # Example
//!
//! ```rust,ignore
//! use planner_sync::{EntityId, EntitySync, Patch, SyncConfig};
//!
//! let view = EntitySync::new(course_accessor, SyncConfig::default());
//! view.bind(Some(EntityId::new("c1")));
//!
//! // Visible immediately, sent after one quiet second
//! view.mutate(Patch::new().set("credits", 4.5))?;
//!
//! // Leaving the view flushes whatever is still buffered
//! view.dispose();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod accessor;
pub mod buffer;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod hub;
pub mod notify;
pub mod patch;
pub mod staleness;
pub mod types;

// Re-exports
pub use accessor::{accessor_fn, FnAccessor, RemoteAccessor};
pub use buffer::PendingBuffer;
pub use config::{SyncConfig, DEFAULT_DEBOUNCE, DEFAULT_ERROR_MESSAGE, DEFAULT_TEARDOWN_MESSAGE};
pub use debounce::DebounceTimer;
pub use engine::EntitySync;
pub use entity::{EntityId, SyncEntity};
pub use error::{AccessError, ConfigError, PatchError};
pub use fetch::{FetchCache, LoadTicket};
pub use hub::SyncHub;
pub use notify::{SyncNotice, SyncNotifier, TracingNotifier};
pub use patch::Patch;
pub use staleness::{FlushTicket, StalenessGuard};
pub use types::{FlushOutcome, FlushReason, LoadOutcome, MutateOutcome, SyncState, SyncStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
