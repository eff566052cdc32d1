//! Core types shared by the sync components
//!
//! - Per-view lifecycle state
//! - Outcomes of loads, flushes and mutations
//! - Engine statistics

use std::fmt;

/// Lifecycle state of one entity view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No id bound, or the last load produced no snapshot
    Unloaded,
    /// First fetch for the bound id in progress
    Loading,
    /// Snapshot available
    Ready {
        /// Buffered edits not yet sent
        dirty: bool,
        /// A flush is awaiting its response
        flushing: bool,
    },
    /// Torn down; further edits are ignored
    Disposed,
}

impl SyncState {
    /// Ready with nothing buffered and nothing in flight
    pub const IDLE: Self = Self::Ready {
        dirty: false,
        flushing: false,
    };

    /// Check if a snapshot is available
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Check if edits are waiting to be sent
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Ready { dirty: true, .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("unloaded"),
            Self::Loading => f.write_str("loading"),
            Self::Ready { dirty, flushing } => match (dirty, flushing) {
                (false, false) => f.write_str("ready"),
                (true, false) => f.write_str("ready(dirty)"),
                (false, true) => f.write_str("ready(flushing)"),
                (true, true) => f.write_str("ready(dirty, flushing)"),
            },
            Self::Disposed => f.write_str("disposed"),
        }
    }
}

/// Result of a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Snapshot replaced with the fetched record
    Loaded,
    /// Fetch failed
    Failed,
    /// A newer request or a rebind made this response irrelevant
    Superseded,
    /// Nothing bound to fetch
    Unbound,
}

/// Result of a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Buffer was empty, nothing sent
    Idle,
    /// Server response merged into the snapshot
    Applied,
    /// Write succeeded but a newer flush or edit superseded the response
    Discarded,
    /// Write failed; payload merged back into the buffer
    Failed,
}

/// Result of a local edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateOutcome {
    /// Applied to the snapshot and buffered
    Applied,
    /// No snapshot loaded yet; nothing happened
    NotLoaded,
    /// View already torn down; nothing happened
    Disposed,
}

/// Why a flush was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Debounce timer fired
    Debounce,
    /// Explicit `flush_now`
    Forced,
    /// View disposed or rebound to another id
    Teardown,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debounce => f.write_str("debounce"),
            Self::Forced => f.write_str("forced"),
            Self::Teardown => f.write_str("teardown"),
        }
    }
}

/// Engine statistics for one view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Successful fetches applied
    pub loads: u64,
    /// Failed fetches
    pub load_failures: u64,
    /// Update calls issued
    pub flushes_started: u64,
    /// Responses merged into the snapshot
    pub flushes_applied: u64,
    /// Successful responses dropped by the staleness guard
    pub flushes_discarded: u64,
    /// Update calls that failed
    pub flushes_failed: u64,
    /// Update calls issued by teardown
    pub teardown_flushes: u64,
}

impl SyncStats {
    /// Update calls that have completed either way
    #[inline]
    #[must_use]
    pub fn flushes_completed(&self) -> u64 {
        self.flushes_applied + self.flushes_discarded + self.flushes_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_state_display() {
        assert_eq!(SyncState::IDLE.to_string(), "ready");
        assert_eq!(
            SyncState::Ready {
                dirty: true,
                flushing: false
            }
            .to_string(),
            "ready(dirty)"
        );
        assert_eq!(SyncState::Disposed.to_string(), "disposed");
    }

    #[test]
    fn sync_state_predicates() {
        assert!(SyncState::IDLE.is_ready());
        assert!(!SyncState::IDLE.is_dirty());
        assert!(!SyncState::Loading.is_ready());
    }

    #[test]
    fn stats_completed() {
        let stats = SyncStats {
            flushes_applied: 2,
            flushes_discarded: 1,
            flushes_failed: 3,
            ..SyncStats::default()
        };
        assert_eq!(stats.flushes_completed(), 6);
    }
}
