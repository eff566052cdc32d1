//! Non-blocking sync failure notices
//!
//! The engine reports flush failures through an injected [`SyncNotifier`]
//! and never through `mutate`'s return value. Presentation (toast, status
//! bar, log line) is the integrator's choice.

use crate::entity::EntityId;

/// A transient, user-facing sync failure notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncNotice {
    /// Entity kind
    pub kind: &'static str,
    /// Entity id
    pub id: EntityId,
    /// Human-readable text; teardown notices use the teardown message
    pub message: String,
    /// Underlying error, for logs
    pub detail: String,
    /// Raised by a teardown flush; the view is gone and cannot retry
    pub teardown: bool,
}

/// Side channel for sync failures
pub trait SyncNotifier: Send + Sync {
    /// Called once per failed flush, outside the engine lock
    fn on_sync_error(&self, notice: &SyncNotice);
}

impl<F> SyncNotifier for F
where
    F: Fn(&SyncNotice) + Send + Sync,
{
    fn on_sync_error(&self, notice: &SyncNotice) {
        self(notice);
    }
}

/// Default notifier: writes notices to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl SyncNotifier for TracingNotifier {
    fn on_sync_error(&self, notice: &SyncNotice) {
        tracing::warn!(
            kind = notice.kind,
            id = %notice.id,
            teardown = notice.teardown,
            detail = %notice.detail,
            "{}",
            notice.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn notice() -> SyncNotice {
        SyncNotice {
            kind: "course",
            id: EntityId::new("c1"),
            message: "Failed to sync changes, will retry".to_string(),
            detail: "network error: reset".to_string(),
            teardown: false,
        }
    }

    #[test]
    fn closure_is_notifier() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = move |n: &SyncNotice| sink.lock().push(n.message.clone());

        notifier.on_sync_error(&notice());
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn tracing_notifier_does_not_panic() {
        TracingNotifier.on_sync_error(&notice());
    }
}
