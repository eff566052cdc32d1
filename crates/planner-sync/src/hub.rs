//! Explicit registry of open views for one entity kind
//!
//! Owned by the application root and passed by reference; there is no
//! process-wide instance. The hub shares one accessor, config and notifier
//! across every view it opens and can force-flush all of them on shutdown.

use crate::accessor::RemoteAccessor;
use crate::config::SyncConfig;
use crate::engine::{flush_shared, EntitySync, Shared};
use crate::entity::{EntityId, SyncEntity};
use crate::notify::{SyncNotifier, TracingNotifier};
use crate::types::{FlushOutcome, LoadOutcome};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Factory and registry for entity views
pub struct SyncHub<E: SyncEntity, A: RemoteAccessor<E>> {
    accessor: Arc<A>,
    config: SyncConfig,
    notifier: Arc<dyn SyncNotifier>,
    views: Mutex<Vec<Weak<Shared<E, Arc<A>>>>>,
}

impl<E: SyncEntity, A: RemoteAccessor<E>> SyncHub<E, A> {
    /// Create hub logging failures via tracing
    #[must_use]
    pub fn new(accessor: A, config: SyncConfig) -> Self {
        Self::with_notifier(accessor, config, Arc::new(TracingNotifier))
    }

    /// Create hub with a custom failure notifier
    #[must_use]
    pub fn with_notifier(accessor: A, config: SyncConfig, notifier: Arc<dyn SyncNotifier>) -> Self {
        Self {
            accessor: Arc::new(accessor),
            config,
            notifier,
            views: Mutex::new(Vec::new()),
        }
    }

    /// Shared accessor
    #[inline]
    #[must_use]
    pub fn accessor(&self) -> &Arc<A> {
        &self.accessor
    }

    /// Open a view bound to `id`; the initial load runs in the background
    pub fn open(&self, id: EntityId) -> EntitySync<E, Arc<A>> {
        let view = self.unbound();
        view.bind(Some(id));
        view
    }

    /// Open a view and wait for its initial load
    pub async fn open_loaded(&self, id: EntityId) -> (EntitySync<E, Arc<A>>, LoadOutcome) {
        let view = self.unbound();
        let outcome = match view.bind(Some(id)) {
            Some(load) => match load.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(kind = E::KIND, error = %err, "load task failed");
                    LoadOutcome::Failed
                }
            },
            None => LoadOutcome::Unbound,
        };
        (view, outcome)
    }

    /// Open a view with no id bound
    pub fn unbound(&self) -> EntitySync<E, Arc<A>> {
        let view = EntitySync::with_notifier(
            Arc::clone(&self.accessor),
            self.config.clone(),
            Arc::clone(&self.notifier),
        );
        let mut views = self.views.lock();
        views.retain(|weak| weak.strong_count() > 0);
        views.push(view.downgrade());
        view
    }

    /// Number of live, undisposed views
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.live().len()
    }

    /// Ids currently bound by live views
    #[must_use]
    pub fn open_ids(&self) -> Vec<EntityId> {
        self.live().iter().filter_map(|shared| shared.target()).collect()
    }

    /// Force a flush on every live view
    ///
    /// Flushes run concurrently; the outcomes are returned in no particular
    /// order and exclude views with nothing buffered.
    pub async fn flush_all(&self) -> Vec<FlushOutcome> {
        let live = self.live();
        tracing::info!(kind = E::KIND, views = live.len(), "flushing all views");

        futures::future::join_all(live.into_iter().map(flush_shared))
            .await
            .into_iter()
            .filter(|outcome| *outcome != FlushOutcome::Idle)
            .collect()
    }

    fn live(&self) -> Vec<Arc<Shared<E, Arc<A>>>> {
        let mut views = self.views.lock();
        views.retain(|weak| weak.strong_count() > 0);
        views
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|shared| !shared.is_disposed())
            .collect()
    }
}

impl<E: SyncEntity, A: RemoteAccessor<E>> std::fmt::Debug for SyncHub<E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHub")
            .field("kind", &E::KIND)
            .field("config", &self.config)
            .field("views", &self.views.lock().len())
            .finish_non_exhaustive()
    }
}
