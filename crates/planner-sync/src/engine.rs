//! The entity view: optimistic edits, debounced flushes, recovery, teardown
//!
//! One [`EntitySync`] owns the snapshot, buffer, timer and sequence counter
//! for whichever id it is bound to. Edits apply synchronously to the snapshot
//! and are pushed to the [`RemoteAccessor`] in the background. Accessor
//! failures never propagate out of [`EntitySync::mutate`]; they are merged
//! back into the buffer and reported through the [`SyncNotifier`].

use crate::accessor::RemoteAccessor;
use crate::buffer::PendingBuffer;
use crate::config::SyncConfig;
use crate::debounce::DebounceTimer;
use crate::entity::{EntityId, SyncEntity};
use crate::error::{AccessError, PatchError};
use crate::fetch::{FetchCache, LoadTicket};
use crate::notify::{SyncNotice, SyncNotifier, TracingNotifier};
use crate::patch::Patch;
use crate::staleness::{FlushTicket, StalenessGuard};
use crate::types::{FlushOutcome, FlushReason, LoadOutcome, MutateOutcome, SyncState, SyncStats};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Handle to one entity view
///
/// Dropping the handle disposes the view, flushing any buffered edits.
pub struct EntitySync<E: SyncEntity, A: RemoteAccessor<E>> {
    shared: Arc<Shared<E, A>>,
}

pub(crate) struct Shared<E: SyncEntity, A> {
    accessor: A,
    config: SyncConfig,
    notifier: Arc<dyn SyncNotifier>,
    inner: Mutex<Inner<E>>,
}

struct Inner<E> {
    cache: FetchCache<E>,
    pending: PendingBuffer,
    guard: StalenessGuard,
    timer: DebounceTimer,
    in_flight: BTreeMap<u64, InFlight>,
    /// Latest flush sequence that carried each field
    carried: HashMap<String, u64>,
    /// Flushes acknowledged since the outstanding load was issued
    acked_since_load: Option<Vec<Acked>>,
    disposed: bool,
    stats: SyncStats,
}

/// Payload of a flush awaiting its response
struct InFlight {
    epoch: u64,
    patch: Patch,
}

/// Payload the server accepted while a load was outstanding
///
/// The load may have read the record before this write landed.
struct Acked {
    seq: u64,
    epoch: u64,
    patch: Patch,
}

/// Everything a flush task needs, captured under the lock
struct FlushPlan {
    id: EntityId,
    epoch: u64,
    ticket: FlushTicket,
    patch: Patch,
    reason: FlushReason,
}

impl<E: SyncEntity> Inner<E> {
    fn new() -> Self {
        Self {
            cache: FetchCache::new(),
            pending: PendingBuffer::new(),
            guard: StalenessGuard::new(),
            timer: DebounceTimer::new(),
            in_flight: BTreeMap::new(),
            carried: HashMap::new(),
            acked_since_load: None,
            disposed: false,
            stats: SyncStats::default(),
        }
    }

    /// Drain the buffer into a new flush; `None` if there is nothing to send
    fn begin_flush(&mut self, reason: FlushReason) -> Option<FlushPlan> {
        if self.pending.is_empty() {
            return None;
        }
        let id = self.cache.target()?.clone();
        let epoch = self.cache.epoch();
        let patch = self.pending.take();
        let ticket = self.guard.begin();

        for field in patch.fields() {
            self.carried.insert(field.to_string(), ticket.seq());
        }
        self.in_flight.insert(
            ticket.seq(),
            InFlight {
                epoch,
                patch: patch.clone(),
            },
        );
        self.stats.flushes_started += 1;
        if reason == FlushReason::Teardown {
            self.stats.teardown_flushes += 1;
        }

        tracing::debug!(
            kind = E::KIND,
            id = %id,
            seq = ticket.seq(),
            %reason,
            fields = patch.len(),
            "flush started"
        );
        Some(FlushPlan {
            id,
            epoch,
            ticket,
            patch,
            reason,
        })
    }

    /// Return a failed payload to the buffer if it still belongs to this
    /// binding
    ///
    /// Fields a later flush has already carried are dropped; buffered edits
    /// win over the rest.
    fn merge_back(&mut self, epoch: u64, seq: u64, mut patch: Patch) -> bool {
        if epoch != self.cache.epoch() {
            return false;
        }
        patch.retain(|field| self.carried.get(field).map_or(true, |&latest| latest <= seq));
        self.pending.restore(patch);
        true
    }

    /// Point the cache at a new target, forgetting per-binding bookkeeping
    fn rebind(&mut self, id: Option<EntityId>) {
        self.cache.bind(id);
        self.carried.clear();
        self.acked_since_load = None;
    }

    /// Issue a load and start recording acknowledged flushes against it
    fn begin_load(&mut self, silent: bool) -> Option<LoadTicket> {
        let ticket = self.cache.begin(silent)?;
        self.acked_since_load = Some(Vec::new());
        Some(ticket)
    }

    fn record_ack(&mut self, seq: u64, epoch: u64, patch: &Patch) {
        if let Some(acked) = self.acked_since_load.as_mut() {
            acked.push(Acked {
                seq,
                epoch,
                patch: patch.clone(),
            });
        }
    }

    /// Lay local edits the fetched record may not include back over it
    ///
    /// Flushes acknowledged since the load was issued and flushes still in
    /// flight go first in sequence order, then the buffer.
    fn overlay_local(&self, record: &mut E, epoch: u64) {
        let acked = self
            .acked_since_load
            .iter()
            .flatten()
            .filter(|a| a.epoch == epoch)
            .map(|a| (a.seq, &a.patch));
        let in_flight = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.epoch == epoch)
            .map(|(&seq, f)| (seq, &f.patch));
        let mut sent: Vec<(u64, &Patch)> = acked.chain(in_flight).collect();
        sent.sort_by_key(|&(seq, _)| seq);

        let sent = sent.into_iter().map(|(_, patch)| patch);
        for patch in sent.chain(std::iter::once(self.pending.as_patch())) {
            if let Err(err) = record.apply_patch(patch) {
                tracing::debug!(kind = E::KIND, error = %err, "local edit not reapplied");
            }
        }
    }

    fn is_flushing(&self) -> bool {
        let epoch = self.cache.epoch();
        self.in_flight.values().any(|f| f.epoch == epoch)
    }
}

impl<E: SyncEntity, A: RemoteAccessor<E>> Shared<E, A> {
    fn lock(&self) -> parking_lot::MutexGuard<'_, Inner<E>> {
        self.inner.lock()
    }

    fn notice(&self, id: EntityId, err: &AccessError, teardown: bool) -> SyncNotice {
        SyncNotice {
            kind: E::KIND,
            id,
            message: self.config.notice_message(teardown).to_string(),
            detail: err.to_string(),
            teardown,
        }
    }

    /// Debounce timer callback
    fn on_timer(weak: &Weak<Self>, generation: u64) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let plan = {
            let mut inner = shared.lock();
            if inner.disposed || !inner.timer.fired(generation) {
                return;
            }
            inner.begin_flush(FlushReason::Debounce)
        };
        if let Some(plan) = plan {
            Self::spawn_flush(shared, plan);
        }
    }

    /// Start a flush in the background
    ///
    /// The task is never aborted: a superseded response is ignored by the
    /// staleness check instead.
    fn spawn_flush(self: Arc<Self>, plan: FlushPlan) -> Option<JoinHandle<FlushOutcome>> {
        let Ok(runtime) = Handle::try_current() else {
            let mut inner = self.lock();
            inner.in_flight.remove(&plan.ticket.seq());
            inner.stats.flushes_failed += 1;
            let kept = inner.merge_back(plan.epoch, plan.ticket.seq(), plan.patch);
            tracing::error!(
                kind = E::KIND,
                id = %plan.id,
                kept,
                "no tokio runtime; flush not started"
            );
            return None;
        };
        Some(runtime.spawn(async move { self.run_flush(plan).await }))
    }

    async fn run_flush(&self, plan: FlushPlan) -> FlushOutcome {
        let FlushPlan {
            id,
            epoch,
            ticket,
            patch,
            reason,
        } = plan;

        let result = self.accessor.update(&id, patch.clone()).await;

        let mut inner = self.lock();
        inner.in_flight.remove(&ticket.seq());

        let err = match result {
            Ok(authoritative) => {
                inner.record_ack(ticket.seq(), epoch, &authoritative);
                let current = epoch == inner.cache.epoch()
                    && inner.guard.is_current(ticket)
                    && inner.pending.is_empty();
                if !current {
                    inner.stats.flushes_discarded += 1;
                    tracing::debug!(
                        kind = E::KIND,
                        id = %id,
                        seq = ticket.seq(),
                        latest = inner.guard.current(),
                        "stale flush response discarded"
                    );
                    return FlushOutcome::Discarded;
                }

                let applied = match inner.cache.value_mut() {
                    Some(value) => value.apply_patch(&authoritative),
                    None => Ok(()),
                };
                if let Err(err) = applied {
                    inner.stats.flushes_discarded += 1;
                    tracing::warn!(
                        kind = E::KIND,
                        id = %id,
                        seq = ticket.seq(),
                        error = %err,
                        "server response could not be applied"
                    );
                    return FlushOutcome::Discarded;
                }

                inner.stats.flushes_applied += 1;
                tracing::debug!(
                    kind = E::KIND,
                    id = %id,
                    seq = ticket.seq(),
                    fields = authoritative.len(),
                    "flush applied"
                );
                return FlushOutcome::Applied;
            }
            Err(err) => err,
        };

        inner.stats.flushes_failed += 1;
        let teardown = reason == FlushReason::Teardown || inner.disposed;
        let kept = inner.merge_back(epoch, ticket.seq(), patch);
        drop(inner);

        if teardown || !kept {
            tracing::error!(
                kind = E::KIND,
                id = %id,
                seq = ticket.seq(),
                %reason,
                kept,
                error = %err,
                "teardown flush failed; edits not synced"
            );
        } else {
            tracing::warn!(
                kind = E::KIND,
                id = %id,
                seq = ticket.seq(),
                retryable = err.is_retryable(),
                error = %err,
                "flush failed; edits kept for next flush"
            );
        }

        self.notifier.on_sync_error(&self.notice(id, &err, teardown));
        FlushOutcome::Failed
    }

    fn spawn_load(self: Arc<Self>, ticket: LoadTicket) -> Option<JoinHandle<LoadOutcome>> {
        let Ok(runtime) = Handle::try_current() else {
            let err = AccessError::Rejected("no tokio runtime".to_string());
            tracing::error!(kind = E::KIND, id = %ticket.id, "no tokio runtime; load not started");
            let mut inner = self.lock();
            inner.cache.complete(&ticket, Err(err));
            inner.acked_since_load = None;
            return None;
        };
        Some(runtime.spawn(async move { self.run_load(ticket).await }))
    }

    async fn run_load(&self, ticket: LoadTicket) -> LoadOutcome {
        let result = self.accessor.fetch(&ticket.id).await;

        let mut inner = self.lock();
        if inner.disposed || !inner.cache.is_current(&ticket) {
            tracing::debug!(kind = E::KIND, id = %ticket.id, "stale load response discarded");
            return LoadOutcome::Superseded;
        }

        let result = match result {
            Ok(mut record) => {
                inner.overlay_local(&mut record, ticket.epoch());
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(
                    kind = E::KIND,
                    id = %ticket.id,
                    silent = ticket.is_silent(),
                    error = %err,
                    "load failed"
                );
                Err(err)
            }
        };

        let outcome = inner.cache.complete(&ticket, result);
        inner.acked_since_load = None;
        match outcome {
            LoadOutcome::Loaded => {
                inner.stats.loads += 1;
                tracing::info!(
                    kind = E::KIND,
                    id = %ticket.id,
                    silent = ticket.is_silent(),
                    "entity loaded"
                );
            }
            LoadOutcome::Failed => inner.stats.load_failures += 1,
            LoadOutcome::Superseded | LoadOutcome::Unbound => {}
        }
        outcome
    }

    async fn flush_now(&self) -> FlushOutcome {
        let plan = {
            let mut inner = self.lock();
            if inner.disposed {
                return FlushOutcome::Idle;
            }
            inner.timer.cancel();
            inner.begin_flush(FlushReason::Forced)
        };
        match plan {
            Some(plan) => self.run_flush(plan).await,
            None => FlushOutcome::Idle,
        }
    }

    fn dispose(self: &Arc<Self>) -> Option<JoinHandle<FlushOutcome>> {
        let plan = {
            let mut inner = self.lock();
            if inner.disposed {
                return None;
            }
            inner.disposed = true;
            inner.timer.cancel();
            tracing::debug!(
                kind = E::KIND,
                id = ?inner.cache.target(),
                pending = inner.pending.len(),
                "view disposed"
            );
            inner.begin_flush(FlushReason::Teardown)
        }?;
        Arc::clone(self).spawn_flush(plan)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub(crate) fn target(&self) -> Option<EntityId> {
        self.lock().cache.target().cloned()
    }
}

impl<E: SyncEntity, A: RemoteAccessor<E>> EntitySync<E, A> {
    /// Create an unbound view that reports failures to the tracing log
    #[must_use]
    pub fn new(accessor: A, config: SyncConfig) -> Self {
        Self::with_notifier(accessor, config, Arc::new(TracingNotifier))
    }

    /// Create an unbound view with a custom failure notifier
    #[must_use]
    pub fn with_notifier(accessor: A, config: SyncConfig, notifier: Arc<dyn SyncNotifier>) -> Self {
        Self {
            shared: Arc::new(Shared {
                accessor,
                config,
                notifier,
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<E, A>> {
        Arc::downgrade(&self.shared)
    }

    /// Point the view at `id`, or at nothing
    ///
    /// Leaving a bound id flushes its buffered edits first (under the old
    /// id). Returns the handle of the initial load, or `None` if nothing was
    /// started (same id, unbind, or disposed view).
    pub fn bind(&self, id: Option<EntityId>) -> Option<JoinHandle<LoadOutcome>> {
        let (teardown, ticket) = {
            let mut inner = self.shared.lock();
            if inner.disposed || inner.cache.target() == id.as_ref() {
                return None;
            }

            inner.timer.cancel();
            let teardown = inner.begin_flush(FlushReason::Teardown);
            tracing::info!(
                kind = E::KIND,
                from = ?inner.cache.target(),
                to = ?id,
                "view rebound"
            );
            inner.rebind(id);
            (teardown, inner.begin_load(false))
        };

        if let Some(plan) = teardown {
            Arc::clone(&self.shared).spawn_flush(plan);
        }
        Arc::clone(&self.shared).spawn_load(ticket?)
    }

    /// Bound id
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.shared.target()
    }

    /// Current snapshot, including unsent edits
    #[must_use]
    pub fn value(&self) -> Option<E> {
        self.shared.lock().cache.value().cloned()
    }

    /// Check whether a visible load is in progress
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.lock().cache.is_loading()
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> SyncState {
        let inner = self.shared.lock();
        if inner.disposed {
            SyncState::Disposed
        } else if inner.cache.value().is_some() {
            SyncState::Ready {
                dirty: !inner.pending.is_empty(),
                flushing: inner.is_flushing(),
            }
        } else if inner.cache.is_loading() {
            SyncState::Loading
        } else {
            SyncState::Unloaded
        }
    }

    /// Buffered edits not yet sent
    #[must_use]
    pub fn pending(&self) -> Patch {
        self.shared.lock().pending.snapshot()
    }

    /// Counters since creation
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.lock().stats.clone()
    }

    /// Change the snapshot locally without buffering anything
    ///
    /// Returns `false` when nothing is loaded.
    pub fn set_value(&self, update: impl FnOnce(&mut E)) -> bool {
        self.shared.lock().cache.set_value(update)
    }

    /// Apply an edit optimistically and schedule it for sending
    ///
    /// The snapshot reflects `patch` as soon as this returns. The flush
    /// happens after the debounce interval passes with no further edits.
    ///
    /// # Errors
    /// `PatchError` when the patch names unknown or read-only fields, has
    /// mistyped values, or breaks a record invariant. The snapshot is
    /// unchanged in that case.
    pub fn mutate(&self, patch: Patch) -> Result<MutateOutcome, PatchError> {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return Ok(MutateOutcome::Disposed);
        }
        let Some(value) = inner.cache.value_mut() else {
            return Ok(MutateOutcome::NotLoaded);
        };
        value.apply_local(&patch)?;
        if patch.is_empty() {
            return Ok(MutateOutcome::Applied);
        }

        tracing::debug!(
            kind = E::KIND,
            id = ?inner.cache.target(),
            fields = ?patch.fields().collect::<Vec<_>>(),
            "edit buffered"
        );
        inner.pending.absorb(patch);

        let weak = Arc::downgrade(&self.shared);
        inner
            .timer
            .schedule(self.shared.config.debounce, move |generation| {
                Shared::on_timer(&weak, generation);
            });
        Ok(MutateOutcome::Applied)
    }

    /// Re-fetch without raising the loading flag
    ///
    /// Unsent and unacknowledged edits are laid back over the fetched record.
    /// A failed refresh keeps the current snapshot.
    pub async fn refresh(&self) -> LoadOutcome {
        self.load(true).await
    }

    /// Re-fetch with the loading flag raised; a failure clears the snapshot
    pub async fn reload(&self) -> LoadOutcome {
        self.load(false).await
    }

    async fn load(&self, silent: bool) -> LoadOutcome {
        let ticket = {
            let mut inner = self.shared.lock();
            if inner.disposed {
                return LoadOutcome::Unbound;
            }
            inner.begin_load(silent)
        };
        match ticket {
            Some(ticket) => self.shared.run_load(ticket).await,
            None => LoadOutcome::Unbound,
        }
    }

    /// Send buffered edits immediately, cancelling the debounce timer
    pub async fn flush_now(&self) -> FlushOutcome {
        self.shared.flush_now().await
    }

    /// Tear the view down
    ///
    /// Cancels the timer and, if edits are buffered, starts one final flush
    /// whose handle is returned. Later calls do nothing.
    pub fn dispose(&self) -> Option<JoinHandle<FlushOutcome>> {
        self.shared.dispose()
    }
}

impl<E: SyncEntity, A: RemoteAccessor<E>> Drop for EntitySync<E, A> {
    fn drop(&mut self) {
        // Teardown keeps running after the handle is gone
        let _ = self.shared.dispose();
    }
}

impl<E: SyncEntity, A: RemoteAccessor<E>> fmt::Debug for EntitySync<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("EntitySync")
            .field("kind", &E::KIND)
            .field("id", &inner.cache.target())
            .field("pending", &inner.pending.len())
            .field("seq", &inner.guard.current())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

/// Force a flush on a view reached through a weak reference
pub(crate) async fn flush_shared<E, A>(shared: Arc<Shared<E, A>>) -> FlushOutcome
where
    E: SyncEntity,
    A: RemoteAccessor<E>,
{
    shared.flush_now().await
}
