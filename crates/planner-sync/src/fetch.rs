//! Fetch cache: snapshot storage and load bookkeeping
//!
//! Holds the snapshot for the currently bound id. Every fetch is issued
//! against a [`LoadTicket`] tagged with the binding epoch and a request
//! generation; only the newest ticket for the current binding may write the
//! snapshot, so a slow response for an id the view has moved away from is
//! dropped.

use crate::entity::EntityId;
use crate::error::AccessError;
use crate::types::LoadOutcome;

/// Tag for one in-flight fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    /// Id the request was issued for
    pub id: EntityId,
    epoch: u64,
    generation: u64,
    silent: bool,
}

impl LoadTicket {
    /// Binding epoch at issue time
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Background refresh that must not flip the loading flag
    #[inline]
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }
}

/// Snapshot holder for one entity view
#[derive(Debug)]
pub struct FetchCache<E> {
    target: Option<EntityId>,
    epoch: u64,
    generation: u64,
    value: Option<E>,
    loading: bool,
}

impl<E> FetchCache<E> {
    /// Create unbound cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: None,
            epoch: 0,
            generation: 0,
            value: None,
            loading: false,
        }
    }

    /// Currently bound id
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&EntityId> {
        self.target.as_ref()
    }

    /// Binding epoch; bumped on every rebind
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Point the cache at another id (or none)
    ///
    /// Drops the old snapshot and invalidates all outstanding tickets.
    /// Returns `false` if `target` is already bound.
    pub fn bind(&mut self, target: Option<EntityId>) -> bool {
        if self.target == target {
            return false;
        }
        self.target = target;
        self.epoch += 1;
        self.value = None;
        self.loading = false;
        true
    }

    /// Issue a ticket for a fetch of the bound id
    ///
    /// A non-silent ticket raises the loading flag; a silent one leaves it
    /// alone. Any earlier ticket stops being current.
    pub fn begin(&mut self, silent: bool) -> Option<LoadTicket> {
        let id = self.target.clone()?;
        self.generation += 1;
        if !silent {
            self.loading = true;
        }
        Some(LoadTicket {
            id,
            epoch: self.epoch,
            generation: self.generation,
            silent,
        })
    }

    /// Check ticket is the newest for the current binding
    #[inline]
    #[must_use]
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.epoch == self.epoch && ticket.generation == self.generation
    }

    /// Record a fetch result
    ///
    /// Stale tickets change nothing. A failed non-silent load clears the
    /// snapshot; a failed silent refresh keeps it.
    pub fn complete(&mut self, ticket: &LoadTicket, result: Result<E, AccessError>) -> LoadOutcome {
        if !self.is_current(ticket) {
            return LoadOutcome::Superseded;
        }
        self.loading = false;

        match result {
            Ok(value) => {
                self.value = Some(value);
                LoadOutcome::Loaded
            }
            Err(_) if ticket.silent => LoadOutcome::Failed,
            Err(_) => {
                self.value = None;
                LoadOutcome::Failed
            }
        }
    }

    /// Current snapshot
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&E> {
        self.value.as_ref()
    }

    /// Mutable snapshot access
    #[inline]
    pub fn value_mut(&mut self) -> Option<&mut E> {
        self.value.as_mut()
    }

    /// Apply a direct local change; no-op without a snapshot
    pub fn set_value(&mut self, update: impl FnOnce(&mut E)) -> bool {
        match self.value.as_mut() {
            Some(value) => {
                update(value);
                true
            }
            None => false,
        }
    }

    /// Check whether a visible load is in progress
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

impl<E> Default for FetchCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(id: &str) -> FetchCache<String> {
        let mut cache = FetchCache::new();
        cache.bind(Some(EntityId::new(id)));
        cache
    }

    #[test]
    fn unbound_cache_issues_no_tickets() {
        let mut cache: FetchCache<String> = FetchCache::new();
        assert!(cache.begin(false).is_none());
        assert!(!cache.is_loading());
    }

    #[test]
    fn load_sets_value_and_clears_loading() {
        let mut cache = bound("p1");
        let ticket = cache.begin(false).unwrap();
        assert!(cache.is_loading());

        let outcome = cache.complete(&ticket, Ok("CS".to_string()));
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(cache.value().map(String::as_str), Some("CS"));
        assert!(!cache.is_loading());
    }

    #[test]
    fn failed_load_clears_value() {
        let mut cache = bound("p1");
        let ticket = cache.begin(false).unwrap();
        cache.complete(&ticket, Ok("CS".to_string()));

        let ticket = cache.begin(false).unwrap();
        let outcome = cache.complete(&ticket, Err(AccessError::not_found("program", "p1")));
        assert_eq!(outcome, LoadOutcome::Failed);
        assert!(cache.value().is_none());
        assert!(!cache.is_loading());
    }

    #[test]
    fn silent_refresh_never_raises_loading() {
        let mut cache = bound("p1");
        let ticket = cache.begin(false).unwrap();
        cache.complete(&ticket, Ok("CS".to_string()));

        let ticket = cache.begin(true).unwrap();
        assert!(!cache.is_loading());
        cache.complete(&ticket, Ok("CS v2".to_string()));
        assert_eq!(cache.value().map(String::as_str), Some("CS v2"));
    }

    #[test]
    fn failed_silent_refresh_keeps_value() {
        let mut cache = bound("p1");
        let ticket = cache.begin(false).unwrap();
        cache.complete(&ticket, Ok("CS".to_string()));

        let ticket = cache.begin(true).unwrap();
        let outcome = cache.complete(&ticket, Err(AccessError::Network("reset".to_string())));
        assert_eq!(outcome, LoadOutcome::Failed);
        assert_eq!(cache.value().map(String::as_str), Some("CS"));
    }

    #[test]
    fn response_for_previous_id_is_discarded() {
        let mut cache = bound("p1");
        let old = cache.begin(false).unwrap();

        assert!(cache.bind(Some(EntityId::new("p2"))));
        let new = cache.begin(false).unwrap();

        assert_eq!(cache.complete(&old, Ok("old".to_string())), LoadOutcome::Superseded);
        assert!(cache.value().is_none());
        assert!(cache.is_loading());

        assert_eq!(cache.complete(&new, Ok("new".to_string())), LoadOutcome::Loaded);
        assert_eq!(cache.value().map(String::as_str), Some("new"));
    }

    #[test]
    fn older_request_for_same_id_is_discarded() {
        let mut cache = bound("p1");
        let first = cache.begin(false).unwrap();
        let second = cache.begin(false).unwrap();

        assert_eq!(cache.complete(&second, Ok("second".to_string())), LoadOutcome::Loaded);
        assert_eq!(cache.complete(&first, Ok("first".to_string())), LoadOutcome::Superseded);
        assert_eq!(cache.value().map(String::as_str), Some("second"));
    }

    #[test]
    fn rebinding_same_id_is_noop() {
        let mut cache = bound("p1");
        let epoch = cache.epoch();
        assert!(!cache.bind(Some(EntityId::new("p1"))));
        assert_eq!(cache.epoch(), epoch);
    }

    #[test]
    fn unbinding_clears_everything() {
        let mut cache = bound("p1");
        let ticket = cache.begin(false).unwrap();
        cache.complete(&ticket, Ok("CS".to_string()));

        assert!(cache.bind(None));
        assert!(cache.value().is_none());
        assert!(cache.target().is_none());
        assert!(!cache.is_loading());
    }

    #[test]
    fn set_value_requires_snapshot() {
        let mut cache = bound("p1");
        assert!(!cache.set_value(|v| v.push('!')));

        let ticket = cache.begin(false).unwrap();
        cache.complete(&ticket, Ok("CS".to_string()));
        assert!(cache.set_value(|v| v.push('!')));
        assert_eq!(cache.value().map(String::as_str), Some("CS!"));
    }
}
