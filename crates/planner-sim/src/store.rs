//! In-memory remote store with seeded faults
//!
//! Every update rolls a [`Fate`]. A dropped response still commits, which is
//! the case a client cannot tell apart from a dropped request.

use async_trait::async_trait;
use parking_lot::Mutex;
use planner_model::Course;
use planner_sync::{AccessError, EntityId, Patch, RemoteAccessor, SyncEntity};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

/// What happens to one update call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Commit and answer
    Deliver,
    /// Lost before the store saw it
    DropRequest,
    /// Committed, but the answer is lost
    DropResponse,
}

/// Fault counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Update calls received
    pub updates: u64,
    /// Committed and answered
    pub delivered: u64,
    /// Lost before commit
    pub dropped_requests: u64,
    /// Committed but unanswered
    pub dropped_responses: u64,
}

struct StoreState {
    records: HashMap<EntityId, Course>,
    rng: StdRng,
    stats: StoreStats,
}

/// Course store behind a lossy link
pub struct FlakyStore {
    state: Mutex<StoreState>,
    failure_rate: f64,
    max_latency: Duration,
}

impl FlakyStore {
    /// Create empty store
    #[must_use]
    pub fn new(seed: u64, failure_rate: f64, max_latency: Duration) -> Self {
        Self {
            state: Mutex::new(StoreState {
                records: HashMap::new(),
                rng: StdRng::seed_from_u64(seed),
                stats: StoreStats::default(),
            }),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            max_latency,
        }
    }

    /// Seed a record
    pub fn insert(&self, course: Course) {
        self.state.lock().records.insert(course.id.clone(), course);
    }

    /// Stored copy of a record
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Course> {
        self.state.lock().records.get(id).cloned()
    }

    /// Fault counters so far
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.state.lock().stats
    }

    fn roll(&self) -> (Fate, Duration) {
        let mut state = self.state.lock();
        let latency_ms = u64::try_from(self.max_latency.as_millis()).unwrap_or(u64::MAX);
        let latency = Duration::from_millis(state.rng.gen_range(0..=latency_ms));

        let roll: f64 = state.rng.gen();
        let fate = if roll < self.failure_rate / 2.0 {
            Fate::DropRequest
        } else if roll < self.failure_rate {
            Fate::DropResponse
        } else {
            Fate::Deliver
        };

        state.stats.updates += 1;
        match fate {
            Fate::Deliver => state.stats.delivered += 1,
            Fate::DropRequest => state.stats.dropped_requests += 1,
            Fate::DropResponse => state.stats.dropped_responses += 1,
        }
        (fate, latency)
    }

    fn commit(&self, id: &EntityId, patch: &Patch) -> Result<(), AccessError> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| AccessError::not_found(Course::KIND, id.as_str()))?;
        record
            .apply_patch(patch)
            .map_err(|err| AccessError::Rejected(err.to_string()))
    }
}

#[async_trait]
impl RemoteAccessor<Course> for FlakyStore {
    async fn fetch(&self, id: &EntityId) -> Result<Course, AccessError> {
        self.get(id)
            .ok_or_else(|| AccessError::not_found(Course::KIND, id.as_str()))
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<Patch, AccessError> {
        let (fate, latency) = self.roll();
        tracing::trace!(%id, ?fate, latency_ms = latency.as_millis(), "update rolled");

        // Commit on arrival so stores see writes in call order
        if fate != Fate::DropRequest {
            self.commit(id, &patch)?;
        }
        tokio::time::sleep(latency).await;

        match fate {
            Fate::Deliver => Ok(patch),
            Fate::DropRequest => Err(AccessError::Network("request lost".to_string())),
            Fate::DropResponse => Err(AccessError::Network("response lost".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store(failure_rate: f64) -> FlakyStore {
        let store = FlakyStore::new(7, failure_rate, Duration::from_millis(20));
        store.insert(Course::new("CS", 4.0).with_id("c1"));
        store
    }

    #[tokio::test(start_paused = true)]
    async fn reliable_store_delivers_and_commits() {
        let store = store(0.0);
        let id = EntityId::new("c1");

        let answer = store.update(&id, Patch::new().set("credits", 5.0)).await.unwrap();
        assert_eq!(answer, Patch::new().set("credits", 5.0));
        assert_eq!(store.get(&id).unwrap().credits, 5.0);
        assert_eq!(store.stats().delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_response_still_commits() {
        let store = store(1.0);
        let id = EntityId::new("c1");

        for credits in 10..30 {
            let credits = f64::from(credits);
            let result = store.update(&id, Patch::new().set("credits", credits)).await;
            assert!(result.is_err());
        }
        let stats = store.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.dropped_requests + stats.dropped_responses, 20);
        assert!(stats.dropped_responses > 0);
        assert_ne!(store.get(&id).unwrap().credits, 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_not_found() {
        let store = store(0.0);
        let err = store.fetch(&EntityId::new("nope")).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
    }
}
