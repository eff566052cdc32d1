//! Testing utilities for the planner workspace
//!
//! Scripted in-memory accessor, recording notifier and fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use planner_model::Course;
use planner_sync::{
    AccessError, EntityId, Patch, RemoteAccessor, SyncConfig, SyncEntity, SyncNotice, SyncNotifier,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// How a held update is finally answered
#[derive(Debug)]
pub enum Reply {
    /// Succeed, returning the request patch
    Echo,
    /// Succeed with this authoritative patch
    Respond(Patch),
    /// Fail
    Fail(AccessError),
}

enum UpdateStep {
    Reply(Reply),
    Hold(oneshot::Receiver<Reply>),
}

enum FetchStep {
    Fail(AccessError),
    Hold(oneshot::Receiver<Option<AccessError>>),
    /// Read when the call arrives, answer when released
    HoldRead(oneshot::Receiver<Option<AccessError>>),
}

struct State<E> {
    store: HashMap<EntityId, E>,
    updates: Vec<(EntityId, Patch)>,
    fetches: Vec<EntityId>,
    update_script: VecDeque<UpdateStep>,
    fetch_script: VecDeque<FetchStep>,
}

/// In-memory accessor whose responses can be scripted per call
///
/// Unscripted updates succeed, apply the patch to the stored record and echo
/// it back. Unscripted fetches return the stored record.
pub struct ScriptedAccessor<E> {
    state: Mutex<State<E>>,
}

/// Pending answer for a held update
pub struct UpdateGate(oneshot::Sender<Reply>);

impl UpdateGate {
    pub fn release(self) {
        let _ = self.0.send(Reply::Echo);
    }

    pub fn respond(self, patch: Patch) {
        let _ = self.0.send(Reply::Respond(patch));
    }

    pub fn fail(self, err: AccessError) {
        let _ = self.0.send(Reply::Fail(err));
    }
}

/// Pending answer for a held fetch
pub struct FetchGate(oneshot::Sender<Option<AccessError>>);

impl FetchGate {
    /// Answer with the record read for this call
    pub fn release(self) {
        let _ = self.0.send(None);
    }

    pub fn fail(self, err: AccessError) {
        let _ = self.0.send(Some(err));
    }
}

impl<E: SyncEntity> ScriptedAccessor<E> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                store: HashMap::new(),
                updates: Vec::new(),
                fetches: Vec::new(),
                update_script: VecDeque::new(),
                fetch_script: VecDeque::new(),
            }),
        }
    }

    pub fn with_record(self, record: E) -> Self {
        self.insert(record);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn insert(&self, record: E) {
        self.state.lock().store.insert(record.id().clone(), record);
    }

    pub fn stored(&self, id: &str) -> Option<E> {
        self.state.lock().store.get(&EntityId::new(id)).cloned()
    }

    /// Every update call so far, in call order
    pub fn updates(&self) -> Vec<(EntityId, Patch)> {
        self.state.lock().updates.clone()
    }

    /// Patches of every update call so far
    pub fn update_patches(&self) -> Vec<Patch> {
        self.state.lock().updates.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().updates.len()
    }

    pub fn fetches(&self) -> Vec<EntityId> {
        self.state.lock().fetches.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches.len()
    }

    /// Hold the next unscripted update until the gate is answered
    pub fn hold_next_update(&self) -> UpdateGate {
        let (tx, rx) = oneshot::channel();
        self.state.lock().update_script.push_back(UpdateStep::Hold(rx));
        UpdateGate(tx)
    }

    pub fn fail_next_update(&self, err: AccessError) {
        self.state
            .lock()
            .update_script
            .push_back(UpdateStep::Reply(Reply::Fail(err)));
    }

    pub fn respond_next_update(&self, patch: Patch) {
        self.state
            .lock()
            .update_script
            .push_back(UpdateStep::Reply(Reply::Respond(patch)));
    }

    pub fn hold_next_fetch(&self) -> FetchGate {
        let (tx, rx) = oneshot::channel();
        self.state.lock().fetch_script.push_back(FetchStep::Hold(rx));
        FetchGate(tx)
    }

    /// Hold the next fetch, answering with the record as stored when the
    /// call arrived
    pub fn hold_next_fetch_as_read(&self) -> FetchGate {
        let (tx, rx) = oneshot::channel();
        self.state.lock().fetch_script.push_back(FetchStep::HoldRead(rx));
        FetchGate(tx)
    }

    pub fn fail_next_fetch(&self, err: AccessError) {
        self.state.lock().fetch_script.push_back(FetchStep::Fail(err));
    }

    fn lookup(&self, id: &EntityId) -> Result<E, AccessError> {
        self.state
            .lock()
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| AccessError::not_found(E::KIND, id.as_str()))
    }

    fn commit(&self, id: &EntityId, request: &Patch, response: &Patch) -> Result<(), AccessError> {
        let mut state = self.state.lock();
        let record = state
            .store
            .get_mut(id)
            .ok_or_else(|| AccessError::not_found(E::KIND, id.as_str()))?;
        record
            .apply_patch(request)
            .and_then(|()| record.apply_patch(response))
            .map_err(|err| AccessError::Rejected(err.to_string()))
    }
}

impl<E: SyncEntity> Default for ScriptedAccessor<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: SyncEntity> RemoteAccessor<E> for ScriptedAccessor<E> {
    async fn fetch(&self, id: &EntityId) -> Result<E, AccessError> {
        let step = {
            let mut state = self.state.lock();
            state.fetches.push(id.clone());
            state.fetch_script.pop_front()
        };
        match step {
            None => self.lookup(id),
            Some(FetchStep::Fail(err)) => Err(err),
            Some(FetchStep::Hold(rx)) => match rx.await {
                Ok(Some(err)) => Err(err),
                Ok(None) | Err(_) => self.lookup(id),
            },
            Some(FetchStep::HoldRead(rx)) => {
                let read = self.lookup(id);
                match rx.await {
                    Ok(Some(err)) => Err(err),
                    Ok(None) | Err(_) => read,
                }
            }
        }
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<Patch, AccessError> {
        let step = {
            let mut state = self.state.lock();
            state.updates.push((id.clone(), patch.clone()));
            state.update_script.pop_front()
        };
        let reply = match step {
            None => Reply::Echo,
            Some(UpdateStep::Reply(reply)) => reply,
            Some(UpdateStep::Hold(rx)) => rx.await.unwrap_or(Reply::Echo),
        };
        match reply {
            Reply::Echo => {
                self.commit(id, &patch, &Patch::new())?;
                Ok(patch)
            }
            Reply::Respond(response) => {
                self.commit(id, &patch, &response)?;
                Ok(response)
            }
            Reply::Fail(err) => Err(err),
        }
    }
}

/// Notifier that keeps every notice
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<SyncNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<SyncNotice> {
        self.notices.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

impl SyncNotifier for RecordingNotifier {
    fn on_sync_error(&self, notice: &SyncNotice) {
        self.notices.lock().push(notice.clone());
    }
}

/// Network failure for scripting
pub fn offline() -> AccessError {
    AccessError::Network("connection refused".to_string())
}

/// `{id: "p1", name: "CS", credits: 4}`
pub fn course_p1() -> Course {
    Course::new("CS", 4.0).with_id("p1")
}

pub fn course(id: &str, name: &str, credits: f64) -> Course {
    Course::new(name, credits).with_id(id)
}

/// Debounce used by most engine tests
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(1000);

pub fn test_config() -> SyncConfig {
    SyncConfig::new().with_debounce(TEST_DEBOUNCE)
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
