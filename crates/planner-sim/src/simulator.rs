//! Planner sync simulator
//!
//! Drives bursts of random course edits through [`SyncHub`] views backed by a
//! [`FlakyStore`], then checks the end state:
//! - every edit shows in the snapshot the moment it is made
//! - once idle, snapshot and store agree and hold every edit
//! - after teardown the store holds every edit, unless a teardown failure
//!   was reported

use crate::store::{FlakyStore, StoreStats};
use crate::SimError;
use parking_lot::Mutex;
use planner_model::Course;
use planner_sync::{
    EntityId, EntitySync, LoadOutcome, Patch, SyncConfig, SyncEntity, SyncHub, SyncNotice,
    SyncNotifier, SyncState, SyncStats,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Flush rounds allowed before a view counts as stuck
const SETTLE_ATTEMPTS: usize = 200;

type View = EntitySync<Course, Arc<FlakyStore>>;

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Courses edited concurrently
    pub entities: usize,
    /// Edits issued against each course
    pub edits_per_entity: usize,
    /// Share of update calls that fail, in `[0, 1)`
    pub failure_rate: f64,
    /// Upper bound on simulated update latency
    pub max_latency_ms: u64,
    /// Engine quiet period
    pub debounce_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            entities: 8,
            edits_per_entity: 50,
            failure_rate: 0.2,
            max_latency_ms: 40,
            debounce_ms: 50,
        }
    }
}

impl SimulatorConfig {
    /// Parse and validate from TOML
    ///
    /// # Errors
    /// `SimError::Config` on malformed TOML, `SimError::Invalid` on
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, SimError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values are usable
    ///
    /// # Errors
    /// `SimError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.entities == 0 {
            return Err(SimError::Invalid("entities must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.failure_rate) {
            return Err(SimError::Invalid(format!(
                "failure_rate must be in [0, 1), got {}",
                self.failure_rate
            )));
        }
        self.sync_config().validate()?;
        Ok(())
    }

    /// Engine configuration for the simulated views
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new().with_debounce(Duration::from_millis(self.debounce_ms))
    }

    fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}

/// A broken guarantee found during simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Initial load did not produce a snapshot
    LoadFailed {
        /// Record that failed to load
        id: EntityId,
        /// What the load returned
        outcome: LoadOutcome,
    },
    /// A valid edit was refused
    EditRejected {
        /// Record being edited
        id: EntityId,
        /// Why `mutate` refused it
        error: String,
    },
    /// Snapshot did not show an edit right after it was made
    EditNotVisible {
        /// Record being edited
        id: EntityId,
        /// Zero-based edit number for this record
        edit: usize,
    },
    /// Buffered edits never drained
    NeverSettled {
        /// Record whose view stayed busy
        id: EntityId,
        /// View state when settling gave up
        state: SyncState,
    },
    /// Idle snapshot differs from the store
    Diverged {
        /// Record whose snapshot and stored copy disagree
        id: EntityId,
    },
    /// Store is missing edits with no failure reported
    LostEdit {
        /// Record the store disagrees with
        id: EntityId,
    },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Edits applied through `mutate`
    pub edits: u64,
    /// Flush-and-wait rounds spent settling
    pub settle_rounds: u64,
    /// Engine counters summed over every view
    pub sync: SyncStats,
    /// Fault counters from the store
    pub store: StoreStats,
    /// Failure notices raised
    pub notices: u64,
    /// Records whose final teardown flush failed and was reported
    pub reported_teardown_losses: u64,
}

impl SimulatorStats {
    fn absorb(&mut self, view: &SyncStats) {
        let sync = &mut self.sync;
        sync.loads += view.loads;
        sync.load_failures += view.load_failures;
        sync.flushes_started += view.flushes_started;
        sync.flushes_applied += view.flushes_applied;
        sync.flushes_discarded += view.flushes_discarded;
        sync.flushes_failed += view.flushes_failed;
        sync.teardown_flushes += view.teardown_flushes;
    }
}

/// Final report from simulator
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Configuration the run used
    pub config: SimulatorConfig,
    /// Counters for the run
    pub stats: SimulatorStats,
    /// Broken guarantees, empty on a clean run
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let stats = &self.stats;
        let mut report = String::new();

        report.push_str("=== Planner Sync Simulator Report ===\n\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Entities: {}", self.config.entities);
        let _ = writeln!(report, "Edits: {}", stats.edits);
        let _ = writeln!(report, "Failure Rate: {:.2}", self.config.failure_rate);
        let _ = writeln!(report, "Flushes Started: {}", stats.sync.flushes_started);
        let _ = writeln!(report, "Flushes Applied: {}", stats.sync.flushes_applied);
        let _ = writeln!(report, "Flushes Discarded (stale): {}", stats.sync.flushes_discarded);
        let _ = writeln!(report, "Flushes Failed: {}", stats.sync.flushes_failed);
        let _ = writeln!(report, "Teardown Flushes: {}", stats.sync.teardown_flushes);
        let _ = writeln!(report, "Requests Dropped: {}", stats.store.dropped_requests);
        let _ = writeln!(report, "Responses Dropped: {}", stats.store.dropped_responses);
        let _ = writeln!(report, "Settle Rounds: {}", stats.settle_rounds);
        let _ = writeln!(report, "Notices: {}", stats.notices);
        let _ = writeln!(report, "Reported Teardown Losses: {}", stats.reported_teardown_losses);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {:?}", i + 1, v);
            }
        }

        let _ = write!(
            report,
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

struct Tracked {
    view: View,
    expected: Course,
}

/// Run the planner sync simulator
///
/// # Errors
/// `SimError::Invalid` if the configuration is unusable.
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, SimError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let store = FlakyStore::new(
        config.seed.wrapping_add(1),
        config.failure_rate,
        config.max_latency(),
    );
    let ids: Vec<EntityId> = (0..config.entities)
        .map(|i| EntityId::new(format!("course-{i}")))
        .collect();
    for (i, id) in ids.iter().enumerate() {
        store.insert(Course::new(format!("Course {i}"), 3.0).with_id(id.clone()));
    }

    let notices: Arc<Mutex<Vec<SyncNotice>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notices);
    let notifier: Arc<dyn SyncNotifier> = Arc::new(move |notice: &SyncNotice| {
        tracing::debug!(id = %notice.id, teardown = notice.teardown, "{}", notice.detail);
        sink.lock().push(notice.clone());
    });
    let hub = SyncHub::with_notifier(store, config.sync_config(), notifier);

    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    // Phase 1: open and load every course
    let mut tracked = Vec::with_capacity(ids.len());
    for id in &ids {
        let (view, outcome) = hub.open_loaded(id.clone()).await;
        match view.value() {
            Some(expected) if outcome == LoadOutcome::Loaded => {
                tracked.push(Tracked { view, expected });
            }
            _ => violations.push(Violation::LoadFailed {
                id: id.clone(),
                outcome,
            }),
        }
    }

    // Phase 2: bursts of edits with random pauses
    let max_pause = config.debounce_ms.saturating_mul(2).max(1);
    for edit in 0..config.edits_per_entity {
        for entry in &mut tracked {
            let patch = random_edit(&mut rng);
            apply_edit(entry, patch, edit, &mut stats, &mut violations);
        }
        let pause = rng.gen_range(0..=max_pause);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    // Phase 3: drain and compare against the store
    let quiet = config.sync_config().debounce + config.max_latency();
    tokio::time::sleep(quiet + Duration::from_millis(1)).await;
    let mut unsettled: BTreeSet<usize> = (0..tracked.len()).collect();
    for _ in 0..SETTLE_ATTEMPTS {
        hub.flush_all().await;
        tokio::time::sleep(config.max_latency() + Duration::from_millis(1)).await;
        stats.settle_rounds += 1;

        unsettled.retain(|&i| tracked[i].view.state() != SyncState::IDLE);
        if unsettled.is_empty() {
            break;
        }
    }
    for (i, entry) in tracked.iter().enumerate() {
        let id = entry.expected.id.clone();
        if unsettled.contains(&i) {
            violations.push(Violation::NeverSettled {
                id,
                state: entry.view.state(),
            });
            continue;
        }
        let stored = hub.accessor().get(&id);
        if entry.view.value() != stored {
            violations.push(Violation::Diverged { id: id.clone() });
        }
        if stored.as_ref() != Some(&entry.expected) {
            violations.push(Violation::LostEdit { id });
        }
    }

    // Phase 4: one last edit, then tear down without waiting
    for entry in &mut tracked {
        let patch = random_edit(&mut rng);
        apply_edit(entry, patch, config.edits_per_entity, &mut stats, &mut violations);
    }
    let teardowns: Vec<_> = tracked.iter().filter_map(|t| t.view.dispose()).collect();
    for handle in teardowns {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "teardown flush task failed");
        }
    }

    let notices = notices.lock().clone();
    let lost: BTreeSet<EntityId> = notices
        .iter()
        .filter(|n| n.teardown)
        .map(|n| n.id.clone())
        .collect();
    for entry in &tracked {
        let id = &entry.expected.id;
        if lost.contains(id) {
            stats.reported_teardown_losses += 1;
            continue;
        }
        if hub.accessor().get(id).as_ref() != Some(&entry.expected) {
            violations.push(Violation::LostEdit { id: id.clone() });
        }
    }

    for entry in &tracked {
        stats.absorb(&entry.view.stats());
    }
    stats.store = hub.accessor().stats();
    stats.notices = notices.len() as u64;

    tracing::info!(
        seed = config.seed,
        edits = stats.edits,
        violations = violations.len(),
        "simulation finished"
    );

    Ok(SimulatorReport {
        config,
        stats,
        violations,
    })
}

fn apply_edit(
    entry: &mut Tracked,
    patch: Patch,
    edit: usize,
    stats: &mut SimulatorStats,
    violations: &mut Vec<Violation>,
) {
    let id = entry.expected.id.clone();
    if let Err(err) = entry.view.mutate(patch.clone()) {
        violations.push(Violation::EditRejected {
            id,
            error: err.to_string(),
        });
        return;
    }
    stats.edits += 1;

    if let Err(err) = entry.expected.apply_local(&patch) {
        violations.push(Violation::EditRejected {
            id,
            error: err.to_string(),
        });
        return;
    }
    if entry.view.value().as_ref() != Some(&entry.expected) {
        violations.push(Violation::EditNotVisible { id, edit });
    }
}

/// One or two field changes with exactly representable values
fn random_edit(rng: &mut StdRng) -> Patch {
    let mut patch = Patch::new();
    let fields = rng.gen_range(1..=2);
    for _ in 0..fields {
        match rng.gen_range(0..4) {
            0 => patch.insert("credits", f64::from(rng.gen_range(0..=12_u8)) / 2.0),
            1 => patch.insert("grade_percentage", f64::from(rng.gen_range(0..=100_u8))),
            2 => patch.insert("name", format!("Course {}", rng.gen_range(0..1000_u32))),
            _ => patch.insert("include_in_gpa", rng.gen_bool(0.5)),
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_from_toml_fills_defaults() {
        let config = SimulatorConfig::from_toml_str("seed = 9\nfailure_rate = 0.5\n").unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.failure_rate, 0.5);
        assert_eq!(config.entities, SimulatorConfig::default().entities);
    }

    #[test]
    fn certain_failure_is_rejected() {
        let config = SimulatorConfig {
            failure_rate: 1.0,
            ..SimulatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Invalid(_))));
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let err = SimulatorConfig::from_toml_str("debounce_ms = 0").unwrap_err();
        assert!(matches!(err, SimError::Sync(_)));
    }

    #[test]
    fn random_edits_are_valid_course_patches() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut course = Course::new("CS", 4.0).with_id("c1");
        for _ in 0..200 {
            let patch = random_edit(&mut rng);
            assert!(!patch.is_empty());
            course.apply_local(&patch).unwrap();
        }
    }

    #[test]
    fn report_text_shows_result() {
        let report = SimulatorReport {
            config: SimulatorConfig::default(),
            stats: SimulatorStats::default(),
            violations: vec![Violation::LostEdit {
                id: EntityId::new("course-0"),
            }],
        };
        assert!(!report.passed());
        let text = report.generate_text();
        assert!(text.contains("Violations: 1"));
        assert!(text.contains("LostEdit"));
        assert!(text.ends_with("=== Result: FAIL ===\n"));
    }
}
