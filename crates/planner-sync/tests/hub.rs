//! Shared registry of views

use planner_model::Course;
use planner_sync::{EntityId, FlushOutcome, LoadOutcome, Patch, SyncHub};
use planner_test_utils::{
    course, course_p1, init_tracing, offline, test_config, RecordingNotifier, ScriptedAccessor,
};
use pretty_assertions::assert_eq;

fn hub() -> (SyncHub<Course, ScriptedAccessor<Course>>, std::sync::Arc<RecordingNotifier>) {
    init_tracing();
    let accessor = ScriptedAccessor::new()
        .with_record(course_p1())
        .with_record(course("p2", "Math", 3.0));
    let notifier = RecordingNotifier::new();
    (SyncHub::with_notifier(accessor, test_config(), notifier.clone()), notifier)
}

#[tokio::test(start_paused = true)]
async fn open_loaded_binds_and_loads() {
    let (hub, _) = hub();
    let (view, outcome) = hub.open_loaded(EntityId::new("p1")).await;

    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(view.value().unwrap().name, "CS");
    assert_eq!(hub.open_count(), 1);
    assert_eq!(hub.open_ids(), vec![EntityId::new("p1")]);
}

#[tokio::test(start_paused = true)]
async fn flush_all_sends_every_dirty_view() {
    let (hub, _) = hub();
    let (a, _) = hub.open_loaded(EntityId::new("p1")).await;
    let (b, _) = hub.open_loaded(EntityId::new("p2")).await;
    let (_clean, _) = hub.open_loaded(EntityId::new("p1")).await;

    a.mutate(Patch::new().set("credits", 5.0)).unwrap();
    b.mutate(Patch::new().set("name", "Linear Algebra")).unwrap();

    let outcomes = hub.flush_all().await;
    assert_eq!(outcomes, vec![FlushOutcome::Applied, FlushOutcome::Applied]);
    assert_eq!(hub.accessor().update_count(), 2);
    assert_eq!(hub.accessor().stored("p2").unwrap().name, "Linear Algebra");
    assert!(a.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_views_leave_the_registry() {
    let (hub, _) = hub();
    let (a, _) = hub.open_loaded(EntityId::new("p1")).await;
    let b = hub.open(EntityId::new("p2"));
    assert_eq!(hub.open_count(), 2);

    drop(a);
    assert_eq!(hub.open_count(), 1);

    b.dispose();
    assert_eq!(hub.open_count(), 0);
    assert!(hub.flush_all().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn views_share_the_notifier() {
    let (hub, notifier) = hub();
    let (view, _) = hub.open_loaded(EntityId::new("p2")).await;

    hub.accessor().fail_next_update(offline());
    view.mutate(Patch::new().set("credits", 1.0)).unwrap();

    assert_eq!(hub.flush_all().await, vec![FlushOutcome::Failed]);
    assert_eq!(notifier.count(), 1);
    assert_eq!(notifier.notices()[0].id, EntityId::new("p2"));
}
