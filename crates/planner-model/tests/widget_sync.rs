//! Widgets, tabs and academic records through the sync engine

use planner_model::{
    CounterSettings, NotesSettings, Semester, Tab, TabKind, TabRecord, TabSettings, Widget,
    WidgetCatalog, WidgetContext, WidgetKind, WidgetRecord, WidgetSettings,
};
use planner_sync::{EntityId, EntitySync, Patch, PatchError, SyncEntity};
use planner_test_utils::{init_tracing, test_config, ScriptedAccessor};
use pretty_assertions::assert_eq;
use serde_json::json;

fn counter_widget(catalog: &WidgetCatalog) -> Widget {
    init_tracing();
    let mut widget = catalog
        .create(WidgetKind::Counter, WidgetContext::Course(EntityId::new("c1")))
        .unwrap();
    widget.id = EntityId::new("w1");
    widget
}

#[tokio::test(start_paused = true)]
async fn counter_settings_sync_as_typed_payload() {
    let catalog = WidgetCatalog::with_builtins();
    let accessor = ScriptedAccessor::new().with_record(counter_widget(&catalog)).shared();
    let view = EntitySync::new(accessor.clone(), test_config());
    view.bind(Some(EntityId::new("w1"))).unwrap().await.unwrap();

    let next = match view.value().unwrap().settings {
        WidgetSettings::Counter(counter) => counter.stepped(2),
        other => panic!("unexpected settings {other:?}"),
    };
    let patch = Patch::new().set("settings", serde_json::to_value(WidgetSettings::Counter(next)).unwrap());
    view.mutate(patch).unwrap();
    view.flush_now().await;

    let stored = accessor.stored("w1").unwrap();
    assert_eq!(
        stored.settings,
        WidgetSettings::Counter(CounterSettings {
            value: 2.0,
            ..CounterSettings::default()
        })
    );

    // Stored form carries no kind tag and parses back to the same widget
    let record = stored.to_record();
    assert_eq!(record.settings, r#"{"min":0.0,"max":10.0,"value":2.0,"step":1.0}"#);
    assert_eq!(record.parse(&catalog).unwrap(), stored);
}

#[tokio::test(start_paused = true)]
async fn invalid_counter_edit_is_rejected_locally() {
    let catalog = WidgetCatalog::with_builtins();
    let accessor = ScriptedAccessor::new().with_record(counter_widget(&catalog)).shared();
    let view = EntitySync::new(accessor.clone(), test_config());
    view.bind(Some(EntityId::new("w1"))).unwrap().await.unwrap();

    let err = view
        .mutate(Patch::new().set(
            "settings",
            json!({"kind": "counter", "min": 5, "max": 1, "value": 3, "step": 1}),
        ))
        .unwrap_err();
    assert!(matches!(err, PatchError::Invalid { code: "COUNTER_OUT_OF_RANGE", .. }));
    assert!(view.pending().is_empty());
    assert_eq!(accessor.update_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn semester_range_checked_before_buffering() {
    let semester = Semester::new(
        "Fall",
        "p1",
        chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
    );
    let id = semester.id().clone();
    let accessor = ScriptedAccessor::new().with_record(semester).shared();
    let view = EntitySync::new(accessor.clone(), test_config());
    view.bind(Some(id)).unwrap().await.unwrap();

    let err = view
        .mutate(Patch::new().set("end_date", "2025-08-01"))
        .unwrap_err();
    assert!(matches!(
        err,
        PatchError::Invalid {
            code: "INVALID_SEMESTER_DATE_RANGE",
            ..
        }
    ));
    assert!(view.pending().is_empty());
}

#[test]
fn malformed_stored_settings_surface_as_errors() {
    let catalog = WidgetCatalog::with_builtins();
    let record = WidgetRecord {
        id: EntityId::new("w9"),
        widget_type: "counter".to_string(),
        layout_config: String::new(),
        settings: "not json".to_string(),
        is_removable: true,
        semester_id: None,
        course_id: Some(EntityId::new("c1")),
    };
    let err = record.parse(&catalog).unwrap_err();
    assert!(err.is_corrupt());
}

#[tokio::test(start_paused = true)]
async fn tab_reorder_and_notes_sync_in_one_flush() {
    init_tracing();
    let context = WidgetContext::Semester(EntityId::new("s1"));
    let tab = Tab::new("t1", TabKind::Notes, context.clone(), 1);
    let accessor = ScriptedAccessor::new().with_record(tab).shared();
    let view = EntitySync::new(accessor.clone(), test_config());
    view.bind(Some(EntityId::new("t1"))).unwrap().await.unwrap();

    view.mutate(Patch::new().set("order_index", 2)).unwrap();
    view.mutate(Patch::new().set(
        "settings",
        json!({"kind": "notes", "content": "bring calculator"}),
    ))
    .unwrap();
    assert!(view
        .mutate(Patch::new().set("context", json!({"type": "course", "id": "c1"})))
        .is_err());
    view.flush_now().await;

    assert_eq!(accessor.update_count(), 1);
    let stored = accessor.stored("t1").unwrap();
    assert_eq!(stored.order_index, 2);
    assert_eq!(stored.context, context);

    let record = stored.to_record();
    assert_eq!(record.settings, r#"{"content":"bring calculator"}"#);
    assert_eq!(record.semester_id, Some(EntityId::new("s1")));
    assert_eq!(
        record.parse().unwrap().settings,
        TabSettings::Notes(NotesSettings {
            content: "bring calculator".to_string()
        })
    );
}

#[test]
fn tab_on_two_parents_is_rejected() {
    let record = TabRecord {
        id: EntityId::new("t9"),
        tab_type: "dashboard".to_string(),
        settings: "{}".to_string(),
        order_index: 0,
        is_removable: true,
        is_draggable: false,
        semester_id: Some(EntityId::new("s1")),
        course_id: Some(EntityId::new("c1")),
    };
    let err = record.parse().unwrap_err();
    assert!(err.is_corrupt());
    assert_eq!(err.to_string(), "must belong to exactly one semester or course");
}
