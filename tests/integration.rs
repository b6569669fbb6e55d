//! Integration tests for the machine registry store.

use deskvault::{
    ConnectionAction, CustomField, FieldId, FieldKind, Machine, Store, StoreConfig, StoreEvent,
    SubscriptionConfig,
};
use tempfile::TempDir;

fn test_store(dir: &TempDir) -> Store {
    Store::create(StoreConfig {
        path: dir.path().join("store"),
        create_if_missing: true,
    })
    .unwrap()
}

fn machine(name: &str, remote_id: &str) -> Machine {
    Machine::new(name, remote_id)
}

// --- Realistic Workflow Tests ---

#[test]
fn test_registry_workflow() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    // Register a few machines the way the UI would.
    let mut office = machine("office desktop", "123456789");
    office.address = Some("10.0.0.12".to_string());
    office.categories = vec!["Work".to_string()];
    office.tags = vec!["primary".to_string()];
    office.passwords = vec!["s3cret".to_string()];
    office.custom_fields = vec![CustomField {
        id: FieldId::new(),
        key: "os".to_string(),
        value: "windows 11".to_string(),
        kind: FieldKind::Text,
    }];
    let office_id = office.id;

    let home = machine("home laptop", "987654321");
    let home_id = home.id;

    store.add_machine(office).unwrap();
    store.add_machine(home).unwrap();

    // Launch a couple of sessions.
    store
        .log_connection_attempt(office_id, ConnectionAction::LaunchAttempt, None)
        .unwrap();
    store
        .log_connection_attempt(office_id, ConnectionAction::LaunchSuccess, None)
        .unwrap();
    store
        .log_connection_attempt(
            home_id,
            ConnectionAction::LaunchFailure,
            Some("unreachable".to_string()),
        )
        .unwrap();

    let office = store.get_machine(office_id).unwrap();
    assert_eq!(office.connection_count, 1);
    assert!(office.last_accessed.is_some());

    assert_eq!(store.get_history(None).len(), 3);
    assert_eq!(store.get_history(Some(home_id)).len(), 1);

    // Search and category filters.
    assert_eq!(store.search_machines("laptop").len(), 1);
    assert_eq!(store.search_machines("10.0.0").len(), 1);
    assert_eq!(store.get_machines_by_category("Work").len(), 1);
    assert!(store.search_machines("mainframe").is_empty());

    // Remote-id lookups.
    assert_eq!(
        store.get_machine_by_remote_id("987654321").unwrap().id,
        home_id
    );
    assert!(store.remote_id_in_use("123456789", None));
    assert!(!store.remote_id_in_use("123456789", Some(office_id)));
}

#[test]
fn test_history_survives_machine_deletion() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let m = machine("ephemeral", "555");
    let id = m.id;
    store.add_machine(m).unwrap();
    store
        .log_connection_attempt(id, ConnectionAction::LaunchSuccess, None)
        .unwrap();

    store.delete_machine(id).unwrap();

    // Soft reference: entries keep pointing at the deleted machine.
    let history = store.get_history(Some(id));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].machine_id, id);

    // Logging against the deleted machine still records the attempt.
    store
        .log_connection_attempt(id, ConnectionAction::LaunchAttempt, None)
        .unwrap();
    assert_eq!(store.get_history(Some(id)).len(), 2);
}

#[test]
fn test_history_clear_scopes() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let a = machine("a", "1");
    let b = machine("b", "2");
    let (a_id, b_id) = (a.id, b.id);
    store.add_machine(a).unwrap();
    store.add_machine(b).unwrap();

    for _ in 0..3 {
        store
            .log_connection_attempt(a_id, ConnectionAction::LaunchAttempt, None)
            .unwrap();
    }
    store
        .log_connection_attempt(b_id, ConnectionAction::LaunchAttempt, None)
        .unwrap();

    store.clear_history(Some(a_id)).unwrap();
    assert!(store.get_history(Some(a_id)).is_empty());
    assert_eq!(store.get_history(None).len(), 1);

    store.clear_history(None).unwrap();
    assert!(store.get_history(None).is_empty());
}

#[test]
fn test_settings_roundtrip_through_store() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let mut settings = store.get_settings().unwrap();
    settings.dark_mode = true;
    settings.categories.push("Lab".to_string());
    store.update_settings(settings.clone()).unwrap();

    assert_eq!(store.get_settings().unwrap(), settings);
}

#[test]
fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");

    let m = machine("durable", "424242");
    let id = m.id;
    {
        let store = Store::create(StoreConfig {
            path: path.clone(),
            create_if_missing: true,
        })
        .unwrap();
        store.add_machine(m).unwrap();
        store
            .log_connection_attempt(id, ConnectionAction::LaunchSuccess, None)
            .unwrap();
        let mut settings = store.get_settings().unwrap();
        settings.default_encryption = true;
        store.update_settings(settings).unwrap();
    }

    let store = Store::open_or_create(StoreConfig {
        path,
        create_if_missing: false,
    })
    .unwrap();

    let restored = store.get_machine(id).unwrap();
    assert_eq!(restored.name, "durable");
    assert_eq!(restored.connection_count, 1);
    assert_eq!(store.get_history(None).len(), 1);
    assert!(store.get_settings().unwrap().default_encryption);
}

#[test]
fn test_export_import_data_primitives() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    store.add_machine(machine("one", "1")).unwrap();
    store.add_machine(machine("two", "2")).unwrap();

    let contents = store.export_all_data().unwrap();
    assert_eq!(contents.machines.len(), 2);

    // Destructive import replaces, never merges.
    store.add_machine(machine("three", "3")).unwrap();
    store.import_data(contents).unwrap();

    let names: Vec<String> = store
        .get_all_machines()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"three".to_string()));
}

#[test]
fn test_event_stream_reflects_mutations() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);
    let handle = store.subscribe(SubscriptionConfig::default());

    let m = machine("watched", "777");
    let id = m.id;
    store.add_machine(m.clone()).unwrap();
    store.update_machine(m).unwrap();
    store.delete_machine(id).unwrap();
    store.clear_all_data().unwrap();

    assert_eq!(handle.try_recv().unwrap(), StoreEvent::MachineAdded { id });
    assert_eq!(handle.try_recv().unwrap(), StoreEvent::MachineUpdated { id });
    assert_eq!(handle.try_recv().unwrap(), StoreEvent::MachineDeleted { id });
    assert_eq!(handle.try_recv().unwrap(), StoreEvent::DataCleared);
    assert!(handle.try_recv().is_err());
}
