//! Tests for the auto-backup sentinel's state machine.

use deskvault::{
    ConnectionAction, KvStore, Machine, MemoryKvStore, Sentinel, Store, StoreConfig, BACKUP_KEY,
    SKIP_RESTORE_KEY,
};
use std::sync::Arc;
use tempfile::TempDir;

fn test_store(dir: &TempDir, name: &str) -> Arc<Store> {
    Arc::new(
        Store::create(StoreConfig {
            path: dir.path().join(name),
            create_if_missing: true,
        })
        .unwrap(),
    )
}

/// Populate a store and capture its backup into the given kv store.
fn seeded_backup(dir: &TempDir, kv: &Arc<dyn KvStore>, machine_count: usize) {
    let donor = test_store(dir, "donor");
    for i in 0..machine_count {
        donor
            .add_machine(Machine::new(format!("machine-{i}"), format!("{i}00")))
            .unwrap();
    }
    let sentinel = Sentinel::new(Arc::clone(&donor), Arc::clone(kv));
    sentinel.create_backup().unwrap();
}

#[test]
fn test_restore_fires_only_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    seeded_backup(&dir, &kv, 4);

    // Empty primary store: startup restores all four machines.
    let empty = test_store(&dir, "empty");
    let sentinel = Sentinel::new(Arc::clone(&empty), Arc::clone(&kv));
    let status = sentinel.initialize();

    assert!(status.restored);
    assert!(status.has_backup);
    assert_eq!(empty.get_all_machines().len(), 4);

    // Non-empty primary store: backup contents are ignored.
    let busy = test_store(&dir, "busy");
    busy.add_machine(Machine::new("resident", "999")).unwrap();
    let sentinel = Sentinel::new(Arc::clone(&busy), Arc::clone(&kv));
    let status = sentinel.initialize();

    assert!(!status.restored);
    assert_eq!(busy.get_all_machines().len(), 1);
    assert_eq!(busy.get_all_machines()[0].name, "resident");
}

#[test]
fn test_initialize_without_backup_reports_none() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

    let store = test_store(&dir, "fresh");
    let sentinel = Sentinel::new(Arc::clone(&store), kv);
    let status = sentinel.initialize();

    assert!(!status.restored);
    assert!(!status.has_backup);
}

#[test]
fn test_nonempty_store_gets_initial_backup() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

    let store = test_store(&dir, "busy");
    store.add_machine(Machine::new("resident", "1")).unwrap();

    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));
    let status = sentinel.initialize();

    assert!(!status.restored);
    assert!(status.has_backup);
    assert!(kv.get(BACKUP_KEY).unwrap().is_some());
}

#[test]
fn test_skip_flag_is_consumed_exactly_once() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    seeded_backup(&dir, &kv, 2);

    let store = test_store(&dir, "cleared");
    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));

    // The explicit clear flow arms the flag before wiping.
    sentinel.skip_next_restore().unwrap();
    store.clear_all_data().unwrap();

    // First startup: flag present, restore skipped, flag consumed.
    let status = sentinel.initialize();
    assert!(!status.restored);
    assert!(store.get_all_machines().is_empty());
    assert_eq!(kv.get(SKIP_RESTORE_KEY).unwrap(), None);

    // Second startup: flag gone, store still empty, restore fires.
    let status = sentinel.initialize();
    assert!(status.restored);
    assert_eq!(store.get_all_machines().len(), 2);
}

#[test]
fn test_tick_refreshes_backup_on_data_change() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

    let store = test_store(&dir, "live");
    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));

    // Nothing changed yet.
    assert!(!sentinel.tick());

    let m = Machine::new("fresh", "31337");
    let id = m.id;
    store.add_machine(m).unwrap();
    assert!(sentinel.tick());

    let backed_up = sentinel.latest_backup().unwrap();
    assert_eq!(backed_up.machines.len(), 1);
    assert_eq!(backed_up.machines[0].id, id);

    // The backup stamped last_backup_date; its own echo is not a change.
    assert!(store.get_settings().unwrap().last_backup_date.is_some());
    assert!(!sentinel.tick());

    // More activity, another refresh.
    store
        .log_connection_attempt(id, ConnectionAction::LaunchSuccess, None)
        .unwrap();
    assert!(sentinel.tick());
    assert_eq!(sentinel.latest_backup().unwrap().history.len(), 1);
}

#[test]
fn test_tick_respects_auto_backup_setting() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

    let store = test_store(&dir, "optout");
    let mut settings = store.get_settings().unwrap();
    settings.auto_backup = false;
    store.update_settings(settings).unwrap();

    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));
    store.add_machine(Machine::new("quiet", "5")).unwrap();

    assert!(!sentinel.tick());
    assert!(kv.get(BACKUP_KEY).unwrap().is_none());
}

#[test]
fn test_corrupt_backup_never_blocks_startup() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    seeded_backup(&dir, &kv, 1);

    // Flip a byte inside the stored record's payload.
    let raw = kv.get(BACKUP_KEY).unwrap().unwrap();
    let tampered = raw.replace("machine-0", "machine-X");
    kv.set(BACKUP_KEY, &tampered).unwrap();

    let store = test_store(&dir, "victim");
    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));
    let status = sentinel.initialize();

    // Checksum fails, restore degrades gracefully.
    assert!(!status.restored);
    assert!(store.get_all_machines().is_empty());
    assert!(sentinel.latest_backup().is_none());
}

#[test]
fn test_backup_status_and_clear() {
    let dir = TempDir::new().unwrap();
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

    let store = test_store(&dir, "status");
    store.add_machine(Machine::new("tracked", "8")).unwrap();
    let sentinel = Sentinel::new(Arc::clone(&store), Arc::clone(&kv));

    assert!(!sentinel.check_status().has_backup);
    assert_eq!(sentinel.backup_size(), 0);

    sentinel.create_backup().unwrap();
    let info = sentinel.check_status();
    assert!(info.has_backup);
    assert!(info.backup_date.is_some());
    assert!(sentinel.backup_size() > 0);

    sentinel.clear_backup().unwrap();
    assert!(!sentinel.check_status().has_backup);
}

#[test]
fn test_restore_survives_process_restart() {
    let dir = TempDir::new().unwrap();
    let kv_path = dir.path().join("kv.json");

    let machine = Machine::new("survivor", "123123");
    let id = machine.id;

    // First "session": populate and back up to the file-backed kv store.
    {
        let store = test_store(&dir, "session1");
        store.add_machine(machine).unwrap();
        let kv = Arc::new(deskvault::FileKvStore::open(&kv_path).unwrap());
        let sentinel = Sentinel::new(Arc::clone(&store), kv);
        sentinel.create_backup().unwrap();
    }

    // Second "session": primary store lost, secondary store heals it.
    let store = test_store(&dir, "session2");
    let kv = Arc::new(deskvault::FileKvStore::open(&kv_path).unwrap());
    let sentinel = Sentinel::new(Arc::clone(&store), kv);
    let status = sentinel.initialize();

    assert!(status.restored);
    assert_eq!(store.get_machine(id).unwrap().name, "survivor");
}
