//! Failure-mode tests across the error taxonomy.

use deskvault::export::export_data;
use deskvault::{
    deserialize, ExportOptions, Machine, MachineId, Store, StoreConfig, StoreError,
};
use tempfile::TempDir;

fn test_store(dir: &TempDir) -> Store {
    Store::create(StoreConfig {
        path: dir.path().join("store"),
        create_if_missing: true,
    })
    .unwrap()
}

#[test]
fn test_open_missing_store_without_create() {
    let dir = TempDir::new().unwrap();
    let result = Store::open_or_create(StoreConfig {
        path: dir.path().join("nowhere"),
        create_if_missing: false,
    });
    assert!(matches!(result, Err(StoreError::NotInitialized)));
}

#[test]
fn test_second_open_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");

    let _first = Store::create(StoreConfig {
        path: path.clone(),
        create_if_missing: true,
    })
    .unwrap();

    let second = Store::open(StoreConfig {
        path,
        create_if_missing: false,
    });
    assert!(matches!(second, Err(StoreError::Locked)));
}

#[test]
fn test_corrupt_data_file_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");

    {
        let store = test_store(&dir);
        store.add_machine(Machine::new("doomed", "1")).unwrap();
    }

    std::fs::write(path.join("store.bin"), b"XXXXgarbage").unwrap();

    let result = Store::open(StoreConfig {
        path,
        create_if_missing: false,
    });
    assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
}

#[test]
fn test_store_error_taxonomy() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);

    let machine = Machine::new("only", "123");
    store.add_machine(machine.clone()).unwrap();

    // Duplicate key.
    assert!(matches!(
        store.add_machine(machine.clone()),
        Err(StoreError::MachineExists(_))
    ));

    // Not found.
    let ghost = Machine::new("ghost", "456");
    assert!(matches!(
        store.update_machine(ghost),
        Err(StoreError::MachineNotFound(_))
    ));

    // Reads degrade to None rather than erroring.
    assert!(store.get_machine(MachineId::new()).is_none());
    assert!(store.get_machine_by_remote_id("000").is_none());
}

#[test]
fn test_format_errors_are_fatal_to_deserialize() {
    assert!(matches!(
        deserialize(b"not json", None),
        Err(StoreError::InvalidFormat(_))
    ));

    // Structurally wrong document.
    assert!(matches!(
        deserialize(b"{\"version\": \"1.0.0\"}", None),
        Err(StoreError::InvalidFormat(_))
    ));
}

#[test]
fn test_password_errors_carry_their_kind() {
    let dir = TempDir::new().unwrap();
    let store = test_store(&dir);
    store.add_machine(Machine::new("sealed", "987")).unwrap();

    let bytes = export_data(
        &store,
        &ExportOptions {
            encrypt: true,
            password: Some("right".to_string()),
            ..ExportOptions::default()
        },
    )
    .unwrap();

    assert!(matches!(
        deserialize(&bytes, None),
        Err(StoreError::PasswordRequired)
    ));
    assert!(matches!(
        deserialize(&bytes, Some("left")),
        Err(StoreError::DecryptionFailed(_))
    ));
}
