use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pinning_core::models::{CoreErrorKind, GatedVersion, Pin, PinKey, PinType};
use pinning_core::persistence::PinStore;
use pinning_core::sqlite::{OpenDisposition, SchemaVersion, SqlitePinStore};

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("pinning-{test_name}-{nanos}.sqlite3"))
}

fn key(package_id: &str, source_id: &str) -> PinKey {
    PinKey::new(package_id, source_id).expect("valid pin key")
}

fn gating(package_id: &str, source_id: &str, gate: &str) -> Pin {
    Pin::create_gating_pin(
        key(package_id, source_id),
        GatedVersion::parse(gate).expect("valid gate"),
    )
    .expect("valid gating pin")
}

fn set_metadata(path: &Path, name: &str, value: &str) {
    let connection = rusqlite::Connection::open(path).expect("open raw connection");
    connection
        .execute(
            "UPDATE metadata SET value = ?1 WHERE name = ?2",
            rusqlite::params![value, name],
        )
        .expect("update metadata");
}

#[test]
fn new_store_records_latest_schema_version() {
    let path = test_db_path("new-store-version");
    let store = SqlitePinStore::create_new(&path, None).unwrap();

    assert_eq!(store.schema_version(), SchemaVersion::LATEST);
    assert_eq!(store.disposition(), OpenDisposition::ReadWrite);
    assert_eq!(store.database_path(), path.as_path());
    assert!(store.get_all_pins().unwrap().is_empty());

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn pins_round_trip_and_survive_reopen() {
    let path = test_db_path("round-trip");
    let blocking = Pin::create_blocking_pin(key("Contoso.Tool", "winget"));
    let pinning = Pin::create_pinning_pin(PinKey::installed("Contoso.Tool").unwrap());
    let gated = gating("Fabrikam.App", "msstore", "1.2.*");

    {
        let store = SqlitePinStore::create_new(&path, None).unwrap();
        for pin in [&blocking, &pinning, &gated] {
            store.add_pin(pin).unwrap();
        }
        assert_eq!(store.get_pin(blocking.key()).unwrap(), Some(blocking.clone()));
        assert_eq!(store.get_pin(gated.key()).unwrap(), Some(gated.clone()));
    }

    let reopened = SqlitePinStore::open(&path, OpenDisposition::Read).unwrap();
    assert_eq!(
        reopened.get_all_pins().unwrap(),
        vec![blocking, pinning, gated]
    );
    assert_eq!(
        reopened.get_pin(&key("Contoso.Tool", "msstore")).unwrap(),
        None
    );

    drop(reopened);
    let _ = std::fs::remove_file(path);
}

#[test]
fn adding_the_same_key_twice_fails() {
    let path = test_db_path("duplicate-add");
    let store = SqlitePinStore::create_new(&path, None).unwrap();

    let first = store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "winget")))
        .unwrap();
    let error = store
        .add_pin(&Pin::create_blocking_pin(key("Contoso.Tool", "winget")))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::AlreadyExists);
    assert!(error.is_structural());

    let second = store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "msstore")))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(
        store
            .get_pin(&key("Contoso.Tool", "winget"))
            .unwrap()
            .map(|pin| pin.pin_type()),
        Some(PinType::Pinning)
    );

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn update_requires_an_existing_pin_and_reports_changes() {
    let path = test_db_path("update");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    let pin_key = key("Contoso.Tool", "winget");

    let error = store
        .update_pin(&Pin::create_blocking_pin(pin_key.clone()))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::NotFound);

    let row_id = store
        .add_pin(&Pin::create_pinning_pin(pin_key.clone()))
        .unwrap();

    let unchanged = store
        .update_pin(&Pin::create_pinning_pin(pin_key.clone()))
        .unwrap();
    assert!(!unchanged.changed);
    assert_eq!(unchanged.row_id, row_id);

    let changed = store
        .update_pin(&gating("Contoso.Tool", "winget", "<2.0"))
        .unwrap();
    assert!(changed.changed);
    assert_eq!(changed.row_id, row_id);

    let stored = store.get_pin(&pin_key).unwrap().unwrap();
    assert_eq!(stored.pin_type(), PinType::Gating);
    assert_eq!(stored.gated_version().as_str(), "<2.0");

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn add_or_update_replaces_an_existing_pin() {
    let path = test_db_path("add-or-update");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    let pin_key = key("Contoso.Tool", "winget");

    store
        .add_or_update_pin(&Pin::create_pinning_pin(pin_key.clone()))
        .unwrap();
    store
        .add_or_update_pin(&Pin::create_blocking_pin(pin_key.clone()))
        .unwrap();

    let pins = store.get_all_pins().unwrap();
    assert_eq!(pins, vec![Pin::create_blocking_pin(pin_key)]);

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn add_list_remove_scenario() {
    let path = test_db_path("scenario");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    let pin = gating("Contoso.Tool", "winget", "<2.0");

    store.add_pin(&pin).unwrap();
    assert_eq!(store.get_all_pins().unwrap().len(), 1);

    store.remove_pin(pin.key()).unwrap();
    assert!(store.get_all_pins().unwrap().is_empty());

    let error = store.remove_pin(pin.key()).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::NotFound);

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn reset_is_scoped_to_the_requested_source() {
    let path = test_db_path("reset");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "winget")))
        .unwrap();
    store
        .add_pin(&Pin::create_blocking_pin(key("Fabrikam.App", "winget")))
        .unwrap();
    store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "msstore")))
        .unwrap();

    assert!(!store.reset_all_pins("unknown-source").unwrap());
    assert!(store.reset_all_pins("winget").unwrap());

    let remaining = store.get_all_pins().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key().source_id(), "msstore");

    assert!(store.reset_all_pins("").unwrap());
    assert!(store.get_all_pins().unwrap().is_empty());
    assert!(!store.reset_all_pins("").unwrap());

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn read_only_store_rejects_writes() {
    let path = test_db_path("read-only");
    let pin = Pin::create_pinning_pin(key("Contoso.Tool", "winget"));
    {
        let store = SqlitePinStore::create_new(&path, None).unwrap();
        store.add_pin(&pin).unwrap();
    }

    let store = SqlitePinStore::open(&path, OpenDisposition::Read).unwrap();
    assert_eq!(store.get_pin(pin.key()).unwrap(), Some(pin.clone()));

    let error = store
        .add_pin(&Pin::create_blocking_pin(key("Fabrikam.App", "winget")))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidState);

    let error = store.remove_pin(pin.key()).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidState);

    let error = store.reset_all_pins("").unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidState);

    assert_eq!(store.get_all_pins().unwrap(), vec![pin]);

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn last_write_time_moves_on_changes() {
    let path = test_db_path("last-write-time");
    let store = SqlitePinStore::create_new(&path, None).unwrap();

    let created = store.last_write_time().unwrap();
    store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "winget")))
        .unwrap();
    let after_add = store.last_write_time().unwrap();

    assert!(after_add >= created);
    assert!(after_add <= SystemTime::now());

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn create_new_refuses_an_existing_file() {
    let path = test_db_path("create-existing");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    drop(store);

    let error = SqlitePinStore::create_new(&path, None).err().unwrap();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);

    let _ = std::fs::remove_file(path);
}

#[test]
fn create_new_refuses_versions_this_build_cannot_write() {
    let path = test_db_path("create-up-level");

    let error = SqlitePinStore::create_new(&path, Some(SchemaVersion::new(1, 1)))
        .err()
        .unwrap();
    assert_eq!(error.kind, CoreErrorKind::UpLevelSchema);

    let error = SqlitePinStore::create_new(&path, Some(SchemaVersion::new(2, 0)))
        .err()
        .unwrap();
    assert_eq!(error.kind, CoreErrorKind::UpLevelSchema);
    assert!(!path.exists());
}

#[test]
fn up_level_minor_version_opens_read_only() {
    let path = test_db_path("up-level-minor");
    let pin = Pin::create_blocking_pin(key("Contoso.Tool", "winget"));
    {
        let store = SqlitePinStore::create_new(&path, None).unwrap();
        store.add_pin(&pin).unwrap();
    }
    set_metadata(&path, "minorVersion", "1");

    let store = SqlitePinStore::open(&path, OpenDisposition::Read).unwrap();
    assert_eq!(store.schema_version(), SchemaVersion::new(1, 1));
    assert_eq!(store.get_all_pins().unwrap(), vec![pin]);
    drop(store);

    let error = SqlitePinStore::open(&path, OpenDisposition::ReadWrite)
        .err()
        .unwrap();
    assert_eq!(error.kind, CoreErrorKind::UpLevelSchema);
    assert!(!error.is_structural());

    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::ReadWrite).is_none());
    assert!(path.exists(), "an up-level store must be left in place");

    let _ = std::fs::remove_file(path);
}

#[test]
fn unknown_major_version_is_refused() {
    let path = test_db_path("up-level-major");
    drop(SqlitePinStore::create_new(&path, None).unwrap());
    set_metadata(&path, "majorVersion", "2");

    for disposition in [OpenDisposition::Read, OpenDisposition::ReadWrite] {
        let error = SqlitePinStore::open(&path, disposition).err().unwrap();
        assert_eq!(error.kind, CoreErrorKind::UpLevelSchema);
    }
    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::Read).is_none());
    assert!(path.exists());

    let _ = std::fs::remove_file(path);
}

#[test]
fn open_reports_corrupt_metadata() {
    let path = test_db_path("bad-metadata");
    drop(SqlitePinStore::create_new(&path, None).unwrap());
    set_metadata(&path, "majorVersion", "one");

    let error = SqlitePinStore::open(&path, OpenDisposition::Read)
        .err()
        .unwrap();
    assert_eq!(error.kind, CoreErrorKind::Corrupt);

    let _ = std::fs::remove_file(path);
}

#[test]
fn open_if_exists_returns_none_for_a_missing_store() {
    let path = test_db_path("missing");

    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::ReadWrite).is_none());
    assert!(!path.exists());
}

#[test]
fn open_if_exists_removes_a_corrupt_file() {
    let path = test_db_path("corrupt");
    std::fs::write(&path, "this is not a sqlite database\n".repeat(256)).unwrap();

    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::Read).is_none());
    assert!(!path.exists());
}

#[test]
fn open_if_exists_removes_a_database_without_metadata() {
    let path = test_db_path("no-metadata");
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
            .unwrap();
    }

    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::ReadWrite).is_none());
    assert!(!path.exists());
}

#[test]
fn open_if_exists_removes_a_directory_at_the_store_path() {
    let path = test_db_path("directory");
    std::fs::create_dir_all(path.join("nested")).unwrap();

    assert!(SqlitePinStore::open_if_exists(&path, OpenDisposition::ReadWrite).is_none());
    assert!(!path.exists());
}

#[test]
fn open_or_create_replaces_a_corrupt_file_with_a_fresh_store() {
    let path = test_db_path("open-or-create");
    std::fs::write(&path, "garbage".repeat(1024)).unwrap();

    let store = SqlitePinStore::open_or_create(&path, OpenDisposition::ReadWrite).unwrap();
    assert_eq!(store.schema_version(), SchemaVersion::LATEST);
    store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "winget")))
        .unwrap();

    drop(store);
    let reopened = SqlitePinStore::open_or_create(&path, OpenDisposition::Read).unwrap();
    assert_eq!(reopened.disposition(), OpenDisposition::Read);
    assert_eq!(reopened.get_all_pins().unwrap().len(), 1);

    drop(reopened);
    let _ = std::fs::remove_file(path);
}

#[test]
fn open_or_create_creates_parent_directories() {
    let root = test_db_path("nested-parent");
    let path = root.join("data").join("pins.db");

    let store = SqlitePinStore::open_or_create(&path, OpenDisposition::Read).unwrap();
    assert_eq!(store.disposition(), OpenDisposition::Read);
    assert!(path.exists());

    drop(store);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn create_new_reports_a_parent_that_is_not_a_directory() {
    let root = test_db_path("parent-is-file");
    std::fs::write(&root, "not a directory").unwrap();
    let path = root.join("data").join("pins.db");

    let error = SqlitePinStore::create_new(&path, None).err().unwrap();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);
    assert!(error.message.contains("failed to create"));
    assert!(error.message.contains("data"));

    let _ = std::fs::remove_file(root);
}

#[test]
fn concurrent_writers_share_one_store() {
    const WRITERS: usize = 8;
    let path = test_db_path("concurrent");
    let store = SqlitePinStore::create_new(&path, None).unwrap();

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let store = &store;
            scope.spawn(move || {
                store
                    .add_pin(&Pin::create_pinning_pin(key(&format!("Pkg.{writer}"), "winget")))
                    .unwrap();
            });
        }
    });

    let pins = store.get_all_pins().unwrap();
    assert_eq!(pins.len(), WRITERS);
    for writer in 0..WRITERS {
        let pin_key = key(&format!("Pkg.{writer}"), "winget");
        assert_eq!(
            store.get_pin(&pin_key).unwrap(),
            Some(Pin::create_pinning_pin(pin_key))
        );
    }

    drop(store);
    let _ = std::fs::remove_file(path);
}

#[test]
fn failed_writes_leave_the_store_unchanged() {
    let path = test_db_path("failed-writes");
    let store = SqlitePinStore::create_new(&path, None).unwrap();
    store
        .add_pin(&Pin::create_pinning_pin(key("Contoso.Tool", "winget")))
        .unwrap();

    let pins = store.get_all_pins().unwrap();
    let written = store.last_write_time().unwrap();

    let error = store
        .add_pin(&Pin::create_blocking_pin(key("Contoso.Tool", "winget")))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::AlreadyExists);

    let error = store.remove_pin(&key("Fabrikam.App", "winget")).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::NotFound);

    let error = store
        .update_pin(&Pin::create_blocking_pin(key("Fabrikam.App", "winget")))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::NotFound);

    assert_eq!(store.get_all_pins().unwrap(), pins);
    assert_eq!(store.last_write_time().unwrap(), written);

    drop(store);
    let _ = std::fs::remove_file(path);
}
