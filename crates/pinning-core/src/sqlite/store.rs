use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};

use crate::config::PinningConfig;
use crate::models::{CoreError, CoreErrorKind, Pin, PinKey};
use crate::persistence::{PersistenceResult, PinStore, PinUpdate, RowId};
use crate::sqlite::schema::{PinSchema, SchemaVersion};

const METADATA_TABLE_SQL: &str = r#"
CREATE TABLE metadata (
    name TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

const MAJOR_VERSION_KEY: &str = "majorVersion";
const MINOR_VERSION_KEY: &str = "minorVersion";
const LAST_WRITE_TIME_KEY: &str = "lastwritetime";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OpenDisposition {
    Read,
    ReadWrite,
}

/// A pin store backed by a single SQLite file.
///
/// The connection is guarded by a mutex held for the whole of every call, so
/// one handle can be shared between threads. Coordinating several processes
/// writing the same file is left to the caller.
pub struct SqlitePinStore {
    database_path: PathBuf,
    disposition: OpenDisposition,
    version: SchemaVersion,
    schema: PinSchema,
    connection: Mutex<Connection>,
}

impl SqlitePinStore {
    /// Creates a new store file, defaulting to the latest schema version.
    pub fn create_new(
        database_path: impl Into<PathBuf>,
        version: Option<SchemaVersion>,
    ) -> PersistenceResult<Self> {
        let database_path = database_path.into();
        let version = version.unwrap_or(SchemaVersion::LATEST);
        let schema = PinSchema::for_version(version)
            .filter(|schema| schema.can_write(version))
            .ok_or_else(|| up_level_error("create_new", &database_path, version))?;

        if database_path.exists() {
            return Err(storage_error_text(
                "create_new",
                format!("'{}' already exists", database_path.display()),
            ));
        }

        let mut connection = open_connection(
            "create_new",
            &database_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(error) = initialize(&mut connection, schema, version) {
            drop(connection);
            let _ = fs::remove_file(&database_path);
            return Err(storage_error("create_new", error));
        }

        tracing::debug!(
            path = %database_path.display(),
            version = %version,
            "created pin store"
        );

        Ok(Self {
            database_path,
            disposition: OpenDisposition::ReadWrite,
            version,
            schema,
            connection: Mutex::new(connection),
        })
    }

    /// Opens an existing store.
    ///
    /// A store written by a newer minor revision of a known major version can
    /// still be opened for `Read`; `ReadWrite` requires a version this build
    /// can write. Unknown major versions are refused either way.
    pub fn open(
        database_path: impl Into<PathBuf>,
        disposition: OpenDisposition,
    ) -> PersistenceResult<Self> {
        let database_path = database_path.into();
        let flags = match disposition {
            OpenDisposition::Read => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenDisposition::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        };

        let connection = Connection::open_with_flags(&database_path, flags)
            .map_err(|error| classify_error("open", error))?;
        let version = read_schema_version(&connection)?;

        let schema = PinSchema::for_version(version)
            .ok_or_else(|| up_level_error("open", &database_path, version))?;
        if disposition == OpenDisposition::ReadWrite && !schema.can_write(version) {
            return Err(up_level_error("open", &database_path, version));
        }

        Ok(Self {
            database_path,
            disposition,
            version,
            schema,
            connection: Mutex::new(connection),
        })
    }

    /// Opens the store if a usable one exists. Never fails: a directory or a
    /// corrupt file at the path is deleted, and every other failure is logged.
    pub fn open_if_exists(
        database_path: impl AsRef<Path>,
        disposition: OpenDisposition,
    ) -> Option<Self> {
        let database_path = database_path.as_ref();

        if database_path.is_dir() {
            tracing::warn!(
                path = %database_path.display(),
                "pin store path is a directory; removing it"
            );
            if let Err(error) = fs::remove_dir_all(database_path) {
                tracing::warn!(
                    path = %database_path.display(),
                    error = %error,
                    "failed to remove directory at pin store path"
                );
            }
            return None;
        }

        if !database_path.exists() {
            tracing::debug!(path = %database_path.display(), "pin store does not exist");
            return None;
        }

        match Self::open(database_path, disposition) {
            Ok(store) => Some(store),
            Err(error) if error.kind == CoreErrorKind::Corrupt => {
                tracing::warn!(
                    path = %database_path.display(),
                    message = %error.message,
                    "pin store is corrupt; removing it"
                );
                if let Err(error) = fs::remove_file(database_path) {
                    tracing::warn!(
                        path = %database_path.display(),
                        error = %error,
                        "failed to remove corrupt pin store"
                    );
                }
                None
            }
            Err(error) => {
                tracing::warn!(
                    path = %database_path.display(),
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to open pin store"
                );
                None
            }
        }
    }

    /// Opens the store at `database_path`, creating it when no usable store
    /// exists. Returns `None` only if creation fails as well.
    pub fn open_or_create(
        database_path: impl AsRef<Path>,
        disposition: OpenDisposition,
    ) -> Option<Self> {
        let database_path = database_path.as_ref();
        if let Some(store) = Self::open_if_exists(database_path, disposition) {
            return Some(store);
        }

        let created = Self::create_new(database_path, None).and_then(|store| match disposition {
            OpenDisposition::ReadWrite => Ok(store),
            OpenDisposition::Read => {
                drop(store);
                Self::open(database_path, OpenDisposition::Read)
            }
        });

        match created {
            Ok(store) => Some(store),
            Err(error) => {
                tracing::warn!(
                    path = %database_path.display(),
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to create pin store"
                );
                None
            }
        }
    }

    /// [`Self::open_or_create`] at the configured default location.
    pub fn open_or_create_default(disposition: OpenDisposition) -> Option<Self> {
        Self::open_or_create(PinningConfig::from_env().store_path, disposition)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn disposition(&self) -> OpenDisposition {
        self.disposition
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.version
    }

    /// Time of the last committed change, for callers deciding whether cached
    /// pin data is stale.
    pub fn last_write_time(&self) -> PersistenceResult<SystemTime> {
        let raw = self.with_read("last_write_time", |connection| {
            read_metadata(connection, LAST_WRITE_TIME_KEY)
        })?;
        let raw = raw.ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Corrupt,
                "pin store metadata has no last write time",
            )
        })?;
        let seconds = raw.parse::<u64>().map_err(|_| {
            CoreError::new(
                CoreErrorKind::Corrupt,
                format!("pin store last write time '{raw}' is not a unix timestamp"),
            )
        })?;
        Ok(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    fn lock_connection(&self, operation_name: &str) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("pin store '{operation_name}' failed: connection mutex poisoned"),
            )
        })
    }

    fn with_read<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let connection = self.lock_connection(operation_name)?;
        operation(&connection).map_err(|error| classify_error(operation_name, error))
    }

    /// Runs `operation` inside a savepoint. The savepoint only commits when the
    /// operation succeeds; the returned flag says whether the store changed and
    /// the last write time must move.
    fn with_write<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&Connection) -> PersistenceResult<(T, bool)>,
    ) -> PersistenceResult<T> {
        if self.disposition != OpenDisposition::ReadWrite {
            return Err(CoreError::new(
                CoreErrorKind::InvalidState,
                format!("pin store '{operation_name}' requires read-write access"),
            ));
        }

        let mut connection = self.lock_connection(operation_name)?;
        let savepoint = connection
            .savepoint()
            .map_err(|error| storage_error(operation_name, error))?;

        let (value, modified) = operation(&savepoint)?;
        if modified {
            write_last_write_time(&savepoint, SystemTime::now())
                .map_err(|error| storage_error(operation_name, error))?;
        }

        savepoint
            .commit()
            .map_err(|error| storage_error(operation_name, error))?;
        Ok(value)
    }
}

impl PinStore for SqlitePinStore {
    fn add_pin(&self, pin: &Pin) -> PersistenceResult<RowId> {
        self.with_write("add_pin", |connection| {
            match self
                .schema
                .add_pin(connection, pin)
                .map_err(|error| storage_error("add_pin", error))?
            {
                Some(row_id) => {
                    tracing::debug!(pin = %pin, row_id = row_id.0, "added pin");
                    Ok((row_id, true))
                }
                None => Err(CoreError::new(
                    CoreErrorKind::AlreadyExists,
                    format!("a pin already exists for '{}'", pin.key()),
                )),
            }
        })
    }

    fn update_pin(&self, pin: &Pin) -> PersistenceResult<PinUpdate> {
        self.with_write("update_pin", |connection| {
            match self
                .schema
                .update_pin(connection, pin)
                .map_err(|error| storage_error("update_pin", error))?
            {
                Some(update) => {
                    tracing::debug!(pin = %pin, changed = update.changed, "updated pin");
                    Ok((update, update.changed))
                }
                None => Err(not_found(pin.key())),
            }
        })
    }

    fn remove_pin(&self, key: &PinKey) -> PersistenceResult<()> {
        self.with_write("remove_pin", |connection| {
            let removed = self
                .schema
                .remove_pin(connection, key)
                .map_err(|error| storage_error("remove_pin", error))?;
            if !removed {
                return Err(not_found(key));
            }
            tracing::debug!(key = %key, "removed pin");
            Ok(((), true))
        })
    }

    fn get_pin(&self, key: &PinKey) -> PersistenceResult<Option<Pin>> {
        self.with_read("get_pin", |connection| self.schema.get_pin(connection, key))
    }

    fn get_all_pins(&self) -> PersistenceResult<Vec<Pin>> {
        self.with_read("get_all_pins", |connection| {
            self.schema.get_all_pins(connection)
        })
    }

    fn reset_all_pins(&self, source_id: &str) -> PersistenceResult<bool> {
        self.with_write("reset_all_pins", |connection| {
            let removed = self
                .schema
                .reset_all_pins(connection, source_id)
                .map_err(|error| storage_error("reset_all_pins", error))?;
            tracing::debug!(source_id, removed, "reset pins");
            Ok((removed, removed))
        })
    }
}

fn open_connection(
    operation: &str,
    database_path: &Path,
    flags: OpenFlags,
) -> PersistenceResult<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| {
            storage_error_text(
                operation,
                format!("failed to create '{}': {error}", parent.display()),
            )
        })?;
    }
    Connection::open_with_flags(database_path, flags)
        .map_err(|error| storage_error(operation, error))
}

fn initialize(
    connection: &mut Connection,
    schema: PinSchema,
    version: SchemaVersion,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(METADATA_TABLE_SQL)?;
    write_metadata(&transaction, MAJOR_VERSION_KEY, &version.major.to_string())?;
    write_metadata(&transaction, MINOR_VERSION_KEY, &version.minor.to_string())?;
    schema.create_tables(&transaction)?;
    write_last_write_time(&transaction, SystemTime::now())?;
    transaction.commit()
}

fn read_schema_version(connection: &Connection) -> PersistenceResult<SchemaVersion> {
    let has_metadata = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata'",
            [],
            |_| Ok(()),
        )
        .optional()
        .map_err(|error| classify_error("open", error))?
        .is_some();
    if !has_metadata {
        return Err(CoreError::new(
            CoreErrorKind::Corrupt,
            "pin store has no metadata table",
        ));
    }

    let major = read_version_part(connection, MAJOR_VERSION_KEY)?;
    let minor = read_version_part(connection, MINOR_VERSION_KEY)?;
    Ok(SchemaVersion::new(major, minor))
}

fn read_version_part(connection: &Connection, name: &str) -> PersistenceResult<u32> {
    let raw = read_metadata(connection, name)
        .map_err(|error| classify_error("open", error))?
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Corrupt,
                format!("pin store metadata is missing '{name}'"),
            )
        })?;
    raw.parse::<u32>().map_err(|_| {
        CoreError::new(
            CoreErrorKind::Corrupt,
            format!("pin store metadata '{name}' has invalid value '{raw}'"),
        )
    })
}

fn read_metadata(connection: &Connection, name: &str) -> rusqlite::Result<Option<String>> {
    connection
        .query_row(
            "SELECT value FROM metadata WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()
}

fn write_metadata(connection: &Connection, name: &str, value: &str) -> rusqlite::Result<()> {
    connection.execute(
        "
INSERT INTO metadata (name, value) VALUES (?1, ?2)
ON CONFLICT(name) DO UPDATE SET value = excluded.value
",
        params![name, value],
    )?;
    Ok(())
}

fn write_last_write_time(connection: &Connection, value: SystemTime) -> rusqlite::Result<()> {
    let seconds = value
        .duration_since(UNIX_EPOCH)
        .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?
        .as_secs();
    write_metadata(connection, LAST_WRITE_TIME_KEY, &seconds.to_string())
}

fn not_found(key: &PinKey) -> CoreError {
    CoreError::new(
        CoreErrorKind::NotFound,
        format!("no pin exists for '{key}'"),
    )
}

fn up_level_error(operation: &str, database_path: &Path, version: SchemaVersion) -> CoreError {
    CoreError::new(
        CoreErrorKind::UpLevelSchema,
        format!(
            "pin store '{operation}' failed: '{}' uses schema {version}, which this build cannot write (latest supported is {})",
            database_path.display(),
            SchemaVersion::LATEST
        ),
    )
}

fn classify_error(operation: &str, error: rusqlite::Error) -> CoreError {
    let corrupt = matches!(
        &error,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    );
    if corrupt {
        CoreError::new(
            CoreErrorKind::Corrupt,
            format!("pin store '{operation}' failed: {error}"),
        )
    } else {
        storage_error(operation, error)
    }
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("pin store '{operation}' failed: {}", message.as_ref()),
    )
}
