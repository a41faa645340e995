use std::path::Path;

use crate::config::PinningConfig;
use crate::models::{CoreError, CoreErrorKind, Pin, PinKey};
use crate::persistence::{PersistenceResult, PinStore, PinUpdate, RowId};
use crate::sqlite::{OpenDisposition, SqlitePinStore};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RepositoryDisposition {
    ReadOnly,
    ReadWrite,
}

/// Entry point most callers use for pins.
///
/// Pinning is optional: when no store can be opened the repository is simply
/// disconnected. Reads then find nothing and writes fail with `InvalidState`.
pub struct PinRepository {
    store: Option<SqlitePinStore>,
}

impl PinRepository {
    /// Opens the repository at the configured default location.
    pub fn open(disposition: RepositoryDisposition) -> Self {
        Self::open_at(PinningConfig::from_env().store_path, disposition)
    }

    pub fn open_at(database_path: impl AsRef<Path>, disposition: RepositoryDisposition) -> Self {
        let store = match disposition {
            RepositoryDisposition::ReadOnly => {
                SqlitePinStore::open_if_exists(database_path, OpenDisposition::Read)
            }
            RepositoryDisposition::ReadWrite => {
                SqlitePinStore::open_or_create(database_path, OpenDisposition::ReadWrite)
            }
        };
        Self { store }
    }

    pub fn from_store(store: SqlitePinStore) -> Self {
        Self { store: Some(store) }
    }

    pub fn disconnected() -> Self {
        Self { store: None }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&SqlitePinStore> {
        self.store.as_ref()
    }

    fn connected_store(&self, operation_name: &str) -> PersistenceResult<&SqlitePinStore> {
        self.store.as_ref().ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::InvalidState,
                format!("pin repository '{operation_name}' failed: no pin store is connected"),
            )
        })
    }
}

impl PinStore for PinRepository {
    fn add_pin(&self, pin: &Pin) -> PersistenceResult<RowId> {
        self.connected_store("add_pin")?.add_pin(pin)
    }

    fn update_pin(&self, pin: &Pin) -> PersistenceResult<PinUpdate> {
        self.connected_store("update_pin")?.update_pin(pin)
    }

    fn remove_pin(&self, key: &PinKey) -> PersistenceResult<()> {
        self.connected_store("remove_pin")?.remove_pin(key)
    }

    fn get_pin(&self, key: &PinKey) -> PersistenceResult<Option<Pin>> {
        match &self.store {
            Some(store) => store.get_pin(key),
            None => Ok(None),
        }
    }

    fn get_all_pins(&self) -> PersistenceResult<Vec<Pin>> {
        match &self.store {
            Some(store) => store.get_all_pins(),
            None => Ok(Vec::new()),
        }
    }

    fn reset_all_pins(&self, source_id: &str) -> PersistenceResult<bool> {
        self.connected_store("reset_all_pins")?
            .reset_all_pins(source_id)
    }
}
