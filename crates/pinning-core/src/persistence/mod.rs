use crate::models::{CoreError, Pin, PinKey};

pub type PersistenceResult<T> = Result<T, CoreError>;

/// Opaque identifier of a stored pin row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RowId(pub i64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PinUpdate {
    pub changed: bool,
    pub row_id: RowId,
}

/// Storage contract for pins, keyed by `(package_id, source_id)`.
///
/// `add_pin` fails with `AlreadyExists` when the key is present; `update_pin`
/// and `remove_pin` fail with `NotFound` when it is absent.
pub trait PinStore: Send + Sync {
    fn add_pin(&self, pin: &Pin) -> PersistenceResult<RowId>;

    fn update_pin(&self, pin: &Pin) -> PersistenceResult<PinUpdate>;

    fn remove_pin(&self, key: &PinKey) -> PersistenceResult<()>;

    fn get_pin(&self, key: &PinKey) -> PersistenceResult<Option<Pin>>;

    fn get_all_pins(&self) -> PersistenceResult<Vec<Pin>>;

    /// Removes every pin, or only those from `source_id` when it is non-empty.
    /// Returns whether anything was removed.
    fn reset_all_pins(&self, source_id: &str) -> PersistenceResult<bool>;

    /// Reads then writes without a transaction spanning both steps; callers
    /// sharing the store across processes must hold their own lock.
    fn add_or_update_pin(&self, pin: &Pin) -> PersistenceResult<()> {
        if self.get_pin(pin.key())?.is_some() {
            self.update_pin(pin)?;
        } else {
            self.add_pin(pin)?;
        }
        Ok(())
    }
}
