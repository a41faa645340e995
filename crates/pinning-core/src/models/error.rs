use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    InvalidInput,
    AlreadyExists,
    NotFound,
    InvalidState,
    UpLevelSchema,
    Corrupt,
    StorageFailure,
    Internal,
}

impl CoreErrorKind {
    /// Kinds that callers are expected to branch on as ordinary control flow.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::InvalidInput | Self::AlreadyExists | Self::NotFound | Self::InvalidState
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind.is_structural()
    }
}
