use std::path::PathBuf;

use directories::ProjectDirs;

pub const STORE_PATH_ENV: &str = "PINNING_STORE_PATH";

const APP_DIR: &str = "pinning";
const STORE_FILE_NAME: &str = "pins.db";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinningConfig {
    pub store_path: PathBuf,
}

impl PinningConfig {
    /// Resolves the store location from `PINNING_STORE_PATH`, then the
    /// platform data directory (`$XDG_DATA_HOME/pinning` on Linux), then the
    /// temp directory.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var_os(STORE_PATH_ENV).map(PathBuf::from),
            ProjectDirs::from("", "", APP_DIR).map(|dirs| dirs.data_dir().to_path_buf()),
        )
    }

    pub fn with_store_path(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
        }
    }

    fn resolve(explicit: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        if let Some(path) = explicit.filter(|path| !path.as_os_str().is_empty()) {
            return Self::with_store_path(path);
        }

        let data_dir = data_dir.unwrap_or_else(|| std::env::temp_dir().join(APP_DIR));
        Self::with_store_path(data_dir.join(STORE_FILE_NAME))
    }
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
