pub mod config;
pub mod evaluation;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod repository;
pub mod sqlite;

pub use evaluation::{LatestApplicableVersion, LatestApplicableVersionSelector, PinEvaluator};
pub use persistence::PinStore;
pub use repository::{PinRepository, RepositoryDisposition};
