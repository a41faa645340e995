pub mod schema;
pub mod store;

pub use schema::{PinSchema, SchemaVersion};
pub use store::{OpenDisposition, SqlitePinStore};
