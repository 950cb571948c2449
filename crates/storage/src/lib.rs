pub mod database;
pub mod error;
pub mod functions;
pub mod query;
pub mod schema;
pub mod traits;

pub use database::{Database, DatabaseConfig};
pub use error::StorageError;
pub use query::{InsertIdCallback, Query, RowCallback, Value};
pub use schema::{SCHEMA_VERSION, SchemaStatus};
pub use traits::Executor;
