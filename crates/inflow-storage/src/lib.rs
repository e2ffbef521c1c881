// Event storage layer with sqlx
//
// This crate provides the `EventStore` trait consumed by the API and two
// engines behind it: the production-complete SQLite implementation and a
// DynamoDB skeleton kept for the managed deployment path.

pub mod dynamo;
pub mod error;
pub mod models;
pub mod sqlite;
pub mod store;

pub use dynamo::DynamoStore;
pub use error::{Result, StoreError};
pub use models::*;
pub use sqlite::SqliteStore;
pub use store::EventStore;
