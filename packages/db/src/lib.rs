//! Persistence for sampling jobs, their items and presets.
//!
//! This crate provides database connectivity, SurrealDB repositories and an
//! in-memory backend, both exposed through the [`JobStore`] and
//! [`PresetStore`] traits.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod memory;
mod schema;
mod store;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use memory::MemoryStore;
pub use repositories::SurrealStore;
pub use schema::init_schema;
pub use store::{JobFilter, JobStore, PresetStore};

/// Connect with the given configuration and initialize the schema.
pub async fn init(config: &DbConfig) -> Result<Database, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}
