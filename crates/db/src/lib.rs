//! Persistence layer for MediBot
//!
//! Provides the SurrealDB-backed vector store for embedded document chunks
//! and the JSON file store for per-profile chat histories.

pub mod error;
pub mod history;
pub mod schema;
pub mod store;

pub use error::{DbError, Result};
pub use history::HistoryStore;
pub use store::VectorStore;

use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;

/// Database connection type
pub type DbConnection = Surreal<Db>;

/// Initialize database with RocksDB (persistent)
#[cfg(feature = "rocksdb")]
pub async fn init_persistent(path: impl AsRef<std::path::Path>) -> Result<DbConnection> {
    use surrealdb::engine::local::RocksDb;

    let db = Surreal::new::<RocksDb>(path.as_ref()).await?;
    setup_database(&db).await?;
    Ok(db)
}

/// Initialize database in-memory (for testing)
pub async fn init_memory() -> Result<DbConnection> {
    let db = Surreal::new::<Mem>(()).await?;
    setup_database(&db).await?;
    Ok(db)
}

/// Setup database namespace, database, and schema
async fn setup_database(db: &DbConnection) -> Result<()> {
    db.use_ns("medibot").use_db("vectorstore").await?;
    schema::initialize_schema(db).await?;
    Ok(())
}
