//! SurrealDB schema definitions

use crate::{DbConnection, DbError, Result};
use tracing::info;

/// Initialize the database schema
///
/// Every statement is `IF NOT EXISTS`, so this runs on each open.
pub async fn initialize_schema(db: &DbConnection) -> Result<()> {
    info!("Initializing database schema...");

    db.query(SCHEMA_DEFINITION)
        .await?
        .check()
        .map_err(|e| DbError::SchemaInit(e.to_string()))?;

    info!("Schema initialized successfully");
    Ok(())
}

const SCHEMA_DEFINITION: &str = r#"
-- ============================================
-- TABLES
-- ============================================

-- Embedded document chunks
DEFINE TABLE IF NOT EXISTS chunk SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS content ON chunk TYPE string;
DEFINE FIELD IF NOT EXISTS source ON chunk TYPE string;
DEFINE FIELD IF NOT EXISTS page ON chunk TYPE int;
DEFINE FIELD IF NOT EXISTS chunk_index ON chunk TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS embedding ON chunk TYPE array<float>;
DEFINE FIELD IF NOT EXISTS created_at ON chunk TYPE datetime DEFAULT time::now();

-- Ingested source documents
DEFINE TABLE IF NOT EXISTS document SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS source ON document TYPE string;
DEFINE FIELD IF NOT EXISTS title ON document TYPE string;
DEFINE FIELD IF NOT EXISTS page_count ON document TYPE int;
DEFINE FIELD IF NOT EXISTS chunk_count ON document TYPE int;
DEFINE FIELD IF NOT EXISTS ingested_at ON document TYPE datetime DEFAULT time::now();

-- Embedding model the index was built with (single record index_meta:current)
DEFINE TABLE IF NOT EXISTS index_meta SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS embedding_model ON index_meta TYPE string;
DEFINE FIELD IF NOT EXISTS dimension ON index_meta TYPE int;

-- ============================================
-- INDEXES
-- ============================================

-- Chunk lookups by originating document (re-ingest replaces them)
DEFINE INDEX IF NOT EXISTS idx_chunk_source ON chunk FIELDS source;

-- One document record per source path
DEFINE INDEX IF NOT EXISTS idx_document_source ON document FIELDS source UNIQUE;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_memory;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = init_memory().await.expect("Failed to init db");

        // Verify tables exist by selecting from them
        let chunks: Vec<serde_json::Value> = db.select("chunk").await.unwrap();
        assert!(chunks.is_empty());

        let documents: Vec<serde_json::Value> = db.select("document").await.unwrap();
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = init_memory().await.expect("Failed to init db");
        initialize_schema(&db).await.expect("Second initialization failed");
    }
}
