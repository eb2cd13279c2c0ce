//! Vector store operations over the chunk and document tables

use crate::{DbConnection, DbError, Result};
use medibot_core::{Chunk, ScoredChunk};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Vector store for embedded document chunks
#[derive(Clone)]
pub struct VectorStore {
    db: DbConnection,
}

impl VectorStore {
    /// Create a new store over an initialized connection
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    // ==========================================
    // INDEX METADATA
    // ==========================================

    /// Embedding model and dimension the index was built with
    #[instrument(skip(self))]
    pub async fn index_meta(&self) -> Result<Option<IndexMeta>> {
        let meta: Option<IndexMeta> = self.db.select(("index_meta", "current")).await?;
        Ok(meta)
    }

    /// Validate that `chunks` can live in this index; returns their dimension
    pub async fn check_compatibility(&self, model: &str, chunks: &[Chunk]) -> Result<usize> {
        let dimension = uniform_dimension(chunks)?;

        if let Some(meta) = self.index_meta().await? {
            if meta.embedding_model != model {
                return Err(DbError::ModelMismatch {
                    stored: meta.embedding_model,
                    requested: model.to_string(),
                });
            }
            if meta.dimension != dimension {
                return Err(DbError::DimensionMismatch {
                    expected: meta.dimension,
                    actual: dimension,
                });
            }
        }

        Ok(dimension)
    }

    // ==========================================
    // CHUNK OPERATIONS
    // ==========================================

    /// Append embedded chunks to the index
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn insert_chunks(&self, model: &str, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let dimension = self.check_compatibility(model, &chunks).await?;
        let count = chunks.len();

        self.db
            .query("INSERT INTO chunk $chunks RETURN NONE")
            .query("UPSERT index_meta:current CONTENT $meta RETURN NONE")
            .bind(("chunks", chunks))
            .bind(("meta", IndexMeta::new(model, dimension)))
            .await?
            .check()?;

        debug!("Inserted {} chunks (dimension {})", count, dimension);
        Ok(count)
    }

    /// Replace everything stored for `document.source` in one transaction
    #[instrument(skip(self, document, chunks), fields(source = %document.source, count = chunks.len()))]
    pub async fn replace_document(
        &self,
        model: &str,
        document: DocumentRecord,
        chunks: Vec<Chunk>,
    ) -> Result<usize> {
        let source = document.source.clone();
        let count = chunks.len();

        if chunks.is_empty() {
            self.db
                .query(
                    r#"
                    BEGIN TRANSACTION;
                    DELETE chunk WHERE source = $source;
                    DELETE document WHERE source = $source;
                    CREATE document CONTENT $document RETURN NONE;
                    COMMIT TRANSACTION;
                "#,
                )
                .bind(("source", source))
                .bind(("document", document))
                .await?
                .check()?;
            return Ok(0);
        }

        let dimension = self.check_compatibility(model, &chunks).await?;

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE chunk WHERE source = $source;
                DELETE document WHERE source = $source;
                INSERT INTO chunk $chunks RETURN NONE;
                CREATE document CONTENT $document RETURN NONE;
                UPSERT index_meta:current CONTENT $meta RETURN NONE;
                COMMIT TRANSACTION;
            "#,
            )
            .bind(("source", source))
            .bind(("chunks", chunks))
            .bind(("document", document))
            .bind(("meta", IndexMeta::new(model, dimension)))
            .await?
            .check()?;

        Ok(count)
    }

    /// Remove a document and all of its chunks
    #[instrument(skip(self))]
    pub async fn remove_document(&self, source: &str) -> Result<()> {
        self.db
            .query("DELETE chunk WHERE source = $source")
            .query("DELETE document WHERE source = $source")
            .bind(("source", source.to_string()))
            .await?
            .check()?;
        Ok(())
    }

    /// All chunks of one document, in chunk order
    #[instrument(skip(self))]
    pub async fn chunks_for_source(&self, source: &str) -> Result<Vec<Chunk>> {
        let chunks: Vec<Chunk> = self
            .db
            .query(
                "SELECT id, content, source, page, chunk_index, embedding \
                 FROM chunk WHERE source = $source ORDER BY chunk_index ASC",
            )
            .bind(("source", source.to_string()))
            .await?
            .take(0)?;
        Ok(chunks)
    }

    // ==========================================
    // SEARCH OPERATIONS
    // ==========================================

    /// Top-`limit` chunks by cosine similarity to `embedding`
    #[instrument(skip(self, embedding))]
    pub async fn similarity_search(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        match self.index_meta().await? {
            None => {
                debug!("Similarity search on an empty index");
                return Ok(Vec::new());
            }
            Some(meta) if meta.dimension != embedding.len() => {
                return Err(DbError::DimensionMismatch {
                    expected: meta.dimension,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
        }

        let results: Vec<ScoredChunk> = self
            .db
            .query(
                r#"
                SELECT
                    id,
                    content,
                    source,
                    page,
                    chunk_index,
                    vector::similarity::cosine(embedding, $embedding) AS score
                FROM chunk
                ORDER BY score DESC
                LIMIT $limit
            "#,
            )
            .bind(("embedding", embedding))
            .bind(("limit", limit))
            .await?
            .take(0)?;

        Ok(results)
    }

    // ==========================================
    // DOCUMENTS & STATS
    // ==========================================

    /// List ingested documents ordered by source path
    #[instrument(skip(self))]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let documents: Vec<DocumentRecord> = self
            .db
            .query(
                r#"
                SELECT
                    source,
                    title,
                    page_count,
                    chunk_count,
                    <string> ingested_at AS ingested_at
                FROM document
                ORDER BY source ASC
            "#,
            )
            .await?
            .take(0)?;
        Ok(documents)
    }

    /// Get database statistics
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<StoreStats> {
        let counts: Option<StoreStats> = self
            .db
            .query(
                r#"
                RETURN {
                    chunk_count: (SELECT count() FROM chunk GROUP ALL)[0].count ?? 0,
                    document_count: (SELECT count() FROM document GROUP ALL)[0].count ?? 0
                }
            "#,
            )
            .await?
            .take(0)?;

        let mut stats = counts.ok_or_else(|| DbError::QueryFailed("stats".into()))?;
        if let Some(meta) = self.index_meta().await? {
            stats.embedding_model = Some(meta.embedding_model);
            stats.dimension = Some(meta.dimension);
        }
        Ok(stats)
    }

    /// Delete every chunk, document and the index metadata
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        warn!("Clearing vector store");
        self.db
            .query("DELETE chunk")
            .query("DELETE document")
            .query("DELETE index_meta")
            .await?
            .check()?;
        Ok(())
    }
}

/// Dimension shared by every chunk's embedding
fn uniform_dimension(chunks: &[Chunk]) -> Result<usize> {
    let mut dimension = None;

    for chunk in chunks {
        if !chunk.has_embedding() {
            return Err(DbError::MissingEmbedding(format!(
                "{} #{}",
                chunk.source, chunk.chunk_index
            )));
        }
        match dimension {
            None => dimension = Some(chunk.embedding.len()),
            Some(expected) if expected != chunk.embedding.len() => {
                return Err(DbError::DimensionMismatch {
                    expected,
                    actual: chunk.embedding.len(),
                });
            }
            Some(_) => {}
        }
    }

    dimension.ok_or_else(|| DbError::QueryFailed("no chunks to index".into()))
}

// ==========================================
// RESULT TYPES
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub dimension: usize,
}

impl IndexMeta {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            embedding_model: model.into(),
            dimension,
        }
    }
}

/// One ingested source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub source: String,
    pub title: String,
    pub page_count: u32,
    pub chunk_count: u32,
    /// Set by the database; read back as an RFC 3339 string
    #[serde(default, skip_serializing)]
    pub ingested_at: Option<String>,
}

impl DocumentRecord {
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            page_count: 0,
            chunk_count: 0,
            ingested_at: None,
        }
    }

    /// Builder: set page and chunk counts
    pub fn with_counts(mut self, page_count: u32, chunk_count: u32) -> Self {
        self.page_count = page_count;
        self.chunk_count = chunk_count;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreStats {
    #[serde(default)]
    pub chunk_count: i64,
    #[serde(default)]
    pub document_count: i64,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub dimension: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_memory;

    fn chunk(content: &str, embedding: Vec<f32>) -> Chunk {
        Chunk::new(content, "data/gale.pdf", 0).with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let store = VectorStore::new(init_memory().await.unwrap());

        let results = store.similarity_search(vec![1.0, 0.0], 3).await.unwrap();
        assert!(results.is_empty());
        assert!(store.index_meta().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_stats() {
        let store = VectorStore::new(init_memory().await.unwrap());

        let inserted = store
            .insert_chunks(
                "test-model",
                vec![chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.dimension, Some(2));
        assert_eq!(stats.embedding_model.as_deref(), Some("test-model"));
    }

    #[tokio::test]
    async fn test_rejects_mixed_dimensions() {
        let store = VectorStore::new(init_memory().await.unwrap());

        let err = store
            .insert_chunks(
                "test-model",
                vec![chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0, 0.0])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DimensionMismatch { expected: 2, actual: 3 }));

        let err = store
            .insert_chunks("test-model", vec![Chunk::new("bare", "x.pdf", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::MissingEmbedding(_)));
    }

    #[test]
    fn test_uniform_dimension_requires_chunks() {
        assert!(uniform_dimension(&[]).is_err());
    }
}
