//! Chunk types - embedded text spans stored in the vector index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// A span of document text with its vector embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (maps to SurrealDB record ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    /// The chunk text
    pub content: String,

    /// Path of the document this chunk came from
    pub source: String,

    /// Zero-based page number within the source
    pub page: u32,

    /// Position of the chunk within its document
    pub chunk_index: u32,

    /// Vector embedding
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// When this chunk was created
    #[serde(skip_serializing, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Create a chunk without an embedding
    pub fn new(content: impl Into<String>, source: impl Into<String>, page: u32) -> Self {
        Self {
            id: None,
            content: content.into(),
            source: source.into(),
            page,
            chunk_index: 0,
            embedding: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Builder pattern: set position within the document
    pub fn with_index(mut self, chunk_index: u32) -> Self {
        self.chunk_index = chunk_index;
        self
    }

    /// Builder pattern: set embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Check if chunk has an embedding
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: RecordId,
    pub content: String,
    pub source: String,
    pub page: u32,
    #[serde(default)]
    pub chunk_index: u32,
    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}
