//! Ingest Agent - Splits, embeds and indexes source documents

use crate::{pdf, AgentError, Embedder, Result};
use medibot_core::{RecursiveSplitter, SourceDocument};
use medibot_db::store::DocumentRecord;
use medibot_db::VectorStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
    /// Set when the document had no extractable text
    pub skipped: bool,
}

/// Running totals over a batch of documents
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub reports: Vec<IngestReport>,
    pub failed: Vec<(String, String)>,
}

impl IngestSummary {
    pub fn record(&mut self, source: &str, outcome: Result<IngestReport>) {
        match outcome {
            Ok(report) => self.reports.push(report),
            Err(e) => self.failed.push((source.to_string(), e.to_string())),
        }
    }

    pub fn indexed(&self) -> usize {
        self.reports.iter().filter(|r| !r.skipped).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.skipped).count()
    }

    pub fn total_pages(&self) -> usize {
        self.reports.iter().map(|r| r.pages).sum()
    }

    pub fn total_chunks(&self) -> usize {
        self.reports.iter().map(|r| r.chunks).sum()
    }
}

/// The Ingest agent turns documents into indexed chunks
pub struct IngestAgent {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    splitter: RecursiveSplitter,
}

impl IngestAgent {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>, splitter: RecursiveSplitter) -> Self {
        Self {
            store,
            embedder,
            splitter,
        }
    }

    /// Split, embed and store a document, replacing any previous version
    #[instrument(skip(self, doc), fields(source = %doc.source))]
    pub async fn ingest_document(&self, doc: &SourceDocument) -> Result<IngestReport> {
        let pages = doc.pages.len();

        if doc.is_blank() {
            // A previously indexed version must not outlive its text
            warn!("No extractable text in {}, skipping", doc.source);
            self.store.remove_document(&doc.source).await?;
            return Ok(IngestReport {
                source: doc.source.clone(),
                pages,
                chunks: 0,
                skipped: true,
            });
        }

        let chunks = self.splitter.split_document(doc);
        debug!("Split {} pages into {} chunks", pages, chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AgentError::Processing(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<_> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.with_embedding(embedding))
            .collect();
        let count = chunks.len();

        let record = DocumentRecord::new(&doc.source, doc.display_name())
            .with_counts(pages as u32, count as u32);
        self.store
            .replace_document(self.embedder.embedding_model(), record, chunks)
            .await?;

        info!("Indexed {} ({} pages, {} chunks)", doc.source, pages, count);
        Ok(IngestReport {
            source: doc.source.clone(),
            pages,
            chunks: count,
            skipped: false,
        })
    }

    /// Extract a PDF and ingest it
    pub async fn ingest_pdf(&self, path: &Path) -> Result<IngestReport> {
        let doc = pdf::load_pdf(path).await?;
        self.ingest_document(&doc).await
    }
}
