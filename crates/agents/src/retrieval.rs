//! Retrieval Agent - Finds supporting passages in the vector store

use crate::{Embedder, Result};
use medibot_core::{document::display_name, ScoredChunk};
use medibot_db::VectorStore;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Passages retrieved per question
pub const DEFAULT_TOP_K: usize = 3;

/// The Retrieval agent embeds a question and looks up nearby chunks
#[derive(Clone)]
pub struct RetrievalAgent {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl RetrievalAgent {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            k: DEFAULT_TOP_K,
        }
    }

    /// Builder: number of passages to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.k
    }

    /// Top-k chunks for `query`
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let Some(meta) = self.store.index_meta().await? else {
            debug!("Index is empty, nothing to retrieve");
            return Ok(Vec::new());
        };

        if meta.embedding_model != self.embedder.embedding_model() {
            warn!(
                "Index was built with {} but queries use {}; results may be poor",
                meta.embedding_model,
                self.embedder.embedding_model()
            );
        }

        let embedding = self.embedder.embed_query(query).await?;
        let results = self.store.similarity_search(embedding, self.k).await?;

        debug!("Retrieved {} passages", results.len());
        Ok(results)
    }

    /// Short bullet summary of the top passages; `None` when nothing matched
    pub async fn digest(&self, query: &str) -> Result<Option<RagDigest>> {
        let hits = self.retrieve(query).await?;
        Ok(RagDigest::from_hits(&hits))
    }
}

/// Bullet snippets plus the pages they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagDigest {
    pub bullets: Vec<String>,
    /// Display name of each source with its sorted 1-based pages
    pub sources: Vec<(String, Vec<u32>)>,
}

impl RagDigest {
    pub fn from_hits(hits: &[ScoredChunk]) -> Option<Self> {
        if hits.is_empty() {
            return None;
        }

        let bullets = hits.iter().map(|hit| snippet(&hit.content)).collect();

        // Keyed by source path so two files with the same name stay apart
        let mut pages: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
        for hit in hits {
            pages.entry(&hit.source).or_default().insert(hit.page + 1);
        }

        let sources = pages
            .into_iter()
            .map(|(source, pages)| (display_name(source), pages.into_iter().collect()))
            .collect();

        Some(Self { bullets, sources })
    }

    /// `Sources: a.pdf (Page 3); b.pdf (Pages 1–4)`
    pub fn sources_line(&self) -> String {
        let parts: Vec<String> = self
            .sources
            .iter()
            .map(|(name, pages)| format!("{} ({})", name, page_range(pages)))
            .collect();
        format!("Sources: {}", parts.join("; "))
    }
}

impl fmt::Display for RagDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bullet) in self.bullets.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {}", bullet)?;
        }
        write!(f, "\n\n{}", self.sources_line())
    }
}

/// First two sentences of a passage on one line
fn snippet(content: &str) -> String {
    let text = content.trim().replace('\n', " ");
    let sentences: Vec<&str> = text.split(". ").collect();

    let mut snippet = sentences[..sentences.len().min(2)].join(". ");
    if sentences.len() > 1 && !snippet.ends_with('.') {
        snippet.push('.');
    }
    snippet
}

fn page_range(pages: &[u32]) -> String {
    match pages {
        [] => "Page N/A".to_string(),
        [only] => format!("Page {}", only),
        [first, .., last] => format!("Pages {}–{}", first, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medibot_core::Chunk;
    use medibot_db::init_memory;
    use surrealdb::RecordId;

    struct KeywordEmbedder;

    /// Two-dimensional embeddings: heart-ish text points one way, the rest the other
    fn embed(text: &str) -> Vec<f32> {
        if text.to_lowercase().contains("heart") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(embed(text))
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| embed(t)).collect())
        }

        fn embedding_model(&self) -> &str {
            "keyword"
        }
    }

    fn hit(content: &str, source: &str, page: u32) -> ScoredChunk {
        ScoredChunk {
            id: RecordId::from(("chunk", "x")),
            content: content.to_string(),
            source: source.to_string(),
            page,
            chunk_index: 0,
            score: 0.9,
        }
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("One sentence only"), "One sentence only");
        assert_eq!(
            snippet("  First line\nwraps. Second. Third. Fourth.  "),
            "First line wraps. Second."
        );
        // Already ends with a period
        assert_eq!(snippet("Alpha. Beta."), "Alpha. Beta.");
    }

    #[test]
    fn test_digest_rendering() {
        let hits = vec![
            hit("Anemia is common. It causes fatigue. More text.", "data/gale.pdf", 9),
            hit("Iron helps", "data/gale.pdf", 2),
            hit("Folate too", "data/nutrition.pdf", 0),
        ];

        let digest = RagDigest::from_hits(&hits).unwrap();
        assert_eq!(
            digest.to_string(),
            "- Anemia is common. It causes fatigue.\n- Iron helps\n- Folate too\n\n\
             Sources: gale.pdf (Pages 3–10); nutrition.pdf (Page 1)"
        );
        assert!(RagDigest::from_hits(&[]).is_none());
    }

    #[tokio::test]
    async fn test_digest_from_store() {
        let store = VectorStore::new(init_memory().await.unwrap());
        let agent = RetrievalAgent::new(store.clone(), Arc::new(KeywordEmbedder)).with_top_k(1);
        assert_eq!(agent.top_k(), 1);

        // Empty index
        assert!(agent.digest("heart attack").await.unwrap().is_none());

        store
            .insert_chunks(
                "keyword",
                vec![
                    Chunk::new("The heart pumps blood", "data/gale.pdf", 4)
                        .with_embedding(vec![1.0, 0.0]),
                    Chunk::new("Kidneys filter blood", "data/gale.pdf", 7)
                        .with_embedding(vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = agent.retrieve("my heart hurts").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "The heart pumps blood");

        let digest = agent.digest("heart").await.unwrap().unwrap();
        assert_eq!(digest.sources, vec![("gale.pdf".to_string(), vec![5])]);
    }
}
