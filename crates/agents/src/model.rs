//! Seams between the agents and the hosted models

use crate::Result;
use async_trait::async_trait;

/// Text generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete reply for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate a reply, handing each text delta to `on_text` as it arrives
    ///
    /// Returns the full reply. Models without streaming emit it in one piece.
    async fn generate_stream(
        &self,
        prompt: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        let text = self.generate(prompt).await?;
        on_text(&text);
        Ok(text)
    }

    /// Model identifier, for logging
    fn name(&self) -> &str;
}

/// Text embeddings for retrieval
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed document passages, one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding model identifier; stored with the index
    fn embedding_model(&self) -> &str;
}
