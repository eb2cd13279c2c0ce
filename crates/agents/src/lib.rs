//! AI Agents for MediBot
//!
//! This crate contains the model client and the agent implementations:
//! - Gemini: generation, streaming and embeddings over the REST API
//! - Ingest: turns PDFs into embedded chunks in the vector store
//! - Retrieval: finds supporting passages for a question
//! - Chat: answers questions within a conversation

pub mod chat;
pub mod error;
pub mod gemini;
pub mod ingest;
pub mod model;
pub mod pdf;
pub mod prompt;
pub mod retrieval;

pub use chat::{ChatAgent, ChatReply};
pub use error::{AgentError, Result};
pub use gemini::{GeminiClient, GeminiConfig};
pub use ingest::{IngestAgent, IngestReport, IngestSummary};
pub use model::{Embedder, LanguageModel};
pub use retrieval::{RagDigest, RetrievalAgent};
