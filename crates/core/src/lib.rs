//! Core domain types for MediBot
//!
//! This crate defines the fundamental data structures used throughout
//! the application: chat sessions, source documents, embedded chunks,
//! and the text splitter that turns the former into the latter.

pub mod chat;
pub mod chunk;
pub mod document;
pub mod error;
pub mod splitter;

pub use chat::{ChatHistory, ChatMessage, ChatSession, MessageRole};
pub use chunk::{Chunk, ScoredChunk};
pub use document::{PageText, SourceDocument};
pub use error::{CoreError, Result};
pub use splitter::{RecursiveSplitter, SplitterConfig};
