//! Source documents - text extracted from files before chunking

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Text of a single page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    /// Zero-based page number, as reported by the extractor
    pub number: u32,
    pub text: String,
}

/// A document loaded from disk, split into pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path the document was loaded from
    pub source: String,
    pub pages: Vec<PageText>,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pages: Vec::new(),
        }
    }

    /// Builder: append a page
    pub fn with_page(mut self, number: u32, text: impl Into<String>) -> Self {
        self.pages.push(PageText {
            number,
            text: text.into(),
        });
        self
    }

    /// Build from per-page strings, numbering from zero
    pub fn from_pages(source: impl Into<String>, pages: Vec<String>) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageText {
                number: i as u32,
                text,
            })
            .collect();
        Self {
            source: source.into(),
            pages,
        }
    }

    /// File name component of the source path
    pub fn display_name(&self) -> String {
        display_name(&self.source)
    }

    /// True when no page carries any non-whitespace text
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

/// File name component of a source path, or the path itself
pub fn display_name(source: &str) -> String {
    Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
