//! PDF discovery and text extraction

use crate::{AgentError, Result};
use medibot_core::SourceDocument;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Expand a glob (or a directory) into the PDF files it names, sorted
///
/// A directory means every PDF below it, like `<dir>/**/*.pdf`.
pub fn resolve_pdf_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = if Path::new(pattern).is_dir() {
        format!("{}/**/*.pdf", pattern.trim_end_matches(['/', '\\']))
    } else {
        pattern.to_string()
    };

    let mut paths = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if is_pdf(&path) => paths.push(path),
            Ok(path) => debug!("Skipping non-PDF {}", path.display()),
            Err(e) => warn!("Unreadable path while expanding {}: {}", pattern, e),
        }
    }

    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn is_pdf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}

/// Extract the text of every page of a PDF
///
/// Extraction is CPU-bound and runs on the blocking pool. A panic inside
/// the extractor surfaces as `AgentError::Pdf` instead of taking the
/// runtime down.
#[instrument]
pub async fn load_pdf(path: &Path) -> Result<SourceDocument> {
    let owned = path.to_path_buf();
    let source = path.display().to_string();

    let pages = tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned))
        .await
        .map_err(|e| AgentError::Pdf {
            path: source.clone(),
            message: format!("extractor crashed: {}", e),
        })?
        .map_err(|e| AgentError::Pdf {
            path: source.clone(),
            message: e.to_string(),
        })?;

    debug!("Extracted {} pages from {}", pages.len(), source);
    Ok(SourceDocument::from_pages(source, pages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_directory_and_glob() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("cardiology");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(nested.join("a.PDF"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();

        let root = dir.path().to_str().unwrap();
        let from_dir = resolve_pdf_paths(root).unwrap();
        assert_eq!(from_dir, vec![dir.path().join("b.pdf")]);

        let from_glob = resolve_pdf_paths(&format!("{}/**/*", root)).unwrap();
        assert_eq!(from_glob, vec![dir.path().join("b.pdf"), nested.join("a.PDF")]);
    }

    #[test]
    fn test_resolve_no_matches() {
        let dir = tempdir().unwrap();
        let pattern = format!("{}/*.pdf", dir.path().display());
        assert!(resolve_pdf_paths(&pattern).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            resolve_pdf_paths("data/***/[.pdf"),
            Err(AgentError::Pattern(_))
        ));
    }

    #[tokio::test]
    async fn test_load_pdf_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = load_pdf(&path).await.unwrap_err();
        assert!(matches!(err, AgentError::Pdf { .. }));
    }
}
