//! Extracted article record and its failure counterpart.
//!
//! An [`Article`] only exists for a page whose content region was found; it
//! carries no error state and is never mutated once built. A page that could
//! not be extracted yields an [`ExtractionFailure`] instead.

use serde::Serialize;
use thiserror::Error;

use crate::AnthologyError;
use crate::metadata::Metadata;

/// The normalized result of extracting one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    /// Never empty; "Untitled" when the page has no heading.
    pub title: String,

    /// "Unknown Author" when the page has no byline.
    pub author: String,

    /// Raw machine-readable timestamp, as published.
    pub published_at: Option<String>,

    /// Human-readable date text, as published.
    pub published_display: Option<String>,

    /// At most 200 characters plus a trailing "..." when cut.
    pub summary: Option<String>,

    /// Sanitized, self-contained HTML fragment.
    pub body: String,

    /// The page this article came from.
    pub source_url: String,
}

impl Article {
    /// Creates an Article from located metadata and a sanitized body.
    pub fn new(metadata: Metadata, body: String, source_url: String) -> Self {
        let Metadata { title, author, published_at, published_display, summary } = metadata;
        Self { title, author, published_at, published_display, summary, body, source_url }
    }
}

/// Why a URL produced no article.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{source_url}: {reason}")]
pub struct ExtractionFailure {
    pub source_url: String,
    pub reason: String,
}

impl ExtractionFailure {
    pub fn new(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { source_url: source_url.into(), reason: reason.into() }
    }

    /// Wraps an error, keeping its display text as the reason.
    pub fn from_error(source_url: impl Into<String>, err: &AnthologyError) -> Self {
        Self::new(source_url, err.to_string())
    }
}

/// What the extractor hands back for one URL.
pub type FetchOutcome = std::result::Result<Article, ExtractionFailure>;
