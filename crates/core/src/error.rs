//! Error types for Anthology operations.
//!
//! This module defines the main error type [`AnthologyError`] which represents
//! every failure that can occur while fetching pages, locating article
//! content, and packaging the compiled document.
//!
//! Per-URL failures never leave the extractor as an `AnthologyError`; they are
//! folded into an [`ExtractionFailure`](crate::ExtractionFailure) carrying the
//! error's display text as its reason.
//!
//! # Example
//!
//! ```rust
//! use anthology_core::{AnthologyError, Result};
//!
//! fn require_articles(count: usize) -> Result<()> {
//!     if count == 0 {
//!         return Err(AnthologyError::NoArticles);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for extraction and compilation.
#[derive(Error, Debug)]
pub enum AnthologyError {
    /// HTTP request errors from reqwest.
    ///
    /// This variant wraps network errors, DNS failures, connection issues,
    /// and other HTTP-related problems.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when a page or image request exceeds its configured timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The server answered with a non-success status code.
    #[error("HTTP request returned status {status}")]
    HttpStatus { status: u16 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing errors, usually an invalid CSS selector.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// None of the recognized article containers exist on the page.
    ///
    /// This is the only markup condition that aborts an extraction; every
    /// other metadata field degrades to a placeholder.
    #[error("Could not find article content")]
    NoContent,

    /// The response carried no bytes.
    #[error("Response body was empty")]
    EmptyBody,

    /// `compile` was called on a compiler that has already been finalized.
    #[error("Document has already been compiled")]
    AlreadyCompiled,

    /// Every URL in the run failed, so there is nothing to compile.
    #[error("Failed to fetch any articles")]
    NoArticles,

    /// Errors from the zip container while assembling the EPUB.
    #[error("Failed to assemble package: {0}")]
    PackageError(#[from] zip::result::ZipError),

    /// File write errors.
    ///
    /// Wraps standard I/O errors for file operations.
    #[error("Failed to write to file: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Result type alias for AnthologyError.
pub type Result<T> = std::result::Result<T, AnthologyError>;
