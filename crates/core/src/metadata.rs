//! Article metadata location.
//!
//! Each field is described by an ordered list of [`Strategy`] values. The
//! strategies are tried in sequence and the first one producing non-empty
//! text wins; when all of them miss, the field falls back to its placeholder
//! (title, author) or stays empty (date, summary). Supporting another site
//! layout means adding a strategy to the relevant list.

use crate::Document;
use crate::parse::Element;

/// Title used when no heading is found.
pub const UNTITLED: &str = "Untitled";

/// Author used when no byline is found.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Maximum summary length in characters, before the ellipsis.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// One way of reading a metadata field out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Visible text of the first element matching the selector.
    Text(&'static str),
    /// An attribute of the first element matching the selector.
    Attr(&'static str, &'static str),
}

/// Post title heading, then any first-level heading.
pub const TITLE_STRATEGIES: &[Strategy] = &[Strategy::Text("h1.post-title"), Strategy::Text("h1")];

/// Byline name, then author link.
pub const AUTHOR_STRATEGIES: &[Strategy] = &[Strategy::Text("span.byline-name"), Strategy::Text("a.author-name")];

/// Description meta tag, then Open Graph description.
pub const SUMMARY_STRATEGIES: &[Strategy] = &[
    Strategy::Attr("meta[name=\"description\"]", "content"),
    Strategy::Attr("meta[property=\"og:description\"]", "content"),
];

/// Content containers, tried in order.
pub const CONTENT_SELECTORS: &[&str] = &["div.available-content", "div.post-content", "article"];

/// Normalized metadata of one article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub published_at: Option<String>,
    pub published_display: Option<String>,
    pub summary: Option<String>,
}

impl Strategy {
    fn apply(&self, doc: &Document) -> Option<String> {
        match self {
            Strategy::Text(selector) => {
                let element = doc.select_first(selector).ok()??;
                non_empty(element.normalized_text())
            }
            Strategy::Attr(selector, attr) => {
                let element = doc.select_first(selector).ok()??;
                non_empty(element.attr(attr)?.trim().to_string())
            }
        }
    }
}

impl Document {
    /// Runs `strategies` in order and returns the first non-empty result.
    pub fn first_match(&self, strategies: &[Strategy]) -> Option<String> {
        strategies.iter().find_map(|strategy| strategy.apply(self))
    }

    /// Extract title: `h1.post-title` → first `h1` → "Untitled".
    pub fn extract_title(&self) -> String {
        self.first_match(TITLE_STRATEGIES).unwrap_or_else(|| UNTITLED.to_string())
    }

    /// Extract author: `span.byline-name` → `a.author-name` → "Unknown Author".
    pub fn extract_author(&self) -> String {
        self.first_match(AUTHOR_STRATEGIES).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
    }

    /// Extract the raw `datetime` attribute and the visible text of the first `<time>`.
    pub fn extract_date(&self) -> (Option<String>, Option<String>) {
        match self.select_first("time") {
            Ok(Some(time)) => {
                let raw = time.attr("datetime").and_then(|v| non_empty(v.trim().to_string()));
                (raw, non_empty(time.normalized_text()))
            }
            _ => (None, None),
        }
    }

    /// Locates the readable content region.
    ///
    /// Returns the first element matching [`CONTENT_SELECTORS`], in selector order.
    pub fn content_region(&self) -> Option<Element<'_>> {
        CONTENT_SELECTORS
            .iter()
            .find_map(|selector| self.select_first(selector).ok().flatten())
    }

    /// Extract summary: description meta → Open Graph description → first
    /// paragraph of `region`, truncated to [`SUMMARY_MAX_CHARS`].
    pub fn extract_summary(&self, region: Option<&Element<'_>>) -> Option<String> {
        let summary = self.first_match(SUMMARY_STRATEGIES).or_else(|| {
            region?
                .select("p")
                .ok()?
                .iter()
                .find_map(|p| non_empty(p.normalized_text()))
        })?;
        Some(truncate_summary(&summary))
    }

    /// Extract all metadata at once.
    pub fn extract_metadata(&self, region: Option<&Element<'_>>) -> Metadata {
        let (published_at, published_display) = self.extract_date();
        Metadata {
            title: self.extract_title(),
            author: self.extract_author(),
            published_at,
            published_display,
            summary: self.extract_summary(region),
        }
    }
}

/// Truncate to [`SUMMARY_MAX_CHARS`] characters, appending "..." iff the
/// input was longer.
pub fn truncate_summary(text: &str) -> String {
    if text.chars().count() > SUMMARY_MAX_CHARS {
        let head: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}
