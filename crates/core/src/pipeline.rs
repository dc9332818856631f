//! Runs a URL list through an extractor and a compiler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

use crate::article::ExtractionFailure;
use crate::compile::Compiler;
use crate::extract::Extractor;
use crate::fetch::Transport;
use crate::{AnthologyError, Result};

/// Pause between consecutive page fetches.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Where the document was written.
    pub output: PathBuf,
    /// Titles of the compiled articles, in reading order.
    pub articles: Vec<String>,
    pub failures: Vec<ExtractionFailure>,
    /// Number of embedded images.
    pub images: usize,
}

/// Splits text into URLs: one per line, trimmed, blank lines dropped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect()
}

/// `anthology_20240115_150405.epub`
pub fn default_output_name(now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("anthology_{}.epub", stamp)
}

/// Extracts every URL in order and compiles the successes into `output`.
///
/// URLs are fetched one at a time with `delay` between consecutive fetches.
/// Failed URLs are collected in the report. When no URL succeeds nothing is
/// written and [`AnthologyError::NoArticles`] is returned.
pub async fn build_book<T: Transport>(
    extractor: &mut Extractor<T>, compiler: &mut Compiler, urls: &[String], delay: Duration, output: &Path,
) -> Result<BuildReport> {
    let mut articles = Vec::new();
    let mut failures = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        debug!(url = %url, position = index + 1, total = urls.len(), "Fetching");
        match extractor.fetch(url).await {
            Ok(article) => {
                let title = article.title.clone();
                if compiler.add_article(Ok(article)) {
                    articles.push(title);
                } else {
                    failures.push(ExtractionFailure::new(url.as_str(), AnthologyError::AlreadyCompiled.to_string()));
                }
            }
            Err(failure) => failures.push(failure),
        }
    }

    if articles.is_empty() {
        warn!(failed = failures.len(), "No article could be extracted");
        return Err(AnthologyError::NoArticles);
    }

    compiler.add_images(extractor.take_images());
    compiler.compile(output)?;

    info!(articles = articles.len(), failed = failures.len(), output = %output.display(), "Build finished");
    Ok(BuildReport { output: output.to_path_buf(), articles, failures, images: compiler.image_count() })
}
