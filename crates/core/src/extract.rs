//! Article extraction.
//!
//! [`Extractor::fetch`] turns one URL into an [`Article`] or an
//! [`ExtractionFailure`]:
//!
//! 1. fetch the page (bounded by [`FetchConfig::page_timeout`]);
//! 2. locate the content region and strip scripts, styles and page chrome
//!    from it;
//! 3. read the metadata, taking the fallback summary from the stripped region;
//! 4. download every image, rewriting its reference to the embedded copy;
//! 5. serialize and sweep residual script/style blocks.
//!
//! Only a failed page fetch or a missing content region fails the URL.
//! Image downloads that fail are logged and leave the resolved absolute
//! reference in place.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use url::Url;

use crate::article::{Article, ExtractionFailure, FetchOutcome};
use crate::fetch::{FetchConfig, FetchRequest, IMAGE_ACCEPT, PAGE_ACCEPT, Transport};
use crate::images::{self, ImageOutcome, LocalizedImage};
use crate::metadata::Metadata;
use crate::sanitize::{self, ImageRewrite};
use crate::{AnthologyError, Document, Result};

#[cfg(feature = "fetch")]
use crate::fetch::HttpTransport;

/// Fetches pages and localizes their images.
///
/// One extractor serves a whole run: image ids come from a counter that is
/// never reset, so ids and relative paths stay unique across every article
/// it extracts. An image URL is downloaded once per extractor; later
/// references to it reuse the first copy's path.
#[derive(Debug)]
pub struct Extractor<T> {
    transport: T,
    config: FetchConfig,
    images: Vec<LocalizedImage>,
    next_image_id: usize,
    localized: HashMap<Url, String>,
}

#[cfg(feature = "fetch")]
impl Extractor<HttpTransport> {
    /// Creates an extractor backed by a reqwest client.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

/// Metadata and region markup located in a page.
struct Located {
    metadata: Metadata,
    region: String,
}

impl<T: Transport> Extractor<T> {
    pub fn with_transport(transport: T, config: FetchConfig) -> Self {
        Self { transport, config, images: Vec::new(), next_image_id: 0, localized: HashMap::new() }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Images localized so far, in discovery order.
    pub fn images(&self) -> &[LocalizedImage] {
        &self.images
    }

    /// Hands over the images localized so far. Later ids keep counting
    /// from where the previous ones stopped.
    pub fn take_images(&mut self) -> Vec<LocalizedImage> {
        std::mem::take(&mut self.images)
    }

    /// Fetches and extracts one article.
    ///
    /// Never returns an error other than as an [`ExtractionFailure`].
    pub async fn fetch(&mut self, url: &str) -> FetchOutcome {
        match self.try_fetch(url).await {
            Ok(article) => {
                info!(url, title = %article.title, "extracted article");
                Ok(article)
            }
            Err(err) => {
                warn!(url, error = %err, "extraction failed");
                Err(ExtractionFailure::from_error(url, &err))
            }
        }
    }

    async fn try_fetch(&mut self, url: &str) -> Result<Article> {
        let page_url = Url::parse(url.trim()).map_err(|e| AnthologyError::InvalidUrl(format!("{}: {}", url, e)))?;

        let request = FetchRequest::new(page_url.clone(), self.config.page_timeout)
            .header("Accept", PAGE_ACCEPT)
            .header("Accept-Language", "en-US,en;q=0.9");
        let response = self.transport.get(request).await?;
        if !response.is_success() {
            return Err(AnthologyError::HttpStatus { status: response.status });
        }

        let Located { metadata, region } = locate(&response.text())?;
        debug!(url, region_len = region.len(), "located content region");

        let rewrites = self.localize_images(&region, &page_url).await;
        let body = sanitize::strip_residual(&sanitize::rewrite_images(&region, &rewrites));

        Ok(Article::new(metadata, body, url.to_string()))
    }

    /// Downloads every image in `html`, returning one rewrite per image.
    async fn localize_images(&mut self, html: &str, page_url: &Url) -> Vec<ImageRewrite> {
        let mut rewrites = Vec::new();
        for src in sanitize::image_sources(html) {
            if images::is_inline(&src) {
                rewrites.push(ImageRewrite::Keep);
                continue;
            }

            let Some(resolved) = images::resolve_src(&src, page_url) else {
                warn!(src = %src, "could not resolve image source");
                rewrites.push(ImageRewrite::Keep);
                continue;
            };

            if let Some(path) = self.localized.get(&resolved) {
                debug!(src = %resolved, path = %path, "reusing localized image");
                rewrites.push(ImageRewrite::Localize(path.clone()));
                continue;
            }

            match self.download_image(&resolved, page_url).await {
                ImageOutcome::Localized(image) => {
                    debug!(src = %resolved, path = %image.relative_path, "localized image");
                    rewrites.push(ImageRewrite::Localize(image.relative_path.clone()));
                    self.localized.insert(resolved, image.relative_path.clone());
                    self.images.push(image);
                }
                ImageOutcome::Skipped { src, reason } => {
                    warn!(src = %src, reason = %reason, "skipping image");
                    rewrites.push(ImageRewrite::Absolute(src));
                }
            }
        }
        rewrites
    }

    /// One image download attempt. Assigns an id only on success.
    async fn download_image(&mut self, src: &Url, page_url: &Url) -> ImageOutcome {
        let mut request = FetchRequest::new(src.clone(), self.config.image_timeout).header("Accept", IMAGE_ACCEPT);
        if self.config.send_referer {
            request = request.header("Referer", page_url.as_str());
        }

        let skipped = |reason: String| ImageOutcome::Skipped { src: src.to_string(), reason };

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(err) => return skipped(err.to_string()),
        };
        if !response.is_success() {
            return skipped(AnthologyError::HttpStatus { status: response.status }.to_string());
        }
        if response.body.is_empty() {
            return skipped(AnthologyError::EmptyBody.to_string());
        }

        let id = format!("img_{}", self.next_image_id);
        self.next_image_id += 1;

        let media_type = images::media_type_for(response.content_type(), src);
        let relative_path = format!("images/{}{}", id, images::extension_for(&media_type, src));

        ImageOutcome::Localized(LocalizedImage { id, relative_path, bytes: response.body, media_type })
    }
}

/// Parses a page and pulls out its metadata and the stripped content region.
fn locate(html: &str) -> Result<Located> {
    let doc = Document::parse(html)?;
    let region = doc.content_region().ok_or(AnthologyError::NoContent)?;
    let cleaned = sanitize::strip_unwanted(&region.outer_html());
    let cleaned_doc = Document::parse(&cleaned)?;
    let metadata = doc.extract_metadata(Some(&cleaned_doc.root()));
    Ok(Located { metadata, region: cleaned })
}
