//! Localized image assets.
//!
//! An image found in an article body is downloaded once and embedded in the
//! compiled document under `images/<id><ext>`. This module holds the asset
//! type and the rules for resolving sources and naming files; the download
//! itself is driven by the [`Extractor`](crate::Extractor).

use url::Url;

/// Media type used when neither the response nor the URL says otherwise.
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Alt text set on localized images that have none.
pub const PLACEHOLDER_ALT: &str = "Image";

/// One downloaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedImage {
    /// `img_<n>`, unique within one extractor.
    pub id: String,
    /// Path inside the package, e.g. `images/img_3.jpg`. Article bodies
    /// reference the image by exactly this string.
    pub relative_path: String,
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// The result of one image download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Localized(LocalizedImage),
    Skipped { src: String, reason: String },
}

/// Resolves an `img` source against the page URL.
///
/// Protocol-relative sources get an `https:` scheme; everything else is
/// joined onto `base`. Returns `None` when the source cannot be resolved.
pub fn resolve_src(src: &str, base: &Url) -> Option<Url> {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        return Url::parse(&format!("https://{}", rest)).ok();
    }
    base.join(src).ok()
}

/// Whether a source already embeds its bytes and needs no download.
pub fn is_inline(src: &str) -> bool {
    src.trim_start().get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Picks the media type: an `image/*` content type, else a guess from the
/// URL's extension, else [`DEFAULT_MEDIA_TYPE`].
pub fn media_type_for(content_type: Option<&str>, url: &Url) -> String {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"));

    declared
        .or_else(|| url_extension(url).and_then(|ext| media_type_from_extension(&ext)).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string())
}

/// Picks the file extension (with the leading dot): from the media type when
/// it is a known image type, else from the URL path, else `.jpg`.
pub fn extension_for(media_type: &str, url: &Url) -> String {
    let known = match media_type {
        mt if mt.contains("jpeg") || mt.contains("jpg") => Some(".jpg"),
        mt if mt.contains("png") => Some(".png"),
        mt if mt.contains("gif") => Some(".gif"),
        mt if mt.contains("webp") => Some(".webp"),
        mt if mt.contains("svg") => Some(".svg"),
        mt if mt.contains("avif") => Some(".avif"),
        _ => None,
    };

    known
        .map(str::to_string)
        .or_else(|| url_extension(url).map(|ext| format!(".{}", ext)))
        .unwrap_or_else(|| ".jpg".to_string())
}

/// Lowercased extension of the last path segment, if it looks like one.
fn url_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    let valid = !stem.is_empty() && !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

fn media_type_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}
