//! HTTP transport for page and image fetches.
//!
//! The extractor talks to the network through the [`Transport`] trait so the
//! whole pipeline can be driven by an in-memory implementation in tests.
//! [`HttpTransport`] is the reqwest-backed implementation used in production.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use url::Url;

use crate::Result;

/// Accept header sent with page requests.
pub const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Accept header sent with image requests.
pub const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// How far into a body to look for a `<meta>` charset declaration.
const CHARSET_SNIFF_LEN: usize = 1024;

static META_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#).unwrap());

/// HTTP client configuration for fetching pages and images.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for the article page request.
    pub page_timeout: Duration,
    /// Timeout for each image request.
    pub image_timeout: Duration,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Whether image requests carry a `Referer` of the article page.
    pub send_referer: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)"
                .to_string(),
            send_referer: true,
        }
    }
}

/// A single GET request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self { url, timeout, headers: Vec::new() }
    }

    /// Adds a request header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Status, headers and raw body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded with the declared character encoding, replacing invalid
    /// sequences.
    ///
    /// The `charset` parameter of `Content-Type` wins, then a `<meta>`
    /// declaration near the top of the body, then UTF-8. A byte order mark
    /// overrides all three.
    pub fn text(&self) -> String {
        let encoding = self
            .content_type()
            .and_then(charset_param)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .or_else(|| sniff_meta_charset(&self.body))
            .unwrap_or(UTF_8);
        let (text, _, _) = encoding.decode(&self.body);
        text.into_owned()
    }
}

/// The `charset` parameter of a `Content-Type` value.
fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(CHARSET_SNIFF_LEN)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Performs HTTP GET requests.
///
/// A transport reports transport-level problems (connection failures,
/// timeouts) as errors and returns every completed response, whatever its
/// status; callers decide what a non-success status means.
pub trait Transport {
    fn get(&self, request: FetchRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// reqwest-backed [`Transport`].
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    /// Builds a client that identifies itself with `config.user_agent`.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "fetch")]
impl Transport for HttpTransport {
    async fn get(&self, request: FetchRequest) -> Result<HttpResponse> {
        use crate::AnthologyError;

        let timeout = request.timeout;
        let mut builder = self.client.get(request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                AnthologyError::Timeout { timeout: timeout.as_secs() }
            } else {
                AnthologyError::HttpError(e)
            }
        };

        let response = builder.send().await.map_err(to_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(to_error)?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}
