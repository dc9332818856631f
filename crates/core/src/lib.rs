pub mod article;
pub mod compile;
pub mod dates;
pub mod epub;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod images;
pub mod metadata;
pub mod parse;
pub mod pipeline;
pub mod sanitize;
pub mod xhtml;

pub use article::{Article, ExtractionFailure, FetchOutcome};
pub use compile::{BookConfig, Compiler};
pub use error::{AnthologyError, Result};
pub use extract::Extractor;
#[cfg(feature = "fetch")]
pub use fetch::HttpTransport;
pub use fetch::{FetchConfig, FetchRequest, HttpResponse, Transport};
pub use images::{ImageOutcome, LocalizedImage};
pub use metadata::Metadata;
pub use parse::Document;
pub use pipeline::{BuildReport, DEFAULT_DELAY, build_book, default_output_name, parse_url_list};
