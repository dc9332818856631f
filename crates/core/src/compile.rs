//! Accumulates extracted articles and images and finalizes them into one EPUB.
//!
//! A [`Compiler`] is a single-use builder. Articles are appended in reading
//! order with [`Compiler::add_article`], images are embedded once per
//! relative path with [`Compiler::add_images`], and [`Compiler::compile`]
//! writes the document. A compiler can only be compiled once.

use std::collections::HashSet;
use std::path::Path;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::article::{Article, FetchOutcome};
use crate::dates::{display_date, long_timestamp, now};
use crate::epub::{Asset, ContentPage, NAV_ID, NavEntry, Package, PackageMetadata};
use crate::images::LocalizedImage;
use crate::xhtml::{escape_attr, escape_text, to_xhtml};
use crate::{AnthologyError, Result};

const TOC_ID: &str = "toc";
const TOC_FILE: &str = "toc.xhtml";
const TOC_TITLE: &str = "Table of Contents";

const STYLESHEET: &str = "\
body { font-family: Georgia, serif; margin: 2em; line-height: 1.6; }
h1 { color: #333; border-bottom: 2px solid #333; padding-bottom: 0.5em; }
h2, h3 { color: #555; }
p { margin-bottom: 1em; }
blockquote { font-style: italic; margin: 1em 2em; padding: 1em; background-color: #f5f5f5; }
hr { margin: 2em 0; border: none; border-top: 1px solid #ccc; }
img { max-width: 100%; height: auto; }
.toc-entry { margin-bottom: 1.5em; }
.toc-entry h2 { margin-bottom: 0.2em; }
.toc-entry a { text-decoration: none; }
";

/// Document-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookConfig {
    pub title: String,
    pub author: String,
    /// BCP 47 language tag.
    pub language: String,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self { title: "Substack Collection".to_string(), author: "Various".to_string(), language: "en".to_string() }
    }
}

/// Builds an EPUB from extracted articles.
#[derive(Debug)]
pub struct Compiler {
    config: BookConfig,
    identifier: String,
    articles: Vec<Article>,
    assets: Vec<Asset>,
    embedded: HashSet<String>,
    asset_ids: HashSet<String>,
    generated_at: Option<OffsetDateTime>,
    finalized: bool,
}

impl Compiler {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self::with_config(BookConfig { title: title.into(), author: author.into(), ..Default::default() })
    }

    pub fn with_config(config: BookConfig) -> Self {
        Self {
            config,
            identifier: format!("anthology-{}", Uuid::new_v4()),
            articles: Vec::new(),
            assets: Vec::new(),
            embedded: HashSet::new(),
            asset_ids: HashSet::new(),
            generated_at: None,
            finalized: false,
        }
    }

    /// Fixes the generation timestamp shown on the table of contents and
    /// recorded as the modification date. Defaults to the time of compilation.
    pub fn with_generated_at(mut self, at: OffsetDateTime) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn image_count(&self) -> usize {
        self.assets.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Appends a successfully extracted article as the next chapter.
    ///
    /// Returns `false` without changing anything for a failure or once the
    /// compiler has been finalized.
    pub fn add_article(&mut self, outcome: FetchOutcome) -> bool {
        if self.finalized {
            return false;
        }
        match outcome {
            Ok(article) => {
                debug!(title = %article.title, chapter = self.articles.len() + 1, "Added article");
                self.articles.push(article);
                true
            }
            Err(failure) => {
                debug!(url = %failure.source_url, "Skipped failed article");
                false
            }
        }
    }

    /// Embeds every image whose relative path is not embedded yet.
    ///
    /// Returns the number of newly embedded images.
    pub fn add_images(&mut self, images: impl IntoIterator<Item = LocalizedImage>) -> usize {
        if self.finalized {
            return 0;
        }

        let mut added = 0;
        for image in images {
            if !self.embedded.insert(image.relative_path.clone()) {
                continue;
            }
            let id = self.unique_asset_id(&image.id);
            self.assets.push(Asset {
                id,
                file_name: image.relative_path,
                media_type: image.media_type,
                data: image.bytes,
            });
            added += 1;
        }
        if added > 0 {
            debug!(added, total = self.assets.len(), "Embedded images");
        }
        added
    }

    /// Writes the document to `path`.
    ///
    /// Fails with [`AnthologyError::AlreadyCompiled`] on any call after the
    /// first, without touching the filesystem.
    pub fn compile(&mut self, path: &Path) -> Result<()> {
        if self.finalized {
            return Err(AnthologyError::AlreadyCompiled);
        }
        self.finalized = true;

        let package = self.package(self.generated_at.unwrap_or_else(now));
        package.write_file(path)?;

        info!(
            path = %path.display(),
            articles = self.articles.len(),
            images = self.assets.len(),
            "Compiled document"
        );
        Ok(())
    }

    fn unique_asset_id(&mut self, id: &str) -> String {
        let mut candidate = id.to_string();
        let mut suffix = 1;
        while self.asset_ids.contains(&candidate) {
            candidate = format!("{}_{}", id, suffix);
            suffix += 1;
        }
        self.asset_ids.insert(candidate.clone());
        candidate
    }

    /// Assembles the package: navigation first, then the table of contents
    /// (only when there are articles), then one chapter per article.
    fn package(&self, generated_at: OffsetDateTime) -> Package {
        let mut pages = Vec::with_capacity(self.articles.len() + 1);
        let mut nav = Vec::with_capacity(self.articles.len() + 1);
        let mut spine = vec![NAV_ID.to_string()];

        if !self.articles.is_empty() {
            pages.push(ContentPage {
                id: TOC_ID.to_string(),
                file_name: TOC_FILE.to_string(),
                title: TOC_TITLE.to_string(),
                body: self.toc_body(generated_at),
            });
            nav.push(NavEntry { title: TOC_TITLE.to_string(), href: TOC_FILE.to_string() });
            spine.push(TOC_ID.to_string());
        }

        for (index, article) in self.articles.iter().enumerate() {
            let id = chapter_id(index);
            let file_name = format!("{}.xhtml", id);
            nav.push(NavEntry { title: article.title.clone(), href: file_name.clone() });
            spine.push(id.clone());
            pages.push(ContentPage { id, file_name, title: article.title.clone(), body: chapter_body(article) });
        }

        debug!(pages = pages.len(), "Assembled package");

        Package {
            metadata: PackageMetadata {
                identifier: self.identifier.clone(),
                title: self.config.title.clone(),
                language: self.config.language.clone(),
                author: self.config.author.clone(),
                modified: generated_at,
            },
            pages,
            assets: self.assets.clone(),
            nav,
            stylesheet: STYLESHEET.to_string(),
            spine,
        }
    }

    fn toc_body(&self, generated_at: OffsetDateTime) -> String {
        let count = self.articles.len();
        let noun = if count == 1 { "article" } else { "articles" };

        let mut body = format!(
            "<h1>{}</h1>\n<p><small>{} {} compiled on {}</small></p>\n<hr/>\n",
            escape_text(&self.config.title),
            count,
            noun,
            escape_text(&long_timestamp(generated_at))
        );

        for (index, article) in self.articles.iter().enumerate() {
            body.push_str("<div class=\"toc-entry\">\n");
            body.push_str(&format!(
                "<h2><a href=\"{}.xhtml\">{}</a></h2>\n",
                chapter_id(index),
                escape_text(&article.title)
            ));
            body.push_str(&format!("<p><em>By {}</em></p>\n", escape_text(&article.author)));
            if let Some(date) = display_date(article) {
                body.push_str(&format!("<p><small>{}</small></p>\n", escape_text(&date)));
            }
            if let Some(summary) = &article.summary {
                body.push_str(&format!("<p>{}</p>\n", escape_text(summary)));
            }
            body.push_str("</div>\n");
        }
        body
    }
}

fn chapter_id(index: usize) -> String {
    format!("chapter_{}", index + 1)
}

fn chapter_body(article: &Article) -> String {
    let mut body = format!(
        "<h1>{}</h1>\n<p><em>By {}</em></p>\n",
        escape_text(&article.title),
        escape_text(&article.author)
    );
    if let Some(date) = display_date(article) {
        body.push_str(&format!("<p><small>{}</small></p>\n", escape_text(&date)));
    }
    body.push_str("<hr/>\n");
    body.push_str(&to_xhtml(&article.body));
    body.push_str(&format!(
        "\n<hr/>\n<p><small>Source: <a href=\"{}\">{}</a></small></p>",
        escape_attr(&article.source_url),
        escape_text(&article.source_url)
    ));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ExtractionFailure;
    use std::io::Read;
    use time::macros::datetime;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            author: "Jane Doe".to_string(),
            published_at: Some("2024-01-15T10:30:00Z".to_string()),
            published_display: None,
            summary: Some("A short summary".to_string()),
            body: "<p>Body<br>text</p>".to_string(),
            source_url: "https://example.substack.com/p/post?a=1&b=2".to_string(),
        }
    }

    fn image(id: &str, path: &str) -> LocalizedImage {
        LocalizedImage {
            id: id.to_string(),
            relative_path: path.to_string(),
            bytes: vec![1, 2, 3],
            media_type: "image/png".to_string(),
        }
    }

    fn page<'a>(package: &'a Package, id: &str) -> &'a ContentPage {
        package.pages.iter().find(|p| p.id == id).unwrap()
    }

    const GENERATED: OffsetDateTime = datetime!(2024-01-15 15:04 UTC);

    #[test]
    fn test_defaults() {
        let compiler = Compiler::with_config(BookConfig::default());
        assert_eq!(compiler.config().title, "Substack Collection");
        assert_eq!(compiler.config().author, "Various");
        assert_eq!(compiler.config().language, "en");
        assert!(compiler.identifier().starts_with("anthology-"));
    }

    #[test]
    fn test_add_article_rejects_failures() {
        let mut compiler = Compiler::new("Book", "Me");
        assert!(compiler.add_article(Ok(article("One"))));
        assert!(!compiler.add_article(Err(ExtractionFailure::new("https://x.com", "HTTP request returned status 404"))));
        assert_eq!(compiler.articles().len(), 1);
    }

    #[test]
    fn test_add_images_is_idempotent() {
        let mut compiler = Compiler::new("Book", "Me");
        let images = vec![image("img_0", "images/img_0.png"), image("img_1", "images/img_1.png")];

        assert_eq!(compiler.add_images(images.clone()), 2);
        assert_eq!(compiler.add_images(images), 0);
        assert_eq!(compiler.image_count(), 2);
    }

    #[test]
    fn test_colliding_image_ids_are_suffixed() {
        let mut compiler = Compiler::new("Book", "Me");
        compiler.add_images(vec![image("img_0", "images/img_0.png"), image("img_0", "images/img_0.jpg")]);

        let package = compiler.package(GENERATED);
        let ids: Vec<&str> = package.assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["img_0", "img_0_1"]);
    }

    #[test]
    fn test_spine_order() {
        let mut compiler = Compiler::new("Book", "Me");
        compiler.add_article(Ok(article("One")));
        compiler.add_article(Ok(article("Two")));

        let package = compiler.package(GENERATED);
        assert_eq!(package.spine, vec!["nav", "toc", "chapter_1", "chapter_2"]);
        assert_eq!(package.nav[0].href, "toc.xhtml");
        assert_eq!(package.nav[2], NavEntry { title: "Two".to_string(), href: "chapter_2.xhtml".to_string() });
    }

    #[test]
    fn test_toc_entries_in_order() {
        let mut compiler = Compiler::new("Book", "Me");
        for title in ["First", "Second", "Third"] {
            compiler.add_article(Ok(article(title)));
        }

        let package = compiler.package(GENERATED);
        let toc = &page(&package, "toc").body;
        assert_eq!(toc.matches("class=\"toc-entry\"").count(), 3);
        assert!(toc.contains("3 articles compiled on January 15, 2024 at 3:04 PM"));

        let first = toc.find("chapter_1.xhtml\">First").unwrap();
        let second = toc.find("chapter_2.xhtml\">Second").unwrap();
        let third = toc.find("chapter_3.xhtml\">Third").unwrap();
        assert!(first < second && second < third);
        assert!(toc.contains("<p><small>January 15, 2024</small></p>"));
        assert!(toc.contains("<p>A short summary</p>"));
    }

    #[test]
    fn test_toc_escapes_once() {
        let mut compiler = Compiler::new("Book", "Me");
        let mut tricky = article("Cats <and> Dogs & more");
        tricky.author = "A & B".to_string();
        tricky.summary = Some("1 < 2".to_string());
        compiler.add_article(Ok(tricky));

        let package = compiler.package(GENERATED);
        let toc = &page(&package, "toc").body;
        assert!(toc.contains("Cats &lt;and&gt; Dogs &amp; more"));
        assert!(toc.contains("By A &amp; B"));
        assert!(toc.contains("<p>1 &lt; 2</p>"));
        assert!(!toc.contains("&amp;lt;"));
        assert!(!toc.contains("&amp;amp;"));
    }

    #[test]
    fn test_toc_omits_missing_fields() {
        let mut compiler = Compiler::new("Book", "Me");
        let mut bare = article("Bare");
        bare.published_at = None;
        bare.summary = None;
        compiler.add_article(Ok(bare));

        let package = compiler.package(GENERATED);
        let toc = &page(&package, "toc").body;
        assert!(toc.contains("1 article compiled"));
        assert!(!toc.contains("<p><small>January"));
        assert!(!toc.contains("A short summary"));
    }

    #[test]
    fn test_chapter_layout() {
        let mut compiler = Compiler::new("Book", "Me");
        compiler.add_article(Ok(article("One")));

        let package = compiler.package(GENERATED);
        let chapter = &page(&package, "chapter_1").body;
        assert!(chapter.starts_with("<h1>One</h1>\n<p><em>By Jane Doe</em></p>\n<p><small>January 15, 2024</small></p>\n<hr/>"));
        assert!(chapter.contains("<p>Body<br/>text</p>"));
        assert!(chapter.ends_with(
            "<p><small>Source: <a href=\"https://example.substack.com/p/post?a=1&amp;b=2\">https://example.substack.com/p/post?a=1&amp;b=2</a></small></p>"
        ));
    }

    #[test]
    fn test_zero_articles_is_nav_only() {
        let compiler = Compiler::new("Book", "Me");
        let package = compiler.package(GENERATED);
        assert_eq!(package.spine, vec!["nav"]);
        assert!(package.pages.is_empty());
        assert!(package.nav.is_empty());
    }

    #[test]
    fn test_compile_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut compiler = Compiler::new("Book", "Me").with_generated_at(GENERATED);
        compiler.add_article(Ok(article("One")));

        let first = dir.path().join("first.epub");
        compiler.compile(&first).unwrap();
        assert!(compiler.is_finalized());

        let second = dir.path().join("second.epub");
        assert!(matches!(compiler.compile(&second), Err(AnthologyError::AlreadyCompiled)));
        assert!(!second.exists());
        assert!(!compiler.add_article(Ok(article("Late"))));
        assert_eq!(compiler.add_images(vec![image("img_9", "images/img_9.png")]), 0);
    }

    #[test]
    fn test_compile_writes_readable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        let mut compiler = Compiler::new("Book", "Me").with_generated_at(GENERATED);
        compiler.add_article(Ok(article("One")));
        compiler.add_images(vec![image("img_0", "images/img_0.png")]);
        compiler.compile(&path).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut css = String::new();
        archive.by_name("EPUB/style/nav.css").unwrap().read_to_string(&mut css).unwrap();
        assert!(css.contains("font-family: Georgia, serif"));
        assert!(archive.by_name("EPUB/toc.xhtml").is_ok());
        assert!(archive.by_name("EPUB/chapter_1.xhtml").is_ok());
        assert!(archive.by_name("EPUB/images/img_0.png").is_ok());
    }
}
