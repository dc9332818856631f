//! EPUB 3 package writer.
//!
//! A [`Package`] is the fully assembled document: metadata, content pages,
//! binary assets, navigation entries, the stylesheet and the reading order.
//! Writing it produces a zip container laid out as
//!
//! ```text
//! mimetype                    (stored, first entry)
//! META-INF/container.xml
//! EPUB/content.opf            (metadata, manifest, spine)
//! EPUB/nav.xhtml              (EPUB 3 navigation document)
//! EPUB/toc.ncx                (EPUB 2 navigation fallback)
//! EPUB/style/nav.css
//! EPUB/<pages>
//! EPUB/<assets>
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::Result;
use crate::xhtml::{escape_attr, escape_text};

/// Directory inside the container holding every publication resource.
const CONTENT_DIR: &str = "EPUB";

/// Manifest id and file name of the navigation document.
pub const NAV_ID: &str = "nav";
pub const NAV_FILE: &str = "nav.xhtml";

/// Manifest id and file name of the shared stylesheet.
pub const STYLESHEET_ID: &str = "style_nav";
pub const STYLESHEET_FILE: &str = "style/nav.css";

const NCX_ID: &str = "ncx";
const NCX_FILE: &str = "toc.ncx";

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="EPUB/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// Document-level metadata.
#[derive(Debug, Clone)]
pub struct PackageMetadata {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub author: String,
    pub modified: OffsetDateTime,
}

/// One XHTML content document. `body` is the XHTML inside `<body>`.
#[derive(Debug, Clone)]
pub struct ContentPage {
    pub id: String,
    pub file_name: String,
    pub title: String,
    pub body: String,
}

/// A binary resource such as an image.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// An entry of the navigation document and NCX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub title: String,
    pub href: String,
}

/// A complete publication, ready to be written.
#[derive(Debug, Clone)]
pub struct Package {
    pub metadata: PackageMetadata,
    pub pages: Vec<ContentPage>,
    pub assets: Vec<Asset>,
    pub nav: Vec<NavEntry>,
    pub stylesheet: String,
    /// Manifest ids in reading order.
    pub spine: Vec<String>,
}

impl Package {
    /// Writes the container to `writer` and returns it.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut zip = ZipWriter::new(writer);

        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML.as_bytes())?;

        zip.start_file(content_path("content.opf"), deflated)?;
        zip.write_all(self.content_opf().as_bytes())?;

        zip.start_file(content_path(NAV_FILE), deflated)?;
        zip.write_all(self.nav_xhtml().as_bytes())?;

        zip.start_file(content_path(NCX_FILE), deflated)?;
        zip.write_all(self.toc_ncx().as_bytes())?;

        zip.start_file(content_path(STYLESHEET_FILE), deflated)?;
        zip.write_all(self.stylesheet.as_bytes())?;

        for page in &self.pages {
            zip.start_file(content_path(&page.file_name), deflated)?;
            zip.write_all(xhtml_document(&page.title, &self.metadata.language, &page.body).as_bytes())?;
        }

        for asset in &self.assets {
            zip.start_file(content_path(&asset.file_name), stored)?;
            zip.write_all(&asset.data)?;
        }

        Ok(zip.finish()?)
    }

    /// Writes the container to `path`.
    ///
    /// The bytes go to a sibling `.part` file that is renamed over `path`
    /// once complete, and removed if anything fails.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let partial = partial_path(path);
        let result = self.write_partial(&partial).and_then(|()| Ok(fs::rename(&partial, path)?));
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result
    }

    fn write_partial(&self, partial: &Path) -> Result<()> {
        let file = File::create(partial)?;
        let mut writer = self.write_to(BufWriter::new(file))?;
        writer.flush()?;
        Ok(())
    }

    fn content_opf(&self) -> String {
        let meta = &self.metadata;
        let modified = meta
            .modified
            .to_offset(UtcOffset::UTC)
            .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
            .unwrap_or_default();

        let mut manifest = String::new();
        manifest.push_str(&manifest_item(NAV_ID, NAV_FILE, "application/xhtml+xml", Some("nav")));
        manifest.push_str(&manifest_item(NCX_ID, NCX_FILE, "application/x-dtbncx+xml", None));
        manifest.push_str(&manifest_item(STYLESHEET_ID, STYLESHEET_FILE, "text/css", None));
        for page in &self.pages {
            manifest.push_str(&manifest_item(&page.id, &page.file_name, "application/xhtml+xml", None));
        }
        for asset in &self.assets {
            manifest.push_str(&manifest_item(&asset.id, &asset.file_name, &asset.media_type, None));
        }

        let spine: String = self
            .spine
            .iter()
            .map(|id| format!("    <itemref idref=\"{}\"/>\n", escape_attr(id)))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id" xml:lang="{lang}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">{identifier}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{lang}</dc:language>
    <dc:creator id="creator">{author}</dc:creator>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="{ncx}">
{spine}  </spine>
</package>
"#,
            lang = escape_attr(&meta.language),
            identifier = escape_text(&meta.identifier),
            title = escape_text(&meta.title),
            author = escape_text(&meta.author),
            modified = modified,
            manifest = manifest,
            ncx = NCX_ID,
            spine = spine,
        )
    }

    /// Navigation entries, or a single entry pointing at the navigation
    /// document itself when there are none (both formats require one).
    fn nav_entries(&self) -> Vec<NavEntry> {
        if self.nav.is_empty() {
            vec![NavEntry { title: self.metadata.title.clone(), href: NAV_FILE.to_string() }]
        } else {
            self.nav.clone()
        }
    }

    fn nav_xhtml(&self) -> String {
        let items: String = self
            .nav_entries()
            .iter()
            .map(|entry| {
                format!(
                    "      <li><a href=\"{}\">{}</a></li>\n",
                    escape_attr(&entry.href),
                    escape_text(&entry.title)
                )
            })
            .collect();

        let body = format!(
            "<nav epub:type=\"toc\" id=\"toc\">\n    <h1>{}</h1>\n    <ol>\n{}    </ol>\n  </nav>",
            escape_text(&self.metadata.title),
            items
        );
        xhtml_document(&self.metadata.title, &self.metadata.language, &body)
    }

    fn toc_ncx(&self) -> String {
        let points: String = self
            .nav_entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "    <navPoint id=\"navpoint-{n}\" playOrder=\"{n}\">\n      <navLabel><text>{}</text></navLabel>\n      <content src=\"{}\"/>\n    </navPoint>\n",
                    escape_text(&entry.title),
                    escape_attr(&entry.href),
                    n = i + 1,
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{uid}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
            uid = escape_attr(&self.metadata.identifier),
            title = escape_text(&self.metadata.title),
            points = points,
        )
    }
}

/// Wraps an XHTML body in a complete content document.
fn xhtml_document(title: &str, language: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
  {body}
</body>
</html>
"#,
        lang = escape_attr(language),
        title = escape_text(title),
        css = STYLESHEET_FILE,
        body = body,
    )
}

fn manifest_item(id: &str, href: &str, media_type: &str, properties: Option<&str>) -> String {
    let properties = properties.map(|p| format!(" properties=\"{}\"", p)).unwrap_or_default();
    format!(
        "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
        escape_attr(id),
        escape_attr(href),
        escape_attr(media_type),
        properties
    )
}

fn content_path(file_name: &str) -> String {
    format!("{}/{}", CONTENT_DIR, file_name)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use time::macros::datetime;
    use zip::ZipArchive;

    fn package() -> Package {
        Package {
            metadata: PackageMetadata {
                identifier: "anthology-test".to_string(),
                title: "Reading & Notes".to_string(),
                language: "en".to_string(),
                author: "Various".to_string(),
                modified: datetime!(2024-01-15 10:30 UTC),
            },
            pages: vec![ContentPage {
                id: "chapter_1".to_string(),
                file_name: "chapter_1.xhtml".to_string(),
                title: "One".to_string(),
                body: "<h1>One</h1><img src=\"images/img_0.png\" alt=\"Image\"/>".to_string(),
            }],
            assets: vec![Asset {
                id: "img_0".to_string(),
                file_name: "images/img_0.png".to_string(),
                media_type: "image/png".to_string(),
                data: vec![0x89, b'P', b'N', b'G'],
            }],
            nav: vec![NavEntry { title: "One".to_string(), href: "chapter_1.xhtml".to_string() }],
            stylesheet: "body { margin: 0; }".to_string(),
            spine: vec!["nav".to_string(), "chapter_1".to_string()],
        }
    }

    fn archive(package: &Package) -> ZipArchive<Cursor<Vec<u8>>> {
        let cursor = package.write_to(Cursor::new(Vec::new())).unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut content = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let mut archive = archive(&package());
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
        drop(first);
        assert_eq!(read(&mut archive, "mimetype"), "application/epub+zip");
    }

    #[test]
    fn test_layout() {
        let archive = archive(&package());
        let names: Vec<&str> = archive.file_names().collect();
        for expected in [
            "META-INF/container.xml",
            "EPUB/content.opf",
            "EPUB/nav.xhtml",
            "EPUB/toc.ncx",
            "EPUB/style/nav.css",
            "EPUB/chapter_1.xhtml",
            "EPUB/images/img_0.png",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_content_opf() {
        let mut archive = archive(&package());
        let opf = read(&mut archive, "EPUB/content.opf");

        assert!(opf.contains("<dc:title>Reading &amp; Notes</dc:title>"));
        assert!(opf.contains("<dc:identifier id=\"id\">anthology-test</dc:identifier>"));
        assert!(opf.contains("<meta property=\"dcterms:modified\">2024-01-15T10:30:00Z</meta>"));
        assert!(opf.contains(r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#));
        assert!(opf.contains(r#"<item id="img_0" href="images/img_0.png" media-type="image/png"/>"#));

        let nav = opf.find(r#"<itemref idref="nav"/>"#).unwrap();
        let chapter = opf.find(r#"<itemref idref="chapter_1"/>"#).unwrap();
        assert!(nav < chapter);
    }

    #[test]
    fn test_pages_are_complete_documents() {
        let mut archive = archive(&package());
        let page = read(&mut archive, "EPUB/chapter_1.xhtml");
        assert!(page.starts_with("<?xml"));
        assert!(page.contains("<title>One</title>"));
        assert!(page.contains(r#"href="style/nav.css""#));
        assert!(page.contains(r#"<img src="images/img_0.png" alt="Image"/>"#));
    }

    #[test]
    fn test_empty_nav_points_at_itself() {
        let mut package = package();
        package.nav.clear();
        let mut archive = archive(&package);
        let nav = read(&mut archive, "EPUB/nav.xhtml");
        assert!(nav.contains(r#"<li><a href="nav.xhtml">Reading &amp; Notes</a></li>"#));
        let ncx = read(&mut archive, "EPUB/toc.ncx");
        assert!(ncx.contains(r#"<content src="nav.xhtml"/>"#));
    }

    #[test]
    fn test_write_file_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        package().write_file(&path).unwrap();

        assert!(path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_write_file_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("book.epub");
        assert!(package().write_file(&path).is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }
}
