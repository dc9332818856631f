//! Sanitization of a located content region.
//!
//! The region's outer HTML goes through three streaming passes:
//! [`strip_unwanted`] drops scripts, styles and page chrome,
//! [`image_sources`] lists the images to localize, and [`rewrite_images`]
//! points them at their downloaded copies. [`strip_residual`] is a final
//! pattern-based sweep over the serialized result.

use std::sync::LazyLock;

use regex::Regex;

use crate::images::PLACEHOLDER_ALT;

/// Elements removed together with their content.
const UNWANTED_TAGS: &[&str] = &["script", "style", "noscript"];

static CHROME_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(share|social|ad-|subscribe|footer)").unwrap());

static RESIDUAL_SCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").unwrap());

static RESIDUAL_STYLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style\s*>").unwrap());

/// What to do with one `img` element, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRewrite {
    /// Leave the element untouched.
    Keep,
    /// Point `src` at the embedded copy and fill in a missing `alt`.
    Localize(String),
    /// Replace `src` with its resolved absolute form.
    Absolute(String),
}

/// Removes `script`, `style` and `noscript` elements, and every element whose
/// class attribute contains a share/social/advertisement/subscribe/footer
/// marker. The first element of `html` is the region root and is never
/// removed for its class.
pub fn strip_unwanted(html: &str) -> String {
    let mut seen_root = false;
    run(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("*", |el| {
                let is_root = !seen_root;
                seen_root = true;

                let tag = el.tag_name();
                if UNWANTED_TAGS.contains(&tag.as_str()) {
                    el.remove();
                    return Ok(());
                }

                if !is_root
                    && let Some(class) = el.get_attribute("class")
                    && CHROME_CLASS.is_match(&class)
                {
                    el.remove();
                }

                Ok(())
            })],
            ..Default::default()
        },
    )
}

/// Lists the non-empty `src` attribute of every `img`, in document order,
/// with character references decoded.
pub fn image_sources(html: &str) -> Vec<String> {
    let mut sources = Vec::new();
    run(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src")
                    && !src.trim().is_empty()
                {
                    sources.push(decode_references(&src));
                }
                Ok(())
            })],
            ..Default::default()
        },
    );
    sources
}

/// Applies `rewrites` to the images listed by [`image_sources`] for the
/// same `html`, matched by position.
pub fn rewrite_images(html: &str, rewrites: &[ImageRewrite]) -> String {
    let mut index = 0usize;
    run(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img[src]", |el| {
                let has_src = el.get_attribute("src").is_some_and(|src| !src.trim().is_empty());
                if !has_src {
                    return Ok(());
                }

                match rewrites.get(index) {
                    Some(ImageRewrite::Localize(path)) => {
                        el.set_attribute("src", path).ok();
                        if !el.has_attribute("alt") {
                            el.set_attribute("alt", PLACEHOLDER_ALT).ok();
                        }
                    }
                    Some(ImageRewrite::Absolute(url)) => {
                        el.set_attribute("src", url).ok();
                    }
                    Some(ImageRewrite::Keep) | None => {}
                }
                index += 1;
                Ok(())
            })],
            ..Default::default()
        },
    )
}

/// Decodes the character references lol_html leaves in attribute values.
/// Unknown references are kept literally.
pub fn decode_references(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_reference(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Strips any `<script>` or `<style>` block left in serialized markup.
pub fn strip_residual(html: &str) -> String {
    let without_scripts = RESIDUAL_SCRIPT.replace_all(html, "");
    RESIDUAL_STYLE.replace_all(&without_scripts, "").into_owned()
}

/// Runs one lol_html pass, returning the input unchanged if the rewriter fails.
fn run(html: &str, settings: lol_html::Settings<'_, '_>) -> String {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = lol_html::HtmlRewriter::new(settings, |c: &[u8]| output.extend_from_slice(c));

    match rewriter.write(html.as_bytes()) {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    match rewriter.end() {
        Ok(_) => {}
        Err(_) => return html.to_string(),
    }

    String::from_utf8_lossy(&output).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_unwanted_tags() {
        let html = r#"<div class="available-content"><p>Keep</p><script>alert(1)</script><style>p{}</style><noscript>No JS</noscript></div>"#;
        let result = strip_unwanted(html);
        assert!(result.contains("<p>Keep</p>"));
        assert!(!result.contains("script"));
        assert!(!result.contains("style"));
        assert!(!result.contains("No JS"));
    }

    #[test]
    fn test_strip_chrome_classes() {
        let html = r#"<div class="post-content">
            <p>Body text</p>
            <div class="share-dialog"><a>Share</a></div>
            <div class="social-links">Follow</div>
            <div class="ad-banner">Buy</div>
            <div class="subscribe-widget">Subscribe now</div>
            <div class="post-footer">Footer</div>
            <div class="shadow">Shadowed but kept</div>
        </div>"#;
        let result = strip_unwanted(html);
        assert!(result.contains("Body text"));
        assert!(result.contains("Shadowed but kept"));
        for gone in ["Share", "Follow", "Buy", "Subscribe now", "Footer"] {
            assert!(!result.contains(gone), "{gone} should be removed");
        }
    }

    #[test]
    fn test_chrome_match_is_case_sensitive() {
        let html = r#"<article><div class="ShareBox">Kept</div></article>"#;
        assert!(strip_unwanted(html).contains("Kept"));
    }

    #[test]
    fn test_root_is_never_removed() {
        let html = r#"<div class="post-content footer-aware"><p>Body</p></div>"#;
        let result = strip_unwanted(html);
        assert!(result.contains("<p>Body</p>"));
    }

    #[test]
    fn test_image_sources() {
        let html = r#"<div><img src="a.png"><img src=""><img alt="none"><img src="//cdn/b.jpg"></div>"#;
        assert_eq!(image_sources(html), vec!["a.png".to_string(), "//cdn/b.jpg".to_string()]);
    }

    #[test]
    fn test_image_sources_decode_references() {
        let html = r#"<p><img src="https://x.com/p?a=1&amp;b=2"><img src="/q?x=&#49;&#x32;&amp"></p>"#;
        assert_eq!(image_sources(html), vec!["https://x.com/p?a=1&b=2".to_string(), "/q?x=12&amp".to_string()]);
    }

    #[test]
    fn test_decode_references_keeps_unknown() {
        assert_eq!(decode_references("a&copy;b&bogus;&lt;"), "a&copy;b&bogus;<");
        assert_eq!(decode_references("&#xZZ; & plain"), "&#xZZ; & plain");
        assert_eq!(decode_references("no refs"), "no refs");
    }

    #[test]
    fn test_rewrite_images_by_position() {
        let html = r#"<div><img src="a.png"><img src=""><img src="b.png" alt="B"><img src="c.png"></div>"#;
        let rewrites = vec![
            ImageRewrite::Localize("images/img_0.png".to_string()),
            ImageRewrite::Localize("images/img_1.png".to_string()),
            ImageRewrite::Absolute("https://example.com/c.png".to_string()),
        ];
        let result = rewrite_images(html, &rewrites);
        assert!(result.contains(r#"<img src="images/img_0.png" alt="Image">"#));
        assert!(result.contains(r#"<img src="images/img_1.png" alt="B">"#));
        assert!(result.contains(r#"<img src="https://example.com/c.png">"#));
        assert!(result.contains(r#"<img src="">"#));
    }

    #[test]
    fn test_rewrite_images_keep() {
        let html = r#"<p><img src="data:image/gif;base64,R0lG"></p>"#;
        assert_eq!(rewrite_images(html, &[ImageRewrite::Keep]), html);
    }

    #[test]
    fn test_strip_residual() {
        let html = "<p>a</p><SCRIPT type=\"x\">\nbad()\n</SCRIPT><p>b</p><style>\n.x{}\n</style >";
        assert_eq!(strip_residual(html), "<p>a</p><p>b</p>");
    }
}
