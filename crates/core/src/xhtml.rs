//! HTML fragment to XHTML conversion and markup escaping.
//!
//! EPUB content documents must be well-formed XML. Extracted bodies are
//! HTML, so before packaging they are re-parsed and written back out with
//! void elements self-closed and every text node and attribute escaped.

use scraper::{ElementRef, Html, Node};

/// Elements that never have content and must be written as `<tag/>`.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Escapes `&`, `<` and `>` for use in text content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text, false);
    out
}

/// Escapes text for a double-quoted attribute value.
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text, true);
    out
}

/// Converts an HTML fragment to well-formed XHTML.
///
/// Comments and processing instructions are dropped, as are attributes
/// whose names are not valid XML names. Attributes are written by local
/// name, so when two share one (`href` and `xlink:href`) only the first is
/// kept. Elements with such names are
/// replaced by their children.
pub fn to_xhtml(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let mut out = String::with_capacity(fragment.len() + fragment.len() / 8);
    write_children(html.root_element(), &mut out);
    out
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_element(child_element, out);
        } else if let Node::Text(text) = child.value() {
            push_escaped(out, text, false);
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let value = element.value();
    let name = value.name();
    if !is_xml_name(name) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    let mut written: Vec<&str> = Vec::new();
    for (attr, attr_value) in value.attrs() {
        if !is_xml_name(attr) || written.contains(&attr) {
            continue;
        }
        written.push(attr);
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        push_escaped(out, attr_value, true);
        out.push('"');
    }
    if name == "svg" && !value.attrs().any(|(attr, _)| attr == "xmlns") {
        out.push_str(" xmlns=\"");
        out.push_str(SVG_NAMESPACE);
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }

    out.push('>');
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
}

/// Element and attribute names without namespaces: a letter or `_`, then letters,
/// digits, `-`, `_` or `.`.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Characters allowed in an XML 1.0 document.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}
