//! HTML5-correct serializer for the arena tree.
//!
//! - Void elements never get end tags
//! - Text content is escaped (`&`, `<`, `>`)
//! - Attribute values are escaped and double-quoted, in source order
//! - Raw text elements (script, style, and the ones html5ever tokenizes as
//!   raw text with scripting enabled) are not escaped, but their end-tag
//!   sequence is neutralised so saved text can never close them early
//! - `plaintext` never ends, so it gets no end tag
//! - RCDATA elements (title, textarea) escape only `&` and `<`
//! - Foreign content (SVG/MathML) without children uses self-closing syntax
//!
//! The walk is iterative, so arbitrarily deep trees serialize without
//! recursion.

use indextree::{NodeEdge, NodeId};
use std::fmt::Write;

use crate::dom::{Document, ElementData, Namespace, NodeKind, Shape, is_void_element};

/// Raw text elements - content is not escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "xmp",
    "noembed",
    "noframes",
    "plaintext",
];

/// RCDATA elements - only `&` and `<` are escaped.
const RCDATA_ELEMENTS: &[&str] = &["title", "textarea"];

/// How text inside an element is written.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TextMode {
    Escaped,
    Rcdata,
    Raw,
}

fn text_mode(tag: &str, ns: Namespace) -> TextMode {
    if ns != Namespace::Html {
        TextMode::Escaped
    } else if RAW_TEXT_ELEMENTS.contains(&tag) {
        TextMode::Raw
    } else if RCDATA_ELEMENTS.contains(&tag) {
        TextMode::Rcdata
    } else {
        TextMode::Escaped
    }
}

/// Serialize a parsed document back to markup, preserving its shape.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    let mut ser = Serializer::new(&mut out, doc);
    if doc.shape == Shape::Document
        && let Some(doctype) = &doc.doctype
    {
        let _ = write!(ser.out, "<!DOCTYPE {}>", doctype);
    }
    for top in doc.top_level() {
        ser.write_subtree(top);
    }
    out
}

/// Serialize one node and its descendants (outer HTML).
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    Serializer::new(&mut out, doc).write_subtree(id);
    out
}

struct Serializer<'a, W: Write> {
    out: &'a mut W,
    doc: &'a Document,
}

impl<'a, W: Write> Serializer<'a, W> {
    fn new(out: &'a mut W, doc: &'a Document) -> Self {
        Self { out, doc }
    }

    fn write_subtree(&mut self, start: NodeId) {
        // Set while inside a void element, whose children are never written
        let mut skip_until: Option<NodeId> = None;

        for edge in start.traverse(&self.doc.arena) {
            match edge {
                NodeEdge::Start(id) => {
                    if skip_until.is_some() {
                        continue;
                    }
                    let node = self.doc.get(id);
                    match &node.kind {
                        NodeKind::Document => {}
                        NodeKind::Element(elem) => {
                            let has_children = id.children(&self.doc.arena).next().is_some();
                            if self.write_start_tag(elem, node.ns, has_children) {
                                skip_until = Some(id);
                            }
                        }
                        NodeKind::Text(text) => {
                            let mode = self.parent_text_mode(id);
                            match mode {
                                TextMode::Escaped => self.write_text_escaped(text),
                                TextMode::Rcdata => self.write_rcdata_escaped(text),
                                TextMode::Raw => {
                                    let tag = self.parent_tag(id).unwrap_or_default();
                                    self.write_raw_text(text, &tag);
                                }
                            }
                        }
                        NodeKind::Comment(text) => {
                            let _ = write!(self.out, "<!--{}-->", text);
                        }
                    }
                }
                NodeEdge::End(id) => {
                    if let Some(skip) = skip_until {
                        if skip == id {
                            skip_until = None;
                        }
                        continue;
                    }
                    let node = self.doc.get(id);
                    if let NodeKind::Element(elem) = &node.kind
                        && !(node.ns == Namespace::Html && &*elem.tag == "plaintext")
                    {
                        let _ = write!(self.out, "</{}>", elem.tag);
                    }
                }
            }
        }
    }

    /// Writes the opening tag. Returns true when the element is closed
    /// already (void or self-closing) and its subtree must be skipped.
    fn write_start_tag(&mut self, elem: &ElementData, ns: Namespace, has_children: bool) -> bool {
        let _ = write!(self.out, "<{}", elem.tag);
        for (name, value) in &elem.attrs {
            self.write_attr(name, value);
        }

        if ns == Namespace::Html && is_void_element(&elem.tag) {
            let _ = write!(self.out, ">");
            return true;
        }

        if ns != Namespace::Html && !has_children {
            let _ = write!(self.out, "/>");
            return true;
        }

        let _ = write!(self.out, ">");
        false
    }

    fn parent_tag(&self, id: NodeId) -> Option<String> {
        let parent = self.doc.arena[id].parent()?;
        self.doc.element(parent).map(|e| e.tag.to_string())
    }

    fn parent_text_mode(&self, id: NodeId) -> TextMode {
        self.doc.arena[id]
            .parent()
            .and_then(|parent| {
                let node = self.doc.get(parent);
                match &node.kind {
                    NodeKind::Element(elem) => Some(text_mode(&elem.tag, node.ns)),
                    _ => None,
                }
            })
            .unwrap_or(TextMode::Escaped)
    }

    /// Escape text content for normal HTML elements.
    fn write_text_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                _ => self.out.write_char(c),
            };
        }
    }

    /// Escape text content for RCDATA elements (only & and <).
    fn write_rcdata_escaped(&mut self, text: &str) {
        for c in text.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '<' => self.out.write_str("&lt;"),
                _ => self.out.write_char(c),
            };
        }
    }

    /// Write raw text content, neutralising `</tag` so the element cannot be
    /// closed from inside.
    fn write_raw_text(&mut self, text: &str, tag: &str) {
        if tag == "plaintext" {
            let _ = self.out.write_str(text);
            return;
        }
        let pattern = format!("</{tag}");
        let pattern = pattern.as_bytes();
        let bytes = text.as_bytes();
        let mut last_end = 0;
        let mut i = 0;

        // ASCII case-insensitive match on the original bytes keeps indices
        // aligned with char boundaries ('<' is ASCII)
        while i + pattern.len() <= bytes.len() {
            if bytes[i..i + pattern.len()].eq_ignore_ascii_case(pattern) {
                let _ = self.out.write_str(&text[last_end..i]);
                let _ = write!(self.out, "<\\/{}", &text[i + 2..i + pattern.len()]);
                last_end = i + pattern.len();
                i = last_end;
            } else {
                i += 1;
            }
        }
        let _ = self.out.write_str(&text[last_end..]);
    }

    /// Escape attribute value and write it double-quoted.
    fn write_attr(&mut self, name: &str, value: &str) {
        let _ = write!(self.out, " {}=\"", name);
        for c in value.chars() {
            let _ = match c {
                '&' => self.out.write_str("&amp;"),
                '"' => self.out.write_str("&quot;"),
                '<' => self.out.write_str("&lt;"),
                '>' => self.out.write_str("&gt;"),
                _ => self.out.write_char(c),
            };
        }
        let _ = self.out.write_str("\"");
    }
}

impl Document {
    /// Serialize with [`serialize`].
    pub fn to_html(&self) -> String {
        serialize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn fragment_roundtrip() {
        let html = r#"<p data-editable-id="editable-0">Old</p>"#;
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn document_roundtrip_keeps_doctype() {
        let html = "<!DOCTYPE html><html><head><title>T</title></head><body><p>x</p></body></html>";
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn second_pass_is_a_fixpoint() {
        let messy = "<!doctype html>\n<html>\n<head><title>T</title></head>\n<body class=x>\n<p>a<p>b\n</body>\n</html>\n";
        let once = Document::parse(messy).to_html();
        let twice = Document::parse(&once).to_html();
        assert_eq!(once, twice);
    }

    #[test]
    fn void_elements() {
        let out = Document::parse(r#"<div><br><img src="a.png"></div>"#).to_html();
        assert_eq!(out, r#"<div><br><img src="a.png"></div>"#);
    }

    #[test]
    fn text_escaping() {
        let mut doc = Document::parse("<p>x</p>");
        let p = doc.elements().next().expect("p");
        doc.set_text_content(p, "<script>alert('xss')</script>");
        assert_eq!(
            doc.to_html(),
            "<p>&lt;script&gt;alert('xss')&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn attribute_escaping() {
        let mut doc = Document::parse("<a>t</a>");
        let a = doc.elements().next().expect("a");
        doc.set_attr(a, "href", "test?a=1&b=2");
        doc.set_attr(a, "title", "Say \"hello\"");
        assert_eq!(
            doc.to_html(),
            r#"<a href="test?a=1&amp;b=2" title="Say &quot;hello&quot;">t</a>"#
        );
    }

    #[test]
    fn raw_text_is_not_escaped() {
        let html = "<script>if (a < b && c > d) {}</script>";
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn raw_text_end_tag_is_neutralised() {
        let mut doc = Document::parse("<style>p{}</style>");
        let style = doc.elements().next().expect("style");
        doc.set_text_content(style, "p{}</STYLE><script>x()</script>");
        let out = doc.to_html();
        assert_eq!(out, "<style>p{}<\\/STYLE><script>x()</script></style>");
    }

    #[test]
    fn scripting_raw_text_elements_are_fixpoints() {
        for html in [
            "<noscript><p>Enable JS &amp; reload</p></noscript>",
            r#"<iframe src="/embed"><p>fallback</p></iframe>"#,
            "<xmp><b>shown as is</b></xmp>",
            "<noembed><em>x</em></noembed>",
            "<div><p>a</p></div><plaintext><p>b</p></plaintext>",
        ] {
            let once = Document::parse(html).to_html();
            let twice = Document::parse(&once).to_html();
            assert_eq!(once, twice, "{html}");
        }
        let html = "<noscript><p>Enable JS</p></noscript>";
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn rcdata_elements() {
        let mut doc = Document::parse("<textarea>x</textarea>");
        let textarea = doc.elements().next().expect("textarea");
        doc.set_text_content(textarea, "Test & <Demo>");
        assert_eq!(doc.to_html(), "<textarea>Test &amp; &lt;Demo></textarea>");
    }

    #[test]
    fn foreign_content_self_closing() {
        let out = Document::parse(r#"<svg viewBox="0 0 1 1"><rect width="1"></rect></svg>"#).to_html();
        assert_eq!(out, r#"<svg viewBox="0 0 1 1"><rect width="1"/></svg>"#);
    }

    #[test]
    fn comments_are_kept() {
        let html = "<div><!--note--><p>a</p></div>";
        assert_eq!(Document::parse(html).to_html(), html);
    }

    #[test]
    fn serialize_node_is_outer_html() {
        let doc = Document::parse(r#"<div><p class="c">a</p></div>"#);
        let p = doc.elements().nth(1).expect("p");
        assert_eq!(serialize_node(&doc, p), r#"<p class="c">a</p>"#);
    }
}
