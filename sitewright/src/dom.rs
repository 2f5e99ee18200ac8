//! Arena-based HTML tree.
//!
//! Generated markup is parsed with html5ever (full HTML5 tree construction,
//! browser-compatible error recovery) into an `indextree` arena. Everything
//! that reads or rewrites markup (tagging, extraction, merging, publish
//! sanitization) goes through this one representation and the serializer in
//! [`crate::serialize`].
//!
//! Input that looks like a whole page (`<!doctype`, `<html`, `<head`, `<body`)
//! is parsed as a document; anything else is parsed as a fragment in `<body>`
//! context, so a fragment serializes back to a fragment.

use facet::Facet;
use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, QualName, parse_document, parse_fragment};
use indexmap::IndexMap;
use indextree::{Arena, NodeEdge, NodeId};
use std::borrow::Cow;
use std::cell::RefCell;
use tendril::{StrTendril, TendrilSink};

use crate::tracing_macros::trace;

/// Deepest element nesting accepted by [`Document::parse_strict`].
pub const MAX_DEPTH: usize = 512;

/// Errors that make a piece of markup unusable for tagging or merging.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum HtmlError {
    /// input contains a NUL character at byte {offset}
    NulCharacter { offset: usize },

    /// element nesting depth {depth} exceeds the limit of {limit}
    TooDeep { depth: usize, limit: usize },
}

/// Whether the source was a whole page or a body fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Parsed with `parse_document`; serializes doctype and `<html>`.
    Document,
    /// Parsed in `<body>` context; serializes only the top-level nodes.
    Fragment,
}

/// Parsed markup: an arena plus the handles needed to walk and serialize it.
#[derive(Debug, Clone)]
pub struct Document {
    /// THE tree - all nodes live here
    pub arena: Arena<NodeData>,

    /// Invisible document node (parent of `<html>`)
    pub document: NodeId,

    /// Root `<html>` element (synthesized by the tree builder for fragments)
    pub root: NodeId,

    /// DOCTYPE name if present (usually "html")
    pub doctype: Option<StrTendril>,

    pub shape: Shape,
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub ns: Namespace,
}

/// Node types
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content (StrTendril is refcounted - cheap to clone)
    Text(StrTendril),
    /// HTML comment
    Comment(StrTendril),
}

/// Element data (tag + attributes)
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Local tag name, lowercase for HTML, case-preserved for SVG/MathML
    pub tag: StrTendril,

    /// Attributes in source order. Namespaced attributes keep their prefix
    /// (`xlink:href`).
    pub attrs: IndexMap<String, StrTendril>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|v| v.as_ref())
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    pub fn from_url(url: &str) -> Self {
        match url {
            "http://www.w3.org/2000/svg" => Namespace::Svg,
            "http://www.w3.org/1998/Math/MathML" => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// HTML5 void elements that never have closing tags
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// True when the markup carries page-level structure that fragment parsing
/// would drop.
fn looks_like_document(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    ["<!doctype", "<html", "<head", "<body"]
        .iter()
        .any(|needle| has_tag_open(&lower, needle))
}

/// `needle` followed by a tag-name boundary, so `<head` does not match
/// `<header`.
fn has_tag_open(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, _)| {
        match haystack.as_bytes().get(at + needle.len()) {
            None => true,
            Some(&b) => b.is_ascii_whitespace() || b == b'>' || b == b'/',
        }
    })
}

impl Document {
    /// Lenient parse. Never fails: html5ever recovers from anything.
    pub fn parse(html: &str) -> Document {
        let tendril = StrTendril::from(html);
        if looks_like_document(html) {
            parse_document(ArenaSink::new(Shape::Document), Default::default()).one(tendril)
        } else {
            let context = QualName::new(
                None,
                html5ever::Namespace::from(Namespace::Html.url()),
                LocalName::from("body"),
            );
            parse_fragment(
                ArenaSink::new(Shape::Fragment),
                Default::default(),
                context,
                Vec::new(),
            )
            .one(tendril)
        }
    }

    /// Parse for rewriting. Rejects input containing NUL characters and trees
    /// nested deeper than [`MAX_DEPTH`]; the caller never sees a partial tree.
    pub fn parse_strict(html: &str) -> Result<Document, HtmlError> {
        if let Some(offset) = html.find('\0') {
            return Err(HtmlError::NulCharacter { offset });
        }
        let doc = Self::parse(html);
        let depth = doc.max_depth();
        if depth > MAX_DEPTH {
            return Err(HtmlError::TooDeep {
                depth,
                limit: MAX_DEPTH,
            });
        }
        Ok(doc)
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.get(id).kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.get_mut(id).kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Nodes that make up the serialized output, in order.
    pub fn top_level(&self) -> impl Iterator<Item = NodeId> + '_ {
        let parent = match self.shape {
            Shape::Document => self.document,
            Shape::Fragment => self.root,
        };
        parent.children(&self.arena)
    }

    /// Every element in document order (pre-order, parent before children).
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.top_level()
            .flat_map(|top| top.descendants(&self.arena))
            .filter(|&id| matches!(self.get(id).kind, NodeKind::Element(_)))
    }

    /// Elements whose attribute `name` equals `value`, in document order.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.elements()
            .filter(|&id| {
                self.element(id)
                    .and_then(|elem| elem.attr(name))
                    .is_some_and(|v| v == value)
            })
            .collect()
    }

    /// Concatenated text of every descendant text node (comments excluded).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in id.descendants(&self.arena) {
            if let NodeKind::Text(text) = &self.get(node).kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace every child of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let children: Vec<NodeId> = id.children(&self.arena).collect();
        for child in children {
            child.remove_subtree(&mut self.arena);
        }
        if !text.is_empty() {
            let text_node = self.arena.new_node(NodeData {
                kind: NodeKind::Text(StrTendril::from(text)),
                ns: Namespace::Html,
            });
            id.append(text_node, &mut self.arena);
        }
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(elem) = self.element_mut(id) {
            elem.attrs
                .insert(name.to_owned(), StrTendril::from(value));
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<StrTendril> {
        self.element_mut(id)
            .and_then(|elem| elem.attrs.shift_remove(name))
    }

    /// Deepest element nesting among the serialized nodes.
    pub fn max_depth(&self) -> usize {
        let mut depth = 0usize;
        let mut max = 0usize;
        for top in self.top_level() {
            for edge in top.traverse(&self.arena) {
                match edge {
                    NodeEdge::Start(id) if self.element(id).is_some() => {
                        depth += 1;
                        max = max.max(depth);
                    }
                    NodeEdge::End(id) if self.element(id).is_some() => {
                        depth -= 1;
                    }
                    _ => {}
                }
            }
        }
        max
    }
}

/// Owned element name wrapper
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &html5ever::Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// Attribute key as it appears in markup.
fn attr_key(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

/// TreeSink implementation for building the arena
struct ArenaSink {
    arena: RefCell<Arena<NodeData>>,

    /// Document node (parent of `<html>`)
    document: NodeId,

    doctype: RefCell<Option<StrTendril>>,

    shape: Shape,
}

impl ArenaSink {
    fn new(shape: Shape) -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData {
            kind: NodeKind::Document,
            ns: Namespace::Html,
        });

        ArenaSink {
            arena: RefCell::new(arena),
            document,
            doctype: RefCell::new(None),
            shape,
        }
    }

    fn new_text(arena: &mut Arena<NodeData>, text: StrTendril) -> NodeId {
        arena.new_node(NodeData {
            kind: NodeKind::Text(text),
            ns: Namespace::Html,
        })
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let arena = self.arena.into_inner();

        // Comments may precede <html> at document level
        let root = self
            .document
            .children(&arena)
            .find(|&id| matches!(arena[id].get().kind, NodeKind::Element(_)))
            .unwrap_or(self.document);

        Document {
            arena,
            document: self.document,
            root,
            doctype: self.doctype.into_inner(),
            shape: self.shape,
        }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        trace!(msg = %_msg, "html parse error (recovered)");
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        let node = arena[*target].get();

        let (local, ns) = match &node.kind {
            NodeKind::Element(elem) => (LocalName::from(elem.tag.as_ref()), node.ns),
            _ => (LocalName::from(""), Namespace::Html),
        };

        OwnedElemName(QualName {
            prefix: None,
            ns: html5ever::Namespace::from(ns.url()),
            local,
        })
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let tag = StrTendril::from(name.local.as_ref());
        let ns = Namespace::from_url(name.ns.as_ref());

        // First occurrence wins, as in browsers
        let mut attr_map: IndexMap<String, StrTendril> = IndexMap::with_capacity(attrs.len());
        for attr in attrs {
            attr_map.entry(attr_key(&attr.name)).or_insert(attr.value);
        }

        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Element(ElementData {
                tag,
                attrs: attr_map,
            }),
            ns,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(text),
            ns: Namespace::Html,
        })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        // Processing instructions only occur in XML; keep an empty comment
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(StrTendril::new()),
            ns: Namespace::Html,
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                parent.append(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                // Adjacent text merges into one node, as in the DOM
                let last_child_id = parent.children(&arena).next_back();
                if let Some(last_child) = last_child_id
                    && let NodeKind::Text(existing) = &mut arena[last_child].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = Self::new_text(&mut arena, text);
                parent.append(text_node, &mut arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                sibling.insert_before(node, &mut arena);
            }
            NodeOrText::AppendText(text) => {
                let previous = arena[*sibling].previous_sibling();
                if let Some(previous) = previous
                    && let NodeKind::Text(existing) = &mut arena[previous].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = Self::new_text(&mut arena, text);
                sibling.insert_before(text_node, &mut arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        // Foster parenting: insert before the table when it is still attached
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        *self.doctype.borrow_mut() = Some(name);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents live directly under the <template> element
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = &mut arena[*target].get_mut().kind {
            for attr in attrs {
                elem.attrs.entry(attr_key(&attr.name)).or_insert(attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&arena).collect();
        for child in children {
            child.detach(&mut arena);
            new_parent.append(child, &mut arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn tag_of(doc: &Document, id: NodeId) -> String {
        doc.element(id).map(|e| e.tag.to_string()).unwrap_or_default()
    }

    #[test]
    fn fragment_keeps_top_level_nodes() {
        let doc = Document::parse("<p>Hello</p><h1>World</h1>");
        assert_eq!(doc.shape, Shape::Fragment);

        let tops: Vec<String> = doc.top_level().map(|id| tag_of(&doc, id)).collect();
        assert_eq!(tops, vec!["p", "h1"]);
    }

    #[test]
    fn full_page_is_parsed_as_document() {
        let doc = Document::parse("<!DOCTYPE html><html><head></head><body><p>Hi</p></body></html>");
        assert_eq!(doc.shape, Shape::Document);
        assert_eq!(doc.doctype.as_deref(), Some("html"));
        assert_eq!(tag_of(&doc, doc.root), "html");
    }

    #[test]
    fn header_is_not_a_head() {
        for html in [
            "<header><h1>Hi</h1></header>",
            r#"<header class="sticky top-0"><nav>x</nav></header><main><p>y</p></main>"#,
            "<HEADER>a</HEADER><bodyguard>b</bodyguard>",
        ] {
            let doc = Document::parse(html);
            assert_eq!(doc.shape, Shape::Fragment, "{html}");
            assert_eq!(doc.to_html(), html.to_ascii_lowercase());
        }
    }

    #[test]
    fn page_tags_with_attributes_are_documents() {
        assert!(looks_like_document(r#"<html lang="en"><p>x</p></html>"#));
        assert!(looks_like_document("<body\nclass=x>y</body>"));
        assert!(looks_like_document("<head/>"));
        assert!(!looks_like_document("<header>x</header>"));
    }

    #[test]
    fn elements_are_in_preorder() {
        let doc = Document::parse("<div><p>a</p><span>b</span></div><h2>c</h2>");
        let tags: Vec<String> = doc.elements().map(|id| tag_of(&doc, id)).collect();
        assert_eq!(tags, vec!["div", "p", "span", "h2"]);
    }

    #[test]
    fn text_content_skips_comments() {
        let doc = Document::parse("<p>Hello <!-- hidden --><b>world</b></p>");
        let p = doc.elements().next().expect("p");
        assert_eq!(doc.text_content(p), "Hello world");
    }

    #[test]
    fn set_text_content_replaces_children() {
        let mut doc = Document::parse("<p>Hello <b>world</b></p>");
        let p = doc.elements().next().expect("p");
        doc.set_text_content(p, "Bye");
        assert_eq!(doc.text_content(p), "Bye");
        assert_eq!(doc.elements().count(), 1);
    }

    #[test]
    fn duplicate_attributes_keep_first() {
        let doc = Document::parse(r#"<p class="a" class="b">x</p>"#);
        let p = doc.elements().next().expect("p");
        assert_eq!(doc.element(p).and_then(|e| e.attr("class")), Some("a"));
    }

    #[test]
    fn namespaced_attributes_keep_prefix() {
        let doc = Document::parse(r##"<svg><use xlink:href="#icon"></use></svg>"##);
        let use_el = doc.elements().nth(1).expect("use");
        assert_eq!(
            doc.element(use_el).and_then(|e| e.attr("xlink:href")),
            Some("#icon")
        );
        assert_eq!(doc.get(use_el).ns, Namespace::Svg);
    }

    #[test]
    fn strict_parse_rejects_nul() {
        let err = Document::parse_strict("<p>a\0b</p>").unwrap_err();
        assert_eq!(err, HtmlError::NulCharacter { offset: 4 });
    }

    #[test]
    fn strict_parse_rejects_deep_nesting() {
        let html = "<div>".repeat(MAX_DEPTH + 1);
        let err = Document::parse_strict(&html).unwrap_err();
        assert!(matches!(err, HtmlError::TooDeep { limit: MAX_DEPTH, .. }));
    }

    #[test]
    fn strict_parse_accepts_ordinary_markup() {
        assert!(Document::parse_strict("<section><p>ok</p></section>").is_ok());
    }

    #[test]
    fn find_by_attr_returns_matches_in_order() {
        let doc = Document::parse(r#"<p data-k="1">a</p><p data-k="2">b</p><p data-k="1">c</p>"#);
        let found = doc.find_by_attr("data-k", "1");
        assert_eq!(found.len(), 2);
        assert_eq!(doc.text_content(found[1]), "c");
    }
}
