//! Content merging: write saved edits back into regenerated markup.
//!
//! The walk is pre-order with an explicit stack. When an element's
//! identifier has a saved edit and its current text differs, all of its
//! children are replaced by one text node holding the saved content and the
//! walk does not descend into it. Equal text leaves the element untouched,
//! which is what makes merging the content extracted from the same markup a
//! byte-identical no-op.
//!
//! An identifier names the first element carrying it in document order,
//! the same element extraction reads; later duplicates are left alone.
//!
//! Saved content is written as a text node and escaped by the serializer, so
//! it can never introduce markup.

use facet::Facet;
use indexmap::{IndexMap, IndexSet};
use indextree::NodeId;

use crate::dom::{Document, HtmlError};
use crate::extract::ContentMap;
use crate::policy::EditablePolicy;
use crate::styles::{Styles, apply_styles};
use crate::tracing_macros::debug;

/// A user's saved edit for one element.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct EditableElement {
    pub id: String,
    pub content: String,

    #[facet(default)]
    pub styles: Option<Styles>,
}

impl EditableElement {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            styles: None,
        }
    }

    pub fn with_styles(mut self, styles: Styles) -> Self {
        self.styles = (!styles.is_empty()).then_some(styles);
        self
    }
}

/// Identifier → saved edit, in the order edits were first made.
pub type EditableMap = IndexMap<String, EditableElement>;

/// Anything that can be merged into an element.
pub trait SavedEdit {
    fn content(&self) -> &str;

    fn styles(&self) -> Option<&Styles> {
        None
    }
}

impl SavedEdit for String {
    fn content(&self) -> &str {
        self
    }
}

impl SavedEdit for EditableElement {
    fn content(&self) -> &str {
        &self.content
    }

    fn styles(&self) -> Option<&Styles> {
        self.styles.as_ref()
    }
}

/// What a merge pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Identifiers that matched an element, in document order
    pub matched: Vec<String>,
    /// Elements whose children were replaced
    pub rewritten: usize,
    /// Elements whose class or style attribute changed
    pub restyled: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.rewritten > 0 || self.restyled > 0
    }
}

/// Merge saved edits into `html` with the default policy.
///
/// ```rust
/// use sitewright::{EditableElement, EditableMap, merge_editable_content};
///
/// let mut saved = EditableMap::new();
/// saved.insert("editable-0".into(), EditableElement::new("editable-0", "New"));
/// let html = r#"<p data-editable-id="editable-0">Old</p>"#;
/// assert_eq!(
///     merge_editable_content(html, &saved).unwrap(),
///     r#"<p data-editable-id="editable-0">New</p>"#
/// );
/// ```
pub fn merge_editable_content<E: SavedEdit>(
    html: &str,
    saved: &IndexMap<String, E>,
) -> Result<String, HtmlError> {
    merge_editable_content_with(html, saved, &EditablePolicy::default())
}

/// Merge with a custom policy. Fails as a whole on unusable input.
pub fn merge_editable_content_with<E: SavedEdit>(
    html: &str,
    saved: &IndexMap<String, E>,
    policy: &EditablePolicy,
) -> Result<String, HtmlError> {
    let mut doc = Document::parse_strict(html)?;
    merge_document(&mut doc, saved, policy);
    Ok(doc.to_html())
}

/// Merge plain text content, as produced by extraction.
pub fn merge_content_map(html: &str, saved: &ContentMap) -> Result<String, HtmlError> {
    merge_editable_content(html, saved)
}

/// Merge in place.
pub fn merge_document<E: SavedEdit>(
    doc: &mut Document,
    saved: &IndexMap<String, E>,
    policy: &EditablePolicy,
) -> MergeReport {
    let mut report = MergeReport::default();
    if saved.is_empty() {
        return report;
    }

    let mut stack: Vec<NodeId> = doc.top_level().collect();
    stack.reverse();
    let mut seen: IndexSet<String> = IndexSet::new();

    while let Some(id) = stack.pop() {
        let key = doc
            .element(id)
            .and_then(|elem| elem.attr(&policy.id_attribute))
            .map(str::to_owned);

        let mut descend = true;
        if let Some(key) = key
            && let Some(edit) = saved.get(&key)
            && seen.insert(key.clone())
        {
            if doc.text_content(id).trim() != edit.content().trim() {
                doc.set_text_content(id, edit.content());
                report.rewritten += 1;
                descend = false;
            }
            if let Some(styles) = edit.styles()
                && apply_styles(doc, id, styles)
            {
                report.restyled += 1;
            }
            report.matched.push(key);
        }

        if descend {
            let children: Vec<NodeId> = doc.children(id).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    debug!(
        matched = report.matched.len(),
        rewritten = report.rewritten,
        restyled = report.restyled,
        "merged saved edits"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_editable_content;
    use crate::tag::tag_editable;
    use facet_testhelpers::test;

    fn saved(entries: &[(&str, &str)]) -> EditableMap {
        entries
            .iter()
            .map(|(id, content)| (id.to_string(), EditableElement::new(*id, *content)))
            .collect()
    }

    #[test]
    fn rewrites_changed_content() {
        let html = r#"<p data-editable-id="editable-0">Old</p>"#;
        let out = merge_editable_content(html, &saved(&[("editable-0", "New")])).unwrap();
        assert_eq!(out, r#"<p data-editable-id="editable-0">New</p>"#);
    }

    #[test]
    fn extracted_content_merges_to_identical_bytes() {
        let tagged = tag_editable(concat!(
            "<section><h1>Title <em>here</em></h1>",
            "<p>Body &amp; more</p>",
            r#"<div class="editable"><p>inner</p></div></section>"#
        ))
        .unwrap();
        let content = extract_editable_content(&tagged);
        assert_eq!(merge_content_map(&tagged, &content).unwrap(), tagged);
    }

    #[test]
    fn absent_identifiers_are_untouched() {
        let html = concat!(
            r#"<p data-editable-id="a">keep <b>bold</b></p>"#,
            r#"<p data-editable-id="b">Old</p>"#
        );
        let out = merge_editable_content(html, &saved(&[("b", "New")])).unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<p data-editable-id="a">keep <b>bold</b></p>"#,
                r#"<p data-editable-id="b">New</p>"#
            )
        );
    }

    #[test]
    fn unknown_identifiers_are_ignored() {
        let html = r#"<p data-editable-id="a">x</p>"#;
        let out = merge_editable_content(html, &saved(&[("zzz", "y")])).unwrap();
        assert_eq!(out, html);
    }

    #[test]
    fn markup_in_content_is_escaped() {
        let html = r#"<p data-editable-id="a">x</p>"#;
        let out = merge_editable_content(html, &saved(&[("a", "<script>alert(1)</script>")]))
            .unwrap();
        assert_eq!(
            out,
            r#"<p data-editable-id="a">&lt;script&gt;alert(1)&lt;/script&gt;</p>"#
        );
    }

    #[test]
    fn outer_rewrite_wins_over_nested_edits() {
        let html = concat!(
            r#"<div class="editable" data-editable-id="outer">"#,
            r#"<p data-editable-id="inner">a</p></div>"#
        );
        let out =
            merge_editable_content(html, &saved(&[("outer", "flat"), ("inner", "b")])).unwrap();
        assert_eq!(
            out,
            r#"<div class="editable" data-editable-id="outer">flat</div>"#
        );
    }

    #[test]
    fn nested_edit_applies_when_outer_is_unchanged() {
        let html = concat!(
            r#"<div class="editable" data-editable-id="outer">"#,
            r#"<p data-editable-id="inner">a</p></div>"#
        );
        let out =
            merge_editable_content(html, &saved(&[("outer", "a"), ("inner", "b")])).unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<div class="editable" data-editable-id="outer">"#,
                r#"<p data-editable-id="inner">b</p></div>"#
            )
        );
    }

    #[test]
    fn duplicated_identifier_edits_first_occurrence() {
        let html = r#"<p data-editable-id="d">1</p><p data-editable-id="d">2</p>"#;
        let mut doc = Document::parse(html);
        let report = merge_document(&mut doc, &saved(&[("d", "x")]), &EditablePolicy::default());
        assert_eq!(report.matched, vec!["d"]);
        assert_eq!(
            doc.to_html(),
            r#"<p data-editable-id="d">x</p><p data-editable-id="d">2</p>"#
        );
    }

    #[test]
    fn duplicated_identifiers_survive_their_own_extraction() {
        let html = r#"<p data-editable-id="x">first</p><p data-editable-id="x">second</p>"#;
        let own = extract_editable_content(html);
        assert_eq!(merge_content_map(html, &own).unwrap(), html);
    }

    #[test]
    fn styles_are_applied_with_content() {
        let html = r#"<h1 class="text-5xl font-bold" data-editable-id="h">T</h1>"#;
        let mut map = EditableMap::new();
        map.insert(
            "h".into(),
            EditableElement::new("h", "T").with_styles(Styles::font_size("3rem")),
        );
        let out = merge_editable_content(html, &map).unwrap();
        assert_eq!(
            out,
            r#"<h1 class="font-bold" data-editable-id="h" style="font-size: 3rem">T</h1>"#
        );
    }

    #[test]
    fn empty_content_clears_children() {
        let html = r#"<p data-editable-id="a">x <b>y</b></p>"#;
        let out = merge_editable_content(html, &saved(&[("a", "")])).unwrap();
        assert_eq!(out, r#"<p data-editable-id="a"></p>"#);
    }

    #[test]
    fn empty_styles_are_not_stored() {
        let edit = EditableElement::new("a", "b").with_styles(Styles::default());
        assert_eq!(edit.styles, None);
    }
}
