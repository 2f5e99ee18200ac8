//! Editable content extraction: identifier → trimmed text.

use indexmap::IndexMap;

use crate::dom::Document;
use crate::policy::EditablePolicy;

/// Identifier → text content, in document order.
pub type ContentMap = IndexMap<String, String>;

/// Extract with the default policy. Total: markup without identifiers
/// yields an empty map.
///
/// ```rust
/// let map = sitewright::extract_editable_content(r#"<p data-editable-id="editable-0"> Old </p>"#);
/// assert_eq!(map["editable-0"], "Old");
/// ```
pub fn extract_editable_content(html: &str) -> ContentMap {
    extract_document(&Document::parse(html), &EditablePolicy::default())
}

/// Text only, trimmed at the boundary; inner whitespace is kept as is. When
/// an identifier occurs twice the first occurrence wins.
pub fn extract_document(doc: &Document, policy: &EditablePolicy) -> ContentMap {
    let mut content = ContentMap::new();
    for id in doc.elements() {
        let Some(key) = doc
            .element(id)
            .and_then(|elem| elem.attr(&policy.id_attribute))
            .filter(|key| !key.is_empty())
        else {
            continue;
        };
        if !content.contains_key(key) {
            content.insert(key.to_owned(), doc.text_content(id).trim().to_owned());
        }
    }
    content
}
