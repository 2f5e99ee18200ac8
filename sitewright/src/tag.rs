//! Element tagging: give every editable element a stable identifier.
//!
//! Identifiers are `<prefix><n>` with `n` drawn from a counter that starts at
//! zero for every pass and advances in document order (parent before
//! children). Elements that already carry an identifier keep it, and the
//! counter skips values already present so identifiers stay unique.

use indexmap::IndexSet;
use indextree::NodeId;

use crate::dom::{Document, HtmlError};
use crate::policy::EditablePolicy;
use crate::tracing_macros::debug;

/// Tag `html` with the default policy.
///
/// ```rust
/// let tagged = sitewright::tag_editable("<p>Old</p>").unwrap();
/// assert_eq!(tagged, r#"<p data-editable-id="editable-0">Old</p>"#);
/// ```
pub fn tag_editable(html: &str) -> Result<String, HtmlError> {
    tag_editable_with(html, &EditablePolicy::default())
}

/// Tag `html` with a custom policy. Fails as a whole on unusable input.
pub fn tag_editable_with(html: &str, policy: &EditablePolicy) -> Result<String, HtmlError> {
    let mut doc = Document::parse_strict(html)?;
    tag_document(&mut doc, policy);
    Ok(doc.to_html())
}

/// Assign identifiers in place. Returns how many elements were tagged.
pub fn tag_document(doc: &mut Document, policy: &EditablePolicy) -> usize {
    let taken = editable_ids(doc, policy);

    let targets: Vec<NodeId> = doc
        .elements()
        .filter(|&id| {
            let node = doc.get(id);
            doc.element(id).is_some_and(|elem| {
                policy.is_editable(elem, node.ns)
                    && elem
                        .attr(&policy.id_attribute)
                        .is_none_or(|existing| existing.is_empty())
            })
        })
        .collect();

    let mut counter = 0usize;
    for &id in &targets {
        let mut candidate = policy.id_for(counter);
        counter += 1;
        while taken.contains(&candidate) {
            candidate = policy.id_for(counter);
            counter += 1;
        }
        doc.set_attr(id, &policy.id_attribute, &candidate);
    }

    debug!(
        tagged = targets.len(),
        preexisting = taken.len(),
        "tagged editable elements"
    );
    targets.len()
}

/// Every non-empty identifier in the document, in document order.
pub fn editable_ids(doc: &Document, policy: &EditablePolicy) -> IndexSet<String> {
    doc.elements()
        .filter_map(|id| doc.element(id)?.attr(&policy.id_attribute))
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}
