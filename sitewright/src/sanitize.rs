//! Strip editor-only markers before markup is shown publicly.

use indextree::NodeId;

use crate::dom::Document;
use crate::tracing_macros::trace;

/// What to strip from published markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Remove every `data-*` attribute (default: true)
    pub strip_data_attributes: bool,
    /// Further attributes to remove (default: `contenteditable`)
    pub strip_attributes: Vec<String>,
    /// Classes containing this marker are removed (default: `sonner`)
    pub decorator_marker: Option<String>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            strip_data_attributes: true,
            strip_attributes: vec!["contenteditable".to_string()],
            decorator_marker: Some("sonner".to_string()),
        }
    }
}

impl SanitizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_data_attributes(mut self) -> Self {
        self.strip_data_attributes = false;
        self
    }

    pub fn strip_attribute(mut self, name: impl Into<String>) -> Self {
        self.strip_attributes.push(name.into());
        self
    }

    pub fn decorator_marker(mut self, marker: Option<String>) -> Self {
        self.decorator_marker = marker;
        self
    }
}

/// Sanitize a markup string. Total: any input produces output.
pub fn sanitize_for_publish(html: &str, options: &SanitizeOptions) -> String {
    let mut doc = Document::parse(html);
    sanitize_document(&mut doc, options);
    doc.to_html()
}

/// Sanitize in place. Returns how many elements were modified.
pub fn sanitize_document(doc: &mut Document, options: &SanitizeOptions) -> usize {
    let ids: Vec<NodeId> = doc.elements().collect();
    let mut modified = 0;
    for id in ids {
        if sanitize_element(doc, id, options) {
            modified += 1;
        }
    }
    trace!(modified, "sanitized for publish");
    modified
}

fn sanitize_element(doc: &mut Document, id: NodeId, options: &SanitizeOptions) -> bool {
    let Some(elem) = doc.element_mut(id) else {
        return false;
    };
    let before = elem.attrs.len();
    elem.attrs.retain(|name, _| {
        let lower = name.to_ascii_lowercase();
        !(options.strip_data_attributes && lower.starts_with("data-"))
            && !options
                .strip_attributes
                .iter()
                .any(|strip| strip.eq_ignore_ascii_case(&lower))
    });
    let mut changed = elem.attrs.len() != before;

    if let Some(marker) = options.decorator_marker.as_deref().filter(|m| !m.is_empty())
        && elem.attr("class").is_some_and(|class| class.contains(marker))
    {
        let kept: Vec<&str> = elem.classes().filter(|c| !c.contains(marker)).collect();
        let kept = kept.join(" ");
        if kept.is_empty() {
            elem.attrs.shift_remove("class");
        } else {
            elem.attrs.insert("class".to_string(), kept.as_str().into());
        }
        changed = true;
    }

    if elem.attr("class").is_some_and(|class| class.trim().is_empty()) {
        elem.attrs.shift_remove("class");
        changed = true;
    }
    changed
}
