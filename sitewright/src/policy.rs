//! Which elements count as editable, and how they are marked.

use crate::dom::{ElementData, Namespace, is_void_element};

/// Options controlling the editable-tag policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditablePolicy {
    /// Tags that are always editable (default: `p`, `h1`..`h6`, `span`)
    pub tags: Vec<String>,
    /// Class that makes any other element editable (default: `editable`)
    pub marker_class: String,
    /// Attribute carrying the identifier (default: `data-editable-id`)
    pub id_attribute: String,
    /// Prefix of generated identifiers (default: `editable-`)
    pub id_prefix: String,
}

impl Default for EditablePolicy {
    fn default() -> Self {
        Self {
            tags: ["p", "h1", "h2", "h3", "h4", "h5", "h6", "span"]
                .into_iter()
                .map(String::from)
                .collect(),
            marker_class: "editable".to_string(),
            id_attribute: "data-editable-id".to_string(),
            id_prefix: "editable-".to_string(),
        }
    }
}

impl EditablePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of unconditionally editable tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_marker_class(mut self, class: impl Into<String>) -> Self {
        self.marker_class = class.into();
        self
    }

    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Whether an element should carry an identifier.
    pub fn is_editable(&self, elem: &ElementData, ns: Namespace) -> bool {
        if ns != Namespace::Html || is_void_element(&elem.tag) {
            return false;
        }
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(&elem.tag))
            || (!self.marker_class.is_empty() && elem.has_class(&self.marker_class))
    }

    /// The identifier for counter value `n`.
    pub fn id_for(&self, n: usize) -> String {
        format!("{}{}", self.id_prefix, n)
    }
}
