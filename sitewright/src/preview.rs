//! Live preview state: the rendered HTML and CSS plus the map of manual
//! edits that must survive regeneration.

use facet::Facet;

use crate::dom::{Document, HtmlError};
use crate::merge::{EditableElement, EditableMap, merge_document};
use crate::policy::EditablePolicy;
use crate::styles::Styles;
use crate::tag::editable_ids;
use crate::tracing_macros::debug;
use crate::version::VersionStore;

#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// A reconciled preview state, computed by [`PreviewStore::prepare_update`]
/// and installed by [`PreviewStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPreview {
    html: String,
    css: String,
    editable: EditableMap,
    dropped: Vec<String>,
}

impl PreparedPreview {
    /// The HTML that will be shown, with carried-forward edits applied.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    /// Identifiers whose edits were superseded because the new markup no
    /// longer contains them.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviewStore {
    html: String,
    css: String,
    editable: EditableMap,
    theme: Theme,
    policy: EditablePolicy,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: EditablePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn editable_elements(&self) -> &EditableMap {
        &self.editable
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn policy(&self) -> &EditablePolicy {
        &self.policy
    }

    /// Reconcile incoming markup with the edit map without touching the
    /// store. Edits whose identifier still occurs are re-applied and carried
    /// forward; the rest are dropped.
    pub fn prepare_update(&self, html: &str, css: &str) -> Result<PreparedPreview, HtmlError> {
        if self.editable.is_empty() {
            return Ok(PreparedPreview {
                html: html.to_owned(),
                css: css.to_owned(),
                editable: EditableMap::new(),
                dropped: Vec::new(),
            });
        }

        let mut doc = Document::parse_strict(html)?;
        let present = editable_ids(&doc, &self.policy);

        let mut editable = EditableMap::new();
        let mut dropped = Vec::new();
        for (id, entry) in &self.editable {
            if present.contains(id) {
                editable.insert(id.clone(), entry.clone());
            } else {
                dropped.push(id.clone());
            }
        }

        merge_document(&mut doc, &editable, &self.policy);
        if !dropped.is_empty() {
            debug!(?dropped, "manual edits superseded by regeneration");
        }

        Ok(PreparedPreview {
            html: doc.to_html(),
            css: css.to_owned(),
            editable,
            dropped,
        })
    }

    /// Like [`Self::prepare_update`] for a brand new site: no edit is
    /// carried forward and the markup is stored verbatim.
    pub fn prepare_replacement(&self, html: &str, css: &str) -> PreparedPreview {
        PreparedPreview {
            html: html.to_owned(),
            css: css.to_owned(),
            editable: EditableMap::new(),
            dropped: self.editable.keys().cloned().collect(),
        }
    }

    pub fn commit(&mut self, prepared: PreparedPreview) {
        self.html = prepared.html;
        self.css = prepared.css;
        self.editable = prepared.editable;
    }

    /// Set the live HTML and CSS, keeping manual edits that still apply.
    /// Nothing changes when the markup is unusable.
    pub fn update_preview(&mut self, html: &str, css: &str) -> Result<(), HtmlError> {
        let prepared = self.prepare_update(html, css)?;
        self.commit(prepared);
        Ok(())
    }

    /// Record a manual edit and rewrite the live element to match.
    ///
    /// Returns `Ok(false)` without changing anything when no element carries
    /// `id`. Styles merge field-wise into the previous entry for `id`.
    pub fn update_element(
        &mut self,
        id: &str,
        content: &str,
        styles: Option<Styles>,
    ) -> Result<bool, HtmlError> {
        let mut doc = Document::parse_strict(&self.html)?;
        if doc.find_by_attr(&self.policy.id_attribute, id).is_empty() {
            debug!(id, "update for unknown editable element ignored");
            return Ok(false);
        }

        let previous = self.editable.get(id).and_then(|e| e.styles.as_ref());
        let styles = match (styles, previous) {
            (Some(new), Some(old)) => new.merged_over(old),
            (Some(new), None) => new,
            (None, Some(old)) => old.clone(),
            (None, None) => Styles::default(),
        };
        let entry = EditableElement::new(id, content).with_styles(styles);

        let mut single = EditableMap::new();
        single.insert(id.to_owned(), entry.clone());
        merge_document(&mut doc, &single, &self.policy);

        self.html = doc.to_html();
        self.editable.insert(id.to_owned(), entry);
        Ok(true)
    }

    /// Forget every manual edit, e.g. when a brand new site arrives.
    pub fn clear_edits(&mut self) {
        self.editable.clear();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    /// Revert `versions` to `id` and reset the preview to that snapshot,
    /// clearing the edit map. Returns false when `id` is unknown.
    pub fn revert_to_version(&mut self, versions: &mut VersionStore, id: &str) -> bool {
        if !versions.revert_to_version(id) {
            return false;
        }
        if let Some(version) = versions.current_version() {
            self.html = version.html.clone();
            self.css = version.css.clone();
        }
        self.editable.clear();
        true
    }
}
