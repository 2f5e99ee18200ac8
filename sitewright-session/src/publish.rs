//! Published snapshots and their public read endpoint.

use facet::Facet;
use indexmap::IndexMap;
use sitewright::dom::{Document, Shape};
use sitewright::sanitize::sanitize_document;
use sitewright::serialize::serialize_node;
use sitewright::{ExportError, IdGenerator, SanitizeOptions};

use crate::tracing_macros::debug;

/// Classes of the wrapper around publicly served markup.
pub const PREVIEW_WRAPPER_CLASS: &str = "container mx-auto px-4 py-8";

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum PublishError {
    /// no content to publish
    EmptyContent,

    /// site id is required
    MissingId,

    /// site {id} not found
    NotFound { id: String },
}

impl PublishError {
    /// HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            PublishError::EmptyContent | PublishError::MissingId => 400,
            PublishError::NotFound { .. } => 404,
        }
    }
}

/// A persisted snapshot.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(rename_all = "camelCase")]
pub struct PublishedSite {
    pub id: String,
    pub html: String,
    pub css: String,
    #[facet(default)]
    pub version: Option<String>,
    /// Milliseconds since the Unix epoch
    pub published_at: i64,
}

impl PublishedSite {
    pub fn to_json(&self) -> Result<String, ExportError> {
        facet_json::to_string(self).map_err(|e| ExportError::Json {
            message: e.to_string(),
        })
    }
}

/// What the public preview endpoint serves.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PublicPreview {
    pub html: String,
    pub css: String,
}

#[derive(Debug, Clone, Default)]
pub struct PublishRegistry {
    sites: IndexMap<String, PublishedSite>,
    ids: IdGenerator,
    sanitize: SanitizeOptions,
}

impl PublishRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sanitize_options(mut self, options: SanitizeOptions) -> Self {
        self.sanitize = options;
        self
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Store a snapshot and return its new 10-character id.
    pub fn publish(
        &mut self,
        html: &str,
        css: &str,
        version: Option<&str>,
    ) -> Result<String, PublishError> {
        let html = html.trim();
        if html.is_empty() {
            return Err(PublishError::EmptyContent);
        }

        let mut id = self.ids.next_id(10);
        while self.sites.contains_key(&id) {
            id = self.ids.next_id(10);
        }
        self.sites.insert(
            id.clone(),
            PublishedSite {
                id: id.clone(),
                html: html.to_owned(),
                css: css.trim().to_owned(),
                version: version.map(str::to_owned),
                published_at: chrono::Utc::now().timestamp_millis(),
            },
        );
        debug!(site = %id, "published site");
        Ok(id)
    }

    pub fn get(&self, id: Option<&str>) -> Result<&PublishedSite, PublishError> {
        let id = id.filter(|id| !id.is_empty()).ok_or(PublishError::MissingId)?;
        self.sites.get(id).ok_or_else(|| PublishError::NotFound { id: id.to_owned() })
    }

    /// The snapshot with editor markers stripped, wrapped for display.
    pub fn preview(&self, id: Option<&str>) -> Result<PublicPreview, PublishError> {
        let site = self.get(id)?;
        let mut doc = Document::parse(&site.html);
        sanitize_document(&mut doc, &self.sanitize);
        Ok(PublicPreview {
            html: format!(
                r#"<div class="{PREVIEW_WRAPPER_CLASS}">{}</div>"#,
                body_markup(&doc)
            ),
            css: site.css.clone(),
        })
    }
}

/// The markup that belongs inside a wrapper: the body's children for a
/// whole page, everything for a fragment.
fn body_markup(doc: &Document) -> String {
    if doc.shape == Shape::Fragment {
        return doc.to_html();
    }
    let body = doc
        .elements()
        .find(|&id| doc.element(id).is_some_and(|elem| &*elem.tag == "body"));
    match body {
        Some(body) => doc
            .children(body)
            .map(|child| serialize_node(doc, child))
            .collect(),
        None => doc.to_html(),
    }
}
