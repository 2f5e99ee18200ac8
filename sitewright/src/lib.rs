//! Editable-content reconciliation for AI-generated websites, based on
//! html5ever and facet.
//!
//! sitewright provides:
//! - **Tagging**: stable `data-editable-id` identifiers on every editable element
//! - **Extraction**: identifier → text content of a tagged page
//! - **Merging**: reinstating saved manual edits (text and styles) into regenerated markup
//! - **Versioning**: a linear history with revert-with-truncation
//! - **Preview state**: live HTML/CSS plus the manual-edit map that survives regeneration
//! - **Response parsing**, **image enrichment** and **publish sanitization** around that pipeline
//!
//! # Example
//!
//! ```rust
//! use sitewright::{PreviewStore, extract_editable_content, tag_editable};
//!
//! let tagged = tag_editable("<p>Old</p>").unwrap();
//! assert_eq!(tagged, r#"<p data-editable-id="editable-0">Old</p>"#);
//! assert_eq!(extract_editable_content(&tagged)["editable-0"], "Old");
//!
//! let mut preview = PreviewStore::new();
//! preview.update_preview(&tagged, "").unwrap();
//! preview.update_element("editable-0", "New", None).unwrap();
//! assert_eq!(preview.html(), r#"<p data-editable-id="editable-0">New</p>"#);
//!
//! // A regeneration keeps the edit
//! preview
//!     .update_preview(r#"<p data-editable-id="editable-0">Placeholder</p><h1>More</h1>"#, "")
//!     .unwrap();
//! assert_eq!(
//!     preview.html(),
//!     r#"<p data-editable-id="editable-0">New</p><h1>More</h1>"#
//! );
//! ```

mod tracing_macros;

pub mod dom;
pub mod extract;
pub mod ids;
pub mod images;
pub mod merge;
pub mod policy;
pub mod preview;
pub mod response;
pub mod sanitize;
pub mod serialize;
pub mod styles;
pub mod tag;
pub mod version;

pub use dom::{Document, HtmlError, MAX_DEPTH};
pub use extract::{ContentMap, extract_editable_content};
pub use ids::IdGenerator;
pub use images::{FallbackImages, ImageSource, enrich_images, find_placeholders};
pub use merge::{
    EditableElement, EditableMap, MergeReport, SavedEdit, merge_content_map,
    merge_editable_content,
};
pub use policy::EditablePolicy;
pub use preview::{PreparedPreview, PreviewStore, Theme};
pub use response::{GenerationResponse, ResponseError, parse_generation_response};
pub use sanitize::{SanitizeOptions, sanitize_for_publish};
pub use styles::Styles;
pub use tag::tag_editable;
pub use version::{
    ChangeKind, ExportError, LatestNonManual, ManualEdit, NewVersion, Version, VersionChanges,
    VersionStore,
};
