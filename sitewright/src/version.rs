//! Linear version history with destructive rewind.
//!
//! Every successful generation and every manual save appends an immutable
//! [`Version`]. Reverting truncates everything after the target. An AI
//! change collapses the manual-edit branch sitting on top of the latest
//! non-manual version before it is appended, so the log never branches.

use facet::Facet;

use crate::ids::IdGenerator;
use crate::tracing_macros::debug;

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ExportError {
    /// JSON export error: {message}
    Json { message: String },
}

impl ExportError {
    pub(crate) fn json(err: impl std::fmt::Display) -> Self {
        ExportError::Json {
            message: err.to_string(),
        }
    }
}

/// Whether a version started the site or changed it.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChangeKind {
    Initial,
    Update,
}

/// One `(identifier, content)` pair recorded by a manual edit.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct ManualEdit {
    pub id: String,
    pub content: String,
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(rename_all = "camelCase")]
pub struct VersionChanges {
    #[facet(rename = "type")]
    pub kind: ChangeKind,

    pub description: String,

    #[facet(default)]
    pub is_manual_edit: bool,

    /// Structured edits of a manual version
    #[facet(default)]
    pub edits: Vec<ManualEdit>,
}

impl VersionChanges {
    /// An AI-driven change.
    pub fn generated(kind: ChangeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            is_manual_edit: false,
            edits: Vec::new(),
        }
    }

    /// A change made directly in the preview.
    pub fn manual(description: impl Into<String>, edits: Vec<ManualEdit>) -> Self {
        Self {
            kind: ChangeKind::Update,
            description: description.into(),
            is_manual_edit: true,
            edits,
        }
    }
}

/// An immutable snapshot of the whole site.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub message_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub html: String,
    pub css: String,
    pub changes: VersionChanges,
}

impl Version {
    pub fn is_manual_edit(&self) -> bool {
        self.changes.is_manual_edit
    }
}

/// Everything a caller supplies for a new version; the store assigns the id
/// and the timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub message_id: String,
    pub html: String,
    pub css: String,
    pub changes: VersionChanges,
}

/// Result of [`VersionStore::latest_non_manual_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestNonManual<'a> {
    pub version: &'a Version,
    /// Edits of the manual versions after `version`, oldest first
    pub manual_edits: Vec<ManualEdit>,
}

/// The ordered log plus its current pointer.
#[derive(Debug, Clone)]
pub struct VersionStore {
    versions: Vec<Version>,
    current_version_id: Option<String>,
    ids: IdGenerator,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for VersionStore {
    /// Stores are equal when their history and pointer are; the id
    /// generator's position does not count.
    fn eq(&self, other: &Self) -> bool {
        self.versions == other.versions && self.current_version_id == other.current_version_id
    }
}

impl VersionStore {
    pub fn new() -> Self {
        Self::with_ids(IdGenerator::new())
    }

    pub fn with_ids(ids: IdGenerator) -> Self {
        Self {
            versions: Vec::new(),
            current_version_id: None,
            ids,
        }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn current_version_id(&self) -> Option<&str> {
        self.current_version_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The version that answered a chat message. Manual versions recorded
    /// afterwards reuse the message id, so this is the first one carrying it.
    pub fn find_by_message_id(&self, message_id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.message_id == message_id)
    }

    /// Append stamped with the wall clock. Returns the new id.
    pub fn add_version(&mut self, entry: NewVersion) -> String {
        self.add_version_at(entry, chrono::Utc::now().timestamp_millis())
    }

    /// Append with an explicit timestamp. Timestamps are clamped so the log
    /// stays strictly increasing.
    pub fn add_version_at(&mut self, entry: NewVersion, timestamp: i64) -> String {
        if !entry.changes.is_manual_edit
            && let Some(keep) = self.latest_non_manual_index()
        {
            let dropped = self.versions.len() - (keep + 1);
            if dropped > 0 {
                debug!(dropped, "collapsing manual-edit branch");
            }
            self.versions.truncate(keep + 1);
        }

        let timestamp = match self.versions.last() {
            Some(last) if timestamp <= last.timestamp => last.timestamp + 1,
            _ => timestamp,
        };

        let mut id = self.ids.next_id(7);
        while self.get(&id).is_some() {
            id = self.ids.next_id(7);
        }

        self.versions.push(Version {
            id: id.clone(),
            message_id: entry.message_id,
            timestamp,
            html: entry.html,
            css: entry.css,
            changes: entry.changes,
        });
        self.current_version_id = Some(id.clone());
        debug!(version = %id, total = self.versions.len(), "added version");
        id
    }

    /// Truncate to the prefix ending at `id`. Returns false (and changes
    /// nothing) when `id` is unknown.
    pub fn revert_to_version(&mut self, id: &str) -> bool {
        let Some(index) = self.versions.iter().position(|v| v.id == id) else {
            debug!(version = %id, "revert to unknown version ignored");
            return false;
        };
        self.versions.truncate(index + 1);
        self.current_version_id = Some(id.to_owned());
        true
    }

    /// The current version, or the last one if the pointer is stale.
    pub fn current_version(&self) -> Option<&Version> {
        self.current_index().map(|i| &self.versions[i])
    }

    fn current_index(&self) -> Option<usize> {
        self.current_version_id
            .as_deref()
            .and_then(|id| self.versions.iter().position(|v| v.id == id))
            .or_else(|| self.versions.len().checked_sub(1))
    }

    fn latest_non_manual_index(&self) -> Option<usize> {
        let current = self.current_index()?;
        self.versions[..=current]
            .iter()
            .rposition(|v| !v.is_manual_edit())
    }

    /// Scan back from the current version for the latest AI-produced one,
    /// collecting the manual edits layered on top of it.
    pub fn latest_non_manual_version(&self) -> Option<LatestNonManual<'_>> {
        let current = self.current_index()?;
        let index = self.latest_non_manual_index()?;
        let manual_edits = self.versions[index + 1..=current]
            .iter()
            .filter(|v| v.is_manual_edit())
            .flat_map(|v| v.changes.edits.iter().cloned())
            .collect();
        Some(LatestNonManual {
            version: &self.versions[index],
            manual_edits,
        })
    }

    /// The history as a JSON array.
    pub fn to_json(&self) -> Result<String, ExportError> {
        facet_json::to_string(&self.versions).map_err(ExportError::json)
    }
}
