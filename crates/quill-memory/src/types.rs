//! Bedside-note data model.
//!
//! All serializable types use `camelCase` for wire compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_core::ids::NoteId;

/// Topic tag identifying the authoritative bedside note.
pub const BEDSIDE_TAG: &str = "meta:bedside-note";

/// Topic tag marking a note with detected conflicts.
pub const CONFLICT_TAG: &str = "conflict:detected";

/// Memory kind used for bedside notes.
pub const PLAN_KIND: &str = "plan";

/// Change reason attached to staleness-driven evolve calls.
pub const STALENESS_CHANGE_REASON: &str = "staleness_refresh";

/// Scope a note attaches to, narrowest first.
///
/// Display precedence follows declaration order: chapter notes outrank arc
/// notes outrank project notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemoryScope {
    /// One chapter.
    Chapter,
    /// A story arc spanning chapters.
    Arc,
    /// The whole project.
    Project,
}

impl MemoryScope {
    /// Wire name of the scope.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryScope::Chapter => "chapter",
            MemoryScope::Arc => "arc",
            MemoryScope::Project => "project",
        }
    }
}

/// One detected conflict between a previous and current state of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    /// What the plan said before.
    pub previous: String,
    /// What it says now.
    pub current: String,
    /// How the conflict was (or should be) resolved.
    pub resolution: String,
}

/// Structured payload carried alongside a note's plan text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    /// Detected conflicts, if any were recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictEntry>>,
}

/// A persistent planning memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedsideNote {
    /// Unique note ID.
    pub id: NoteId,
    /// Memory kind (`"plan"` for bedside notes).
    pub kind: String,
    /// Scope level.
    pub scope: MemoryScope,
    /// ID of the project / arc / chapter the note attaches to.
    pub scope_id: String,
    /// Current plan text.
    pub text: String,
    /// Structured payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<StructuredContent>,
    /// Topic tags (`meta:bedside-note`, `conflict:detected`, ...).
    pub topic_tags: Vec<String>,
    /// Relative importance for retrieval ranking.
    pub importance: f64,
    /// When the note was created.
    pub created_at: DateTime<Utc>,
    /// When the note was last evolved, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BedsideNote {
    /// The instant staleness is measured against.
    #[must_use]
    pub fn freshness_instant(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Whether the note carries the conflict tag.
    #[must_use]
    pub fn has_conflict(&self) -> bool {
        self.topic_tags.iter().any(|t| t == CONFLICT_TAG)
    }
}

/// Fields for creating a new note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    /// Memory kind.
    pub kind: String,
    /// Scope level.
    pub scope: MemoryScope,
    /// ID the note attaches to.
    pub scope_id: String,
    /// Initial text.
    pub text: String,
    /// Topic tags.
    pub topic_tags: Vec<String>,
    /// Relative importance.
    pub importance: f64,
}

/// An active writing goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Goal ID.
    pub id: NoteId,
    /// Short goal title.
    pub title: String,
    /// Completion percentage, 0 to 100.
    pub progress_percent: u8,
}

/// Query shape for [`MemoryStore::get_memories`].
///
/// [`MemoryStore::get_memories`]: crate::store::MemoryStore::get_memories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQuery {
    /// Project the memories belong to.
    pub project_id: String,
    /// Restrict to a kind (e.g. `"plan"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Restrict to notes carrying a tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Options attached to an evolve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveOptions {
    /// Why the note is being evolved (e.g. `"staleness_refresh"`).
    pub change_reason: String,
}

/// Inputs the consolidator distills into plan text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDigest {
    /// Latest book-level summary.
    pub summary: String,
    /// Known weaknesses worth tracking.
    pub weaknesses: Vec<String>,
    /// Open plot issues.
    pub plot_issues: Vec<String>,
}

impl AnalysisDigest {
    /// Whether there is nothing to distill.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty() && self.weaknesses.is_empty() && self.plot_issues.is_empty()
    }
}

/// Consolidator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatorConfig {
    /// Age past which a note is refreshed. Default: one hour.
    pub staleness_ms: u64,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            staleness_ms: 3_600_000,
        }
    }
}

/// Outcome of one consolidation pass.
///
/// Guard rejections and missing project IDs land in `errors` as soft
/// errors; store failures are returned as hard errors instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    /// A seed note was created because none existed.
    pub seed_created: bool,
    /// The note was stale and an evolve call went out.
    pub evolved: bool,
    /// The note was fresh; nothing was regenerated.
    pub skipped_fresh: bool,
    /// Soft errors, empty on success.
    pub errors: Vec<String>,
}

impl ConsolidationReport {
    /// Report carrying a single soft error.
    #[must_use]
    pub fn soft_error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}
