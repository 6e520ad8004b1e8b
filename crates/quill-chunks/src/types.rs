//! Core types for the chunk cache.
//!
//! All serializable types use `camelCase` for wire compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use quill_core::analysis::{ChunkAnalysis, SceneInfo, TextRange};
use quill_core::ids::{ChapterId, ChunkId};

/// Granularity level of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkLevel {
    /// The single root covering the whole manuscript.
    Book,
    /// One registered chapter.
    Chapter,
    /// One segmented scene within a chapter.
    Scene,
}

/// Freshness state of a chunk.
///
/// Transitions: `dirty → processing → fresh | error`; `error → dirty` only
/// via retry; `fresh → dirty` on any edit touching the chunk's range or a
/// descendant's range. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkStatus {
    /// Text changed since the last successful analysis.
    Dirty,
    /// An analyzer call is in flight.
    Processing,
    /// Analysis reflects the committed text.
    Fresh,
    /// The last analyzer call failed; see `error_message`.
    Error,
}

/// One node in the chunk tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique chunk ID.
    pub id: ChunkId,
    /// Granularity level.
    pub level: ChunkLevel,
    /// Parent chunk, absent only on the book root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ChunkId>,
    /// Children in document order.
    pub child_ids: Vec<ChunkId>,
    /// Byte range within the owning chapter's text (chapter chunks span the
    /// whole text; the book root's range is unused).
    pub range: TextRange,
    /// Hash of the text this chunk last committed to, never an in-flight
    /// edit's text.
    pub hash: String,
    /// Freshness state.
    pub status: ChunkStatus,
    /// Captured analyzer message when `status` is `Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Last analysis artifact, if any run has completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ChunkAnalysis>,
    /// Scene segmentation data (scene chunks only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_info: Option<SceneInfo>,
    /// When this chunk last finished processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl Chunk {
    /// Create a dirty chunk with no analysis yet.
    #[must_use]
    pub fn new(
        id: ChunkId,
        level: ChunkLevel,
        parent_id: Option<ChunkId>,
        range: TextRange,
        hash: String,
    ) -> Self {
        Self {
            id,
            level,
            parent_id,
            child_ids: Vec::new(),
            range,
            hash,
            status: ChunkStatus::Dirty,
            error_message: None,
            analysis: None,
            scene_info: None,
            last_processed_at: None,
        }
    }

    /// Whether this chunk is awaiting processing.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.status == ChunkStatus::Dirty
    }

    /// Whether this chunk's analysis reflects its committed text.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.status == ChunkStatus::Fresh
    }

    /// Whether this chunk is resolved (fresh or error), i.e. a parent may
    /// aggregate over it.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, ChunkStatus::Fresh | ChunkStatus::Error)
    }
}

/// A chapter's debounce buffer between the first uncommitted edit and the
/// timer firing.
///
/// Invariants: `union_range` spans `[min(all starts), max(all ends)]` since
/// the last commit, and `latest_text` is the most recent full text supplied.
/// The chapter chunk's hash does not change until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Union of all edit ranges since the last commit.
    pub union_range: TextRange,
    /// Most recent full chapter text supplied.
    pub latest_text: String,
    /// Absolute instant the debounce fires.
    pub deadline: DateTime<Utc>,
}

/// Configuration for a [`ChunkManager`](crate::manager::ChunkManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManagerConfig {
    /// Quiet period after the last edit before a pending edit commits.
    /// Default: 1500 ms.
    pub debounce_ms: u64,
    /// Quiet period after a commit before a processing batch starts.
    /// Default: 2000 ms.
    pub idle_delay_ms: u64,
    /// Maximum chunks processed per batch. Default: 10.
    pub max_batch_size: usize,
}

impl Default for ChunkManagerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            idle_delay_ms: 2000,
            max_batch_size: 10,
        }
    }
}

/// Snapshot counts for the processing HUD.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStats {
    /// Total chunks in the tree.
    pub total: usize,
    /// Chunks awaiting processing.
    pub dirty: usize,
    /// Chunks currently processing.
    pub processing: usize,
    /// Chunks with up-to-date analysis.
    pub fresh: usize,
    /// Chunks whose last analyzer call failed.
    pub error: usize,
    /// Registered chapters.
    pub chapters: usize,
    /// Chapters with an uncommitted pending edit.
    pub pending_edits: usize,
    /// When the last processing batch finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// Serialized chunk tree plus raw chapter texts. Round-trips through
/// export/load with identical hashes; nothing reprocesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedState {
    /// Every chunk in the tree, including the book root.
    pub chunks: Vec<Chunk>,
    /// Chapter registration order.
    pub chapter_order: Vec<ChapterId>,
    /// Raw committed text per chapter.
    pub chapter_texts: HashMap<ChapterId, String>,
    /// Text each chapter's last delta was computed against.
    pub last_analyzed_texts: HashMap<ChapterId, String>,
    /// Chapters whose scene ranges predate their committed text, sorted.
    #[serde(default)]
    pub stale_segmentation: Vec<ChapterId>,
}
