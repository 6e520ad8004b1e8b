//! The hierarchical chunk tree.
//!
//! [`ChunkStore`] owns every chunk (book → chapter → scene) plus the raw
//! committed text per chapter. It is mutated only by the manager's commit
//! path and the scheduler's processing path; nothing else touches chunks.

use std::collections::{HashMap, HashSet};

use quill_core::analysis::{ChunkAnalysis, SceneInfo, TextRange};
use quill_core::errors::ChunkError;
use quill_core::ids::{ChapterId, ChunkId};
use quill_core::text::content_hash;

use crate::types::{Chunk, ChunkLevel, ChunkStats, ChunkStatus, ExportedState};

/// ID of the singleton book root chunk.
pub const BOOK_CHUNK_ID: &str = "book";

/// Clamp `idx` to a char boundary at or below itself, within `text`.
fn clamp_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Slice `text` by a byte range from the analyzer, tolerating ranges that
/// run past the end or land inside a multi-byte character.
#[must_use]
pub fn slice_range<'a>(text: &'a str, range: &TextRange) -> &'a str {
    let start = clamp_boundary(text, range.start);
    let end = clamp_boundary(text, range.end).max(start);
    &text[start..end]
}

/// Owned tree of chunks plus committed chapter texts.
#[derive(Debug)]
pub struct ChunkStore {
    chunks: HashMap<ChunkId, Chunk>,
    chapter_order: Vec<ChapterId>,
    chapter_texts: HashMap<ChapterId, String>,
    /// Text each chapter's last delta was computed against.
    last_analyzed_texts: HashMap<ChapterId, String>,
    /// Chapters whose scene ranges predate the current committed text.
    stale_segmentation: HashSet<ChapterId>,
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore {
    /// Create a store holding only the (fresh, empty) book root.
    #[must_use]
    pub fn new() -> Self {
        let mut chunks = HashMap::new();
        let mut book = Chunk::new(
            Self::book_id(),
            ChunkLevel::Book,
            None,
            TextRange::new(0, 0),
            String::new(),
        );
        book.status = ChunkStatus::Fresh;
        let _ = chunks.insert(book.id.clone(), book);

        Self {
            chunks,
            chapter_order: Vec::new(),
            chapter_texts: HashMap::new(),
            last_analyzed_texts: HashMap::new(),
            stale_segmentation: HashSet::new(),
        }
    }

    /// ID of the book root.
    #[must_use]
    pub fn book_id() -> ChunkId {
        ChunkId::from(BOOK_CHUNK_ID)
    }

    /// Chunk ID of a chapter chunk (reuses the chapter ID string).
    #[must_use]
    pub fn chapter_chunk_id(chapter_id: &ChapterId) -> ChunkId {
        ChunkId::from(chapter_id.as_str())
    }

    /// Chunk ID of the `index`-th scene of a chapter.
    #[must_use]
    pub fn scene_chunk_id(chapter_id: &ChapterId, index: usize) -> ChunkId {
        ChunkId::from(format!("{chapter_id}::scene-{index}"))
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register (or re-register) a chapter with its committed text and
    /// initial scene segmentation. The whole subtree starts dirty.
    pub fn register_chapter(&mut self, chapter_id: &ChapterId, text: String, scenes: &[SceneInfo]) {
        if self.chapter_texts.contains_key(chapter_id) {
            self.remove_subtree(chapter_id);
        } else {
            self.chapter_order.push(chapter_id.clone());
        }

        let chapter_chunk_id = Self::chapter_chunk_id(chapter_id);
        let mut chapter = Chunk::new(
            chapter_chunk_id.clone(),
            ChunkLevel::Chapter,
            Some(Self::book_id()),
            TextRange::new(0, text.len()),
            content_hash(&text),
        );
        for (index, scene) in scenes.iter().enumerate() {
            let scene_id = Self::scene_chunk_id(chapter_id, index);
            let mut chunk = Chunk::new(
                scene_id.clone(),
                ChunkLevel::Scene,
                Some(chapter_chunk_id.clone()),
                scene.range,
                content_hash(slice_range(&text, &scene.range)),
            );
            chunk.scene_info = Some(scene.clone());
            chapter.child_ids.push(scene_id.clone());
            let _ = self.chunks.insert(scene_id, chunk);
        }
        let _ = self.chunks.insert(chapter_chunk_id, chapter);
        let _ = self.chapter_texts.insert(chapter_id.clone(), text);
        let _ = self.last_analyzed_texts.remove(chapter_id);
        let _ = self.stale_segmentation.remove(chapter_id);

        self.sync_book_children();
        self.mark_book_dirty();
    }

    /// Remove a chapter's subtree, text, and ordering entry.
    pub fn remove_chapter(&mut self, chapter_id: &ChapterId) -> Result<(), ChunkError> {
        if !self.chapter_texts.contains_key(chapter_id) {
            return Err(ChunkError::UnknownChapter(chapter_id.clone()));
        }
        self.remove_subtree(chapter_id);
        self.chapter_order.retain(|c| c != chapter_id);
        let _ = self.chapter_texts.remove(chapter_id);
        let _ = self.last_analyzed_texts.remove(chapter_id);
        let _ = self.stale_segmentation.remove(chapter_id);
        self.sync_book_children();
        self.mark_book_dirty();
        Ok(())
    }

    fn remove_subtree(&mut self, chapter_id: &ChapterId) {
        let chapter_chunk_id = Self::chapter_chunk_id(chapter_id);
        if let Some(chapter) = self.chunks.remove(&chapter_chunk_id) {
            for child in &chapter.child_ids {
                let _ = self.chunks.remove(child);
            }
        }
    }

    /// Replace a chapter's scene children after re-segmentation. New scenes
    /// start dirty; old scene chunks are dropped.
    pub fn rebuild_scenes(&mut self, chapter_id: &ChapterId, scenes: &[SceneInfo]) {
        let chapter_chunk_id = Self::chapter_chunk_id(chapter_id);
        let Some(text) = self.chapter_texts.get(chapter_id).cloned() else {
            return;
        };
        let Some(chapter) = self.chunks.get_mut(&chapter_chunk_id) else {
            return;
        };

        let old_children = std::mem::take(&mut chapter.child_ids);
        chapter.child_ids = (0..scenes.len())
            .map(|index| Self::scene_chunk_id(chapter_id, index))
            .collect();

        for child in old_children {
            let _ = self.chunks.remove(&child);
        }
        for (index, scene) in scenes.iter().enumerate() {
            let scene_id = Self::scene_chunk_id(chapter_id, index);
            let mut chunk = Chunk::new(
                scene_id.clone(),
                ChunkLevel::Scene,
                Some(chapter_chunk_id.clone()),
                scene.range,
                content_hash(slice_range(&text, &scene.range)),
            );
            chunk.scene_info = Some(scene.clone());
            let _ = self.chunks.insert(scene_id, chunk);
        }
        let _ = self.stale_segmentation.remove(chapter_id);
    }

    /// Whether a chapter's scene ranges predate its committed text.
    #[must_use]
    pub fn segmentation_stale(&self, chapter_id: &ChapterId) -> bool {
        self.stale_segmentation.contains(chapter_id)
    }

    fn sync_book_children(&mut self) {
        let children: Vec<ChunkId> = self
            .chapter_order
            .iter()
            .map(Self::chapter_chunk_id)
            .collect();
        if let Some(book) = self.chunks.get_mut(&Self::book_id()) {
            book.child_ids = children;
        }
    }

    fn mark_book_dirty(&mut self) {
        if let Some(book) = self.chunks.get_mut(&Self::book_id()) {
            book.status = ChunkStatus::Dirty;
        }
    }

    // ── Commit ──────────────────────────────────────────────────────────

    /// Commit a coalesced edit: replace the chapter's text, recompute its
    /// hash, and mark the chapter, its scenes, and the book dirty.
    ///
    /// The hash transition here is the only place a chapter's hash changes,
    /// so it always reflects the last-committed text.
    pub fn commit_text(&mut self, chapter_id: &ChapterId, text: String) -> Result<(), ChunkError> {
        let chapter_chunk_id = Self::chapter_chunk_id(chapter_id);
        if !self.chunks.contains_key(&chapter_chunk_id) {
            return Err(ChunkError::UnknownChapter(chapter_id.clone()));
        }

        let hash = content_hash(&text);
        let range = TextRange::new(0, text.len());
        let _ = self.chapter_texts.insert(chapter_id.clone(), text);

        let child_ids = {
            let chapter = self
                .chunks
                .get_mut(&chapter_chunk_id)
                .expect("checked above");
            chapter.hash = hash;
            chapter.range = range;
            chapter.status = ChunkStatus::Dirty;
            chapter.error_message = None;
            chapter.child_ids.clone()
        };
        // Scene ranges are stale until the next re-segmentation; mark them
        // dirty so no stale aggregate survives.
        for child in child_ids {
            if let Some(scene) = self.chunks.get_mut(&child) {
                scene.status = ChunkStatus::Dirty;
            }
        }
        let _ = self.stale_segmentation.insert(chapter_id.clone());
        self.mark_book_dirty();
        Ok(())
    }

    // ── Access ──────────────────────────────────────────────────────────

    /// Look up a chunk by ID.
    #[must_use]
    pub fn get(&self, id: &ChunkId) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// Look up a chunk mutably by ID.
    pub fn get_mut(&mut self, id: &ChunkId) -> Option<&mut Chunk> {
        self.chunks.get_mut(id)
    }

    /// The chapter chunk for a chapter ID.
    #[must_use]
    pub fn chapter_chunk(&self, chapter_id: &ChapterId) -> Option<&Chunk> {
        self.chunks.get(&Self::chapter_chunk_id(chapter_id))
    }

    /// The committed text for a chapter.
    #[must_use]
    pub fn chapter_text(&self, chapter_id: &ChapterId) -> Option<&str> {
        self.chapter_texts.get(chapter_id).map(String::as_str)
    }

    /// Chapters in registration order.
    #[must_use]
    pub fn chapter_order(&self) -> &[ChapterId] {
        &self.chapter_order
    }

    /// The text a chapter's last delta was computed against.
    #[must_use]
    pub fn last_analyzed_text(&self, chapter_id: &ChapterId) -> Option<&str> {
        self.last_analyzed_texts.get(chapter_id).map(String::as_str)
    }

    /// Record the text a chapter's delta was just computed against.
    pub fn set_last_analyzed_text(&mut self, chapter_id: &ChapterId, text: String) {
        let _ = self.last_analyzed_texts.insert(chapter_id.clone(), text);
    }

    /// Iterate over every chunk, book root included.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Number of chunks with `Dirty` status.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|c| c.status == ChunkStatus::Dirty)
            .count()
    }

    /// Status counts for the stats snapshot.
    #[must_use]
    pub fn stats(&self) -> ChunkStats {
        let mut stats = ChunkStats {
            total: self.chunks.len(),
            chapters: self.chapter_order.len(),
            ..ChunkStats::default()
        };
        for chunk in self.chunks.values() {
            match chunk.status {
                ChunkStatus::Dirty => stats.dirty += 1,
                ChunkStatus::Processing => stats.processing += 1,
                ChunkStatus::Fresh => stats.fresh += 1,
                ChunkStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    /// Mark every ancestor of `id` dirty so stale aggregates get rebuilt.
    pub fn mark_ancestors_dirty(&mut self, id: &ChunkId) {
        let mut current = self.chunks.get(id).and_then(|c| c.parent_id.clone());
        while let Some(parent_id) = current {
            current = self
                .chunks
                .get(&parent_id)
                .and_then(|c| c.parent_id.clone());
            if let Some(parent) = self.chunks.get_mut(&parent_id) {
                parent.status = ChunkStatus::Dirty;
            }
        }
    }

    /// Transition every `Error` chunk back to `Dirty`; returns affected IDs.
    pub fn retry_errors(&mut self) -> Vec<ChunkId> {
        let mut retried = Vec::new();
        for chunk in self.chunks.values_mut() {
            if chunk.status == ChunkStatus::Error {
                chunk.status = ChunkStatus::Dirty;
                chunk.error_message = None;
                retried.push(chunk.id.clone());
            }
        }
        retried.sort();
        retried
    }

    // ── Aggregation ─────────────────────────────────────────────────────

    /// Whether every child of `id` is resolved (fresh or error).
    #[must_use]
    pub fn children_resolved(&self, id: &ChunkId) -> bool {
        self.chunks.get(id).is_some_and(|chunk| {
            chunk
                .child_ids
                .iter()
                .all(|child| self.chunks.get(child).is_some_and(Chunk::is_resolved))
        })
    }

    /// Merge the fresh children of `id` into an aggregate.
    ///
    /// Returns `None` if the chunk is unknown, has no children, or has an
    /// unresolved (dirty/processing) child.
    #[must_use]
    pub fn merge_children(&self, id: &ChunkId) -> Option<ChunkAnalysis> {
        let chunk = self.chunks.get(id)?;
        if chunk.child_ids.is_empty() || !self.children_resolved(id) {
            return None;
        }
        let analyses: Vec<&ChunkAnalysis> = chunk
            .child_ids
            .iter()
            .filter_map(|child| self.chunks.get(child))
            .filter(|child| child.is_fresh())
            .filter_map(|child| child.analysis.as_ref())
            .collect();
        Some(ChunkAnalysis::merge(&analyses))
    }

    // ── Export / load ───────────────────────────────────────────────────

    /// Serialize the full tree, chapter texts, and delta baselines.
    #[must_use]
    pub fn export(&self) -> ExportedState {
        let mut chunks: Vec<Chunk> = self.chunks.values().cloned().collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        let mut stale_segmentation: Vec<ChapterId> =
            self.stale_segmentation.iter().cloned().collect();
        stale_segmentation.sort();
        ExportedState {
            chunks,
            chapter_order: self.chapter_order.clone(),
            chapter_texts: self.chapter_texts.clone(),
            last_analyzed_texts: self.last_analyzed_texts.clone(),
            stale_segmentation,
        }
    }

    /// Restore a store from exported state.
    ///
    /// Hashes and analyses are taken as-is, so the round trip never
    /// reprocesses. Structural references are validated.
    pub fn load(state: ExportedState) -> Result<Self, ChunkError> {
        let mut chunks = HashMap::new();
        for chunk in state.chunks {
            let _ = chunks.insert(chunk.id.clone(), chunk);
        }
        if !chunks.contains_key(&Self::book_id()) {
            return Err(ChunkError::InvalidState("missing book root".to_owned()));
        }
        for chapter_id in &state.chapter_order {
            if !chunks.contains_key(&Self::chapter_chunk_id(chapter_id)) {
                return Err(ChunkError::InvalidState(format!(
                    "chapter {chapter_id} has no chunk"
                )));
            }
            if !state.chapter_texts.contains_key(chapter_id) {
                return Err(ChunkError::InvalidState(format!(
                    "chapter {chapter_id} has no text"
                )));
            }
        }
        for chunk in chunks.values() {
            for child in &chunk.child_ids {
                if !chunks.contains_key(child) {
                    return Err(ChunkError::InvalidState(format!(
                        "chunk {} references missing child {child}",
                        chunk.id
                    )));
                }
            }
        }

        Ok(Self {
            chunks,
            chapter_order: state.chapter_order,
            chapter_texts: state.chapter_texts,
            last_analyzed_texts: state.last_analyzed_texts,
            stale_segmentation: state.stale_segmentation.into_iter().collect(),
        })
    }
}
