//! The chunk manager: single owner of one project's chunk state.
//!
//! Call sites hold exactly one [`ChunkManager`] per active project and pass
//! it explicitly; there is no global registry. Time is injected through
//! [`Clock`], and deadlines fire only when the host calls
//! [`ChunkManager::tick`], so behavior is fully deterministic under a
//! manual clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use quill_core::analysis::{AnalyzerSuite, ChunkAnalysis};
use quill_core::clock::Clock;
use quill_core::errors::ChunkError;
use quill_core::events::{HookRegistry, ProcessingEvent, ProcessingHooks};
use quill_core::ids::{ChapterId, ChunkId};

use crate::coalescer::EditCoalescer;
use crate::scheduler::{BatchReport, Scheduler};
use crate::store::ChunkStore;
use crate::types::{Chunk, ChunkManagerConfig, ChunkStats, ChunkStatus, ExportedState};

/// Owner of the chunk tree, debounce buffer, and processing schedule for
/// one project.
pub struct ChunkManager {
    config: ChunkManagerConfig,
    store: ChunkStore,
    coalescer: EditCoalescer,
    scheduler: Scheduler,
    hooks: HookRegistry,
    clock: Arc<dyn Clock>,
    analyzers: Arc<dyn AnalyzerSuite>,
    /// Absolute instant the next idle processing run fires, if scheduled.
    scheduled_run_at: Option<DateTime<Utc>>,
    paused: bool,
    destroyed: bool,
    last_run_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("config", &self.config)
            .field("paused", &self.paused)
            .field("destroyed", &self.destroyed)
            .field("scheduled_run_at", &self.scheduled_run_at)
            .finish_non_exhaustive()
    }
}

impl ChunkManager {
    /// Create a manager with the given config, clock, and analyzer suite.
    #[must_use]
    pub fn new(
        config: ChunkManagerConfig,
        clock: Arc<dyn Clock>,
        analyzers: Arc<dyn AnalyzerSuite>,
    ) -> Self {
        let coalescer = EditCoalescer::new(config.debounce_ms);
        let scheduler = Scheduler::new(config.max_batch_size);
        Self {
            config,
            store: ChunkStore::new(),
            coalescer,
            scheduler,
            hooks: HookRegistry::new(),
            clock,
            analyzers,
            scheduled_run_at: None,
            paused: false,
            destroyed: false,
            last_run_at: None,
        }
    }

    /// Register an observer for processing lifecycle events.
    pub fn register_hooks(&mut self, hooks: Arc<dyn ProcessingHooks>) {
        self.hooks.register(hooks);
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register (or re-register) a chapter with its current text.
    ///
    /// The initial scene segmentation is best-effort: a structural parse
    /// failure leaves the chapter as its own leaf, to be segmented on the
    /// first processing run.
    pub fn register_chapter(&mut self, chapter_id: &ChapterId, text: String) -> Result<(), ChunkError> {
        self.ensure_live()?;
        let scenes = self
            .analyzers
            .parse_structure(&text)
            .map(|s| s.scenes)
            .unwrap_or_default();
        self.store.register_chapter(chapter_id, text, &scenes);
        self.coalescer.discard(chapter_id);
        info!(chapter_id = %chapter_id, scenes = scenes.len(), "chapter registered");
        self.emit_queue_change();
        self.schedule_run();
        Ok(())
    }

    /// Remove a chapter and everything under it.
    pub fn remove_chapter(&mut self, chapter_id: &ChapterId) -> Result<(), ChunkError> {
        self.ensure_live()?;
        self.store.remove_chapter(chapter_id)?;
        self.coalescer.discard(chapter_id);
        self.emit_queue_change();
        self.schedule_run();
        Ok(())
    }

    // ── Edits ───────────────────────────────────────────────────────────

    /// Record an edit to a chapter's text.
    ///
    /// The edit lands in the debounce buffer only; the chunk tree, hashes
    /// included, is untouched until the debounce deadline commits it.
    pub fn handle_edit(
        &mut self,
        chapter_id: &ChapterId,
        new_text: String,
        range_start: usize,
        range_end: usize,
    ) -> Result<(), ChunkError> {
        self.ensure_live()?;
        if self.store.chapter_text(chapter_id).is_none() {
            return Err(ChunkError::UnknownChapter(chapter_id.clone()));
        }
        let now = self.clock.now();
        self.coalescer
            .record(chapter_id, new_text, range_start, range_end, now);
        Ok(())
    }

    /// Fire every deadline that has come due: debounce commits first, then
    /// the idle processing run.
    pub fn tick(&mut self) -> Result<Option<BatchReport>, ChunkError> {
        self.ensure_live()?;
        let now = self.clock.now();

        for chapter_id in self.coalescer.due(now) {
            if let Some(pending) = self.coalescer.take(&chapter_id) {
                self.commit_pending(&chapter_id, pending.latest_text)?;
            }
        }

        if self.paused {
            return Ok(None);
        }
        match self.scheduled_run_at {
            Some(deadline) if deadline <= now => {
                self.scheduled_run_at = None;
                Ok(Some(self.run_batch(now)))
            }
            _ => Ok(None),
        }
    }

    fn commit_pending(&mut self, chapter_id: &ChapterId, text: String) -> Result<(), ChunkError> {
        self.store.commit_text(chapter_id, text)?;
        debug!(chapter_id = %chapter_id, "pending edit committed");
        self.emit_queue_change();
        self.schedule_run();
        Ok(())
    }

    fn schedule_run(&mut self) {
        if self.paused {
            return;
        }
        let idle = Duration::milliseconds(
            i64::try_from(self.config.idle_delay_ms).unwrap_or(i64::MAX),
        );
        self.scheduled_run_at = Some(self.clock.now() + idle);
    }

    fn run_batch(&mut self, now: DateTime<Utc>) -> BatchReport {
        let report =
            self.scheduler
                .run_batch(&mut self.store, self.analyzers.as_ref(), &self.hooks, now);
        self.last_run_at = Some(now);
        if report.remaining_dirty > 0 {
            self.schedule_run();
        }
        report
    }

    // ── Direct processing ───────────────────────────────────────────────

    /// Process every dirty chunk now, ignoring debounce and idle delays.
    ///
    /// Pending (uncommitted) edits stay buffered, so chunk hashes still
    /// reflect the last-committed text afterwards. Works while paused.
    pub fn process_all_dirty(&mut self) -> Result<BatchReport, ChunkError> {
        self.ensure_live()?;
        let now = self.clock.now();
        let mut combined = BatchReport::default();
        loop {
            let report = self.run_batch(now);
            let progressed = !report.processed.is_empty() || !report.errors.is_empty();
            combined.processed.extend(report.processed);
            combined.errors.extend(report.errors);
            combined.remaining_dirty = report.remaining_dirty;
            if combined.remaining_dirty == 0 || !progressed {
                break;
            }
        }
        self.scheduled_run_at = None;
        Ok(combined)
    }

    /// Force one chunk (and its stale ancestors) to reprocess immediately.
    pub fn reprocess_chunk(&mut self, id: &ChunkId) -> Result<BatchReport, ChunkError> {
        self.ensure_live()?;
        {
            let chunk = self
                .store
                .get_mut(id)
                .ok_or_else(|| ChunkError::UnknownChunk(id.clone()))?;
            chunk.status = ChunkStatus::Dirty;
            chunk.error_message = None;
        }
        self.store.mark_ancestors_dirty(id);
        self.emit_queue_change();
        self.process_all_dirty()
    }

    /// Reset every `error` chunk to `dirty` and schedule a run.
    pub fn retry_errors(&mut self) -> Result<Vec<ChunkId>, ChunkError> {
        self.ensure_live()?;
        let retried = self.store.retry_errors();
        for id in &retried {
            self.store.mark_ancestors_dirty(id);
        }
        if !retried.is_empty() {
            info!(count = retried.len(), "error chunks queued for retry");
            self.emit_queue_change();
            self.schedule_run();
        }
        Ok(retried)
    }

    // ── Pause / resume ──────────────────────────────────────────────────

    /// Stop scheduled processing. Edits keep coalescing and committing.
    pub fn pause(&mut self) {
        self.paused = true;
        self.scheduled_run_at = None;
    }

    /// Resume scheduled processing; dirty work is picked up after the idle
    /// delay.
    pub fn resume(&mut self) {
        self.paused = false;
        if self.store.dirty_count() > 0 {
            self.schedule_run();
        }
    }

    /// Whether scheduled processing is currently paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Look up a chunk by ID.
    #[must_use]
    pub fn get_chunk(&self, id: &ChunkId) -> Option<&Chunk> {
        self.store.get(id)
    }

    /// The chapter-level chunk for a chapter.
    #[must_use]
    pub fn get_chapter_chunk(&self, chapter_id: &ChapterId) -> Option<&Chunk> {
        self.store.chapter_chunk(chapter_id)
    }

    /// Every chapter's analysis, in registration order, chapters without a
    /// completed analysis skipped.
    #[must_use]
    pub fn get_all_chapter_analyses(&self) -> Vec<(ChapterId, &ChunkAnalysis)> {
        self.store
            .chapter_order()
            .iter()
            .filter_map(|chapter_id| {
                self.store
                    .chapter_chunk(chapter_id)
                    .and_then(|chunk| chunk.analysis.as_ref())
                    .map(|analysis| (chapter_id.clone(), analysis))
            })
            .collect()
    }

    /// The finest-grained analysis covering a cursor position.
    ///
    /// Resolution: the scene whose range contains `position`, else the
    /// chapter, else `None` when the chapter is unknown.
    #[must_use]
    pub fn get_analysis_at_cursor(
        &self,
        chapter_id: &ChapterId,
        position: usize,
    ) -> Option<&ChunkAnalysis> {
        let chapter = self.store.chapter_chunk(chapter_id)?;
        let scene_hit = chapter
            .child_ids
            .iter()
            .filter_map(|id| self.store.get(id))
            .find(|scene| scene.range.contains(position))
            .and_then(|scene| scene.analysis.as_ref());
        scene_hit.or(chapter.analysis.as_ref())
    }

    /// The aggregate analysis for a chunk.
    ///
    /// Merges the chunk's resolved children on demand; for a leaf, or while
    /// a child is still unresolved, falls back to the chunk's last stored
    /// analysis.
    #[must_use]
    pub fn get_aggregate(&self, id: &ChunkId) -> Option<ChunkAnalysis> {
        self.store
            .merge_children(id)
            .or_else(|| self.store.get(id).and_then(|chunk| chunk.analysis.clone()))
    }

    /// The book aggregate's summary line.
    #[must_use]
    pub fn get_book_summary(&self) -> Option<&str> {
        self.store
            .get(&ChunkStore::book_id())
            .and_then(|book| book.analysis.as_ref())
            .map(|a| a.summary.as_str())
    }

    /// Snapshot counts for the processing HUD.
    #[must_use]
    pub fn get_stats(&self) -> ChunkStats {
        let mut stats = self.store.stats();
        stats.pending_edits = self.coalescer.len();
        stats.last_run_at = self.last_run_at;
        stats
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Serialize the chunk tree and chapter texts.
    ///
    /// Pending (uncommitted) edits are deliberately not exported; an edit
    /// that never committed never happened.
    #[must_use]
    pub fn export_state(&self) -> ExportedState {
        self.store.export()
    }

    /// Restore a previously exported tree. Hashes and analyses round-trip
    /// untouched, so nothing reprocesses.
    pub fn load_state(&mut self, state: ExportedState) -> Result<(), ChunkError> {
        self.ensure_live()?;
        self.store = ChunkStore::load(state)?;
        self.coalescer.clear();
        self.emit_queue_change();
        if self.store.dirty_count() > 0 {
            self.schedule_run();
        }
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Drop every chapter and pending edit, keeping the manager usable.
    pub fn clear(&mut self) -> Result<(), ChunkError> {
        self.ensure_live()?;
        self.store = ChunkStore::new();
        self.coalescer.clear();
        self.scheduled_run_at = None;
        self.emit_queue_change();
        Ok(())
    }

    /// Tear the manager down. Every later operation fails with
    /// [`ChunkError::Destroyed`].
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.coalescer.clear();
        self.scheduled_run_at = None;
    }

    fn ensure_live(&self) -> Result<(), ChunkError> {
        if self.destroyed {
            return Err(ChunkError::Destroyed);
        }
        Ok(())
    }

    fn emit_queue_change(&self) {
        self.hooks.emit(&ProcessingEvent::QueueChange {
            dirty_count: self.store.dirty_count(),
        });
    }
}
