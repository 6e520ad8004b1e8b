//! Bottom-up batch processing of dirty chunks.
//!
//! A run walks chapters in registration order: a dirty chapter is
//! re-segmented first (its scene children are rebuilt from the latest
//! structural parse), then dirty scenes are processed, then the chapter
//! aggregate, then the book aggregate, so a parent is never aggregated
//! while a child is still unresolved. Each analyzer call is isolated: a
//! failure marks only that chunk `error` with the captured message and the
//! batch continues.
//!
//! Batches are bounded by `max_batch_size`; whatever stays dirty is picked
//! up by the next scheduled run.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use quill_core::analysis::{AnalyzerSuite, ChunkAnalysis, SceneInfo, StructuralAnalysis};
use quill_core::errors::AnalyzerError;
use quill_core::events::{HookRegistry, ProcessingEvent};
use quill_core::ids::{ChapterId, ChunkId};
use quill_core::text::{truncate_with_suffix, word_count};

use crate::store::{slice_range, ChunkStore};
use crate::types::{Chunk, ChunkStatus};

/// Maximum length of a generated span summary.
const SPAN_SUMMARY_MAX_CHARS: usize = 120;

/// Outcome of one processing batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Chunks that became fresh this batch.
    pub processed: Vec<ChunkId>,
    /// Chunks that errored this batch, with captured messages.
    pub errors: Vec<(ChunkId, String)>,
    /// Chunks still dirty when the batch ended.
    pub remaining_dirty: usize,
}

/// Bottom-up batch processor.
#[derive(Debug, Clone)]
pub struct Scheduler {
    max_batch_size: usize,
}

impl Scheduler {
    /// Create a scheduler with the given batch bound (minimum 1).
    #[must_use]
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Process up to `max_batch_size` dirty chunks, bottom-up.
    pub fn run_batch(
        &self,
        store: &mut ChunkStore,
        analyzers: &dyn AnalyzerSuite,
        hooks: &HookRegistry,
        now: DateTime<Utc>,
    ) -> BatchReport {
        hooks.emit(&ProcessingEvent::ProcessingStart);
        let mut report = BatchReport::default();
        let mut budget = self.max_batch_size;

        'chapters: for chapter_id in store.chapter_order().to_vec() {
            if budget == 0 {
                break;
            }
            let chapter_chunk_id = ChunkStore::chapter_chunk_id(&chapter_id);

            // Re-segment a dirty chapter before touching its scenes, but
            // only when the scene ranges are actually stale; rebuilding on
            // every pass would throw away partial progress from a bounded
            // batch.
            let needs_resegment = store.get(&chapter_chunk_id).is_some_and(|chapter| {
                chapter.is_dirty()
                    && (store.segmentation_stale(&chapter_id)
                        || chapter
                            .analysis
                            .as_ref()
                            .is_none_or(|a| a.structural.is_none()))
            });
            if needs_resegment
                && !self.resegment(store, analyzers, hooks, &mut report, &chapter_id, now)
            {
                budget -= 1;
                continue;
            }

            let child_ids = store
                .get(&chapter_chunk_id)
                .map(|c| c.child_ids.clone())
                .unwrap_or_default();
            for scene_id in &child_ids {
                if budget == 0 {
                    break 'chapters;
                }
                if !store.get(scene_id).is_some_and(Chunk::is_dirty) {
                    continue;
                }
                self.process_scene(store, analyzers, hooks, &mut report, &chapter_id, scene_id, now);
                budget -= 1;
            }

            if budget == 0 {
                break;
            }
            if store.get(&chapter_chunk_id).is_some_and(Chunk::is_dirty)
                && store.children_resolved(&chapter_chunk_id)
            {
                self.aggregate_chapter(store, analyzers, hooks, &mut report, &chapter_id, now);
                budget -= 1;
            }
        }

        if budget > 0 {
            Self::aggregate_book(store, hooks, &mut report, now);
        }

        report.remaining_dirty = store.dirty_count();
        hooks.emit(&ProcessingEvent::QueueChange {
            dirty_count: report.remaining_dirty,
        });
        hooks.emit(&ProcessingEvent::ProcessingEnd);
        debug!(
            processed = report.processed.len(),
            errors = report.errors.len(),
            remaining_dirty = report.remaining_dirty,
            "processing batch finished"
        );
        report
    }

    /// Re-parse structure for a dirty chapter and rebuild its scene
    /// children. Returns `false` if the parse failed (chapter is now
    /// `error`).
    fn resegment(
        &self,
        store: &mut ChunkStore,
        analyzers: &dyn AnalyzerSuite,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        chapter_id: &ChapterId,
        now: DateTime<Utc>,
    ) -> bool {
        let chapter_chunk_id = ChunkStore::chapter_chunk_id(chapter_id);
        let text = store
            .chapter_text(chapter_id)
            .unwrap_or_default()
            .to_owned();

        match analyzers.parse_structure(&text) {
            Ok(structural) => {
                store.rebuild_scenes(chapter_id, &structural.scenes);
                if let Some(chapter) = store.get_mut(&chapter_chunk_id) {
                    let mut analysis = chapter.analysis.take().unwrap_or_default();
                    analysis.structural = Some(structural);
                    chapter.analysis = Some(analysis);
                }
                hooks.emit(&ProcessingEvent::QueueChange {
                    dirty_count: store.dirty_count(),
                });
                true
            }
            Err(err) => {
                Self::fail_chunk(store, hooks, report, &chapter_chunk_id, &err, now);
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_scene(
        &self,
        store: &mut ChunkStore,
        analyzers: &dyn AnalyzerSuite,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        chapter_id: &ChapterId,
        scene_id: &ChunkId,
        now: DateTime<Utc>,
    ) {
        let text = store
            .chapter_text(chapter_id)
            .unwrap_or_default()
            .to_owned();
        let chapter_chunk_id = ChunkStore::chapter_chunk_id(chapter_id);
        let structural = store
            .get(&chapter_chunk_id)
            .and_then(|c| c.analysis.as_ref())
            .and_then(|a| a.structural.clone())
            .unwrap_or_else(empty_structural);

        let Some(chunk) = store.get_mut(scene_id) else {
            return;
        };
        chunk.status = ChunkStatus::Processing;
        let range = chunk.range;
        let scene_info = chunk.scene_info.clone();

        let scene_text = slice_range(&text, &range).to_owned();
        let tension = scene_info
            .as_ref()
            .map_or(0.0, |scene| scene.tension.score());
        let scenes: Vec<SceneInfo> = scene_info.into_iter().collect();

        match analyze_span(
            analyzers,
            &scene_text,
            &structural,
            chapter_id,
            &scenes,
            tension,
        ) {
            Ok(analysis) => {
                Self::finish_chunk(store, hooks, report, scene_id, analysis, now);
            }
            Err(err) => {
                Self::fail_chunk(store, hooks, report, scene_id, &err, now);
            }
        }
    }

    /// Build a dirty chapter's aggregate once its children are resolved.
    ///
    /// Chapters without scene children are analyzed directly as leaves.
    fn aggregate_chapter(
        &self,
        store: &mut ChunkStore,
        analyzers: &dyn AnalyzerSuite,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        chapter_id: &ChapterId,
        now: DateTime<Utc>,
    ) {
        let chapter_chunk_id = ChunkStore::chapter_chunk_id(chapter_id);
        let text = store
            .chapter_text(chapter_id)
            .unwrap_or_default()
            .to_owned();

        let (structural, prev_entities, prev_timeline, has_children) = {
            let Some(chapter) = store.get_mut(&chapter_chunk_id) else {
                return;
            };
            chapter.status = ChunkStatus::Processing;
            let structural = chapter
                .analysis
                .as_ref()
                .and_then(|a| a.structural.clone())
                .unwrap_or_else(empty_structural);
            let prev_entities = chapter.analysis.as_ref().and_then(|a| a.entities.clone());
            let prev_timeline = chapter.analysis.as_ref().and_then(|a| a.timeline.clone());
            (
                structural,
                prev_entities,
                prev_timeline,
                !chapter.child_ids.is_empty(),
            )
        };

        let base = if has_children {
            match store.merge_children(&chapter_chunk_id) {
                Some(merged) => merged,
                None => {
                    // Children regressed to dirty mid-run; try again next batch.
                    if let Some(chapter) = store.get_mut(&chapter_chunk_id) {
                        chapter.status = ChunkStatus::Dirty;
                    }
                    return;
                }
            }
        } else {
            #[allow(clippy::cast_precision_loss)]
            let tension = if structural.scenes.is_empty() {
                0.0
            } else {
                structural.scenes.iter().map(|s| s.tension.score()).sum::<f64>()
                    / structural.scenes.len() as f64
            };
            match analyze_span(analyzers, &text, &structural, chapter_id, &structural.scenes, tension) {
                Ok(analysis) => analysis,
                Err(err) => {
                    Self::fail_chunk(store, hooks, report, &chapter_chunk_id, &err, now);
                    return;
                }
            }
        };

        let delta = match store.last_analyzed_text(chapter_id) {
            Some(old_text) => analyzers.create_delta(
                old_text,
                &text,
                prev_entities.as_ref(),
                prev_timeline.as_ref(),
            ),
            None => analyzers.create_empty_delta(&text),
        };
        let delta = match delta {
            Ok(delta) => delta,
            Err(err) => {
                Self::fail_chunk(store, hooks, report, &chapter_chunk_id, &err, now);
                return;
            }
        };

        let mut analysis = base;
        analysis.structural = Some(structural);
        analysis.delta = Some(delta);
        if analysis.word_count == 0 {
            analysis.word_count = word_count(&text);
        }
        if analysis.summary.is_empty() {
            analysis.summary = truncate_with_suffix(text.trim(), SPAN_SUMMARY_MAX_CHARS, "…");
        }

        store.set_last_analyzed_text(chapter_id, text);
        Self::finish_chunk(store, hooks, report, &chapter_chunk_id, analysis, now);
    }

    /// Rebuild the book aggregate if every chapter is resolved.
    fn aggregate_book(
        store: &mut ChunkStore,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        now: DateTime<Utc>,
    ) {
        let book_id = ChunkStore::book_id();
        if !store.get(&book_id).is_some_and(Chunk::is_dirty) || !store.children_resolved(&book_id) {
            return;
        }
        let analysis = store.merge_children(&book_id).unwrap_or_default();
        Self::finish_chunk(store, hooks, report, &book_id, analysis, now);
    }

    fn finish_chunk(
        store: &mut ChunkStore,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        id: &ChunkId,
        analysis: ChunkAnalysis,
        now: DateTime<Utc>,
    ) {
        if let Some(chunk) = store.get_mut(id) {
            chunk.analysis = Some(analysis);
            chunk.status = ChunkStatus::Fresh;
            chunk.error_message = None;
            chunk.last_processed_at = Some(now);
        }
        report.processed.push(id.clone());
        hooks.emit(&ProcessingEvent::ChunkProcessed {
            chunk_id: id.clone(),
        });
        hooks.emit(&ProcessingEvent::QueueChange {
            dirty_count: store.dirty_count(),
        });
    }

    fn fail_chunk(
        store: &mut ChunkStore,
        hooks: &HookRegistry,
        report: &mut BatchReport,
        id: &ChunkId,
        err: &AnalyzerError,
        now: DateTime<Utc>,
    ) {
        warn!(chunk_id = %id, error = %err, "analyzer failed; chunk marked error");
        if let Some(chunk) = store.get_mut(id) {
            chunk.status = ChunkStatus::Error;
            chunk.error_message = Some(err.to_string());
            chunk.last_processed_at = Some(now);
        }
        report.errors.push((id.clone(), err.to_string()));
        hooks.emit(&ProcessingEvent::Error {
            chunk_id: id.clone(),
            message: err.to_string(),
        });
        hooks.emit(&ProcessingEvent::ChunkProcessed {
            chunk_id: id.clone(),
        });
        hooks.emit(&ProcessingEvent::QueueChange {
            dirty_count: store.dirty_count(),
        });
    }
}

fn empty_structural() -> StructuralAnalysis {
    StructuralAnalysis {
        scenes: Vec::new(),
        paragraph_count: 0,
        dialogue_ratio: 0.0,
    }
}

/// Run the leaf analyzer pipeline over one span of text.
fn analyze_span(
    analyzers: &dyn AnalyzerSuite,
    text: &str,
    structural: &StructuralAnalysis,
    chapter_id: &ChapterId,
    scenes: &[SceneInfo],
    tension: f64,
) -> Result<ChunkAnalysis, AnalyzerError> {
    let entities = analyzers.extract_entities(text, structural, chapter_id)?;
    let timeline = analyzers.build_timeline(text, scenes, chapter_id)?;
    let style = analyzers.analyze_style(text)?;
    let heatmap = analyzers.build_heatmap(text, structural, &entities, &timeline, &style)?;

    Ok(ChunkAnalysis {
        structural: None,
        entities: Some(entities),
        timeline: Some(timeline),
        style: Some(style),
        heatmap: Some(heatmap),
        delta: None,
        summary: truncate_with_suffix(text.trim(), SPAN_SUMMARY_MAX_CHARS, "…"),
        tension_avg: tension,
        word_count: word_count(text),
    })
}
