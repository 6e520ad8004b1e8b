//! Shared test doubles for the chunk subsystem.

use std::sync::Mutex;

use quill_core::analysis::{
    AnalyzerSuite, Delta, Entity, EntityGraph, HeatSpan, RiskHeatmap, SceneInfo, SceneType,
    StructuralAnalysis, StyleReport, TensionLevel, TextRange, Timeline, TimelineEvent,
};
use quill_core::errors::AnalyzerError;
use quill_core::events::{ProcessingEvent, ProcessingHooks};
use quill_core::ids::ChapterId;
use quill_core::text::truncate_with_suffix;

/// Deterministic analyzer stub.
///
/// Scenes are paragraphs (split on blank lines); a paragraph containing `!`
/// is high tension. `fail_entities_containing` makes `extract_entities`
/// fail for any text containing the given needle, which lets tests exercise
/// per-chunk error isolation.
#[derive(Default)]
pub(crate) struct StubAnalyzers {
    pub fail_entities_containing: Mutex<Option<String>>,
}

impl StubAnalyzers {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_entities_containing: Mutex::new(Some(needle.to_owned())),
        }
    }

    pub fn set_failure(&self, needle: Option<&str>) {
        *self.fail_entities_containing.lock().unwrap() = needle.map(str::to_owned);
    }
}

impl AnalyzerSuite for StubAnalyzers {
    fn parse_structure(&self, text: &str) -> Result<StructuralAnalysis, AnalyzerError> {
        let mut scenes = Vec::new();
        let mut offset = 0;
        for part in text.split("\n\n") {
            if !part.trim().is_empty() {
                scenes.push(SceneInfo {
                    range: TextRange::new(offset, offset + part.len()),
                    scene_type: if part.contains('"') {
                        SceneType::Dialogue
                    } else {
                        SceneType::Action
                    },
                    pov_character: None,
                    location: None,
                    tension: if part.contains('!') {
                        TensionLevel::High
                    } else {
                        TensionLevel::Medium
                    },
                });
            }
            offset += part.len() + 2;
        }
        Ok(StructuralAnalysis {
            scenes,
            paragraph_count: text.split("\n\n").count(),
            dialogue_ratio: 0.25,
        })
    }

    fn extract_entities(
        &self,
        text: &str,
        _structural: &StructuralAnalysis,
        _chapter_id: &ChapterId,
    ) -> Result<EntityGraph, AnalyzerError> {
        if let Some(needle) = self.fail_entities_containing.lock().unwrap().as_deref() {
            if text.contains(needle) {
                return Err(AnalyzerError::new("extract_entities", "stub failure"));
            }
        }
        let mut entities: Vec<Entity> = Vec::new();
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.chars().next().is_some_and(char::is_uppercase) {
                match entities.iter_mut().find(|e| e.name == word) {
                    Some(existing) => existing.mentions += 1,
                    None => entities.push(Entity {
                        name: word.to_owned(),
                        kind: "character".to_owned(),
                        mentions: 1,
                    }),
                }
            }
        }
        Ok(EntityGraph {
            entities,
            relations: Vec::new(),
        })
    }

    fn build_timeline(
        &self,
        text: &str,
        _scenes: &[SceneInfo],
        _chapter_id: &ChapterId,
    ) -> Result<Timeline, AnalyzerError> {
        Ok(Timeline {
            events: vec![TimelineEvent {
                at: "beat".to_owned(),
                description: truncate_with_suffix(text.trim(), 24, "…"),
            }],
        })
    }

    fn analyze_style(&self, _text: &str) -> Result<StyleReport, AnalyzerError> {
        Ok(StyleReport {
            avg_sentence_length: 12.0,
            adverb_density: 2.0,
            passive_ratio: 0.1,
        })
    }

    fn build_heatmap(
        &self,
        text: &str,
        _structural: &StructuralAnalysis,
        _entities: &EntityGraph,
        _timeline: &Timeline,
        _style: &StyleReport,
    ) -> Result<RiskHeatmap, AnalyzerError> {
        let spans = if text.contains("rushed") {
            vec![HeatSpan {
                range: TextRange::new(0, text.len()),
                risk: 0.8,
                label: "pacing".to_owned(),
            }]
        } else {
            Vec::new()
        };
        Ok(RiskHeatmap { spans })
    }

    fn create_delta(
        &self,
        old_text: &str,
        new_text: &str,
        _prev_entities: Option<&EntityGraph>,
        _prev_timeline: Option<&Timeline>,
    ) -> Result<Delta, AnalyzerError> {
        Ok(Delta {
            summary: format!("{} -> {} bytes", old_text.len(), new_text.len()),
            added_entities: Vec::new(),
            removed_entities: Vec::new(),
        })
    }

    fn create_empty_delta(&self, _text: &str) -> Result<Delta, AnalyzerError> {
        Ok(Delta {
            summary: "initial".to_owned(),
            added_entities: Vec::new(),
            removed_entities: Vec::new(),
        })
    }
}

/// Hook that records every emitted event.
#[derive(Default)]
pub(crate) struct CollectingHooks {
    pub events: Mutex<Vec<ProcessingEvent>>,
}

impl CollectingHooks {
    pub fn count(&self, predicate: impl Fn(&ProcessingEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl ProcessingHooks for CollectingHooks {
    fn on_event(&self, event: &ProcessingEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
