//! Analysis artifact types and the external analyzer seam.
//!
//! The NLP heuristics live outside this workspace, consumed as pure
//! `text → artifact` transforms behind [`AnalyzerSuite`]. [`ChunkAnalysis`]
//! is the per-node bundle the chunk tree stores, with the merge law that
//! aggregates children into parents.

use serde::{Deserialize, Serialize};

use crate::errors::AnalyzerError;
use crate::ids::ChapterId;

// =============================================================================
// Ranges
// =============================================================================

/// A half-open byte range `[start, end)` into a chapter's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl TextRange {
    /// Create a range, normalizing `end >= start`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Whether `position` falls inside the range.
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// The smallest range covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// =============================================================================
// Structural analysis
// =============================================================================

/// Narrative tension level of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TensionLevel {
    /// Calm, low-stakes passage.
    Low,
    /// Building or mixed tension.
    Medium,
    /// Peak conflict or crisis.
    High,
}

impl TensionLevel {
    /// Numeric score used for averaging (low=0.25, medium=0.5, high=1.0).
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 1.0,
        }
    }
}

/// Coarse classification of a scene's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneType {
    /// Physical action or confrontation.
    Action,
    /// Conversation-driven scene.
    Dialogue,
    /// Interior monologue / reflection.
    Introspection,
    /// Scene set earlier than the narrative present.
    Flashback,
    /// Connective travel or time-skip material.
    Transition,
    /// World or backstory explanation.
    Exposition,
}

/// One segmented scene within a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInfo {
    /// Byte range of the scene within the chapter text.
    pub range: TextRange,
    /// Scene mode classification.
    pub scene_type: SceneType,
    /// Point-of-view character, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pov_character: Option<String>,
    /// Scene location, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Narrative tension level.
    pub tension: TensionLevel,
}

/// Output of the structural parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralAnalysis {
    /// Segmented scenes in document order.
    pub scenes: Vec<SceneInfo>,
    /// Number of paragraphs.
    pub paragraph_count: usize,
    /// Fraction of text inside dialogue (0.0–1.0).
    pub dialogue_ratio: f64,
}

// =============================================================================
// Entities, timeline, style, heatmap, delta
// =============================================================================

/// A named entity detected in the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Canonical name.
    pub name: String,
    /// Entity kind (character, place, object, ...).
    pub kind: String,
    /// Mention count within the analyzed span.
    pub mentions: u32,
}

/// A typed relation between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Relation label.
    pub label: String,
}

/// Entity graph for a span of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityGraph {
    /// Detected entities.
    pub entities: Vec<Entity>,
    /// Relations between them.
    pub relations: Vec<EntityRelation>,
}

/// One event on the narrative timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Position label (e.g. "day 3", "that evening").
    pub at: String,
    /// What happens.
    pub description: String,
}

/// Narrative timeline for a span of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Events in narrative order.
    pub events: Vec<TimelineEvent>,
}

/// Prose style metrics for a span of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleReport {
    /// Mean sentence length in words.
    pub avg_sentence_length: f64,
    /// Adverbs per hundred words.
    pub adverb_density: f64,
    /// Fraction of sentences in passive voice.
    pub passive_ratio: f64,
}

/// A span flagged by the risk heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatSpan {
    /// Flagged byte range.
    pub range: TextRange,
    /// Risk score (0.0–1.0).
    pub risk: f64,
    /// Short human-readable label.
    pub label: String,
}

/// Risk heatmap over a span of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskHeatmap {
    /// Flagged spans, highest risk first.
    pub spans: Vec<HeatSpan>,
}

/// Structured description of what changed between two analysis passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// One-line change summary.
    pub summary: String,
    /// Entity names present now but not before.
    pub added_entities: Vec<String>,
    /// Entity names present before but not now.
    pub removed_entities: Vec<String>,
}

// =============================================================================
// Per-chunk analysis bundle
// =============================================================================

/// Maximum length of a merged aggregate summary.
const MERGED_SUMMARY_MAX_CHARS: usize = 280;

/// The analysis artifact stored on one chunk.
///
/// Leaves carry the full per-scene artifacts; parents carry the merged
/// aggregate produced by [`ChunkAnalysis::merge`] plus any chapter-level
/// artifacts (structural parse, delta) the scheduler attaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAnalysis {
    /// Structural parse (chapter-level only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural: Option<StructuralAnalysis>,
    /// Entity graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityGraph>,
    /// Narrative timeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    /// Style metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleReport>,
    /// Risk heatmap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<RiskHeatmap>,
    /// Change delta against the previous committed text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    /// Short prose summary of the analyzed span.
    pub summary: String,
    /// Average tension score (0.0–1.0).
    pub tension_avg: f64,
    /// Word count of the analyzed span.
    pub word_count: usize,
}

impl ChunkAnalysis {
    /// Merge child analyses into a parent aggregate.
    ///
    /// The merge law: tension is averaged, entity graphs are unioned
    /// (deduplicated by name, mention counts summed), timelines are
    /// concatenated in child order, style metrics are averaged, and word
    /// counts are summed. Chapter-level artifacts (structural, heatmap,
    /// delta) are left unset; the caller attaches its own.
    #[must_use]
    pub fn merge(children: &[&ChunkAnalysis]) -> Self {
        if children.is_empty() {
            return Self::default();
        }

        let mut entities: Vec<Entity> = Vec::new();
        let mut relations: Vec<EntityRelation> = Vec::new();
        let mut events: Vec<TimelineEvent> = Vec::new();
        let mut summaries: Vec<&str> = Vec::new();
        let mut tension_sum = 0.0;
        let mut word_count = 0;

        let mut style_sum = (0.0_f64, 0.0_f64, 0.0_f64);
        let mut style_count = 0_usize;

        for child in children {
            if let Some(graph) = &child.entities {
                for entity in &graph.entities {
                    match entities.iter_mut().find(|e| e.name == entity.name) {
                        Some(existing) => existing.mentions += entity.mentions,
                        None => entities.push(entity.clone()),
                    }
                }
                for relation in &graph.relations {
                    if !relations.contains(relation) {
                        relations.push(relation.clone());
                    }
                }
            }
            if let Some(timeline) = &child.timeline {
                events.extend(timeline.events.iter().cloned());
            }
            if let Some(style) = &child.style {
                style_sum.0 += style.avg_sentence_length;
                style_sum.1 += style.adverb_density;
                style_sum.2 += style.passive_ratio;
                style_count += 1;
            }
            if !child.summary.is_empty() {
                summaries.push(&child.summary);
            }
            tension_sum += child.tension_avg;
            word_count += child.word_count;
        }

        #[allow(clippy::cast_precision_loss)]
        let tension_avg = tension_sum / children.len() as f64;

        #[allow(clippy::cast_precision_loss)]
        let style = (style_count > 0).then(|| StyleReport {
            avg_sentence_length: style_sum.0 / style_count as f64,
            adverb_density: style_sum.1 / style_count as f64,
            passive_ratio: style_sum.2 / style_count as f64,
        });

        let summary = crate::text::truncate_with_suffix(
            &summaries.join(" / "),
            MERGED_SUMMARY_MAX_CHARS,
            "…",
        );

        Self {
            structural: None,
            entities: Some(EntityGraph {
                entities,
                relations,
            }),
            timeline: Some(Timeline { events }),
            style,
            heatmap: None,
            delta: None,
            summary,
            tension_avg,
            word_count,
        }
    }
}

// =============================================================================
// Analyzer suite (external interface)
// =============================================================================

/// The external NLP analyzer suite, consumed as pure black-box transforms.
///
/// Implementations must be stateless: the scheduler may call any method any
/// number of times and in any order between commits. A failing call marks
/// only the chunk being processed as `error`; it never aborts a batch.
pub trait AnalyzerSuite: Send + Sync {
    /// Segment chapter text into scenes and structural metrics.
    fn parse_structure(&self, text: &str) -> Result<StructuralAnalysis, AnalyzerError>;

    /// Extract the entity graph for a span of text.
    fn extract_entities(
        &self,
        text: &str,
        structural: &StructuralAnalysis,
        chapter_id: &ChapterId,
    ) -> Result<EntityGraph, AnalyzerError>;

    /// Build the narrative timeline for a span of text.
    fn build_timeline(
        &self,
        text: &str,
        scenes: &[SceneInfo],
        chapter_id: &ChapterId,
    ) -> Result<Timeline, AnalyzerError>;

    /// Compute prose style metrics.
    fn analyze_style(&self, text: &str) -> Result<StyleReport, AnalyzerError>;

    /// Combine artifacts into a risk heatmap.
    fn build_heatmap(
        &self,
        text: &str,
        structural: &StructuralAnalysis,
        entities: &EntityGraph,
        timeline: &Timeline,
        style: &StyleReport,
    ) -> Result<RiskHeatmap, AnalyzerError>;

    /// Describe what changed between the previous and current committed text.
    fn create_delta(
        &self,
        old_text: &str,
        new_text: &str,
        prev_entities: Option<&EntityGraph>,
        prev_timeline: Option<&Timeline>,
    ) -> Result<Delta, AnalyzerError>;

    /// Delta for a chapter with no previous committed text.
    fn create_empty_delta(&self, text: &str) -> Result<Delta, AnalyzerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, tension: f64, words: usize) -> ChunkAnalysis {
        ChunkAnalysis {
            entities: Some(EntityGraph {
                entities: vec![Entity {
                    name: name.to_owned(),
                    kind: "character".to_owned(),
                    mentions: 2,
                }],
                relations: Vec::new(),
            }),
            timeline: Some(Timeline {
                events: vec![TimelineEvent {
                    at: "now".to_owned(),
                    description: format!("{name} acts"),
                }],
            }),
            style: Some(StyleReport {
                avg_sentence_length: 12.0,
                adverb_density: 2.0,
                passive_ratio: 0.1,
            }),
            summary: format!("{name} scene"),
            tension_avg: tension,
            word_count: words,
            ..ChunkAnalysis::default()
        }
    }

    // -- TextRange --

    #[test]
    fn range_contains_is_half_open() {
        let r = TextRange::new(5, 10);
        assert!(r.contains(5));
        assert!(r.contains(9));
        assert!(!r.contains(10));
        assert!(!r.contains(4));
    }

    #[test]
    fn range_union_covers_both() {
        let a = TextRange::new(0, 4);
        let b = TextRange::new(15, 19);
        assert_eq!(a.union(&b), TextRange::new(0, 19));
        assert_eq!(b.union(&a), TextRange::new(0, 19));
    }

    #[test]
    fn range_normalizes_inverted_bounds() {
        let r = TextRange::new(10, 3);
        assert!(r.is_empty());
    }

    // -- merge --

    #[test]
    fn merge_empty_is_default() {
        assert_eq!(ChunkAnalysis::merge(&[]), ChunkAnalysis::default());
    }

    #[test]
    fn merge_averages_tension_and_sums_words() {
        let a = leaf("Mara", 1.0, 100);
        let b = leaf("Okonkwo", 0.5, 300);
        let merged = ChunkAnalysis::merge(&[&a, &b]);
        assert!((merged.tension_avg - 0.75).abs() < f64::EPSILON);
        assert_eq!(merged.word_count, 400);
    }

    #[test]
    fn merge_unions_entities_by_name() {
        let a = leaf("Mara", 0.5, 10);
        let b = leaf("Mara", 0.5, 10);
        let merged = ChunkAnalysis::merge(&[&a, &b]);
        let graph = merged.entities.unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.entities[0].mentions, 4);
    }

    #[test]
    fn merge_concatenates_timelines_in_order() {
        let a = leaf("Mara", 0.5, 10);
        let b = leaf("Okonkwo", 0.5, 10);
        let merged = ChunkAnalysis::merge(&[&a, &b]);
        let timeline = merged.timeline.unwrap();
        assert_eq!(timeline.events.len(), 2);
        assert!(timeline.events[0].description.contains("Mara"));
        assert!(timeline.events[1].description.contains("Okonkwo"));
    }

    #[test]
    fn merge_averages_style() {
        let a = leaf("Mara", 0.5, 10);
        let mut b = leaf("Okonkwo", 0.5, 10);
        b.style = Some(StyleReport {
            avg_sentence_length: 20.0,
            adverb_density: 4.0,
            passive_ratio: 0.3,
        });
        let merged = ChunkAnalysis::merge(&[&a, &b]);
        let style = merged.style.unwrap();
        assert!((style.avg_sentence_length - 16.0).abs() < f64::EPSILON);
        assert!((style.adverb_density - 3.0).abs() < f64::EPSILON);
        assert!((style.passive_ratio - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn merge_leaves_chapter_artifacts_unset() {
        let a = leaf("Mara", 0.5, 10);
        let merged = ChunkAnalysis::merge(&[&a]);
        assert!(merged.structural.is_none());
        assert!(merged.heatmap.is_none());
        assert!(merged.delta.is_none());
    }

    // -- serde --

    #[test]
    fn scene_info_serializes_camel_case() {
        let scene = SceneInfo {
            range: TextRange::new(0, 10),
            scene_type: SceneType::Introspection,
            pov_character: Some("Mara".to_owned()),
            location: None,
            tension: TensionLevel::High,
        };
        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["sceneType"], "introspection");
        assert_eq!(json["povCharacter"], "Mara");
        assert_eq!(json["tension"], "high");
        assert!(json.get("location").is_none());
    }
}
