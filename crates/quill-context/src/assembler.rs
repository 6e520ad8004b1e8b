//! Greedy budget-respecting context assembly.
//!
//! Sections render in fixed priority order. Truncatable sections clip to
//! their sub-budget line by line, marking the cut with an ellipsis;
//! non-truncatable sections are included whole only if they fit the
//! remaining overall budget. A failing data source degrades its section to
//! a placeholder. Every section key lands in exactly one of
//! included/truncated/omitted.

use serde::Serialize;
use tracing::{debug, warn};

use quill_core::analysis::SceneInfo;
use quill_core::text::truncate_with_suffix;

use crate::budget::{select_budget, ContextBudget, QueryType, SectionKey};
use crate::estimator::{HeuristicEstimator, TokenEstimator};
use crate::relevance::{augment_hints, RelevanceHints};
use crate::render::{serialize_sections, ContextFormat, RenderedSection};
use crate::sources::{ContextSources, SECTION_PLACEHOLDER};

/// Marker appended where a section was clipped.
const TRUNCATION_MARKER: &str = "…";

/// Options for one assembly run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Output serialization format.
    pub format: ContextFormat,
    /// Caller-supplied relevance hints.
    pub hints: RelevanceHints,
    /// The scene under the cursor, used to augment the hints.
    pub active_scene: Option<SceneInfo>,
}

/// Request shape for [`ContextBuilder::smart_agent_context`].
#[derive(Debug, Clone, Default)]
pub struct SmartContextRequest {
    /// Conversation length in turns.
    pub conversation_length: usize,
    /// Whether the user has an active text selection.
    pub has_selection: bool,
    /// Whether the request came through voice mode.
    pub is_voice_mode: bool,
    /// Upstream query classification.
    pub query_type: QueryType,
    /// Assembly options.
    pub options: BuildOptions,
}

/// Result of one assembly run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledContext {
    /// Serialized context in the requested format.
    pub context: String,
    /// Estimated tokens of the included content.
    pub token_count: usize,
    /// Budget the assembly ran under.
    pub budget: ContextBudget,
    /// Sections rendered in full.
    pub sections_included: Vec<String>,
    /// Sections clipped to their sub-budget.
    pub sections_truncated: Vec<String>,
    /// Sections left out entirely.
    pub sections_omitted: Vec<String>,
}

/// Assembles bounded context from async data sources.
pub struct ContextBuilder<S> {
    sources: S,
    estimator: Box<dyn TokenEstimator>,
}

impl<S: ContextSources> ContextBuilder<S> {
    /// Create a builder over the given sources with the heuristic estimator.
    #[must_use]
    pub fn new(sources: S) -> Self {
        Self {
            sources,
            estimator: Box::new(HeuristicEstimator),
        }
    }

    /// Swap in a different token estimator. Budget semantics are unchanged.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Box<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Select a budget from request shape, then assemble under it.
    pub async fn smart_agent_context(&self, request: SmartContextRequest) -> AssembledContext {
        let budget = select_budget(
            request.conversation_length,
            request.has_selection,
            request.is_voice_mode,
            request.query_type,
        );
        self.build_adaptive_context(&budget, request.options).await
    }

    /// Assemble context under an explicit budget.
    pub async fn build_adaptive_context(
        &self,
        budget: &ContextBudget,
        options: BuildOptions,
    ) -> AssembledContext {
        let hints = match &options.active_scene {
            Some(scene) => augment_hints(&options.hints, scene),
            None => options.hints.clone(),
        };

        let mut rendered: Vec<RenderedSection> = Vec::new();
        let mut included = Vec::new();
        let mut truncated = Vec::new();
        let mut omitted = Vec::new();
        let mut used_tokens = 0usize;

        for key in SectionKey::ORDER {
            let lines = match self.fetch(key, &hints).await {
                Ok(lines) => lines,
                Err(err) => {
                    warn!(section = %key, error = %err, "section source failed; using placeholder");
                    vec![SECTION_PLACEHOLDER.to_owned()]
                }
            };
            if lines.is_empty() {
                omitted.push(key.as_str().to_owned());
                continue;
            }

            if key.truncatable() {
                let sub_budget = budget.section_tokens(key);
                let (kept, section_tokens, was_clipped) = self.clip_lines(&lines, sub_budget);
                if kept.is_empty() {
                    omitted.push(key.as_str().to_owned());
                    continue;
                }
                used_tokens += section_tokens;
                if was_clipped {
                    truncated.push(key.as_str().to_owned());
                } else {
                    included.push(key.as_str().to_owned());
                }
                rendered.push(RenderedSection { key, lines: kept });
            } else {
                let estimate: usize = lines
                    .iter()
                    .map(|line| self.estimator.estimate(line))
                    .sum();
                let remaining = budget.total_tokens.saturating_sub(used_tokens);
                if estimate <= remaining {
                    used_tokens += estimate;
                    included.push(key.as_str().to_owned());
                    rendered.push(RenderedSection { key, lines });
                } else {
                    omitted.push(key.as_str().to_owned());
                }
            }
        }

        debug!(
            token_count = used_tokens,
            total = budget.total_tokens,
            included = included.len(),
            truncated = truncated.len(),
            omitted = omitted.len(),
            "context assembled"
        );

        AssembledContext {
            context: serialize_sections(&rendered, options.format),
            token_count: used_tokens,
            budget: budget.clone(),
            sections_included: included,
            sections_truncated: truncated,
            sections_omitted: omitted,
        }
    }

    /// Keep lines until the sub-budget is spent; clip the first line if it
    /// alone would overflow. Returns (lines, tokens used, whether clipped).
    fn clip_lines(&self, lines: &[String], sub_budget: usize) -> (Vec<String>, usize, bool) {
        let mut kept = Vec::new();
        let mut used = 0usize;
        let mut clipped = false;

        for line in lines {
            let cost = self.estimator.estimate(line);
            if used + cost <= sub_budget {
                kept.push(line.clone());
                used += cost;
            } else {
                clipped = true;
                break;
            }
        }

        // A section whose very first line overflows still gets a clipped
        // preview rather than vanishing, as long as it has any budget.
        if kept.is_empty() && sub_budget > 0 {
            if let Some(first) = lines.first() {
                let preview = truncate_with_suffix(first, sub_budget * 4, TRUNCATION_MARKER);
                used += self.estimator.estimate(&preview);
                kept.push(preview);
                clipped = true;
            }
        } else if clipped {
            kept.push(TRUNCATION_MARKER.to_owned());
        }

        (kept, used, clipped)
    }

    async fn fetch(
        &self,
        key: SectionKey,
        hints: &RelevanceHints,
    ) -> Result<Vec<String>, quill_core::errors::ContextError> {
        match key {
            SectionKey::Manuscript => self.sources.manuscript(hints).await,
            SectionKey::UserState => self.sources.user_state().await,
            SectionKey::Hud => self.sources.hud().await,
            SectionKey::Insights => self.sources.insights(hints).await,
            SectionKey::Memory => self.sources.memory().await,
            SectionKey::Lore => self.sources.lore(hints).await,
            SectionKey::History => self.sources.history().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use quill_core::analysis::{SceneType, TensionLevel, TextRange};
    use quill_core::errors::ContextError;

    use crate::budget::ContextProfile;

    /// Sources stub returning fixed lines, with per-section failure and
    /// hint capture.
    #[derive(Default)]
    struct StubSources {
        manuscript_lines: Vec<String>,
        fail_insights: bool,
        seen_hints: Mutex<Vec<RelevanceHints>>,
    }

    impl StubSources {
        fn with_manuscript(lines: &[&str]) -> Self {
            Self {
                manuscript_lines: lines.iter().map(|s| (*s).to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    fn lines(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{prefix} line {i}")).collect()
    }

    #[async_trait]
    impl ContextSources for StubSources {
        async fn manuscript(&self, hints: &RelevanceHints) -> Result<Vec<String>, ContextError> {
            self.seen_hints.lock().unwrap().push(hints.clone());
            Ok(self.manuscript_lines.clone())
        }

        async fn user_state(&self) -> Result<Vec<String>, ContextError> {
            Ok(vec!["cursor at ch1:120".to_owned()])
        }

        async fn hud(&self) -> Result<Vec<String>, ContextError> {
            Ok(vec!["3 dirty chunks".to_owned()])
        }

        async fn insights(&self, _hints: &RelevanceHints) -> Result<Vec<String>, ContextError> {
            if self.fail_insights {
                return Err(ContextError::source("insights", "store offline"));
            }
            Ok(lines("insight", 3))
        }

        async fn memory(&self) -> Result<Vec<String>, ContextError> {
            Ok(lines("memory", 2))
        }

        async fn lore(&self, _hints: &RelevanceHints) -> Result<Vec<String>, ContextError> {
            Ok(lines("lore", 2))
        }

        async fn history(&self) -> Result<Vec<String>, ContextError> {
            Ok(lines("history", 4))
        }
    }

    fn all_buckets(result: &AssembledContext) -> Vec<String> {
        let mut all = result.sections_included.clone();
        all.extend(result.sections_truncated.clone());
        all.extend(result.sections_omitted.clone());
        all
    }

    // -- trichotomy --

    #[tokio::test]
    async fn every_section_lands_in_exactly_one_bucket() {
        let builder = ContextBuilder::new(StubSources::with_manuscript(&["one line"]));
        let budget = ContextBudget::with_total(ContextProfile::Full, 16_000);
        let result = builder
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;

        let mut all = all_buckets(&result);
        all.sort();
        let mut expected: Vec<String> = SectionKey::ORDER
            .iter()
            .map(|k| k.as_str().to_owned())
            .collect();
        expected.sort();
        assert_eq!(all, expected);
    }

    // -- budget law --

    #[tokio::test]
    async fn token_count_respects_the_budget_with_slack() {
        let long_lines: Vec<String> = (0..50).map(|i| format!("line {i} {}", "x".repeat(400))).collect();
        let refs: Vec<&str> = long_lines.iter().map(String::as_str).collect();
        let builder = ContextBuilder::new(StubSources::with_manuscript(&refs));

        for total in [0usize, 50, 500, 5_000] {
            let budget = ContextBudget::with_total(ContextProfile::Full, total);
            let result = builder
                .build_adaptive_context(&budget, BuildOptions::default())
                .await;
            assert!(
                result.token_count <= budget.total_tokens + 100,
                "token_count {} over budget {}",
                result.token_count,
                budget.total_tokens
            );
        }
    }

    #[tokio::test]
    async fn zero_budget_omits_everything() {
        let builder = ContextBuilder::new(StubSources::with_manuscript(&["text"]));
        let budget = ContextBudget::with_total(ContextProfile::Full, 0);
        let result = builder
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;
        assert_eq!(result.token_count, 0);
        assert!(result.sections_included.is_empty());
        assert_eq!(result.sections_omitted.len(), SectionKey::ORDER.len());
    }

    // -- truncation --

    #[tokio::test]
    async fn oversized_section_truncates_with_marker() {
        let long_lines: Vec<String> = (0..100).map(|i| format!("manuscript {i} {}", "y".repeat(200))).collect();
        let refs: Vec<&str> = long_lines.iter().map(String::as_str).collect();
        let builder = ContextBuilder::new(StubSources::with_manuscript(&refs));
        let budget = ContextBudget::with_total(ContextProfile::Full, 1_000);
        let result = builder
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;

        assert!(result
            .sections_truncated
            .contains(&"manuscript".to_owned()));
        assert!(result.context.contains(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn first_line_overflow_keeps_a_clipped_preview() {
        let huge = "z".repeat(10_000);
        let builder = ContextBuilder::new(StubSources::with_manuscript(&[huge.as_str()]));
        let budget = ContextBudget::with_total(ContextProfile::Full, 400);
        let result = builder
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;

        assert!(result.sections_truncated.contains(&"manuscript".to_owned()));
        // manuscript fraction of 400 is 100 tokens => ~400 chars kept.
        assert!(result.token_count <= budget.total_tokens + 100);
    }

    // -- failure isolation --

    #[tokio::test]
    async fn failing_source_degrades_to_placeholder() {
        let sources = StubSources {
            manuscript_lines: vec!["fine".to_owned()],
            fail_insights: true,
            ..StubSources::default()
        };
        let builder = ContextBuilder::new(sources);
        let budget = ContextBudget::with_total(ContextProfile::Full, 16_000);
        let result = builder
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;

        assert!(result.context.contains(SECTION_PLACEHOLDER));
        assert!(result.sections_included.contains(&"insights".to_owned()));
    }

    // -- relevance --

    #[tokio::test]
    async fn active_scene_augments_hints_before_sources_run() {
        let sources = StubSources::with_manuscript(&["text"]);
        let builder = ContextBuilder::new(sources);
        let budget = ContextBudget::with_total(ContextProfile::Full, 16_000);
        let options = BuildOptions {
            active_scene: Some(SceneInfo {
                range: TextRange::new(0, 10),
                scene_type: SceneType::Action,
                pov_character: Some("Mara".to_owned()),
                location: None,
                tension: TensionLevel::High,
            }),
            ..BuildOptions::default()
        };
        let _ = builder.build_adaptive_context(&budget, options).await;

        let seen = builder.sources.seen_hints.lock().unwrap();
        let hints = &seen[0];
        assert!(hints.selection_keywords.contains(&"conflict".to_owned()));
        assert!(hints.selection_keywords.contains(&"escalation".to_owned()));
        assert!(hints.active_entity_names.contains(&"Mara".to_owned()));
    }

    // -- smart wrapper --

    #[tokio::test]
    async fn smart_agent_context_selects_profile_and_builds() {
        let builder = ContextBuilder::new(StubSources::with_manuscript(&["text"]));
        let result = builder
            .smart_agent_context(SmartContextRequest {
                is_voice_mode: true,
                ..SmartContextRequest::default()
            })
            .await;
        assert_eq!(result.budget.profile, ContextProfile::Voice);
        assert_eq!(result.budget.total_tokens, ContextProfile::Voice.base_tokens());
    }

    // -- formats --

    #[tokio::test]
    async fn formats_carry_the_same_sections() {
        let sources = || StubSources::with_manuscript(&["alpha", "beta"]);
        let budget = ContextBudget::with_total(ContextProfile::Full, 16_000);

        let md = ContextBuilder::new(sources())
            .build_adaptive_context(&budget, BuildOptions::default())
            .await;
        let json = ContextBuilder::new(sources())
            .build_adaptive_context(
                &budget,
                BuildOptions {
                    format: ContextFormat::Json,
                    ..BuildOptions::default()
                },
            )
            .await;
        let xml = ContextBuilder::new(sources())
            .build_adaptive_context(
                &budget,
                BuildOptions {
                    format: ContextFormat::Xml,
                    ..BuildOptions::default()
                },
            )
            .await;

        assert_eq!(md.sections_included, json.sections_included);
        assert_eq!(md.sections_included, xml.sections_included);
        let parsed: serde_json::Value = serde_json::from_str(&json.context).unwrap();
        assert_eq!(parsed[0]["key"], "manuscript");
        assert!(xml.context.contains("<section id=\"manuscript\">"));
        assert!(md.context.contains("## manuscript"));
    }
}
