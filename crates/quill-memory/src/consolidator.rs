//! Staleness-driven bedside-note consolidation.
//!
//! Each pass ensures the project has exactly one plan-kind note tagged
//! `meta:bedside-note` (seeding it if absent), then checks its age. A note
//! older than the staleness threshold gets its plan text regenerated from
//! the latest analysis digest and active goals and evolved with
//! `changeReason: "staleness_refresh"`. Fresh notes are left alone.
//!
//! One pass per project at a time: a concurrent call gets a soft-error
//! report, never a second run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use tracing::{debug, info};

use quill_core::clock::Clock;
use quill_core::errors::MemoryError;
use quill_core::ids::ProjectId;

use crate::format::format_goals_for_prompt;
use crate::store::MemoryStore;
use crate::types::{
    AnalysisDigest, BedsideNote, ConsolidationReport, ConsolidatorConfig, EvolveOptions,
    MemoryQuery, MemoryScope, NoteDraft, BEDSIDE_TAG, PLAN_KIND, STALENESS_CHANGE_REASON,
};

/// Soft error returned when a pass is already running for the project.
pub const CONSOLIDATION_IN_PROGRESS: &str = "Consolidation already in progress";

/// Soft error returned when no project id was supplied.
pub const MISSING_PROJECT_ID: &str = "No project id";

/// Seed text for a project's first bedside note.
const SEED_TEXT: &str = "Bedside note initialized; no analysis digested yet.";

/// Maintains one project's bedside note.
pub struct MemoryConsolidator<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: ConsolidatorConfig,
    in_flight: Mutex<HashSet<ProjectId>>,
}

impl<S: MemoryStore> MemoryConsolidator<S> {
    /// Create a consolidator over the given store and clock.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, config: ConsolidatorConfig) -> Self {
        Self {
            store,
            clock,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one consolidation pass.
    ///
    /// Missing project id and re-entrancy come back as soft errors in the
    /// report; store failures are hard errors.
    pub async fn consolidate(
        &self,
        project_id: Option<&ProjectId>,
        digest: &AnalysisDigest,
    ) -> Result<ConsolidationReport, MemoryError> {
        let Some(project_id) = project_id else {
            return Ok(ConsolidationReport::soft_error(MISSING_PROJECT_ID));
        };

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !in_flight.insert(project_id.clone()) {
                debug!(project_id = %project_id, "consolidation already running; rejecting");
                return Ok(ConsolidationReport::soft_error(CONSOLIDATION_IN_PROGRESS));
            }
        }

        let result = self.run_pass(project_id, digest).await;

        let _ = self
            .in_flight
            .lock()
            .expect("in-flight set poisoned")
            .remove(project_id);
        result
    }

    async fn run_pass(
        &self,
        project_id: &ProjectId,
        digest: &AnalysisDigest,
    ) -> Result<ConsolidationReport, MemoryError> {
        let mut report = ConsolidationReport::default();

        let note = match self.find_bedside_note(project_id).await? {
            Some(note) => note,
            None => {
                let note = self.create_seed_note(project_id).await?;
                info!(project_id = %project_id, note_id = %note.id, "seed bedside note created");
                report.seed_created = true;
                note
            }
        };

        let staleness =
            Duration::milliseconds(i64::try_from(self.config.staleness_ms).unwrap_or(i64::MAX));
        let age = self.clock.now() - note.freshness_instant();
        if age <= staleness {
            debug!(project_id = %project_id, age_ms = age.num_milliseconds(), "bedside note fresh; skipping");
            report.skipped_fresh = true;
            return Ok(report);
        }

        let goals = self.store.get_active_goals(project_id).await?;
        let plan_text = generate_plan_text(digest, &format_goals_for_prompt(&goals));
        if plan_text.is_empty() {
            // Nothing to evolve; not an error.
            return Ok(report);
        }

        self.store
            .evolve_bedside_note(
                project_id,
                &plan_text,
                &EvolveOptions {
                    change_reason: STALENESS_CHANGE_REASON.to_owned(),
                },
            )
            .await?;
        info!(project_id = %project_id, "bedside note evolved after staleness refresh");
        report.evolved = true;
        Ok(report)
    }

    async fn find_bedside_note(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<BedsideNote>, MemoryError> {
        let notes = self
            .store
            .get_memories(&MemoryQuery {
                project_id: project_id.as_str().to_owned(),
                kind: Some(PLAN_KIND.to_owned()),
                tag: Some(BEDSIDE_TAG.to_owned()),
            })
            .await?;
        Ok(notes.into_iter().next())
    }

    async fn create_seed_note(&self, project_id: &ProjectId) -> Result<BedsideNote, MemoryError> {
        self.store
            .create_memory(NoteDraft {
                kind: PLAN_KIND.to_owned(),
                scope: MemoryScope::Project,
                scope_id: project_id.as_str().to_owned(),
                text: SEED_TEXT.to_owned(),
                topic_tags: vec![BEDSIDE_TAG.to_owned()],
                importance: 1.0,
            })
            .await
    }
}

impl<S> std::fmt::Debug for MemoryConsolidator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConsolidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Distill the digest and rendered goals into plan text.
///
/// Returns an empty string when there is nothing worth writing down.
#[must_use]
fn generate_plan_text(digest: &AnalysisDigest, goals_text: &str) -> String {
    if digest.is_empty() && goals_text.is_empty() {
        return String::new();
    }
    let mut parts = Vec::new();
    if !digest.summary.trim().is_empty() {
        parts.push(digest.summary.trim().to_owned());
    }
    if !digest.weaknesses.is_empty() {
        parts.push(format!("Weaknesses:\n- {}", digest.weaknesses.join("\n- ")));
    }
    if !digest.plot_issues.is_empty() {
        parts.push(format!("Plot issues:\n- {}", digest.plot_issues.join("\n- ")));
    }
    if !goals_text.is_empty() {
        parts.push(format!("Active goals:\n{goals_text}"));
    }
    parts.join("\n\n")
}
