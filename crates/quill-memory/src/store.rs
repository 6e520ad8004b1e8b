//! The external memory store interface.
//!
//! Persistence lives outside this subsystem; the consolidator and the
//! context layer talk to it through [`MemoryStore`]. The store is assumed
//! to provide last-write-wins semantics per key, and
//! [`MemoryStore::evolve_bedside_note`] must be idempotent: replaying the
//! same plan text with the same change reason leaves the note in the same
//! state, whichever concurrent writer lands last.

use async_trait::async_trait;

use quill_core::errors::MemoryError;
use quill_core::ids::ProjectId;

use crate::format;
use crate::types::{BedsideNote, EvolveOptions, Goal, MemoryQuery, NoteDraft};

/// Options for [`MemoryStore::get_memories_for_context`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextMemoryOptions {
    /// Maximum notes to return.
    pub limit: Option<usize>,
    /// Include conflict-tagged notes.
    pub include_conflicts: bool,
}

/// Async persistence collaborator for planning memories.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Query notes.
    async fn get_memories(&self, query: &MemoryQuery) -> Result<Vec<BedsideNote>, MemoryError>;

    /// Create a note, returning the stored record.
    async fn create_memory(&self, draft: NoteDraft) -> Result<BedsideNote, MemoryError>;

    /// Notes selected for context assembly, most relevant first.
    async fn get_memories_for_context(
        &self,
        project_id: &ProjectId,
        opts: &ContextMemoryOptions,
    ) -> Result<Vec<BedsideNote>, MemoryError>;

    /// Active goals for a project.
    async fn get_active_goals(&self, project_id: &ProjectId) -> Result<Vec<Goal>, MemoryError>;

    /// Replace the bedside note's plan text. Idempotent, last-write-wins.
    async fn evolve_bedside_note(
        &self,
        project_id: &ProjectId,
        plan_text: &str,
        opts: &EvolveOptions,
    ) -> Result<(), MemoryError>;

    /// Bump a memory's importance after it proved useful.
    async fn reinforce_memory(
        &self,
        project_id: &ProjectId,
        note_id: &str,
    ) -> Result<(), MemoryError>;

    /// Run the store's own background consolidation, if it has one.
    async fn run_consolidation(&self, project_id: &ProjectId) -> Result<(), MemoryError>;

    /// Render notes for a prompt. Hierarchical order, conflicts surfaced.
    fn format_memories_for_prompt(&self, notes: &[BedsideNote]) -> String {
        format::format_memories_for_prompt(notes)
    }

    /// Render goals for a prompt, one line each with progress.
    fn format_goals_for_prompt(&self, goals: &[Goal]) -> String {
        format::format_goals_for_prompt(goals)
    }
}
