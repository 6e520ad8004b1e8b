//! # quill-memory
//!
//! Bedside-note planning memory.
//!
//! A bedside note is the agent's persistent, periodically-refreshed plan for
//! a project. [`MemoryConsolidator`] keeps it alive: it seeds the note on
//! first contact, refreshes it when stale through the external
//! [`MemoryStore`], and guards against concurrent passes. Prompt rendering
//! (hierarchical scope ordering, `[CONFLICT ALERT]` blocks, goal progress)
//! lives in [`format`].

#![deny(unsafe_code)]

pub mod consolidator;
pub mod format;
pub mod store;
pub mod types;

pub use consolidator::{MemoryConsolidator, CONSOLIDATION_IN_PROGRESS, MISSING_PROJECT_ID};
pub use format::{format_goals_for_prompt, format_memories_for_prompt, order_for_display};
pub use store::{ContextMemoryOptions, MemoryStore};
pub use types::{
    AnalysisDigest, BedsideNote, ConflictEntry, ConsolidationReport, ConsolidatorConfig,
    EvolveOptions, Goal, MemoryQuery, MemoryScope, NoteDraft, StructuredContent, BEDSIDE_TAG,
    CONFLICT_TAG, PLAN_KIND, STALENESS_CHANGE_REASON,
};
