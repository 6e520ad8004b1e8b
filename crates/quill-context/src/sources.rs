//! Data sources backing context sections.
//!
//! The assembler pulls every section's raw lines through one async trait,
//! keeping it independent of where the data lives. A failing source method
//! degrades that one section to a placeholder; it never aborts assembly.

use async_trait::async_trait;

use quill_core::errors::ContextError;

use crate::relevance::RelevanceHints;

/// Placeholder rendered when a section's data source fails.
pub const SECTION_PLACEHOLDER: &str = "[section unavailable]";

/// Async providers for each context section's content, as lines.
///
/// Hint-taking methods may use the relevance hints to bias what they return;
/// the assembler passes the scene-augmented hints to all of them.
#[async_trait]
pub trait ContextSources: Send + Sync {
    /// Manuscript state around the active chapter.
    async fn manuscript(&self, hints: &RelevanceHints) -> Result<Vec<String>, ContextError>;

    /// Current user and UI state.
    async fn user_state(&self) -> Result<Vec<String>, ContextError>;

    /// Intelligence HUD stats.
    async fn hud(&self) -> Result<Vec<String>, ContextError>;

    /// Analysis insights relevant to the hints.
    async fn insights(&self, hints: &RelevanceHints) -> Result<Vec<String>, ContextError>;

    /// Formatted bedside notes and active goals.
    async fn memory(&self) -> Result<Vec<String>, ContextError>;

    /// Lore bible entries relevant to the hints.
    async fn lore(&self, hints: &RelevanceHints) -> Result<Vec<String>, ContextError>;

    /// Recent activity and conversation history.
    async fn history(&self) -> Result<Vec<String>, ContextError>;
}
