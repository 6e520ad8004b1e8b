//! # quill-context
//!
//! Token-budget allocation and context assembly.
//!
//! The assembly pipeline has three stages:
//!
//! 1. **Profile selection**: request shape (voice mode, selection, query
//!    type) picks one of four profiles with fixed precedence.
//! 2. **Budget derivation**: the profile's total-token ceiling and
//!    per-section fractions, optionally bounded by a model's context window
//!    via [`ModelRegistry`].
//! 3. **Assembly**: [`ContextBuilder`] renders prioritized sections from
//!    async [`ContextSources`], clipping or omitting to stay inside the
//!    budget, then serializes to markdown, JSON, or XML.
//!
//! Token costs come from a swappable [`TokenEstimator`]; the default is a
//! cheap `len / 4` heuristic.

#![deny(unsafe_code)]

pub mod assembler;
pub mod budget;
pub mod estimator;
pub mod relevance;
pub mod render;
pub mod sources;

pub use assembler::{AssembledContext, BuildOptions, ContextBuilder, SmartContextRequest};
pub use budget::{
    context_budget_for_model, select_budget, select_context_profile, BudgetOptions, ContextBudget,
    ContextProfile, ModelRegistry, QueryType, SectionKey, DEFAULT_MODEL_CEILING,
};
pub use estimator::{HeuristicEstimator, TokenEstimator};
pub use relevance::{augment_hints, RelevanceHints};
pub use render::{ContextFormat, RenderedSection};
pub use sources::{ContextSources, SECTION_PLACEHOLDER};
