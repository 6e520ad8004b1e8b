//! # quill-core
//!
//! Foundation types, errors, branded IDs, and utilities for the Quill
//! manuscript-analysis engine.
//!
//! This crate provides the shared vocabulary that all other Quill crates
//! depend on:
//!
//! - **Branded IDs**: `ProjectId`, `ChapterId`, `ChunkId`, `NoteId` as
//!   newtypes for type safety
//! - **Analysis artifacts**: the black-box outputs of the external analyzer
//!   suite (structure, entities, timeline, style, heatmap, delta)
//! - **Errors**: `QuillError` hierarchy via `thiserror`
//! - **Processing events**: tagged-union `ProcessingEvent` and the
//!   `ProcessingHooks` observer seam
//! - **Clock**: injected time source so debounce and idle timers are
//!   deterministic under test

#![deny(unsafe_code)]

pub mod analysis;
pub mod clock;
pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod text;

pub use analysis::{AnalyzerSuite, ChunkAnalysis, TextRange};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AnalyzerError, ChunkError, ContextError, MemoryError, QuillError};
pub use events::{HookRegistry, ProcessingEvent, ProcessingHooks};
pub use ids::{ChapterId, ChunkId, NoteId, ProjectId};
