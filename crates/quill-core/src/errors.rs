//! Error hierarchy for the Quill engine.
//!
//! Structured error types built on [`thiserror`]:
//!
//! - [`QuillError`]: top-level enum covering all error domains
//! - [`ChunkError`]: chunk tree and manager lifecycle failures
//! - [`AnalyzerError`]: a single analyzer call failing (isolated per chunk)
//! - [`ContextError`]: context assembly data-source failures
//! - [`MemoryError`]: memory store collaborator failures
//!
//! Analyzer failures never propagate past the chunk they belong to; the
//! scheduler captures them into the chunk's `error_message`. Section source
//! failures degrade to placeholders. Everything else surfaces to the caller.

use thiserror::Error;

use crate::ids::{ChapterId, ChunkId};

/// Top-level error type for the Quill engine.
#[derive(Debug, Error)]
pub enum QuillError {
    /// Chunk tree / manager error.
    #[error("{0}")]
    Chunk(#[from] ChunkError),

    /// Analyzer call failure.
    #[error("{0}")]
    Analyzer(#[from] AnalyzerError),

    /// Context assembly error.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// Memory store error.
    #[error("{0}")]
    Memory(#[from] MemoryError),
}

/// Chunk tree and manager lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The chunk ID is not present in the tree.
    #[error("unknown chunk {0}")]
    UnknownChunk(ChunkId),

    /// The chapter ID was never registered.
    #[error("unknown chapter {0}")]
    UnknownChapter(ChapterId),

    /// Operation attempted after `destroy()`.
    #[error("chunk manager has been destroyed")]
    Destroyed,

    /// Exported state could not be restored.
    #[error("invalid exported state: {0}")]
    InvalidState(String),
}

/// A single analyzer call failing.
///
/// Carries the analyzer name and the captured message; the scheduler stores
/// the message on the affected chunk and continues the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("analyzer `{analyzer}` failed: {message}")]
pub struct AnalyzerError {
    /// Which analyzer failed (e.g. `"parse_structure"`).
    pub analyzer: String,
    /// Captured failure message.
    pub message: String,
}

impl AnalyzerError {
    /// Create a new analyzer error.
    #[must_use]
    pub fn new(analyzer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            analyzer: analyzer.into(),
            message: message.into(),
        }
    }
}

/// Context assembly errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A data source backing one section failed.
    ///
    /// The assembler catches this and renders the section's placeholder.
    #[error("section source `{section}` failed: {message}")]
    SectionSource {
        /// Section key the source backs.
        section: String,
        /// Captured failure message.
        message: String,
    },
}

impl ContextError {
    /// Create a section-source error.
    #[must_use]
    pub fn source(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SectionSource {
            section: section.into(),
            message: message.into(),
        }
    }
}

/// Memory store collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// A store operation failed.
    #[error("memory store `{operation}` failed: {message}")]
    Store {
        /// Store operation name (e.g. `"evolveBedsideNote"`).
        operation: String,
        /// Captured failure message.
        message: String,
    },
}

impl MemoryError {
    /// Create a store-operation error.
    #[must_use]
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
