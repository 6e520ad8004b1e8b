//! # quill-chunks
//!
//! Incremental, hierarchical chunk cache over an ever-changing manuscript.
//!
//! The tree has three levels (book → chapter → scene) and each node tracks
//! its own freshness. Edits flow through a per-chapter debounce buffer
//! ([`EditCoalescer`]) so rapid keystrokes commit once; committed changes
//! mark the affected subtree dirty; the [`Scheduler`] then processes dirty
//! chunks bottom-up in bounded batches, isolating analyzer failures per
//! chunk and rebuilding parent aggregates once children resolve.
//!
//! [`ChunkManager`] is the single owner of all of this state: one instance
//! per active project, passed explicitly by the caller. Time is injected:
//! the host event loop calls [`ChunkManager::tick`] and the manager fires
//! whatever debounce or idle deadlines have come due.

#![deny(unsafe_code)]

pub mod coalescer;
#[cfg(test)]
pub(crate) mod testing;
pub mod manager;
pub mod scheduler;
pub mod store;
pub mod types;

pub use coalescer::EditCoalescer;
pub use manager::ChunkManager;
pub use scheduler::{BatchReport, Scheduler};
pub use store::ChunkStore;
pub use types::{
    Chunk, ChunkLevel, ChunkManagerConfig, ChunkStats, ChunkStatus, ExportedState, PendingEdit,
};
