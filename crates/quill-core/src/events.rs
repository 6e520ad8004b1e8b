//! Processing events and observer registration.
//!
//! The scheduler reports its progress through a closed tagged union,
//! [`ProcessingEvent`], discriminated by a `kind` field on the wire.
//! Observers implement [`ProcessingHooks`] and register on a
//! [`HookRegistry`]; emission is synchronous and in registration order.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::ChunkId;

/// One scheduler progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProcessingEvent {
    /// A batch is starting.
    ProcessingStart,
    /// One chunk finished processing (fresh or error).
    #[serde(rename_all = "camelCase")]
    ChunkProcessed {
        /// The processed chunk.
        chunk_id: ChunkId,
    },
    /// The batch finished.
    ProcessingEnd,
    /// One chunk's analyzer call failed.
    #[serde(rename_all = "camelCase")]
    Error {
        /// The failed chunk.
        chunk_id: ChunkId,
        /// Captured analyzer message.
        message: String,
    },
    /// The dirty-set size changed.
    #[serde(rename_all = "camelCase")]
    QueueChange {
        /// Number of chunks currently dirty.
        dirty_count: usize,
    },
}

/// Observer of scheduler progress.
pub trait ProcessingHooks: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &ProcessingEvent);
}

/// Registered observers, notified in registration order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn ProcessingHooks>>,
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn register(&mut self, hook: Arc<dyn ProcessingHooks>) {
        self.hooks.push(hook);
    }

    /// Emit an event to every registered observer.
    pub fn emit(&self, event: &ProcessingEvent) {
        for hook in &self.hooks {
            hook.on_event(event);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collector {
        seen: Mutex<Vec<ProcessingEvent>>,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProcessingHooks for Collector {
        fn on_event(&self, event: &ProcessingEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn emit_reaches_all_hooks_in_order() {
        let a = Collector::new();
        let b = Collector::new();
        let mut registry = HookRegistry::new();
        registry.register(a.clone());
        registry.register(b.clone());

        registry.emit(&ProcessingEvent::ProcessingStart);
        registry.emit(&ProcessingEvent::QueueChange { dirty_count: 3 });

        for collector in [&a, &b] {
            let seen = collector.seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[0], ProcessingEvent::ProcessingStart);
        }
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = ProcessingEvent::ChunkProcessed {
            chunk_id: ChunkId::from("ch1::scene-0"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "chunkProcessed");
        assert_eq!(json["chunkId"], "ch1::scene-0");

        let error = ProcessingEvent::Error {
            chunk_id: ChunkId::from("ch1"),
            message: "boom".to_owned(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn events_round_trip() {
        let event = ProcessingEvent::QueueChange { dirty_count: 7 };
        let json = serde_json::to_string(&event).unwrap();
        let back: ProcessingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
