//! Per-chapter edit coalescing.
//!
//! Rapid edits to one chapter collapse into a single pending edit: the
//! union of every edited range since the last commit, plus the most recent
//! full text. Each new edit pushes the debounce deadline out; only when the
//! deadline passes does the manager commit the buffer and mark the chapter
//! dirty. Intermediate texts between the first and last edit in a window
//! are never hashed or processed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use quill_core::analysis::TextRange;
use quill_core::ids::ChapterId;

use crate::types::PendingEdit;

/// Debounce buffer for in-flight edits, keyed by chapter.
#[derive(Debug)]
pub struct EditCoalescer {
    debounce: Duration,
    pending: HashMap<ChapterId, PendingEdit>,
}

impl EditCoalescer {
    /// Create a coalescer with the given debounce window.
    #[must_use]
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce: Duration::milliseconds(i64::try_from(debounce_ms).unwrap_or(i64::MAX)),
            pending: HashMap::new(),
        }
    }

    /// Record an edit, merging into any pending edit for the chapter.
    ///
    /// Extends the union range to cover `[start, end)`, replaces the
    /// buffered text, and resets the debounce deadline to `now + debounce`.
    pub fn record(
        &mut self,
        chapter_id: &ChapterId,
        new_text: String,
        range_start: usize,
        range_end: usize,
        now: DateTime<Utc>,
    ) {
        let edit_range = TextRange::new(range_start, range_end);
        let deadline = now + self.debounce;

        match self.pending.get_mut(chapter_id) {
            Some(pending) => {
                pending.union_range = pending.union_range.union(&edit_range);
                pending.latest_text = new_text;
                pending.deadline = deadline;
            }
            None => {
                let _ = self.pending.insert(
                    chapter_id.clone(),
                    PendingEdit {
                        union_range: edit_range,
                        latest_text: new_text,
                        deadline,
                    },
                );
            }
        }
    }

    /// Chapters whose debounce deadline has passed, in stable order.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ChapterId> {
        let mut due: Vec<ChapterId> = self
            .pending
            .iter()
            .filter(|(_, edit)| edit.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();
        due
    }

    /// Remove and return the pending edit for a chapter, if any.
    pub fn take(&mut self, chapter_id: &ChapterId) -> Option<PendingEdit> {
        self.pending.remove(chapter_id)
    }

    /// Inspect the pending edit for a chapter.
    #[must_use]
    pub fn pending(&self, chapter_id: &ChapterId) -> Option<&PendingEdit> {
        self.pending.get(chapter_id)
    }

    /// Whether any chapter has an uncommitted edit.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of chapters with uncommitted edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop the pending edit for a chapter without committing it.
    pub fn discard(&mut self, chapter_id: &ChapterId) {
        let _ = self.pending.remove(chapter_id);
    }

    /// Drop all pending edits.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn first_edit_creates_pending() {
        let mut coalescer = EditCoalescer::new(1500);
        let ch = ChapterId::from("ch1");
        coalescer.record(&ch, "text".to_owned(), 0, 4, at(0));

        let pending = coalescer.pending(&ch).unwrap();
        assert_eq!(pending.union_range, TextRange::new(0, 4));
        assert_eq!(pending.latest_text, "text");
        assert_eq!(pending.deadline, at(1500));
    }

    #[test]
    fn union_range_spans_min_start_max_end() {
        let mut coalescer = EditCoalescer::new(1500);
        let ch = ChapterId::from("ch1");
        coalescer.record(&ch, "a".to_owned(), 0, 4, at(0));
        coalescer.record(&ch, "b".to_owned(), 10, 14, at(100));
        coalescer.record(&ch, "c".to_owned(), 15, 19, at(200));

        let pending = coalescer.pending(&ch).unwrap();
        assert_eq!(pending.union_range, TextRange::new(0, 19));
        assert_eq!(pending.latest_text, "c");
    }

    #[test]
    fn each_edit_resets_the_deadline() {
        let mut coalescer = EditCoalescer::new(1500);
        let ch = ChapterId::from("ch1");
        coalescer.record(&ch, "a".to_owned(), 0, 1, at(0));
        coalescer.record(&ch, "b".to_owned(), 0, 1, at(1000));

        assert!(coalescer.due(at(1500)).is_empty());
        assert_eq!(coalescer.due(at(2500)), vec![ch]);
    }

    #[test]
    fn due_is_per_chapter() {
        let mut coalescer = EditCoalescer::new(1000);
        let ch1 = ChapterId::from("ch1");
        let ch2 = ChapterId::from("ch2");
        coalescer.record(&ch1, "a".to_owned(), 0, 1, at(0));
        coalescer.record(&ch2, "b".to_owned(), 0, 1, at(800));

        assert_eq!(coalescer.due(at(1000)), vec![ch1.clone()]);
        let _ = coalescer.take(&ch1);
        assert_eq!(coalescer.due(at(1800)), vec![ch2]);
    }

    #[test]
    fn take_clears_the_buffer() {
        let mut coalescer = EditCoalescer::new(1000);
        let ch = ChapterId::from("ch1");
        coalescer.record(&ch, "a".to_owned(), 2, 5, at(0));

        let taken = coalescer.take(&ch).unwrap();
        assert_eq!(taken.latest_text, "a");
        assert!(!coalescer.has_pending());
        assert!(coalescer.take(&ch).is_none());
    }

    proptest! {
        /// The union range always equals [min(all starts), max(all ends)]
        /// since the last commit, for any edit sequence.
        #[test]
        fn union_range_law(edits in proptest::collection::vec((0usize..500, 0usize..500), 1..20)) {
            let mut coalescer = EditCoalescer::new(1000);
            let ch = ChapterId::from("ch1");
            let mut min_start = usize::MAX;
            let mut max_end = 0usize;

            for (i, (start, end)) in edits.iter().enumerate() {
                let (start, end) = (*start.min(end), *start.max(end));
                min_start = min_start.min(start);
                max_end = max_end.max(end);
                coalescer.record(&ch, format!("text-{i}"), start, end, at(i64::try_from(i).unwrap()));
            }

            let pending = coalescer.pending(&ch).unwrap();
            prop_assert_eq!(pending.union_range, TextRange::new(min_start, max_end));
            prop_assert_eq!(&pending.latest_text, &format!("text-{}", edits.len() - 1));
        }
    }
}
