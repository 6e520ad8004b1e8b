//! Prompt formatting for notes and goals.
//!
//! Display order is hierarchical: chapter-scoped notes first, then arc,
//! then project, deduplicated by id. Conflict-tagged notes get a
//! `[CONFLICT ALERT]` block.

use std::collections::HashSet;

use crate::types::{BedsideNote, Goal};

/// Generic conflict message used when no structured conflicts exist.
const GENERIC_CONFLICT_MESSAGE: &str = "conflicting updates detected, review history";

/// Order notes for display: chapter, then arc, then project, dedup by id.
///
/// Within one scope level the incoming order is preserved.
#[must_use]
pub fn order_for_display(notes: &[BedsideNote]) -> Vec<&BedsideNote> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<&BedsideNote> = Vec::new();
    let mut scopes: Vec<_> = notes.iter().map(|n| n.scope).collect();
    scopes.sort();
    scopes.dedup();

    for scope in scopes {
        for note in notes.iter().filter(|n| n.scope == scope) {
            if seen.insert(note.id.as_str()) {
                ordered.push(note);
            }
        }
    }
    ordered
}

/// Render notes into prompt text, hierarchical order, conflicts surfaced.
#[must_use]
pub fn format_memories_for_prompt(notes: &[BedsideNote]) -> String {
    let mut blocks = Vec::new();
    for note in order_for_display(notes) {
        let mut block = format!("[{} note] {}", note.scope.as_str(), note.text.trim());
        if note.has_conflict() {
            block.push('\n');
            block.push_str(&format_conflict_block(note));
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}

fn format_conflict_block(note: &BedsideNote) -> String {
    let mut out = String::from("[CONFLICT ALERT]");
    let conflicts = note
        .structured_content
        .as_ref()
        .and_then(|c| c.conflicts.as_ref());
    match conflicts {
        Some(conflicts) if !conflicts.is_empty() => {
            for conflict in conflicts {
                out.push_str(&format!(
                    "\n- {} -> {}: {}",
                    conflict.previous, conflict.current, conflict.resolution
                ));
            }
        }
        _ => {
            out.push('\n');
            out.push_str(GENERIC_CONFLICT_MESSAGE);
        }
    }
    out
}

/// Render active goals, one line each, with a `[NN%]` progress suffix.
#[must_use]
pub fn format_goals_for_prompt(goals: &[Goal]) -> String {
    goals
        .iter()
        .map(|goal| format!("- {} [{}%]", goal.title, goal.progress_percent))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use quill_core::ids::NoteId;

    use crate::types::{ConflictEntry, MemoryScope, StructuredContent, CONFLICT_TAG, PLAN_KIND};

    fn note(id: &str, scope: MemoryScope, text: &str) -> BedsideNote {
        BedsideNote {
            id: NoteId::from(id),
            kind: PLAN_KIND.to_owned(),
            scope,
            scope_id: "x".to_owned(),
            text: text.to_owned(),
            structured_content: None,
            topic_tags: Vec::new(),
            importance: 1.0,
            created_at: DateTime::UNIX_EPOCH,
            updated_at: None,
        }
    }

    #[test]
    fn chapter_outranks_arc_outranks_project() {
        let notes = vec![
            note("p", MemoryScope::Project, "project plan"),
            note("c", MemoryScope::Chapter, "chapter plan"),
            note("a", MemoryScope::Arc, "arc plan"),
        ];
        let ordered: Vec<&str> = order_for_display(&notes)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ordered, vec!["c", "a", "p"]);
    }

    #[test]
    fn duplicate_ids_appear_once() {
        let notes = vec![
            note("same", MemoryScope::Chapter, "first"),
            note("same", MemoryScope::Project, "second"),
        ];
        assert_eq!(order_for_display(&notes).len(), 1);
    }

    #[test]
    fn structured_conflicts_are_listed() {
        let mut conflicted = note("c", MemoryScope::Project, "plan");
        conflicted.topic_tags.push(CONFLICT_TAG.to_owned());
        conflicted.structured_content = Some(StructuredContent {
            conflicts: Some(vec![ConflictEntry {
                previous: "Mara is an only child".to_owned(),
                current: "Mara has a brother".to_owned(),
                resolution: "brother introduced in ch3".to_owned(),
            }]),
        });

        let text = format_memories_for_prompt(&[conflicted]);
        assert!(text.contains("[CONFLICT ALERT]"));
        assert!(text.contains("Mara is an only child -> Mara has a brother: brother introduced in ch3"));
    }

    #[test]
    fn untagged_note_has_no_conflict_block() {
        let text = format_memories_for_prompt(&[note("n", MemoryScope::Project, "plan")]);
        assert!(!text.contains("[CONFLICT ALERT]"));
    }

    #[test]
    fn tagged_note_without_structure_gets_generic_message() {
        let mut conflicted = note("c", MemoryScope::Arc, "plan");
        conflicted.topic_tags.push(CONFLICT_TAG.to_owned());
        let text = format_memories_for_prompt(&[conflicted]);
        assert!(text.contains("[CONFLICT ALERT]"));
        assert!(text.contains(GENERIC_CONFLICT_MESSAGE));
    }

    #[test]
    fn goals_render_with_percent_suffix() {
        let goals = vec![
            Goal {
                id: NoteId::from("g1"),
                title: "finish act one".to_owned(),
                progress_percent: 40,
            },
            Goal {
                id: NoteId::from("g2"),
                title: "introduce the rival".to_owned(),
                progress_percent: 0,
            },
        ];
        let text = format_goals_for_prompt(&goals);
        assert_eq!(text, "- finish act one [40%]\n- introduce the rival [0%]");
    }
}
