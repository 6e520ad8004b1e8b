//! Scene-aware relevance hints.
//!
//! The assembler carries caller-supplied hints (active entities, selection
//! keywords, active chapter) into every data source. When the caller also
//! knows the scene under the cursor, [`augment_hints`] folds the scene's
//! type, POV character, location, and tension into those hints so sources
//! can bias retrieval without re-deriving any of it.

use serde::{Deserialize, Serialize};

use quill_core::analysis::{SceneInfo, SceneType, TensionLevel};
use quill_core::ids::ChapterId;

/// Keywords added when the active scene is high tension.
const ESCALATION_KEYWORDS: [&str; 3] = ["escalation", "danger", "urgency"];

/// Caller-supplied relevance hints for context assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevanceHints {
    /// Entity names currently in focus.
    pub active_entity_names: Vec<String>,
    /// Keywords derived from the user's selection or query.
    pub selection_keywords: Vec<String>,
    /// The chapter under the cursor, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_chapter_id: Option<ChapterId>,
}

impl RelevanceHints {
    fn push_entity(&mut self, name: &str) {
        if !self.active_entity_names.iter().any(|n| n == name) {
            self.active_entity_names.push(name.to_owned());
        }
    }

    fn push_keyword(&mut self, keyword: &str) {
        if !self.selection_keywords.iter().any(|k| k == keyword) {
            self.selection_keywords.push(keyword.to_owned());
        }
    }
}

/// Fixed keyword contribution of a scene type.
#[must_use]
fn scene_type_keywords(scene_type: SceneType) -> &'static [&'static str] {
    match scene_type {
        SceneType::Action => &["conflict", "stakes", "momentum"],
        SceneType::Dialogue => &["voice", "subtext", "relationships"],
        SceneType::Introspection => &["motivation", "interiority", "theme"],
        SceneType::Flashback => &["backstory", "continuity", "timeline"],
        SceneType::Transition => &["pacing", "continuity"],
        SceneType::Exposition => &["worldbuilding", "clarity"],
    }
}

/// Fold a scene's properties into the hints, deduplicating as it goes.
#[must_use]
pub fn augment_hints(hints: &RelevanceHints, scene: &SceneInfo) -> RelevanceHints {
    let mut out = hints.clone();
    for keyword in scene_type_keywords(scene.scene_type) {
        out.push_keyword(keyword);
    }
    if scene.tension == TensionLevel::High {
        for keyword in ESCALATION_KEYWORDS {
            out.push_keyword(keyword);
        }
    }
    if let Some(pov) = &scene.pov_character {
        out.push_entity(pov);
    }
    if let Some(location) = &scene.location {
        out.push_keyword(location);
    }
    out
}
