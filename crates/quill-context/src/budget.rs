//! Context profiles and token budgets.
//!
//! A profile names an intent (voice, editing, deep analysis, full) and maps
//! to a total-token ceiling plus per-section fractions. Selection precedence
//! is fixed: voice beats editing/selection beats analysis beats default.

use serde::{Deserialize, Serialize};

/// Token ceiling used when the model registry has no entry for a role.
pub const DEFAULT_MODEL_CEILING: usize = 32_000;

/// Conversation length past which the default budget starts decaying.
pub const HISTORY_DECAY_TURNS: usize = 10;

/// Decay factor applied to the default budget for long conversations.
pub const HISTORY_DECAY: f64 = 0.7;

/// One section of assembled context, in fixed priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    /// Manuscript state around the active chapter.
    Manuscript,
    /// Current user and UI state.
    UserState,
    /// Intelligence HUD stats.
    Hud,
    /// Analysis insights.
    Insights,
    /// Bedside notes and active goals.
    Memory,
    /// Lore bible entries.
    Lore,
    /// Recent activity and conversation history.
    History,
}

impl SectionKey {
    /// All sections in assembly priority order.
    pub const ORDER: [SectionKey; 7] = [
        SectionKey::Manuscript,
        SectionKey::UserState,
        SectionKey::Hud,
        SectionKey::Insights,
        SectionKey::Memory,
        SectionKey::Lore,
        SectionKey::History,
    ];

    /// Wire name of the section.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::Manuscript => "manuscript",
            SectionKey::UserState => "userState",
            SectionKey::Hud => "hud",
            SectionKey::Insights => "insights",
            SectionKey::Memory => "memory",
            SectionKey::Lore => "lore",
            SectionKey::History => "history",
        }
    }

    /// Whether the section may be clipped to its sub-budget. Small
    /// state-shaped sections are all-or-nothing.
    #[must_use]
    pub fn truncatable(self) -> bool {
        !matches!(self, SectionKey::UserState | SectionKey::Hud)
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named context profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextProfile {
    /// Terse voice-mode exchanges.
    Voice,
    /// Selection-focused editing.
    Editing,
    /// Deep analysis queries.
    AnalysisDeep,
    /// Everything, at default weights.
    Full,
}

impl ContextProfile {
    /// Baseline total tokens for the profile.
    #[must_use]
    pub fn base_tokens(self) -> usize {
        match self {
            ContextProfile::Voice => 4_000,
            ContextProfile::Editing => 12_000,
            ContextProfile::AnalysisDeep => 24_000,
            ContextProfile::Full => 16_000,
        }
    }

    /// Section fractions in [`SectionKey::ORDER`] order. Each profile's
    /// fractions sum to 1.0.
    #[must_use]
    pub fn fractions(self) -> [(SectionKey, f64); 7] {
        let weights = match self {
            ContextProfile::Voice => [0.30, 0.15, 0.05, 0.10, 0.15, 0.10, 0.15],
            ContextProfile::Editing => [0.40, 0.15, 0.05, 0.15, 0.10, 0.05, 0.10],
            ContextProfile::AnalysisDeep => [0.30, 0.05, 0.10, 0.30, 0.10, 0.05, 0.10],
            ContextProfile::Full => [0.25, 0.10, 0.05, 0.15, 0.15, 0.15, 0.15],
        };
        let mut out = [(SectionKey::Manuscript, 0.0); 7];
        for (i, key) in SectionKey::ORDER.into_iter().enumerate() {
            out[i] = (key, weights[i]);
        }
        out
    }
}

/// What kind of request the user is making, as classified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    /// Edit or rewrite request.
    Editing,
    /// Analysis or critique request.
    Analysis,
    /// Anything else.
    #[default]
    General,
}

/// A total-token ceiling plus per-section fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBudget {
    /// Profile the budget was derived from.
    pub profile: ContextProfile,
    /// Total token ceiling for assembled context.
    pub total_tokens: usize,
    /// Per-section fractions, priority order, summing to 1.0 (±0.05).
    pub sections: Vec<(SectionKey, f64)>,
}

impl ContextBudget {
    /// Budget at a profile's baseline total.
    #[must_use]
    pub fn for_profile(profile: ContextProfile) -> Self {
        Self::with_total(profile, profile.base_tokens())
    }

    /// Budget with an explicit total and the profile's fractions.
    #[must_use]
    pub fn with_total(profile: ContextProfile, total_tokens: usize) -> Self {
        Self {
            profile,
            total_tokens,
            sections: profile.fractions().to_vec(),
        }
    }

    /// The fraction assigned to one section (0.0 if absent).
    #[must_use]
    pub fn fraction(&self, key: SectionKey) -> f64 {
        self.sections
            .iter()
            .find(|(k, _)| *k == key)
            .map_or(0.0, |(_, f)| *f)
    }

    /// Sub-budget in tokens for one section.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn section_tokens(&self, key: SectionKey) -> usize {
        (self.total_tokens as f64 * self.fraction(key)).floor() as usize
    }
}

/// Token-ceiling lookup keyed by model role.
pub trait ModelRegistry: Send + Sync {
    /// The context-window ceiling for a role, if known.
    fn token_ceiling(&self, role: &str) -> Option<usize>;
}

/// Options for [`context_budget_for_model`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetOptions {
    /// Hard cap on the total, regardless of the model ceiling.
    pub max_budget: Option<usize>,
    /// Tokens held back for the model's response.
    pub reserve_for_response: usize,
}

// ── Selection ───────────────────────────────────────────────────────────

/// Pick a profile from request shape.
///
/// Precedence: voice, then editing/selection, then analysis, then full.
#[must_use]
pub fn select_context_profile(
    is_voice_mode: bool,
    has_selection: bool,
    query_type: QueryType,
) -> ContextProfile {
    if is_voice_mode {
        ContextProfile::Voice
    } else if has_selection || query_type == QueryType::Editing {
        ContextProfile::Editing
    } else if query_type == QueryType::Analysis {
        ContextProfile::AnalysisDeep
    } else {
        ContextProfile::Full
    }
}

/// Pick a budget from request shape and conversation length.
///
/// Same precedence as [`select_context_profile`]; when no special case
/// applies and the conversation has run past [`HISTORY_DECAY_TURNS`] turns,
/// the default total decays by [`HISTORY_DECAY`] to leave room for history.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn select_budget(
    conversation_length: usize,
    has_selection: bool,
    is_voice_mode: bool,
    query_type: QueryType,
) -> ContextBudget {
    let profile = select_context_profile(is_voice_mode, has_selection, query_type);
    let mut total = profile.base_tokens();
    if profile == ContextProfile::Full && conversation_length > HISTORY_DECAY_TURNS {
        total = (total as f64 * HISTORY_DECAY).floor() as usize;
    }
    ContextBudget::with_total(profile, total)
}

/// Budget bounded by a model's context window.
///
/// `total = min(max_budget, ceiling - reserve_for_response)`, never
/// negative; unknown roles fall back to [`DEFAULT_MODEL_CEILING`]. Section
/// fractions come through from the profile unchanged.
#[must_use]
pub fn context_budget_for_model(
    registry: &dyn ModelRegistry,
    role: &str,
    profile: ContextProfile,
    opts: BudgetOptions,
) -> ContextBudget {
    let ceiling = registry.token_ceiling(role).unwrap_or(DEFAULT_MODEL_CEILING);
    let available = ceiling.saturating_sub(opts.reserve_for_response);
    let total = match opts.max_budget {
        Some(max) => available.min(max),
        None => available,
    };
    ContextBudget::with_total(profile, total)
}
