//! Match scoring.
//!
//! A pure, deterministic pass over the candidate pool: no I/O, no hidden
//! randomness. The coordinator feeds it the requester's profile, the
//! candidate list from the store, and the requester's dislike set.

use crate::profile::{UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Additive score weights for candidate evaluation.
///
/// Defaults match the production tuning: a flat interest-overlap bonus
/// (not proportional to overlap size), smaller bonuses for language and
/// age bracket agreement, and a heavy penalty for disliked candidates
/// that disqualifies them whenever any alternative exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Bonus when the normalized interest intersection is non-empty
    #[serde(default = "default_shared_interest")]
    pub shared_interest: i32,
    /// Bonus for exact (case-sensitive) language tag equality
    #[serde(default = "default_shared_language")]
    pub shared_language: i32,
    /// Bonus for equal age brackets when neither side is Hidden
    #[serde(default = "default_shared_age")]
    pub shared_age: i32,
    /// Penalty applied when the candidate is in the requester's dislike set
    #[serde(default = "default_dislike_penalty")]
    pub dislike_penalty: i32,
}

fn default_shared_interest() -> i32 {
    40
}

fn default_shared_language() -> i32 {
    20
}

fn default_shared_age() -> i32 {
    10
}

fn default_dislike_penalty() -> i32 {
    -1000
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            shared_interest: default_shared_interest(),
            shared_language: default_shared_language(),
            shared_age: default_shared_age(),
            dislike_penalty: default_dislike_penalty(),
        }
    }
}

/// The scorer's verdict: the single best candidate and its justification.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// The selected candidate
    pub candidate_id: UserId,
    /// Total additive score the candidate earned
    pub score: i32,
    /// Normalized interest tags both sides share (for the match notification)
    pub shared_interests: Vec<String>,
    /// Candidate's language (for the match notification)
    pub language: String,
    /// Candidate's mood (for the match notification)
    pub mood: String,
}

/// Scores every candidate and returns the best one, or `None` for an empty
/// pool.
///
/// Ties break stable first-seen: the comparison is strict `>`, so among
/// equally scored candidates the first one in `candidates` order wins.
/// This keeps the function deterministic; the order itself is whatever the
/// store's candidate query returns.
///
/// Disliked candidates are penalized, not hard-filtered: a pool containing
/// only disliked candidates still produces a match ("best available"
/// semantics). A candidate in the dislike set is never selected while any
/// non-disliked candidate exists, because the penalty dwarfs every bonus.
///
/// Candidates are expected to exclude the requester already (store query
/// contract); a self row is skipped defensively regardless.
pub fn score_candidates(
    requester: &UserProfile,
    candidates: &[UserProfile],
    dislikes: &HashSet<UserId>,
    weights: &ScoreWeights,
) -> Option<MatchOutcome> {
    let my_tags = requester.normalized_interests();

    let mut best: Option<MatchOutcome> = None;
    let mut best_score = i32::MIN;

    for candidate in candidates {
        if candidate.user_id == requester.user_id {
            continue;
        }

        let mut score = 0i32;
        if dislikes.contains(&candidate.user_id) {
            score += weights.dislike_penalty;
        }

        let shared: Vec<String> = candidate
            .normalized_interests()
            .intersection(&my_tags)
            .cloned()
            .collect();
        if !shared.is_empty() {
            score += weights.shared_interest;
        }
        if candidate.language == requester.language {
            score += weights.shared_language;
        }
        if candidate.age_bracket == requester.age_bracket
            && candidate.has_visible_age()
            && requester.has_visible_age()
        {
            score += weights.shared_age;
        }

        if score > best_score {
            best_score = score;
            best = Some(MatchOutcome {
                candidate_id: candidate.user_id,
                score,
                shared_interests: shared,
                language: candidate.language.clone(),
                mood: candidate.mood.clone(),
            });
        }
    }

    best
}

/// Relaxed fallback: pure availability, all bonuses and penalties ignored.
///
/// Returns the first candidate in pool order with score 0. Shared interests
/// are still computed so the match notification stays informative.
pub fn relaxed_best(requester: &UserProfile, candidates: &[UserProfile]) -> Option<MatchOutcome> {
    let my_tags = requester.normalized_interests();
    candidates
        .iter()
        .find(|c| c.user_id != requester.user_id)
        .map(|candidate| MatchOutcome {
            candidate_id: candidate.user_id,
            score: 0,
            shared_interests: candidate
                .normalized_interests()
                .intersection(&my_tags)
                .cloned()
                .collect(),
            language: candidate.language.clone(),
            mood: candidate.mood.clone(),
        })
}
