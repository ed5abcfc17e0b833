//! Matchmaking module: pure candidate scoring.

mod scorer;

pub use scorer::{relaxed_best, score_candidates, MatchOutcome, ScoreWeights};
