//! Profile domain module.
//!
//! This module contains the per-user profile model, the interaction ledger
//! record, and the store trait the matchmaking core consumes.

mod model;
mod store;

pub use model::{
    ChatStatus, InteractionRecord, UserId, UserProfile, normalize_tags, DISLIKE_SCORE,
    HIDDEN_AGE, LIKE_SCORE,
};
pub use store::ProfileStore;
