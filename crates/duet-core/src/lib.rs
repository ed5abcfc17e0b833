//! duet-core: domain layer for the duet matchmaking and session-routing
//! subsystem.
//!
//! The core pairs anonymous users for ephemeral one-to-one chats:
//!
//! - [`matching`]: pure candidate scoring (shared interests, language,
//!   age bracket, dislike penalty)
//! - [`session`]: the per-user state machine (idle / searching /
//!   chatting) and the in-process pairing cache
//! - [`relay`]: per-message forwarding decisions for paired users
//! - [`profile`]: the durable profile model and the store trait the
//!   core consumes
//! - [`delivery`]: the outbound boundary to the messaging platform
//!
//! Storage backends live in `duet-infrastructure`; orchestration and
//! policy (timeouts, moderation thresholds, retries) in
//! `duet-application`.

pub mod delivery;
pub mod error;
pub mod matching;
pub mod profile;
pub mod relay;
pub mod session;

// Re-export common error type
pub use error::{DuetError, Result};
