//! Profile store trait.
//!
//! Defines the interface for profile persistence and the interaction ledger.

use super::model::{ChatStatus, UserId, UserProfile};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// An abstract store for user profiles and the interaction ledger.
///
/// This trait defines the contract for the durable side of the matchmaking
/// core, decoupling the state machine from the specific storage mechanism
/// (in-memory map, TOML directory, relational database). The store is the
/// single source of truth; the in-process `SessionCache` is a rebuildable
/// optimization on top of it.
///
/// # Implementation Notes
///
/// Implementations must make `commit_pairing` a single atomic operation
/// over both users' rows: the compare-and-swap it performs is the
/// serialization point preventing two concurrent match attempts from
/// claiming the same user.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Finds a profile by user id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(UserProfile))`: profile found
    /// - `Ok(None)`: user has never been registered
    /// - `Err(_)`: store access failed
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;

    /// Registers a user on first contact, or refreshes mutable identity
    /// fields on repeat contact.
    ///
    /// Idempotent: a second call for the same id never creates a duplicate
    /// profile and updates only `username` and `display_name`.
    async fn upsert_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        display_name: Option<String>,
    ) -> Result<UserProfile>;

    /// Persists a full profile (preference edits from onboarding/settings).
    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Sets the routing status for a user.
    ///
    /// Implementations must also maintain `searching_since`: set it to now
    /// when transitioning to `Searching`, clear it otherwise.
    async fn set_status(&self, user_id: UserId, status: ChatStatus) -> Result<()>;

    /// Sets or clears the partner reference for a single row.
    ///
    /// Used by self-healing resets; paired updates go through
    /// `commit_pairing` / `clear_pairing` instead.
    async fn set_partner(&self, user_id: UserId, partner: Option<UserId>) -> Result<()>;

    /// Atomically moves a user into the candidate pool, refusing when the
    /// row currently reads `Chatting`.
    ///
    /// An unconditional write here could clobber a pairing that committed
    /// after the caller's own status check; the store re-checks under the
    /// same exclusion it gives `commit_pairing`. On success the status is
    /// `Searching` and `searching_since` is set to now (a re-entry from
    /// `Searching` succeeds and refreshes it). Returns `Ok(false)` when
    /// the row reads `Chatting` or the user does not exist.
    async fn mark_searching(&self, user_id: UserId) -> Result<bool>;

    /// Atomically returns a searching user to idle, the cancel-side
    /// counterpart of `commit_pairing`'s compare-and-swap.
    ///
    /// Returns `Ok(false)` without modifying anything when the row no
    /// longer reads `Searching`: either a pairing commit won the race or
    /// there was nothing to cancel.
    async fn cancel_if_searching(&self, user_id: UserId) -> Result<bool>;

    /// Lists match candidates: profiles with status `Searching`, excluding
    /// `exclude` itself and users banned as of now.
    async fn query_candidates(&self, exclude: UserId) -> Result<Vec<UserProfile>>;

    /// Atomically pairs two users, but only if both still have status
    /// `Searching` at write time.
    ///
    /// On success both rows read status `Chatting` with mutual partner
    /// references. Returns `Ok(false)` without modifying anything when
    /// either side was claimed or cancelled concurrently. A failure midway
    /// must not leave one user chatting while the other remains searching.
    async fn commit_pairing(&self, a: UserId, b: UserId) -> Result<bool>;

    /// Tears down a pairing: both rows to `Idle`, partner references
    /// cleared. Tolerant of rows that are already idle or missing.
    async fn clear_pairing(&self, a: UserId, b: UserId) -> Result<()>;

    /// Increments the report count on a profile and returns the new count.
    async fn increment_report_count(&self, user_id: UserId) -> Result<u32>;

    /// Sets or clears the ban expiry on a profile.
    async fn set_banned_until(
        &self,
        user_id: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Appends a like/dislike record to the interaction ledger.
    async fn record_interaction(&self, rater: UserId, target: UserId, score: i8) -> Result<()>;

    /// Returns the set of users the rater has ever disliked.
    async fn dislike_set(&self, rater: UserId) -> Result<HashSet<UserId>>;
}
