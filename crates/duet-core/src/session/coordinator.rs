//! Session coordinator.
//!
//! Drives the per-user status state machine (idle -> searching -> chatting
//! -> idle) and keeps the profile store and the in-process session cache
//! consistent. The store is authoritative; the cache is an optimization the
//! coordinator rebuilds and repairs on read.

use crate::error::{DuetError, Result};
use crate::matching::{relaxed_best, score_candidates, ScoreWeights};
use crate::profile::{ChatStatus, ProfileStore, UserId};
use crate::session::cache::SessionCache;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStart {
    /// The user entered the candidate pool.
    Searching,
    /// The user already has an active chat; the request was a no-op.
    AlreadyChatting,
}

/// A committed pairing, returned once both rows and the cache agree.
///
/// `pairing_id` exists for log correlation only; it is not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingTicket {
    pub pairing_id: Uuid,
    pub user: UserId,
    pub partner: UserId,
    pub score: i32,
    pub shared_interests: Vec<String>,
    pub partner_mood: String,
    pub partner_language: String,
}

/// Orchestrates state transitions and guarantees store/cache consistency.
///
/// # Concurrency
///
/// The `searching -> chatting` transition is made exclusive per pair by
/// `ProfileStore::commit_pairing`, an atomic compare-and-swap over both
/// rows: it succeeds only while both users still read `Searching`. Two
/// racing match attempts can therefore commit at most one pairing; the
/// loser rescans a fresh candidate list once before giving up.
///
/// # Self-healing
///
/// `resolve_partner` detects asymmetric rows (A.partner = B but
/// B.partner != A) and resets both implicated users to idle rather than
/// propagating the corruption. Every read path that needs a partner goes
/// through it.
pub struct SessionCoordinator {
    store: Arc<dyn ProfileStore>,
    cache: Arc<SessionCache>,
    weights: ScoreWeights,
}

impl SessionCoordinator {
    /// Creates a coordinator over a store and cache, with scoring weights.
    pub fn new(store: Arc<dyn ProfileStore>, cache: Arc<SessionCache>, weights: ScoreWeights) -> Self {
        Self {
            store,
            cache,
            weights,
        }
    }

    /// The session cache this coordinator maintains.
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// The profile store this coordinator writes through.
    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// `idle -> searching`.
    ///
    /// Precondition: the user is not an active chat participant. The check
    /// goes through `resolve_partner`, so a cache miss falls back to the
    /// store and stale rows are healed instead of blocking the search.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unregistered users, or the store failure.
    pub async fn begin_search(&self, user: UserId) -> Result<SearchStart> {
        if self.resolve_partner(user).await?.is_some() {
            return Ok(SearchStart::AlreadyChatting);
        }
        if self.store.get_profile(user).await?.is_none() {
            return Err(DuetError::not_found("UserProfile", user));
        }
        // Conditional write: a pairing may commit between the partner check
        // above and this transition, and must not be clobbered.
        if !self.store.mark_searching(user).await? {
            return Ok(SearchStart::AlreadyChatting);
        }
        tracing::debug!(user = %user, "entered candidate pool");
        Ok(SearchStart::Searching)
    }

    /// `searching -> chatting`: scans the pool and commits the best match.
    ///
    /// Returns `Ok(None)` when the pool is empty, when the user is no
    /// longer searching (the cancel-vs-match race re-check), or when every
    /// commit attempt lost its race.
    pub async fn try_match(&self, user: UserId) -> Result<Option<PairingTicket>> {
        self.attempt_pairing(user, false).await
    }

    /// Relaxed `searching -> chatting`: ignores all preference bonuses and
    /// pairs on pure availability. The no-match fallback command.
    pub async fn try_match_relaxed(&self, user: UserId) -> Result<Option<PairingTicket>> {
        self.attempt_pairing(user, true).await
    }

    async fn attempt_pairing(&self, user: UserId, relaxed: bool) -> Result<Option<PairingTicket>> {
        // One rescan after a lost commit race: the candidate that vanished
        // was claimed by someone else, the rest of the pool is still fair.
        for attempt in 0..2u8 {
            let requester = self
                .store
                .get_profile(user)
                .await?
                .ok_or_else(|| DuetError::not_found("UserProfile", user))?;
            if requester.status != ChatStatus::Searching {
                return Ok(None);
            }

            let candidates = self.store.query_candidates(user).await?;
            let outcome = if relaxed {
                relaxed_best(&requester, &candidates)
            } else {
                let dislikes = self.store.dislike_set(user).await?;
                score_candidates(&requester, &candidates, &dislikes, &self.weights)
            };
            let Some(outcome) = outcome else {
                return Ok(None);
            };

            if self.store.commit_pairing(user, outcome.candidate_id).await? {
                self.cache.bind(user, outcome.candidate_id).await;
                let pairing_id = Uuid::new_v4();
                tracing::info!(
                    %pairing_id,
                    user = %user,
                    partner = %outcome.candidate_id,
                    score = outcome.score,
                    relaxed,
                    "pairing committed"
                );
                return Ok(Some(PairingTicket {
                    pairing_id,
                    user,
                    partner: outcome.candidate_id,
                    score: outcome.score,
                    shared_interests: outcome.shared_interests,
                    partner_mood: outcome.mood,
                    partner_language: outcome.language,
                }));
            }

            tracing::debug!(
                user = %user,
                candidate = %outcome.candidate_id,
                attempt,
                "commit lost the race, rescanning"
            );
        }
        Ok(None)
    }

    /// `chatting -> idle` for both sides of the user's pairing.
    ///
    /// Resolves the partner (cache first, store fallback), clears both rows
    /// and both cache directions, and returns the partner so the caller can
    /// notify them. Idempotent: returns `Ok(None)` when the user was not
    /// chatting.
    pub async fn end_chat(&self, user: UserId) -> Result<Option<UserId>> {
        let Some(partner) = self.resolve_partner(user).await? else {
            return Ok(None);
        };
        self.store.clear_pairing(user, partner).await?;
        self.cache.unbind(user).await;
        self.cache.unbind(partner).await;
        tracing::info!(user = %user, partner = %partner, "pairing torn down");
        Ok(Some(partner))
    }

    /// `searching -> idle`: explicit cancel. Returns `false` when the user
    /// was not searching, including when a pairing commit won the race:
    /// the store's compare-and-swap refuses rather than idle a row that
    /// just turned `Chatting`.
    pub async fn cancel_search(&self, user: UserId) -> Result<bool> {
        let cancelled = self.store.cancel_if_searching(user).await?;
        if cancelled {
            tracing::debug!(user = %user, "search cancelled");
        }
        Ok(cancelled)
    }

    /// Time spent in the current search, if the user is searching.
    ///
    /// Input for the wait-threshold policy hook ("offer fallback after N
    /// seconds"); the policy itself lives in the application layer.
    pub async fn search_elapsed(&self, user: UserId) -> Result<Option<std::time::Duration>> {
        let Some(profile) = self.store.get_profile(user).await? else {
            return Ok(None);
        };
        if profile.status != ChatStatus::Searching {
            return Ok(None);
        }
        Ok(profile
            .searching_since
            .map(|since| (chrono::Utc::now() - since).to_std().unwrap_or_default()))
    }

    /// Resolves the user's active partner: cache first, store fallback.
    ///
    /// A store fallback hit repopulates the cache (lazy warm-up after
    /// restart). Asymmetric or dangling rows are self-healed: both sides
    /// reset to idle, the anomaly logged, `None` returned.
    pub async fn resolve_partner(&self, user: UserId) -> Result<Option<UserId>> {
        if let Some(partner) = self.cache.lookup(user).await {
            return Ok(Some(partner));
        }

        let Some(profile) = self.store.get_profile(user).await? else {
            return Ok(None);
        };
        if profile.status != ChatStatus::Chatting {
            return Ok(None);
        }

        let Some(partner_id) = profile.partner_id else {
            tracing::warn!(user = %user, "chatting with no partner reference, resetting to idle");
            self.store.set_partner(user, None).await?;
            self.store.set_status(user, ChatStatus::Idle).await?;
            return Ok(None);
        };

        match self.store.get_profile(partner_id).await? {
            Some(p) if p.status == ChatStatus::Chatting && p.partner_id == Some(user) => {
                self.cache.bind(user, partner_id).await;
                Ok(Some(partner_id))
            }
            _ => {
                tracing::warn!(
                    user = %user,
                    partner = %partner_id,
                    "asymmetric pairing detected, resetting both sides to idle"
                );
                self.store.clear_pairing(user, partner_id).await?;
                self.cache.unbind(user).await;
                self.cache.unbind(partner_id).await;
                Ok(None)
            }
        }
    }
}
