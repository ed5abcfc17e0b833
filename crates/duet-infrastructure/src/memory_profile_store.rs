//! In-memory implementation of the ProfileStore trait.
//!
//! Uses a `HashMap` behind a `RwLock` for concurrent access, plus a plain
//! `Vec` for the append-only interaction ledger. Suitable for testing,
//! prototyping, and single-process deployments where persistence across
//! restarts is not required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::error::Result;
use duet_core::profile::{
    ChatStatus, InteractionRecord, ProfileStore, UserId, UserProfile, DISLIKE_SCORE,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// In-memory profile store backed by a `HashMap` behind a `RwLock`.
///
/// `commit_pairing` holds the single write lock across both row updates,
/// so the compare-and-swap over both users is atomic by construction.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    interactions: RwLock<Vec<InteractionRecord>>,
}

impl MemoryProfileStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with pre-built profiles (test fixtures).
    pub async fn seed(&self, profiles: impl IntoIterator<Item = UserProfile>) {
        let mut map = self.profiles.write().await;
        for p in profiles {
            map.insert(p.user_id, p);
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        display_name: Option<String>,
    ) -> Result<UserProfile> {
        let mut map = self.profiles.write().await;
        let profile = map
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id));
        profile.username = username;
        profile.display_name = display_name;
        Ok(profile.clone())
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn set_status(&self, user_id: UserId, status: ChatStatus) -> Result<()> {
        let mut map = self.profiles.write().await;
        if let Some(p) = map.get_mut(&user_id) {
            p.status = status;
            p.searching_since = match status {
                ChatStatus::Searching => Some(Utc::now()),
                _ => None,
            };
        }
        Ok(())
    }

    async fn set_partner(&self, user_id: UserId, partner: Option<UserId>) -> Result<()> {
        let mut map = self.profiles.write().await;
        if let Some(p) = map.get_mut(&user_id) {
            p.partner_id = partner;
        }
        Ok(())
    }

    async fn mark_searching(&self, user_id: UserId) -> Result<bool> {
        let mut map = self.profiles.write().await;
        match map.get_mut(&user_id) {
            Some(p) if p.status != ChatStatus::Chatting => {
                p.status = ChatStatus::Searching;
                p.searching_since = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_if_searching(&self, user_id: UserId) -> Result<bool> {
        let mut map = self.profiles.write().await;
        match map.get_mut(&user_id) {
            Some(p) if p.status == ChatStatus::Searching => {
                p.status = ChatStatus::Idle;
                p.searching_since = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query_candidates(&self, exclude: UserId) -> Result<Vec<UserProfile>> {
        let now = Utc::now();
        let map = self.profiles.read().await;
        let mut candidates: Vec<UserProfile> = map
            .values()
            .filter(|p| {
                p.status == ChatStatus::Searching && p.user_id != exclude && !p.is_banned(now)
            })
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; sort so the scorer's
        // first-seen tie-break stays deterministic across runs.
        candidates.sort_by_key(|p| p.user_id);
        Ok(candidates)
    }

    async fn commit_pairing(&self, a: UserId, b: UserId) -> Result<bool> {
        let mut map = self.profiles.write().await;
        let both_searching = map.get(&a).map(|p| p.status) == Some(ChatStatus::Searching)
            && map.get(&b).map(|p| p.status) == Some(ChatStatus::Searching);
        if !both_searching {
            return Ok(false);
        }
        for (user, partner) in [(a, b), (b, a)] {
            if let Some(p) = map.get_mut(&user) {
                p.status = ChatStatus::Chatting;
                p.partner_id = Some(partner);
                p.searching_since = None;
            }
        }
        Ok(true)
    }

    async fn clear_pairing(&self, a: UserId, b: UserId) -> Result<()> {
        let mut map = self.profiles.write().await;
        for user in [a, b] {
            if let Some(p) = map.get_mut(&user) {
                p.status = ChatStatus::Idle;
                p.partner_id = None;
                p.searching_since = None;
            }
        }
        Ok(())
    }

    async fn increment_report_count(&self, user_id: UserId) -> Result<u32> {
        let mut map = self.profiles.write().await;
        let p = map
            .entry(user_id)
            .or_insert_with(|| UserProfile::new(user_id));
        p.report_count += 1;
        Ok(p.report_count)
    }

    async fn set_banned_until(
        &self,
        user_id: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut map = self.profiles.write().await;
        if let Some(p) = map.get_mut(&user_id) {
            p.banned_until = until;
        }
        Ok(())
    }

    async fn record_interaction(&self, rater: UserId, target: UserId, score: i8) -> Result<()> {
        self.interactions.write().await.push(InteractionRecord {
            rater_id: rater,
            target_id: target,
            score,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn dislike_set(&self, rater: UserId) -> Result<HashSet<UserId>> {
        Ok(self
            .interactions
            .read()
            .await
            .iter()
            .filter(|r| r.rater_id == rater && r.score == DISLIKE_SCORE)
            .map(|r| r.target_id)
            .collect())
    }
}
