//! Profile domain model.
//!
//! This module contains the per-user profile entity that the matchmaking
//! core reads and routes on, independent of any specific storage format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum_macros::{Display, EnumString};

/// Sentinel age bracket meaning "unset/unknown"; never earns a score bonus.
pub const HIDDEN_AGE: &str = "Hidden";

/// Opaque, externally assigned, stable user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        UserId(raw)
    }
}

/// Routing state of a user in the session lifecycle.
///
/// Transitions are driven exclusively by the `SessionCoordinator`:
/// `Idle -> Searching -> Chatting -> Idle` (plus `Searching -> Idle` on
/// cancel).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatStatus {
    /// Not searching and not paired.
    #[default]
    Idle,
    /// In the candidate pool, waiting for a match.
    Searching,
    /// Paired; `partner_id` must be set.
    Chatting,
}

/// Represents a registered user's durable profile.
///
/// A profile contains:
/// - Matching preferences (language, interests, age bracket, mood)
/// - Routing state (status + partner reference)
/// - Moderation state (report count, ban expiry)
///
/// Invariant: `partner_id.is_some()` if and only if `status == Chatting`,
/// and the reference must be symmetric (A.partner = B implies B.partner = A).
/// The `SessionCoordinator` maintains and repairs this invariant.
///
/// Profiles are never hard-deleted; routing state resets to `Idle` and the
/// profile persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable external identifier
    pub user_id: UserId,
    /// Platform username (mutable identity field, refreshed on upsert)
    #[serde(default)]
    pub username: Option<String>,
    /// Display name (mutable identity field, refreshed on upsert)
    #[serde(default)]
    pub display_name: Option<String>,
    /// Preferred language tag (case-sensitive for matching)
    #[serde(default = "default_language")]
    pub language: String,
    /// Free-form interest tags; normalized lowercase before scoring
    #[serde(default)]
    pub interests: BTreeSet<String>,
    /// Age bracket tag; `HIDDEN_AGE` means unset
    #[serde(default = "default_age_bracket")]
    pub age_bracket: String,
    /// Current mood tag, surfaced in the match notification
    #[serde(default = "default_mood")]
    pub mood: String,
    /// Routing status
    #[serde(default)]
    pub status: ChatStatus,
    /// Current partner; `Some` iff status is `Chatting`
    #[serde(default)]
    pub partner_id: Option<UserId>,
    /// Monotonic count of reports filed against this user
    #[serde(default)]
    pub report_count: u32,
    /// Reputation score
    #[serde(default = "default_karma")]
    pub karma_score: i32,
    /// Ban expiry; `None` or past-dated means not banned
    #[serde(default)]
    pub banned_until: Option<DateTime<Utc>>,
    /// First-contact timestamp
    pub joined_at: DateTime<Utc>,
    /// When the current search began; `Some` only while `Searching`
    #[serde(default)]
    pub searching_since: Option<DateTime<Utc>>,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_age_bracket() -> String {
    HIDDEN_AGE.to_string()
}

fn default_mood() -> String {
    "Neutral".to_string()
}

fn default_karma() -> i32 {
    100
}

impl UserProfile {
    /// Creates a fresh profile with default preferences for a first contact.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            display_name: None,
            language: default_language(),
            interests: BTreeSet::new(),
            age_bracket: default_age_bracket(),
            mood: default_mood(),
            status: ChatStatus::Idle,
            partner_id: None,
            report_count: 0,
            karma_score: default_karma(),
            banned_until: None,
            joined_at: Utc::now(),
            searching_since: None,
        }
    }

    /// Whether the user is banned as of `now`.
    pub fn is_banned(&self, now: DateTime<Utc>) -> bool {
        matches!(self.banned_until, Some(until) if until > now)
    }

    /// Interest tags normalized to lowercase, trimmed, empties dropped.
    pub fn normalized_interests(&self) -> BTreeSet<String> {
        normalize_tags(self.interests.iter())
    }

    /// Whether the age bracket carries information (not the Hidden sentinel).
    pub fn has_visible_age(&self) -> bool {
        self.age_bracket != HIDDEN_AGE
    }
}

/// Normalizes free-form interest tags: lowercase, trimmed, empties dropped.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score recorded when a user likes a former partner.
pub const LIKE_SCORE: i8 = 1;
/// Score recorded when a user dislikes a former partner.
pub const DISLIKE_SCORE: i8 = -1;

/// One row of the append-only interaction ledger.
///
/// Multiple records between the same pair are permitted; this is history,
/// not a single mutable edge. Consumers treat "a dislike record exists" as
/// the exclusion signal. Records are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// The user who rated
    pub rater_id: UserId,
    /// The former partner who was rated
    pub target_id: UserId,
    /// `LIKE_SCORE` or `DISLIKE_SCORE`
    pub score: i8,
    /// When the rating was recorded
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(ChatStatus::Searching.to_string(), "searching");
        assert_eq!(
            "chatting".parse::<ChatStatus>().unwrap(),
            ChatStatus::Chatting
        );
    }

    #[test]
    fn new_profile_defaults() {
        let p = UserProfile::new(UserId(7));
        assert_eq!(p.language, "English");
        assert_eq!(p.age_bracket, HIDDEN_AGE);
        assert_eq!(p.mood, "Neutral");
        assert_eq!(p.status, ChatStatus::Idle);
        assert_eq!(p.karma_score, 100);
        assert!(p.partner_id.is_none());
        assert!(!p.has_visible_age());
    }

    #[test]
    fn ban_expiry_comparison() {
        let now = Utc::now();
        let mut p = UserProfile::new(UserId(1));
        assert!(!p.is_banned(now));
        p.banned_until = Some(now + Duration::hours(1));
        assert!(p.is_banned(now));
        p.banned_until = Some(now - Duration::hours(1));
        assert!(!p.is_banned(now));
    }

    #[test]
    fn tag_normalization_drops_noise() {
        let tags = normalize_tags(["  Music ", "GAMING", "", "music"]);
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["gaming".to_string(), "music".to_string()]
        );
    }
}
