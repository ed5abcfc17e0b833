//! Delivery layer trait.
//!
//! The boundary to the messaging platform. The core never constructs
//! platform UI (keyboards, buttons, markup); it only asks the delivery
//! layer to forward message content between paired users and to surface
//! lifecycle events.

use crate::error::Result;
use crate::profile::UserId;
use async_trait::async_trait;

/// Lifecycle events the core surfaces to users through the delivery layer.
///
/// Wording and presentation are the delivery implementation's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A pairing was committed; carries the justification for display.
    Matched {
        shared_interests: Vec<String>,
        partner_mood: String,
        partner_language: String,
    },
    /// The partner ended the chat or vanished.
    PartnerLeft,
    /// The user's own chat was ended.
    ChatEnded,
    /// A start request arrived while already paired.
    AlreadyChatting,
    /// An inbound message had no forwarding target.
    NotPaired,
    /// The search exceeded the wait threshold; a fallback is on offer.
    SearchTimeout,
    /// The search was cancelled at the user's request.
    SearchCancelled,
}

/// Outbound boundary to the messaging platform.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Forwards message content from one paired user to the other.
    ///
    /// An error means the recipient is unreachable at the delivery layer;
    /// the relay gate treats that as "partner vanished" and tears the
    /// pairing down.
    async fn forward(&self, from: UserId, to: UserId, content: &str) -> Result<()>;

    /// Notifies a user of a lifecycle event.
    async fn notify(&self, user: UserId, event: ChatEvent) -> Result<()>;
}
