//! Chat use case implementation.
//!
//! This module provides the `ChatUseCase`, which orchestrates interactions
//! between the `SessionCoordinator`, `RelayGate`, and the delivery layer:
//! one entry point per user action, policy (timeouts, retries, moderation
//! thresholds) on top of the core's mechanics.

use crate::config::ChatConfig;
use anyhow::Result;
use chrono::Utc;
use duet_core::delivery::{ChatEvent, Delivery};
use duet_core::profile::{ChatStatus, ProfileStore, UserId, UserProfile, DISLIKE_SCORE, LIKE_SCORE};
use duet_core::relay::{RelayGate, RelayOutcome};
use duet_core::session::{PairingTicket, SearchStart, SessionCache, SessionCoordinator};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Use case for driving anonymous chat sessions.
///
/// `ChatUseCase` coordinates the session state machine with user-facing
/// notifications and applies the policies the core deliberately leaves
/// open: when to offer the no-match fallback, when a transient store
/// failure is retried, and when repeated reports turn into a ban.
///
/// # Thread Safety
///
/// All internal components are wrapped in `Arc`; entry points take `&self`
/// and may be called concurrently for different users.
pub struct ChatUseCase {
    /// The session state machine
    coordinator: Arc<SessionCoordinator>,
    /// Per-message forwarding decisions
    relay: RelayGate,
    /// Durable profile store (also reachable through the coordinator)
    store: Arc<dyn ProfileStore>,
    /// Outbound boundary to the messaging platform
    delivery: Arc<dyn Delivery>,
    config: ChatConfig,
}

impl ChatUseCase {
    /// Creates a use case over a store and delivery layer.
    ///
    /// The session cache, coordinator, and relay gate are constructed
    /// internally and share one cache instance.
    pub fn new(
        store: Arc<dyn ProfileStore>,
        delivery: Arc<dyn Delivery>,
        config: ChatConfig,
    ) -> Self {
        let cache = Arc::new(SessionCache::new());
        let coordinator = Arc::new(SessionCoordinator::new(
            store.clone(),
            cache,
            config.weights,
        ));
        let relay = RelayGate::new(coordinator.clone(), delivery.clone());
        Self {
            coordinator,
            relay,
            store,
            delivery,
            config,
        }
    }

    /// The coordinator backing this use case (for wiring and inspection).
    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// Registers a user on first contact; repeat calls refresh the mutable
    /// identity fields and never duplicate the profile.
    pub async fn register(
        &self,
        user: UserId,
        username: Option<String>,
        display_name: Option<String>,
    ) -> Result<UserProfile> {
        Ok(self
            .retry_once(|| self.store.upsert_profile(user, username.clone(), display_name.clone()))
            .await?)
    }

    /// Enters the user into the candidate pool and attempts a match
    /// immediately.
    ///
    /// On a committed match both parties are notified (the partner
    /// best-effort, since their delivery channel may already be gone).
    /// Without a match the user stays searching and a timeout task is
    /// scheduled to surface the fallback offer.
    pub async fn start_search(&self, user: UserId) -> Result<Option<PairingTicket>> {
        match self.retry_once(|| self.coordinator.begin_search(user)).await? {
            SearchStart::AlreadyChatting => {
                self.notify_best_effort(user, ChatEvent::AlreadyChatting).await;
                return Ok(None);
            }
            SearchStart::Searching => {}
        }

        if let Some(ticket) = self
            .retry_once(|| self.coordinator.try_match(user))
            .await?
        {
            self.announce_match(&ticket).await;
            return Ok(Some(ticket));
        }

        self.spawn_search_timeout(user).await;
        Ok(None)
    }

    /// `searching -> idle` on the user's explicit cancel.
    pub async fn cancel_search(&self, user: UserId) -> Result<bool> {
        let cancelled = self
            .retry_once(|| self.coordinator.cancel_search(user))
            .await?;
        if cancelled {
            self.notify_best_effort(user, ChatEvent::SearchCancelled).await;
        }
        Ok(cancelled)
    }

    /// Ends the user's active chat, notifying both sides. Returns the
    /// former partner, or `None` when the user was not chatting.
    pub async fn stop_chat(&self, user: UserId) -> Result<Option<UserId>> {
        let partner = self.retry_once(|| self.coordinator.end_chat(user)).await?;
        if let Some(partner) = partner {
            self.notify_best_effort(user, ChatEvent::ChatEnded).await;
            self.notify_best_effort(partner, ChatEvent::PartnerLeft).await;
        }
        Ok(partner)
    }

    /// The "next" affordance: `chatting -> idle -> searching` as one
    /// logical operation, so the user is never left idle mid-skip.
    pub async fn next_partner(&self, user: UserId) -> Result<Option<PairingTicket>> {
        self.stop_chat(user).await?;
        self.start_search(user).await
    }

    /// Routes an inbound message from a chatting user to their partner.
    ///
    /// An unpaired sender is told so explicitly; the message is never
    /// silently dropped.
    pub async fn handle_message(&self, user: UserId, content: &str) -> Result<RelayOutcome> {
        let outcome = self.retry_once(|| self.relay.relay(user, content)).await?;
        if outcome == RelayOutcome::NotPaired {
            self.notify_best_effort(user, ChatEvent::NotPaired).await;
        }
        Ok(outcome)
    }

    /// The no-match fallback command: re-runs the scorer ignoring all
    /// preference bonuses (pure availability).
    pub async fn force_relaxed_match(&self, user: UserId) -> Result<Option<PairingTicket>> {
        if let Some(ticket) = self
            .retry_once(|| self.coordinator.try_match_relaxed(user))
            .await?
        {
            self.announce_match(&ticket).await;
            return Ok(Some(ticket));
        }
        Ok(None)
    }

    /// Records a like/dislike of a former partner in the interaction
    /// ledger. Dislikes feed the scorer's exclusion set on future searches.
    pub async fn rate_partner(&self, rater: UserId, target: UserId, liked: bool) -> Result<()> {
        let score = if liked { LIKE_SCORE } else { DISLIKE_SCORE };
        self.retry_once(|| self.store.record_interaction(rater, target, score))
            .await?;
        Ok(())
    }

    /// Files a report against a user and applies the auto-ban policy when
    /// the configured threshold is reached. Returns the new report count.
    pub async fn report_user(&self, _reporter: UserId, target: UserId) -> Result<u32> {
        let count = self
            .retry_once(|| self.store.increment_report_count(target))
            .await?;
        if count >= self.config.report_ban_threshold {
            let until = Utc::now() + chrono::Duration::hours(self.config.ban_duration_hours);
            self.retry_once(|| self.store.set_banned_until(target, Some(until)))
                .await?;
            tracing::info!(user = %target, count, "report threshold reached, user banned");
        }
        Ok(count)
    }

    async fn announce_match(&self, ticket: &PairingTicket) {
        let event = ChatEvent::Matched {
            shared_interests: ticket.shared_interests.clone(),
            partner_mood: ticket.partner_mood.clone(),
            partner_language: ticket.partner_language.clone(),
        };
        // The pairing is already committed; notification failures are
        // logged, not propagated, so a flaky channel cannot half-undo it.
        self.notify_best_effort(ticket.user, event.clone()).await;
        self.notify_best_effort(ticket.partner, event).await;
    }

    /// Offers a fallback once the search outlives the wait threshold.
    ///
    /// The timer is tied to the search it was armed for by the
    /// `searching_since` stamp: when it fires it re-checks that the user
    /// is still searching *and* that the stamp is unchanged, so a timer
    /// left over from a cancelled search stays silent instead of firing
    /// prematurely for a later one.
    async fn spawn_search_timeout(&self, user: UserId) {
        let armed_for = match self.store.get_profile(user).await {
            Ok(Some(p)) if p.status == ChatStatus::Searching => p.searching_since,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "timeout arming read failed");
                return;
            }
        };
        let store = self.store.clone();
        let delivery = self.delivery.clone();
        let wait = Duration::from_secs(self.config.search_wait_secs);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            match store.get_profile(user).await {
                Ok(Some(p))
                    if p.status == ChatStatus::Searching && p.searching_since == armed_for =>
                {
                    if let Err(e) = delivery.notify(user, ChatEvent::SearchTimeout).await {
                        tracing::debug!(user = %user, error = %e, "timeout offer failed to send");
                    }
                }
                Ok(_) => {} // matched, cancelled, or searching anew
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "timeout status re-check failed");
                }
            }
        });
    }

    async fn notify_best_effort(&self, user: UserId, event: ChatEvent) {
        if let Err(e) = self.delivery.notify(user, event).await {
            tracing::debug!(user = %user, error = %e, "notification failed");
        }
    }

    /// Retries a transient store failure once after a short backoff; any
    /// persistent failure surfaces to the caller instead of being applied
    /// half-way.
    async fn retry_once<T, F, Fut>(&self, op: F) -> duet_core::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = duet_core::Result<T>>,
    {
        match op().await {
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "transient store failure, retrying once");
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                op().await
            }
            other => other,
        }
    }
}
