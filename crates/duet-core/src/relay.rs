//! Relay gate.
//!
//! Per-message decision of where an inbound message from a chatting user
//! goes: cache first, store fallback, explicit "not paired" signal when
//! neither yields a target, and pairing teardown when the partner turns out
//! to be unreachable.

use crate::delivery::{ChatEvent, Delivery};
use crate::error::Result;
use crate::profile::UserId;
use crate::session::SessionCoordinator;
use std::sync::Arc;

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Forwarded to the partner.
    Forwarded(UserId),
    /// The sender has no active pairing; nothing was dropped silently.
    NotPaired,
    /// The partner was unreachable; the pairing was torn down.
    PartnerVanished(UserId),
}

/// Routes inbound messages between paired users.
pub struct RelayGate {
    coordinator: Arc<SessionCoordinator>,
    delivery: Arc<dyn Delivery>,
}

impl RelayGate {
    /// Creates a relay gate over a coordinator and a delivery layer.
    pub fn new(coordinator: Arc<SessionCoordinator>, delivery: Arc<dyn Delivery>) -> Self {
        Self {
            coordinator,
            delivery,
        }
    }

    /// Relays an inbound message from `from` to their partner.
    ///
    /// The partner lookup goes through the coordinator: session cache
    /// first, store fallback with cache repopulation, self-healing of
    /// stale rows. A delivery failure on forward triggers the
    /// `chatting -> idle` transition for the sender (the partner is
    /// presumed gone) and informs the sender the chat ended.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (store unreachable) propagate; an
    /// undeliverable message is a signaled outcome, not an error.
    pub async fn relay(&self, from: UserId, content: &str) -> Result<RelayOutcome> {
        let Some(partner) = self.coordinator.resolve_partner(from).await? else {
            return Ok(RelayOutcome::NotPaired);
        };

        match self.delivery.forward(from, partner, content).await {
            Ok(()) => Ok(RelayOutcome::Forwarded(partner)),
            Err(err) => {
                tracing::warn!(
                    from = %from,
                    partner = %partner,
                    error = %err,
                    "forward failed, tearing down pairing"
                );
                self.coordinator.end_chat(from).await?;
                // The sender learns the chat ended, not that an internal
                // error occurred. The vanished partner gets a best-effort
                // notification.
                if let Err(e) = self.delivery.notify(from, ChatEvent::ChatEnded).await {
                    tracing::debug!(user = %from, error = %e, "sender notification failed");
                }
                let _ = self.delivery.notify(partner, ChatEvent::PartnerLeft).await;
                Ok(RelayOutcome::PartnerVanished(partner))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DuetError;
    use crate::matching::ScoreWeights;
    use crate::profile::{ChatStatus, ProfileStore, UserProfile};
    use crate::session::SessionCache;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        profiles: Mutex<HashMap<UserId, UserProfile>>,
    }

    impl FakeStore {
        fn paired(a: i64, b: i64) -> Self {
            let store = Self::default();
            {
                let mut map = store.profiles.lock().unwrap();
                for (id, partner) in [(a, b), (b, a)] {
                    let mut p = UserProfile::new(UserId(id));
                    p.status = ChatStatus::Chatting;
                    p.partner_id = Some(UserId(partner));
                    map.insert(p.user_id, p);
                }
            }
            store
        }

        fn status(&self, user: UserId) -> ChatStatus {
            self.profiles.lock().unwrap().get(&user).unwrap().status
        }
    }

    #[async_trait]
    impl ProfileStore for FakeStore {
        async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
            Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
        }

        async fn upsert_profile(
            &self,
            user_id: UserId,
            username: Option<String>,
            display_name: Option<String>,
        ) -> Result<UserProfile> {
            let mut map = self.profiles.lock().unwrap();
            let p = map.entry(user_id).or_insert_with(|| UserProfile::new(user_id));
            p.username = username;
            p.display_name = display_name;
            Ok(p.clone())
        }

        async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.user_id, profile.clone());
            Ok(())
        }

        async fn set_status(&self, user_id: UserId, status: ChatStatus) -> Result<()> {
            if let Some(p) = self.profiles.lock().unwrap().get_mut(&user_id) {
                p.status = status;
            }
            Ok(())
        }

        async fn set_partner(&self, user_id: UserId, partner: Option<UserId>) -> Result<()> {
            if let Some(p) = self.profiles.lock().unwrap().get_mut(&user_id) {
                p.partner_id = partner;
            }
            Ok(())
        }

        async fn mark_searching(&self, user_id: UserId) -> Result<bool> {
            let mut map = self.profiles.lock().unwrap();
            match map.get_mut(&user_id) {
                Some(p) if p.status != ChatStatus::Chatting => {
                    p.status = ChatStatus::Searching;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn cancel_if_searching(&self, user_id: UserId) -> Result<bool> {
            let mut map = self.profiles.lock().unwrap();
            match map.get_mut(&user_id) {
                Some(p) if p.status == ChatStatus::Searching => {
                    p.status = ChatStatus::Idle;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn query_candidates(&self, _exclude: UserId) -> Result<Vec<UserProfile>> {
            Ok(Vec::new())
        }

        async fn commit_pairing(&self, _a: UserId, _b: UserId) -> Result<bool> {
            Ok(false)
        }

        async fn clear_pairing(&self, a: UserId, b: UserId) -> Result<()> {
            let mut map = self.profiles.lock().unwrap();
            for user in [a, b] {
                if let Some(p) = map.get_mut(&user) {
                    p.status = ChatStatus::Idle;
                    p.partner_id = None;
                }
            }
            Ok(())
        }

        async fn increment_report_count(&self, _user_id: UserId) -> Result<u32> {
            Ok(0)
        }

        async fn set_banned_until(
            &self,
            _user_id: UserId,
            _until: Option<DateTime<Utc>>,
        ) -> Result<()> {
            Ok(())
        }

        async fn record_interaction(
            &self,
            _rater: UserId,
            _target: UserId,
            _score: i8,
        ) -> Result<()> {
            Ok(())
        }

        async fn dislike_set(&self, _rater: UserId) -> Result<HashSet<UserId>> {
            Ok(HashSet::new())
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        forwards: Mutex<Vec<(UserId, UserId, String)>>,
        events: Mutex<Vec<(UserId, ChatEvent)>>,
        fail_forward: bool,
    }

    #[async_trait]
    impl Delivery for RecordingDelivery {
        async fn forward(&self, from: UserId, to: UserId, content: &str) -> Result<()> {
            if self.fail_forward {
                return Err(DuetError::delivery("recipient unreachable"));
            }
            self.forwards
                .lock()
                .unwrap()
                .push((from, to, content.to_string()));
            Ok(())
        }

        async fn notify(&self, user: UserId, event: ChatEvent) -> Result<()> {
            self.events.lock().unwrap().push((user, event));
            Ok(())
        }
    }

    fn gate(
        store: Arc<FakeStore>,
        delivery: Arc<RecordingDelivery>,
    ) -> (RelayGate, Arc<SessionCoordinator>) {
        let coordinator = Arc::new(SessionCoordinator::new(
            store,
            Arc::new(SessionCache::new()),
            ScoreWeights::default(),
        ));
        (
            RelayGate::new(coordinator.clone(), delivery),
            coordinator,
        )
    }

    #[tokio::test]
    async fn relay_forwards_between_paired_users() {
        let store = Arc::new(FakeStore::paired(1, 2));
        let delivery = Arc::new(RecordingDelivery::default());
        let (relay, _) = gate(store, delivery.clone());

        let outcome = relay.relay(UserId(1), "hi").await.unwrap();
        assert_eq!(outcome, RelayOutcome::Forwarded(UserId(2)));
        assert_eq!(
            delivery.forwards.lock().unwrap().as_slice(),
            &[(UserId(1), UserId(2), "hi".to_string())]
        );
    }

    #[tokio::test]
    async fn cold_cache_falls_back_to_store_and_repopulates() {
        // Restart scenario: rows are durable, cache starts empty.
        let store = Arc::new(FakeStore::paired(1, 2));
        let delivery = Arc::new(RecordingDelivery::default());
        let (relay, coordinator) = gate(store, delivery);

        assert!(coordinator.cache().is_empty().await);
        let outcome = relay.relay(UserId(1), "still there?").await.unwrap();
        assert_eq!(outcome, RelayOutcome::Forwarded(UserId(2)));
        assert_eq!(
            coordinator.cache().lookup(UserId(1)).await,
            Some(UserId(2))
        );
    }

    #[tokio::test]
    async fn unpaired_sender_is_signaled_not_dropped() {
        let store = Arc::new(FakeStore::default());
        store
            .upsert_profile(UserId(1), None, None)
            .await
            .unwrap();
        let delivery = Arc::new(RecordingDelivery::default());
        let (relay, _) = gate(store, delivery.clone());

        let outcome = relay.relay(UserId(1), "hello?").await.unwrap();
        assert_eq!(outcome, RelayOutcome::NotPaired);
        assert!(delivery.forwards.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forward_failure_tears_down_the_pairing() {
        let store = Arc::new(FakeStore::paired(1, 2));
        let delivery = Arc::new(RecordingDelivery {
            fail_forward: true,
            ..Default::default()
        });
        let (relay, coordinator) = gate(store.clone(), delivery.clone());

        let outcome = relay.relay(UserId(1), "hi").await.unwrap();
        assert_eq!(outcome, RelayOutcome::PartnerVanished(UserId(2)));

        assert_eq!(store.status(UserId(1)), ChatStatus::Idle);
        assert_eq!(store.status(UserId(2)), ChatStatus::Idle);
        assert!(coordinator.cache().is_empty().await);

        let events = delivery.events.lock().unwrap();
        assert!(events.contains(&(UserId(1), ChatEvent::ChatEnded)));
        assert!(events.contains(&(UserId(2), ChatEvent::PartnerLeft)));
    }
}
