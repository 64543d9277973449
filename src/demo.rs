//! Reference [`StateStore`] implementation backed by in-process maps.
//!
//! No persistence, no real network latency — this exists for the demo
//! binary and the integration tests, the way a teaching example keeps a toy
//! store next to the abstract interface it proves out. A production
//! deployment swaps this module for one backed by a real database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::audit::AuditRecord;
use crate::error::EngineError;
use crate::referral::{ReferralMember, ReferralSnapshot};
use crate::store::{NetworkState, StateStore, UserAccount};

/// Synthetic per-user profile fields the data model doesn't carry on
/// [`UserAccount`] itself (platform/country/activity pattern) — upstream
/// systems own this data in a real deployment. Assigned deterministically
/// from the user id so the demo store's referral snapshots look plausible.
fn synthetic_profile(user_id: &str) -> (&'static str, &'static str, &'static str) {
    const PLATFORMS: [&str; 4] = ["tiktok", "instagram", "youtube", "x"];
    const COUNTRIES: [&str; 3] = ["usa", "india", "brazil"];
    const PATTERNS: [&str; 2] = ["daily", "weekly"];
    let h = user_id.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    (
        PLATFORMS[(h % PLATFORMS.len() as u64) as usize],
        COUNTRIES[(h / 7 % COUNTRIES.len() as u64) as usize],
        PATTERNS[(h / 13 % PATTERNS.len() as u64) as usize],
    )
}

struct Inner {
    accounts: HashMap<String, UserAccount>,
    /// child -> parent
    referred_by: HashMap<String, String>,
    /// parent -> children
    referrals_of: HashMap<String, Vec<String>>,
    network_state: NetworkState,
    audit_log: Vec<AuditRecord>,
}

pub struct InMemoryStore {
    inner: RwLock<Inner>,
    /// Mirrors `EngineConfig::active_referral_window_days`; the caller is
    /// responsible for keeping the two in sync (see `Engine::new`'s wiring
    /// in the demo binary).
    active_referral_window_days: i64,
}

impl InMemoryStore {
    pub fn new(network_state: NetworkState, active_referral_window_days: i64) -> InMemoryStore {
        InMemoryStore {
            inner: RwLock::new(Inner {
                accounts: HashMap::new(),
                referred_by: HashMap::new(),
                referrals_of: HashMap::new(),
                network_state,
                audit_log: Vec::new(),
            }),
            active_referral_window_days,
        }
    }

    pub fn set_network_state(&self, network_state: NetworkState) {
        self.inner.write().network_state = network_state;
    }

    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.inner.read().audit_log.clone()
    }

    fn member_for(inner: &Inner, user_id: &str, active_referral_window_days: i64) -> ReferralMember {
        let (platform, country, activity_pattern) = synthetic_profile(user_id);
        match inner.accounts.get(user_id) {
            Some(acc) => {
                let active_30d = Utc::now() - acc.last_event_at
                    <= chrono::Duration::days(active_referral_window_days);
                ReferralMember {
                    user_id: user_id.to_string(),
                    active_30d,
                    xp_level: acc.xp_level,
                    joined_at: acc.created_at,
                    platform: platform.to_string(),
                    country: country.to_string(),
                    activity_pattern: activity_pattern.to_string(),
                    activity_score: (acc.xp_total.to_f64() / 1_000.0).clamp(0.0, 2.0),
                }
            }
            None => ReferralMember {
                user_id: user_id.to_string(),
                active_30d: false,
                xp_level: 1,
                joined_at: Utc::now(),
                platform: platform.to_string(),
                country: country.to_string(),
                activity_pattern: activity_pattern.to_string(),
                activity_score: 0.0,
            },
        }
    }

    fn children<'a>(inner: &'a Inner, user_id: &str) -> &'a [String] {
        inner
            .referrals_of
            .get(user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn would_cycle(inner: &Inner, user_id: &str, referrer_id: &str) -> bool {
        // Inserting user_id -> referrer_id cycles iff referrer_id is already
        // downstream of user_id (i.e. user_id is an ancestor of referrer_id).
        let mut frontier = vec![user_id.to_string()];
        let mut visited = std::collections::HashSet::new();
        while let Some(node) = frontier.pop() {
            if node == referrer_id {
                return true;
            }
            if !visited.insert(node.clone()) {
                continue;
            }
            frontier.extend(Self::children(inner, &node).iter().cloned());
        }
        false
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get_user(&self, id: &str) -> Result<UserAccount, EngineError> {
        let mut inner = self.inner.write();
        if !inner.accounts.contains_key(id) {
            let account = UserAccount::new(id.to_string(), Utc::now());
            inner.accounts.insert(id.to_string(), account);
        }
        Ok(inner.accounts.get(id).cloned().unwrap())
    }

    async fn try_get_user(&self, id: &str) -> Result<Option<UserAccount>, EngineError> {
        Ok(self.inner.read().accounts.get(id).cloned())
    }

    async fn update_user(
        &self,
        id: &str,
        mutator: Box<dyn for<'a> FnOnce(&'a mut UserAccount) -> Result<(), EngineError> + Send>,
    ) -> Result<UserAccount, EngineError> {
        let mut inner = self.inner.write();
        let mut account = inner
            .accounts
            .get(id)
            .cloned()
            .unwrap_or_else(|| UserAccount::new(id.to_string(), Utc::now()));
        mutator(&mut account)?;
        inner.accounts.insert(id.to_string(), account.clone());
        Ok(account)
    }

    async fn get_network_state(&self) -> Result<NetworkState, EngineError> {
        Ok(self.inner.read().network_state)
    }

    async fn get_referral_snapshot(&self, user_id: &str) -> Result<ReferralSnapshot, EngineError> {
        let inner = self.inner.read();
        let direct_ids = Self::children(&inner, user_id).to_vec();
        let l2_ids: Vec<String> = direct_ids
            .iter()
            .flat_map(|id| Self::children(&inner, id).to_vec())
            .collect();
        let l3_ids: Vec<String> = l2_ids
            .iter()
            .flat_map(|id| Self::children(&inner, id).to_vec())
            .collect();

        let window = self.active_referral_window_days;
        Ok(ReferralSnapshot {
            direct: direct_ids.iter().map(|id| Self::member_for(&inner, id, window)).collect(),
            l2: l2_ids.iter().map(|id| Self::member_for(&inner, id, window)).collect(),
            l3: l3_ids.iter().map(|id| Self::member_for(&inner, id, window)).collect(),
        })
    }

    async fn log_suspicious(&self, record: AuditRecord) {
        self.inner.write().audit_log.push(record);
    }

    async fn set_direct_referrer(
        &self,
        user_id: &str,
        referrer_id: &str,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.write();
        if user_id == referrer_id || Self::would_cycle(&inner, user_id, referrer_id) {
            return Err(EngineError::GraphCycle);
        }
        if let Some(old_parent) = inner.referred_by.insert(user_id.to_string(), referrer_id.to_string()) {
            if let Some(siblings) = inner.referrals_of.get_mut(&old_parent) {
                siblings.retain(|c| c != user_id);
            }
        }
        inner
            .referrals_of
            .entry(referrer_id.to_string())
            .or_default()
            .push(user_id.to_string());
        if let Some(acc) = inner.accounts.get_mut(user_id) {
            acc.direct_referrer_id = Some(referrer_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Fixed;

    fn store() -> InMemoryStore {
        InMemoryStore::new(
            NetworkState {
                total_users: 10_000,
                daily_reward_pool: 100_000.0,
                last_refresh: Utc::now(),
            },
            30,
        )
    }

    #[tokio::test]
    async fn get_user_auto_creates() {
        let store = store();
        let account = store.get_user("u1").await.unwrap();
        assert_eq!(account.id, "u1");
        assert!(store.try_get_user("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn try_get_user_does_not_create() {
        let store = store();
        assert!(store.try_get_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn referral_snapshot_reflects_three_hops() {
        let store = store();
        store.get_user("a").await.unwrap();
        store.get_user("b").await.unwrap();
        store.get_user("c").await.unwrap();
        store.set_direct_referrer("b", "a").await.unwrap();
        store.set_direct_referrer("c", "b").await.unwrap();

        let snapshot = store.get_referral_snapshot("a").await.unwrap();
        assert_eq!(snapshot.direct.len(), 1);
        assert_eq!(snapshot.direct[0].user_id, "b");
        assert_eq!(snapshot.l2.len(), 1);
        assert_eq!(snapshot.l2[0].user_id, "c");
    }

    #[tokio::test]
    async fn set_direct_referrer_rejects_cycle() {
        let store = store();
        store.get_user("a").await.unwrap();
        store.get_user("b").await.unwrap();
        store.set_direct_referrer("b", "a").await.unwrap();
        let result = store.set_direct_referrer("a", "b").await;
        assert!(matches!(result, Err(EngineError::GraphCycle)));
    }

    #[tokio::test]
    async fn update_user_persists_mutation() {
        let store = store();
        store.get_user("u1").await.unwrap();
        store
            .update_user(
                "u1",
                Box::new(|acc| {
                    acc.holdings = Fixed::from_f64(42.0);
                    Ok(())
                }),
            )
            .await
            .unwrap();
        let account = store.try_get_user("u1").await.unwrap().unwrap();
        assert_eq!(account.holdings.to_f64(), 42.0);
    }
}
