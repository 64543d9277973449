//! Reward & Integrity Engine
//!
//! The off-chain core that decides, per user and per action, how much of
//! three fungible scores (mining tokens, experience points, referral
//! points) an account should accrue, and whether the account is likely
//! operated by a human.
//!
//! The HTTP/REST surface, auth, caching transport, admin dashboards, the
//! downstream chain, and the ML training pipeline are explicitly out of
//! scope — this crate is a library a host process embeds behind whatever
//! RPC transport it chooses. [`demo`] wires a minimal in-process example.

pub mod antibot;
pub mod audit;
pub mod config;
pub mod demo;
pub mod error;
pub mod event;
pub mod numeric;
pub mod phase;
pub mod quality;
pub mod referral;
pub mod reward;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use antibot::{AnomalyScorer, AntiBotResult, BehavioralSample};
use audit::AuditRecord;
use config::EngineConfig;
use error::EngineError;
use event::ActivityEventWire;
use numeric::Fixed;
use referral::{ReferralBreakdown, RpTier};
use reward::{MultiplierBreakdown, RewardOutcome};
use store::{NetworkState, StateStore, UserAccount};

/// A safe, read-only view over a [`UserAccount`] for the `getUserState` RPC
/// — excludes the internal idempotency cache and content-history buffer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserAccountView {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    pub kyc_verified: bool,
    pub total_mined: f64,
    pub holdings: f64,
    pub xp_total: f64,
    pub xp_level: u32,
    pub rp_total: f64,
    pub rp_tier: RpTier,
    pub streak_days: u32,
    pub mined_today: f64,
}

impl From<&UserAccount> for UserAccountView {
    fn from(a: &UserAccount) -> UserAccountView {
        UserAccountView {
            id: a.id.clone(),
            created_at: a.created_at,
            last_event_at: a.last_event_at,
            kyc_verified: a.kyc_verified,
            total_mined: a.total_mined.to_f64(),
            holdings: a.holdings.to_f64(),
            xp_total: a.xp_total.to_f64(),
            xp_level: a.xp_level,
            rp_total: a.rp_total.to_f64(),
            rp_tier: a.rp_tier,
            streak_days: a.streak_days,
            mined_today: a.daily_counter.mined_today,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReferralTierResult {
    pub rp_total: f64,
    pub tier: RpTier,
    pub breakdown: ReferralBreakdown,
}

/// The engine, holding its collaborators as trait objects so a host can
/// swap storage and ML backends without recompiling.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn StateStore>,
    anomaly: ArcSwap<Arc<dyn AnomalyScorer>>,
    /// Per-user logical locks: an event for user `u` is processed end to
    /// end holding this lock; events for `u` and `v != u` run concurrently.
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn StateStore>,
        anomaly: Arc<dyn AnomalyScorer>,
        config: EngineConfig,
    ) -> Engine {
        Engine {
            config,
            store,
            anomaly: ArcSwap::from_pointee(anomaly),
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Atomically replaces the anomaly detector. In-flight evaluations
    /// continue on the version they started with.
    pub fn replace_anomaly_scorer(&self, new: Arc<dyn AnomalyScorer>) {
        self.anomaly.store(Arc::new(new));
    }

    fn user_lock(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// `submitActivity(ActivityEvent, BehavioralSample) -> RewardOutcome | EngineError`.
    ///
    /// All-or-nothing: every fallible step runs against a candidate account
    /// before anything is committed via [`StateStore::update_user`].
    pub async fn submit_activity(
        &self,
        wire: ActivityEventWire,
        sample: BehavioralSample,
    ) -> Result<RewardOutcome, EngineError> {
        let event = event::ActivityEvent::from_wire(wire)?;
        let lock = self.user_lock(&event.user_id);
        let _guard = lock.lock().await;

        let mut account = self.store.get_user(&event.user_id).await?;

        if let Some(prior) = account.recent_event_outcomes.get(&event.event_id) {
            return Err(EngineError::DuplicateEvent {
                event_id: event.event_id.clone(),
                prior_outcome: Box::new(prior.clone()),
            });
        }

        account
            .daily_counter
            .roll_over_if_needed(event.timestamp.date_naive());

        let network_state: NetworkState = self.store.get_network_state().await?;
        let referral_snapshot = self.store.get_referral_snapshot(&event.user_id).await?;

        let content_history = account.content_history(event.timestamp);
        let quality_score =
            quality::assess_quality(event.content.as_ref(), event.platform, &content_history);
        let originality = event
            .content
            .as_ref()
            .and_then(|c| c.text.as_deref())
            .map(|t| quality::originality_score(t, &content_history))
            .unwrap_or(0.5);

        let ml_score = self.anomaly.load().score(&sample).await;
        let antibot_result = antibot::evaluate(&sample, originality, ml_score, &self.config);
        let gated = antibot_result.action.is_gated();

        if gated {
            warn!(
                user_id = %event.user_id,
                event_id = %event.event_id,
                action = ?antibot_result.action,
                "anti-bot gate triggered"
            );
            self.store
                .log_suspicious(AuditRecord {
                    user_id: event.user_id.clone(),
                    event_id: event.event_id.clone(),
                    risk: antibot_result.risk.clone(),
                    human_probability: antibot_result.human_probability,
                    factor_breakdown: antibot_result.factors.clone(),
                    timestamp: event.timestamp,
                })
                .await;
        }

        let referral_breakdown = referral::evaluate_referral(&referral_snapshot, event.timestamp);
        let active_referrals_30d = referral_snapshot
            .direct
            .iter()
            .filter(|m| m.active_30d)
            .count() as u32;
        let referral_network_size = (referral_snapshot.direct.len()
            + referral_snapshot.l2.len()
            + referral_snapshot.l3.len()) as u64;

        let rate = reward::mining_rate(
            network_state.total_users,
            account.kyc_verified,
            active_referrals_30d,
            account.holdings.to_f64(),
            account.xp_level,
            account.rp_tier,
            quality_score,
            referral_network_size,
            referral_breakdown.quality,
        );

        let hours_since_last_claim = (event.timestamp - account.last_event_at)
            .num_milliseconds()
            .max(0) as f64
            / 3_600_000.0;
        let event_mined_raw = rate * hours_since_last_claim;

        let remaining_cap = (self.config.daily_cap - account.daily_counter.mined_today).max(0.0);
        let event_mined = event_mined_raw.min(remaining_cap).max(0.0);
        let cap_hit = event_mined + 1e-9 < event_mined_raw;

        let whale_tax = reward::whale_tax_multiplier(account.holdings.to_f64());
        let taxed_mining = event_mined * whale_tax;
        let mining_delta = if gated { 0.0 } else { taxed_mining };

        // Snapshot the values this event's mining rate was actually computed
        // from, before the mutation block below advances them — the reason
        // trail must describe what produced `mining_delta`, not what the
        // account looks like afterward.
        let holdings_before = account.holdings;
        let xp_level_before = account.xp_level;
        let rp_tier_before = account.rp_tier;

        account.update_streak(event.timestamp);

        let count_before = account.daily_counter.count_for(event.kind);
        let xp_ungated = reward::xp_delta(
            event.kind,
            event.platform,
            quality_score,
            account.streak_days,
            account.xp_level,
            count_before,
        );
        let xp_delta_final = if gated {
            xp_ungated * self.config.gated_xp_retention
        } else {
            xp_ungated
        };

        *account
            .daily_counter
            .actions_by_type
            .entry(event.kind)
            .or_insert(0) += 1;
        account.daily_counter.mined_today += mining_delta;

        account.total_mined = account.total_mined.checked_add(Fixed::from_f64(mining_delta))?;
        account.holdings = account.holdings.checked_add(Fixed::from_f64(mining_delta))?;
        account.xp_total = account.xp_total.checked_add(Fixed::from_f64(xp_delta_final))?;

        let rp_before = account.rp_total;
        if !gated {
            account.rp_total = Fixed::from_f64(referral_breakdown.rp_total.max(0.0));
        }
        let rp_delta = account.rp_total.checked_sub(rp_before)?.to_f64();

        if let Some(text) = event.content.as_ref().and_then(|c| c.text.clone()) {
            account.recent_content.push((event.timestamp, text));
        }

        account.recompute_derived();
        account.check_invariants()?;
        account.last_event_at = event.timestamp;

        let multipliers = vec![
            MultiplierBreakdown {
                name: "base_rate".into(),
                value: network_state.phase().base_rate(),
            },
            MultiplierBreakdown {
                name: "pioneer".into(),
                value: phase::pioneer_multiplier(network_state.total_users),
            },
            MultiplierBreakdown {
                name: "referral_factor".into(),
                value: reward::referral_factor(active_referrals_30d),
            },
            MultiplierBreakdown {
                name: "security_factor".into(),
                value: reward::security_factor(account.kyc_verified),
            },
            MultiplierBreakdown {
                name: "whale_regression".into(),
                value: reward::whale_regression(holdings_before.to_f64()),
            },
            MultiplierBreakdown {
                name: "xp_factor".into(),
                value: reward::xp_factor(xp_level_before),
            },
            MultiplierBreakdown {
                name: "rp_factor".into(),
                value: referral::rp_factor(rp_tier_before),
            },
            MultiplierBreakdown {
                name: "quality".into(),
                value: quality_score,
            },
            MultiplierBreakdown {
                name: "network_effect".into(),
                value: reward::network_effect(referral_network_size, referral_breakdown.quality),
            },
            MultiplierBreakdown {
                name: "whale_tax".into(),
                value: whale_tax,
            },
        ];

        let reason_trail = multipliers.iter().map(|m| (m.name.clone(), m.value)).collect();

        let outcome = RewardOutcome {
            mining_delta,
            xp_delta: xp_delta_final,
            rp_delta,
            multipliers,
            cap_hit,
            gated,
            reason_trail,
            antibot: antibot_result.clone(),
        };

        account
            .recent_event_outcomes
            .insert(event.event_id.clone(), outcome.clone());

        info!(
            user_id = %event.user_id,
            event_id = %event.event_id,
            mining_delta,
            xp_delta = xp_delta_final,
            cap_hit,
            gated,
            "activity processed"
        );
        debug!(?antibot_result, ?referral_breakdown, "per-event breakdown");

        self.store
            .update_user(
                &event.user_id,
                Box::new(move |acc| {
                    *acc = account;
                    Ok(())
                }),
            )
            .await?;

        Ok(outcome)
    }

    /// `getUserState(user_id) -> UserAccountView`.
    pub async fn get_user_state(&self, user_id: &str) -> Result<UserAccountView, EngineError> {
        let account = self
            .store
            .try_get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::UnknownUser(user_id.to_string()))?;
        Ok(UserAccountView::from(&account))
    }

    /// `recomputeReferralTier(user_id) -> {rp_total, tier, breakdown}`.
    pub async fn recompute_referral_tier(
        &self,
        user_id: &str,
    ) -> Result<ReferralTierResult, EngineError> {
        let mut account = self
            .store
            .try_get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::UnknownUser(user_id.to_string()))?;

        let snapshot = self.store.get_referral_snapshot(user_id).await?;
        let breakdown = referral::evaluate_referral(&snapshot, Utc::now());

        account.rp_total = Fixed::from_f64(breakdown.rp_total.max(0.0));
        account.recompute_derived();
        let tier = account.rp_tier;

        self.store
            .update_user(
                user_id,
                Box::new(move |acc| {
                    *acc = account;
                    Ok(())
                }),
            )
            .await?;

        Ok(ReferralTierResult {
            rp_total: breakdown.rp_total,
            tier,
            breakdown,
        })
    }

    /// `evaluateHumanProbability(user_id, BehavioralSample) -> AntiBotResult`.
    ///
    /// Called standalone (not attached to a content submission), so the
    /// content-originality factor falls back to a neutral `0.5` — there is
    /// no fresh text to compare against the user's fingerprint history.
    pub async fn evaluate_human_probability(
        &self,
        user_id: &str,
        sample: BehavioralSample,
    ) -> Result<AntiBotResult, EngineError> {
        self.store
            .try_get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::UnknownUser(user_id.to_string()))?;

        let ml_score = self.anomaly.load().score(&sample).await;
        let result = antibot::evaluate(&sample, 0.5, ml_score, &self.config);

        if result.action.is_gated() {
            self.store
                .log_suspicious(AuditRecord {
                    user_id: user_id.to_string(),
                    event_id: String::new(),
                    risk: result.risk.clone(),
                    human_probability: result.human_probability,
                    factor_breakdown: result.factors.clone(),
                    timestamp: Utc::now(),
                })
                .await;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antibot::StubAnomalyScorer;
    use crate::demo::InMemoryStore;
    use crate::event::{
        ActivityKind, ConnectionType, ContentPayload, DeviceDescriptor, NetworkDescriptor,
        Platform,
    };
    use chrono::Duration;

    fn engine() -> Engine {
        let store = Arc::new(InMemoryStore::new(
            NetworkState {
                total_users: 50_000,
                daily_reward_pool: 1_000_000.0,
                last_refresh: Utc::now(),
            },
            30,
        ));
        Engine::new(
            store,
            Arc::new(StubAnomalyScorer::default()),
            EngineConfig::default(),
        )
    }

    fn sample(user_id: &str) -> BehavioralSample {
        BehavioralSample {
            user_id: user_id.to_string(),
            click_intervals_ms: vec![400, 900, 650, 1200, 300, 800],
            session_start: Utc::now(),
            session_end: Utc::now() + Duration::minutes(30),
            hour_histogram: {
                let mut h = [0.02; 24];
                for i in 8..20 {
                    h[i] = 0.08;
                }
                h
            },
            device_id: "d1".into(),
            distinct_devices_30d: 1,
            primary_device_share: 0.95,
            mutual_connections: 10,
            connection_age_days: 120,
            content_hash: None,
        }
    }

    fn wire(user_id: &str, event_id: &str, ts: DateTime<Utc>) -> ActivityEventWire {
        ActivityEventWire {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            kind: ActivityKind::Post,
            platform: Platform::Instagram,
            timestamp: ts,
            content: Some(ContentPayload {
                text_hash: "h1".into(),
                text: Some(
                    "A beautiful sunrise over the mountains today! #travel #nature".into(),
                ),
                media_descriptor: None,
            }),
            device: DeviceDescriptor {
                fingerprint_hex: "deadbeef".into(),
                primary: true,
            },
            network_descriptor: NetworkDescriptor {
                country: "USA".into(),
                connection_type: ConnectionType::Residential,
            },
        }
    }

    #[tokio::test]
    async fn s6_idempotent_replay_returns_prior_outcome() {
        let engine = engine();
        let now = Utc::now();
        let first = engine
            .submit_activity(wire("alice", "E1", now), sample("alice"))
            .await
            .unwrap();

        let replay = engine
            .submit_activity(wire("alice", "E1", now), sample("alice"))
            .await;

        match replay {
            Err(EngineError::DuplicateEvent { prior_outcome, .. }) => {
                assert_eq!(prior_outcome.mining_delta, first.mining_delta);
                assert_eq!(prior_outcome.xp_delta, first.xp_delta);
            }
            other => panic!("expected DuplicateEvent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn monotone_accumulators_across_events() {
        let engine = engine();
        let mut ts = Utc::now();
        let mut prev_mined = 0.0;
        let mut prev_xp = 0.0;
        for i in 0..5 {
            ts += Duration::hours(1);
            let outcome = engine
                .submit_activity(wire("bob", &format!("E{i}"), ts), sample("bob"))
                .await
                .unwrap();
            let state = engine.get_user_state("bob").await.unwrap();
            assert!(state.total_mined >= prev_mined);
            assert!(state.xp_total >= prev_xp);
            prev_mined = state.total_mined;
            prev_xp = state.xp_total;
            assert!(outcome.mining_delta >= 0.0);
        }
    }

    #[tokio::test]
    async fn unknown_user_on_read_only_endpoints() {
        let engine = engine();
        let result = engine.get_user_state("ghost").await;
        assert!(matches!(result, Err(EngineError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn cap_hit_zeroes_further_mining_but_keeps_xp() {
        let engine = engine();
        let mut ts = Utc::now();
        let mut last_outcome = None;
        for i in 0..60 {
            ts += Duration::hours(1);
            let outcome = engine
                .submit_activity(wire("carol", &format!("E{i}"), ts), sample("carol"))
                .await
                .unwrap();
            last_outcome = Some(outcome);
        }
        let state = engine.get_user_state("carol").await.unwrap();
        assert!(state.mined_today <= EngineConfig::default().daily_cap + 1e-9);
        let last = last_outcome.unwrap();
        if last.cap_hit {
            assert_eq!(last.mining_delta, 0.0);
        }
    }
}
