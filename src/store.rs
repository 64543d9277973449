//! State store interface — abstract read/write of per-user aggregates and
//! daily counters. No storage technology is implied; the engine only ever
//! sees this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::error::EngineError;
use crate::event::ActivityKind;
use crate::numeric::Fixed;
use crate::phase::Phase;
use crate::referral::{tier_from_rp, ReferralSnapshot, RpTier};
use crate::reward::level_from_xp;

/// `(utc_date, mined_today, actions_by_type)`. The first event on a new UTC
/// day — determined from `event.timestamp`, never wall-clock — resets both
/// `mined_today` and `actions_by_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCounter {
    pub utc_date: NaiveDate,
    pub mined_today: f64,
    pub actions_by_type: HashMap<ActivityKind, u32>,
}

impl DailyCounter {
    pub fn new(utc_date: NaiveDate) -> DailyCounter {
        DailyCounter {
            utc_date,
            mined_today: 0.0,
            actions_by_type: HashMap::new(),
        }
    }

    /// Rolls over to `utc_date` if it differs from the counter's own date,
    /// resetting `mined_today` and `actions_by_type`.
    pub fn roll_over_if_needed(&mut self, utc_date: NaiveDate) {
        if self.utc_date != utc_date {
            self.utc_date = utc_date;
            self.mined_today = 0.0;
            self.actions_by_type.clear();
        }
    }

    pub fn count_for(&self, kind: ActivityKind) -> u32 {
        self.actions_by_type.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    pub kyc_verified: bool,
    pub total_mined: Fixed,
    pub holdings: Fixed,
    pub xp_total: Fixed,
    pub xp_level: u32,
    pub rp_total: Fixed,
    pub rp_tier: RpTier,
    pub streak_days: u32,
    pub staked_amount: Fixed,
    pub staking_tier_id: Option<String>,
    pub stake_started_at: Option<DateTime<Utc>>,
    pub direct_referrer_id: Option<String>,
    pub daily_counter: DailyCounter,
    /// Last 30 days of processed `event_id`s mapped to their outcome, used
    /// for idempotent replay detection per the concurrency contract.
    pub recent_event_outcomes: HashMap<String, crate::reward::RewardOutcome>,
    /// Last 30 days of submitted content text, newest last, used by the
    /// quality assessor's originality signal.
    pub recent_content: Vec<(DateTime<Utc>, String)>,
}

impl UserAccount {
    pub fn new(id: String, now: DateTime<Utc>) -> UserAccount {
        UserAccount {
            id,
            created_at: now,
            last_event_at: now,
            kyc_verified: false,
            total_mined: Fixed::ZERO,
            holdings: Fixed::ZERO,
            xp_total: Fixed::ZERO,
            xp_level: level_from_xp(0.0),
            rp_total: Fixed::ZERO,
            rp_tier: tier_from_rp(Fixed::ZERO),
            streak_days: 0,
            staked_amount: Fixed::ZERO,
            staking_tier_id: None,
            stake_started_at: None,
            direct_referrer_id: None,
            daily_counter: DailyCounter::new(now.date_naive()),
            recent_event_outcomes: HashMap::new(),
            recent_content: Vec::new(),
        }
    }

    /// Builds a [`crate::quality::ContentHistory`] from the last 30 days
    /// of submitted content, relative to `now`.
    pub fn content_history(&self, now: DateTime<Utc>) -> crate::quality::ContentHistory {
        let cutoff = now - chrono::Duration::days(30);
        crate::quality::ContentHistory {
            fingerprints: self
                .recent_content
                .iter()
                .filter(|(ts, _)| *ts >= cutoff)
                .map(|(_, text)| crate::quality::shingle_hashes(text))
                .collect(),
        }
    }

    /// Re-derive `xp_level` and `rp_tier` from their totals; must be
    /// invoked after every mutation that touches `xp_total` or `rp_total`.
    pub fn recompute_derived(&mut self) {
        self.xp_level = level_from_xp(self.xp_total.to_f64());
        self.rp_tier = tier_from_rp(self.rp_total);
    }

    /// Checks the two derived-field invariants hold; callers surface
    /// `InvariantViolation` and quarantine the record if this ever fails.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        if self.xp_level != level_from_xp(self.xp_total.to_f64()) {
            return Err(EngineError::InvariantViolation(format!(
                "xp_level {} does not match levelFromXp({})",
                self.xp_level, self.xp_total
            )));
        }
        if self.rp_tier != tier_from_rp(self.rp_total) {
            return Err(EngineError::InvariantViolation(format!(
                "rp_tier does not match tierFromRp({})",
                self.rp_total
            )));
        }
        if self.daily_counter.mined_today > crate::reward::DAILY_CAP + 1e-9 {
            return Err(EngineError::InvariantViolation(
                "mined_today exceeds DAILY_CAP".into(),
            ));
        }
        Ok(())
    }

    /// Applies the streak rule: increments by at most 1 per UTC day if the
    /// event falls within 48h of `last_event_at`, otherwise resets to 1.
    pub fn update_streak(&mut self, event_time: DateTime<Utc>) {
        let gap = event_time - self.last_event_at;
        if self.streak_days == 0 {
            self.streak_days = 1;
        } else if gap <= chrono::Duration::hours(48) && event_time.date_naive() != self.last_event_at.date_naive() {
            self.streak_days += 1;
        } else if gap > chrono::Duration::hours(48) {
            self.streak_days = 1;
        }
    }
}

/// Single global record describing the overall network, updated
/// atomically by an external job; read-only from the engine's perspective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetworkState {
    pub total_users: u64,
    pub daily_reward_pool: f64,
    pub last_refresh: DateTime<Utc>,
}

impl NetworkState {
    pub fn phase(&self) -> Phase {
        Phase::from_total_users(self.total_users)
    }
}

/// Abstract per-user, per-network state access. No storage technology is
/// implied; a reference in-memory implementation lives in [`crate::demo`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetches the account for `id`, creating one if this is the first
    /// event seen for the subject. Used by `submitActivity`, which is
    /// always allowed to create an account.
    async fn get_user(&self, id: &str) -> Result<UserAccount, EngineError>;

    /// Fetches the account for `id` without creating one; used by the
    /// read-only RPC methods (`getUserState`, `recomputeReferralTier`,
    /// `evaluateHumanProbability`), which surface `UnknownUser` rather than
    /// fabricating a fresh account for a subject that never submitted an
    /// event.
    async fn try_get_user(&self, id: &str) -> Result<Option<UserAccount>, EngineError>;

    /// Applies `mutator` to the user's account atomically. The mutator may
    /// return an error to abort the mutation without committing any
    /// partial state.
    async fn update_user(
        &self,
        id: &str,
        mutator: Box<dyn for<'a> FnOnce(&'a mut UserAccount) -> Result<(), EngineError> + Send>,
    ) -> Result<UserAccount, EngineError>;

    /// Read-only network snapshot, at most 5 minutes stale.
    async fn get_network_state(&self) -> Result<NetworkState, EngineError>;

    /// Bounded-depth referral view, up to 1 hour stale.
    async fn get_referral_snapshot(&self, user_id: &str) -> Result<ReferralSnapshot, EngineError>;

    /// Best-effort audit sink; errors here are logged and never propagate.
    async fn log_suspicious(&self, record: AuditRecord);

    /// Registers `referrer_id` as `user_id`'s direct referrer, rejecting
    /// the insertion with `GraphCycle` if it would create a cycle anywhere
    /// in the up-to-3-hop referral graph.
    async fn set_direct_referrer(
        &self,
        user_id: &str,
        referrer_id: &str,
    ) -> Result<(), EngineError>;
}
