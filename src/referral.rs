//! Referral-network evaluator — aggregates up to three hop levels, applies
//! per-level decay, quality and diversity bonuses, and a size-based
//! regression to produce an RP value and tier assignment.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::numeric::Fixed;

pub const MAX_REFERRAL_DEPTH: u8 = 3;

const L2_DECAY: f64 = 0.3;
const L3_DECAY: f64 = 0.1;
const TIME_DECAY_HORIZON_DAYS: f64 = 730.0;
const TIME_DECAY_FLOOR: f64 = 0.5;

/// RP tier bands (`rp_total` lower-bound, inclusive):
/// Explorer `[0, 1_000)`, Connector `[1_000, 5_000)`,
/// Influencer `[5_000, 15_000)`, Leader `[15_000, 50_000)`,
/// Ambassador `[50_000, inf)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpTier {
    Explorer,
    Connector,
    Influencer,
    Leader,
    Ambassador,
}

pub fn tier_from_rp(rp_total: Fixed) -> RpTier {
    // Compared at `Fixed` precision, never rounded through `f64`, so exact
    // integer band edges (1_000, 5_000, ...) land in the upper band.
    if rp_total < Fixed::from_i64(1_000) {
        RpTier::Explorer
    } else if rp_total < Fixed::from_i64(5_000) {
        RpTier::Connector
    } else if rp_total < Fixed::from_i64(15_000) {
        RpTier::Influencer
    } else if rp_total < Fixed::from_i64(50_000) {
        RpTier::Leader
    } else {
        RpTier::Ambassador
    }
}

/// `rp_factor` used by the reward calculator's mining rate formula.
pub fn rp_factor(tier: RpTier) -> f64 {
    match tier {
        RpTier::Explorer => 1.0,
        RpTier::Connector => 1.2,
        RpTier::Influencer => 1.5,
        RpTier::Leader => 2.0,
        RpTier::Ambassador => 3.0,
    }
}

/// One member of a referral network at some hop level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralMember {
    pub user_id: String,
    pub active_30d: bool,
    pub xp_level: u32,
    pub joined_at: DateTime<Utc>,
    pub platform: String,
    pub country: String,
    pub activity_pattern: String,
    /// The referee's own 30-day XP gain, pre-scaled into `[0, 2]` per the
    /// spec's `activity_score` definition.
    pub activity_score: f64,
}

/// A bounded-depth view of a user's downstream network, cacheable for up
/// to 1 hour per the state-store contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralSnapshot {
    pub direct: Vec<ReferralMember>,
    pub l2: Vec<ReferralMember>,
    pub l3: Vec<ReferralMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralBreakdown {
    pub direct_rp: f64,
    pub l2_rp: f64,
    pub l3_rp: f64,
    pub quality: f64,
    pub diversity: f64,
    pub network_regression: f64,
    pub rp_total: f64,
}

fn time_decay(days_since_joined: f64) -> f64 {
    (1.0 - days_since_joined / TIME_DECAY_HORIZON_DAYS).max(TIME_DECAY_FLOOR)
}

/// Scales a referee's level into the multiplicative weight the spec names
/// `level_factor` without pinning a formula for it. A higher-level referee
/// is a disproportionately more valuable network participant, so this
/// grows superlinearly in level, capped to keep a handful of max-level
/// referrals from dominating the sum outright. See DESIGN.md for why this
/// resolution was chosen over a linear scaling.
fn level_factor(xp_level: u32) -> f64 {
    (xp_level as f64).powi(2).min(10_000.0)
}

fn days_since(joined_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - joined_at).num_seconds().max(0) as f64 / 86_400.0
}

fn direct_rp(members: &[ReferralMember], now: DateTime<Utc>) -> f64 {
    members
        .iter()
        .map(|m| m.activity_score * level_factor(m.xp_level) * time_decay(days_since(m.joined_at, now)))
        .sum()
}

fn hop_rp(members: &[ReferralMember], decay: f64) -> f64 {
    members.iter().map(|m| m.activity_score * decay).sum()
}

fn active_ratio(members: &[ReferralMember]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    members.iter().filter(|m| m.active_30d).count() as f64 / members.len() as f64
}

fn mean_level(members: &[ReferralMember]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    members.iter().map(|m| m.xp_level as f64).sum::<f64>() / members.len() as f64
}

fn all_members(snapshot: &ReferralSnapshot) -> impl Iterator<Item = &ReferralMember> {
    snapshot
        .direct
        .iter()
        .chain(snapshot.l2.iter())
        .chain(snapshot.l3.iter())
}

/// `quality = 0.4*active_ratio_30d + 0.3*mean_level/100 + 0.3*diversity_of_platforms_and_countries`
fn quality_score(snapshot: &ReferralSnapshot) -> f64 {
    let members: Vec<&ReferralMember> = all_members(snapshot).collect();
    if members.is_empty() {
        return 0.0;
    }
    let direct_refs: Vec<ReferralMember> = members.iter().map(|m| (*m).clone()).collect();
    let active = active_ratio(&direct_refs);
    let level = (mean_level(&direct_refs) / 100.0).clamp(0.0, 1.0);

    let platforms: HashSet<&str> = members.iter().map(|m| m.platform.as_str()).collect();
    let countries: HashSet<&str> = members.iter().map(|m| m.country.as_str()).collect();
    let diversity_ratio =
        (platforms.len().min(5) as f64 / 5.0 + countries.len().min(3) as f64 / 3.0) / 2.0;

    (0.4 * active + 0.3 * level + 0.3 * diversity_ratio).clamp(0.0, 1.0)
}

/// `diversity in [1.0, 1.5]`: +0.1 per distinct platform up to 5, +0.1 per
/// distinct country up to 3, +0.1 per distinct activity-pattern up to 3.
fn diversity_bonus(snapshot: &ReferralSnapshot) -> f64 {
    let members: Vec<&ReferralMember> = all_members(snapshot).collect();
    let platforms: HashSet<&str> = members.iter().map(|m| m.platform.as_str()).collect();
    let countries: HashSet<&str> = members.iter().map(|m| m.country.as_str()).collect();
    let patterns: HashSet<&str> = members.iter().map(|m| m.activity_pattern.as_str()).collect();

    let bonus = platforms.len().min(5) as f64 * 0.1
        + countries.len().min(3) as f64 * 0.1
        + patterns.len().min(3) as f64 * 0.1;

    (1.0 + bonus).clamp(1.0, 1.5)
}

/// Evaluate a referral snapshot into an RP value and breakdown. Graph depth
/// (at most 3 hops, each subject visited once) and cycle-freedom are the
/// responsibility of the state store's referral-graph maintenance; this
/// function trusts the snapshot it is given.
///
/// `total_network_size` is this user's own downstream network size
/// (direct + L2 + L3 member count) — the regression damps a single user's
/// RP as *their own* network grows, independent of the platform's total
/// user count (which instead drives the phase oracle).
pub fn evaluate_referral(snapshot: &ReferralSnapshot, now: DateTime<Utc>) -> ReferralBreakdown {
    let direct = direct_rp(&snapshot.direct, now);
    let l2 = hop_rp(&snapshot.l2, L2_DECAY);
    let l3 = hop_rp(&snapshot.l3, L3_DECAY);

    let total_network_size = snapshot.direct.len() + snapshot.l2.len() + snapshot.l3.len();
    let quality = quality_score(snapshot);
    let diversity = diversity_bonus(snapshot);
    let network_regression = (-0.0001 * total_network_size as f64 * quality).exp();

    let rp_total = ((direct + l2 + l3) * quality * diversity * network_regression).max(0.0);

    ReferralBreakdown {
        direct_rp: direct,
        l2_rp: l2,
        l3_rp: l3,
        quality,
        diversity,
        network_regression,
        rp_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn member(level: u32, platform: &str, country: &str, score: f64) -> ReferralMember {
        ReferralMember {
            user_id: format!("m-{level}-{platform}"),
            active_30d: true,
            xp_level: level,
            joined_at: Utc::now() - Duration::days(30),
            platform: platform.to_string(),
            country: country.to_string(),
            activity_pattern: "daily".to_string(),
            activity_score: score,
        }
    }

    #[test]
    fn tier_bands_match_spec() {
        assert_eq!(tier_from_rp(Fixed::from_f64(0.0)), RpTier::Explorer);
        assert_eq!(tier_from_rp(Fixed::from_f64(999.0)), RpTier::Explorer);
        assert_eq!(tier_from_rp(Fixed::from_f64(1_000.0)), RpTier::Connector);
        assert_eq!(tier_from_rp(Fixed::from_f64(5_000.0)), RpTier::Influencer);
        assert_eq!(tier_from_rp(Fixed::from_f64(15_000.0)), RpTier::Leader);
        assert_eq!(tier_from_rp(Fixed::from_f64(50_000.0)), RpTier::Ambassador);
    }

    #[test]
    fn empty_network_has_zero_rp() {
        let snapshot = ReferralSnapshot::default();
        let result = evaluate_referral(&snapshot, Utc::now());
        assert_eq!(result.rp_total, 0.0);
    }

    #[test]
    fn s5_promotion_to_influencer() {
        // S5: 30 direct referrals, level 10, active, 3 platforms, 2 countries.
        let platforms = ["tiktok", "instagram", "youtube"];
        let countries = ["usa", "india"];
        let direct: Vec<ReferralMember> = (0..30)
            .map(|i| member(10, platforms[i % 3], countries[i % 2], 2.0))
            .collect();
        let snapshot = ReferralSnapshot {
            direct,
            l2: vec![],
            l3: vec![],
        };
        let result = evaluate_referral(&snapshot, Utc::now());
        assert!((5_000.0..15_000.0).contains(&result.rp_total), "got {}", result.rp_total);
        assert_eq!(tier_from_rp(Fixed::from_f64(result.rp_total)), RpTier::Influencer);
    }

    #[test]
    fn rp_factor_matches_table() {
        assert_eq!(rp_factor(RpTier::Explorer), 1.0);
        assert_eq!(rp_factor(RpTier::Connector), 1.2);
        assert_eq!(rp_factor(RpTier::Influencer), 1.5);
        assert_eq!(rp_factor(RpTier::Leader), 2.0);
        assert_eq!(rp_factor(RpTier::Ambassador), 3.0);
    }
}
