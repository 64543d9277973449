//! Reward calculator — the integrated mining / XP / RP formulas: exponential
//! regressions, tier multipliers, quality weighting, daily caps, and
//! anti-whale taxation.
//!
//! Every multiplier is evaluated in the fixed left-to-right order the spec
//! lists, at [`Fixed`] precision, so replays are bit-stable.

use serde::{Deserialize, Serialize};

use crate::antibot::AntiBotResult;
use crate::event::ActivityKind;
use crate::event::Platform;
use crate::numeric::{exp_neg, Fixed};
use crate::phase::{pioneer_multiplier, Phase};
use crate::referral::{rp_factor, RpTier};

pub const DAILY_CAP: f64 = 15.0;

/// `security_factor`: KYC-verified accounts mine faster.
pub fn security_factor(kyc_verified: bool) -> f64 {
    if kyc_verified {
        1.2
    } else {
        0.8
    }
}

/// `regression(H) = exp(-0.001 * H)` — damps mining rate as cumulative
/// holdings grow, strictly decreasing, tending to 0 as `H -> inf`.
pub fn whale_regression(holdings: f64) -> f64 {
    exp_neg(Fixed::from_f64(0.001 * holdings)).to_f64()
}

/// `referral_factor = min(3.5, 1.0 + 0.1 * active_referrals_30d)`.
pub fn referral_factor(active_referrals_30d: u32) -> f64 {
    (1.0 + 0.1 * active_referrals_30d as f64).min(3.5)
}

/// `network_effect = min(2.0, 1.0 + 0.01 * referral_network_size * referral_quality_score)`.
pub fn network_effect(referral_network_size: u64, referral_quality_score: f64) -> f64 {
    (1.0 + 0.01 * referral_network_size as f64 * referral_quality_score).min(2.0)
}

/// XP-level piecewise mining multiplier (`spec.md` §4.4).
pub fn xp_factor(level: u32) -> f64 {
    let lvl = level as f64;
    match level {
        0..=10 => 1.0 + 0.02 * (lvl - 1.0),
        11..=25 => 1.2 + 0.04 * (lvl - 10.0),
        26..=50 => 1.8 + 0.028 * (lvl - 25.0),
        51..=75 => 2.5 + 0.028 * (lvl - 50.0),
        76..=100 => 3.2 + 0.032 * (lvl - 75.0),
        _ => (4.0 + 0.01 * (lvl - 100.0)).min(5.0),
    }
}

/// Mining rate, per hour, in base units. Multipliers are applied in the
/// order listed by the spec so replays are deterministic at fixed-point
/// precision.
#[allow(clippy::too_many_arguments)]
pub fn mining_rate(
    total_users: u64,
    kyc_verified: bool,
    active_referrals_30d: u32,
    holdings: f64,
    xp_level: u32,
    rp_tier: RpTier,
    quality: f64,
    referral_network_size: u64,
    referral_quality_score: f64,
) -> f64 {
    let phase = Phase::from_total_users(total_users);
    let mut rate = phase.base_rate();
    rate *= pioneer_multiplier(total_users);
    rate *= referral_factor(active_referrals_30d);
    rate *= security_factor(kyc_verified);
    rate *= whale_regression(holdings);
    rate *= xp_factor(xp_level);
    rate *= rp_factor(rp_tier);
    rate *= quality;
    rate *= network_effect(referral_network_size, referral_quality_score);
    rate
}

/// Base XP award per activity kind.
pub fn base_xp(kind: ActivityKind) -> f64 {
    use ActivityKind::*;
    match kind {
        Post => 50.0,
        Comment => 25.0,
        Like => 5.0,
        Share => 15.0,
        Follow => 20.0,
        Story => 25.0,
        Video => 150.0,
        LiveStream => 200.0,
        DailyLogin => 10.0,
        QuestComplete => 100.0,
        Milestone => 500.0,
        ViralContent => 1000.0,
        ReferralL1ActivityDecay | ReferralL2ActivityDecay | ReferralL3ActivityDecay => 0.0,
    }
}

pub fn platform_mult(platform: Platform) -> f64 {
    use Platform::*;
    match platform {
        TikTok => 1.3,
        YouTube => 1.4,
        Instagram => 1.2,
        X => 1.2,
        Facebook => 1.1,
        LinkedIn => 1.1,
        OwnApp => 1.0,
    }
}

pub fn streak_bonus(streak_days: u32) -> f64 {
    match streak_days {
        0..=2 => 1.0,
        3..=6 => 1.2,
        7..=13 => 1.5,
        14..=29 => 2.0,
        _ => 3.0,
    }
}

pub fn level_progression(level: u32) -> f64 {
    exp_neg(Fixed::from_f64(0.01 * level as f64)).to_f64()
}

/// Per-kind per-day soft limit, or `None` for kinds the spec does not cap
/// (one-off / rare events: live-streams, daily login, quests, milestones,
/// viral content, referral-decay ticks).
pub fn soft_limit(kind: ActivityKind) -> Option<u32> {
    use ActivityKind::*;
    match kind {
        Post => Some(20),
        Comment => Some(100),
        Like => Some(200),
        Share => Some(50),
        Follow => Some(25),
        Video => Some(10),
        Story => Some(50),
        _ => None,
    }
}

/// `anti_spam`: ratio of the user's same-kind count so far today against
/// the soft limit -> `1.0` below 70% usage, `0.6` at 70-90%, `0.2` at
/// 90-100%, `0.0` past 100%. Kinds with no soft limit are never throttled.
pub fn anti_spam(kind: ActivityKind, count_today_before_event: u32) -> f64 {
    let Some(limit) = soft_limit(kind) else {
        return 1.0;
    };
    if limit == 0 {
        return 0.0;
    }
    let usage = count_today_before_event as f64 / limit as f64;
    if usage >= 1.0 {
        0.0
    } else if usage >= 0.9 {
        0.2
    } else if usage >= 0.7 {
        0.6
    } else {
        1.0
    }
}

/// `daily_activity_factor`: a smooth same-day diminishing-returns term
/// complementing the step-function `anti_spam` gate, so repeated actions of
/// the same kind within a day taper continuously rather than only at the
/// 70/90/100% soft-limit steps. See DESIGN.md for this resolution — the
/// spec names the factor without a formula.
pub fn daily_activity_factor(count_today_before_event: u32) -> f64 {
    1.0 / (1.0 + 0.01 * count_today_before_event as f64)
}

pub const XP_DELTA_MIN: f64 = 1.0;
pub const XP_DELTA_MAX: f64 = 2000.0;

#[allow(clippy::too_many_arguments)]
pub fn xp_delta(
    kind: ActivityKind,
    platform: Platform,
    quality: f64,
    streak_days: u32,
    level: u32,
    count_today_before_event: u32,
) -> f64 {
    let raw = base_xp(kind)
        * platform_mult(platform)
        * quality
        * streak_bonus(streak_days)
        * level_progression(level)
        * anti_spam(kind, count_today_before_event)
        * daily_activity_factor(count_today_before_event);
    raw.clamp(XP_DELTA_MIN, XP_DELTA_MAX)
}

/// Derive `xp_level` from `xp_total` by the fixed monotone band table:
/// bands at 0, 1_000, 5_000, 20_000, 50_000, 100_000 xp, linear inside each
/// band with a band-specific step, aligned to the `xp_factor` level
/// bands (`[1,10]`, `[11,25]`, `[26,50]`, `[51,75]`, `[76,100]`, `>100`).
pub fn level_from_xp(xp_total: f64) -> u32 {
    let xp = xp_total.max(0.0);
    if xp < 1_000.0 {
        1 + (xp / (1_000.0 / 10.0)).floor() as u32
    } else if xp < 5_000.0 {
        11 + ((xp - 1_000.0) / (4_000.0 / 15.0)).floor() as u32
    } else if xp < 20_000.0 {
        26 + ((xp - 5_000.0) / 600.0).floor() as u32
    } else if xp < 50_000.0 {
        51 + ((xp - 20_000.0) / 1_200.0).floor() as u32
    } else if xp < 100_000.0 {
        76 + ((xp - 50_000.0) / 2_000.0).floor() as u32
    } else {
        101 + ((xp - 100_000.0) / 10_000.0).floor() as u32
    }
}

/// Multiplicative anti-whale tax applied after the daily cap, per the
/// spec's determinism resolution of Open Question (b).
pub fn whale_tax_multiplier(holdings: f64) -> f64 {
    if holdings > 100_000.0 {
        1.0 - ((holdings - 100_000.0) / 1_000_000.0).min(0.5)
    } else {
        1.0
    }
}

/// Applied multipliers for the reason trail, in evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplierBreakdown {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub mining_delta: f64,
    pub xp_delta: f64,
    pub rp_delta: f64,
    pub multipliers: Vec<MultiplierBreakdown>,
    pub cap_hit: bool,
    pub gated: bool,
    pub reason_trail: Vec<(String, f64)>,
    /// Full anti-bot evaluation for this event — present whether or not the
    /// event was gated, so a caller can surface risk/human_probability even
    /// on an accepted outcome.
    pub antibot: AntiBotResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xp_factor_matches_bands() {
        assert_eq!(xp_factor(1), 1.0);
        assert!((xp_factor(10) - 1.18).abs() < 1e-9);
        assert!((xp_factor(11) - 1.24).abs() < 1e-9);
        assert!((xp_factor(25) - 1.8).abs() < 1e-9);
        assert!((xp_factor(50) - 2.5).abs() < 1e-9);
        assert!((xp_factor(75) - 3.2).abs() < 1e-9);
        assert!((xp_factor(100) - 4.0).abs() < 1e-9);
        assert_eq!(xp_factor(300), 5.0); // clamps at 5.0
    }

    #[test]
    fn level_from_xp_matches_band_edges() {
        assert_eq!(level_from_xp(0.0), 1);
        assert_eq!(level_from_xp(999.9), 10);
        assert_eq!(level_from_xp(1_000.0), 11);
        assert_eq!(level_from_xp(4_999.9), 25);
        assert_eq!(level_from_xp(5_000.0), 26);
        assert_eq!(level_from_xp(19_999.9), 50);
        assert_eq!(level_from_xp(20_000.0), 51);
        assert_eq!(level_from_xp(49_999.9), 75);
        assert_eq!(level_from_xp(50_000.0), 76);
        assert_eq!(level_from_xp(99_999.9), 100);
        assert_eq!(level_from_xp(100_000.0), 101);
    }

    #[test]
    fn level_from_xp_is_monotone() {
        let mut prev = 0;
        let mut xp = 0.0;
        while xp < 200_000.0 {
            let level = level_from_xp(xp);
            assert!(level >= prev);
            prev = level;
            xp += 137.0;
        }
    }

    #[test]
    fn whale_regression_strictly_decreasing() {
        // exp_neg saturates to 0 once 0.001*holdings exceeds the numeric
        // kernel's [0, 50] domain, i.e. past holdings = 50_000 — stay under
        // that bound to observe strict monotonicity.
        let mut prev = whale_regression(0.0);
        for h in [1_000.0, 10_000.0, 25_000.0, 40_000.0, 49_000.0] {
            let r = whale_regression(h);
            assert!(r < prev, "regression did not decrease at holdings={h}");
            prev = r;
        }
        assert_eq!(whale_regression(1_000_000.0), 0.0);
    }

    #[test]
    fn whale_tax_after_cap_matches_s3() {
        // S3: holdings = 1_100_000 -> tax = 1 - min(0.5, 1_000_000/1_000_000) = 0.5
        assert_eq!(whale_tax_multiplier(1_100_000.0), 0.5);
    }

    #[test]
    fn anti_spam_thresholds() {
        assert_eq!(anti_spam(ActivityKind::Post, 10), 1.0); // 50%
        assert_eq!(anti_spam(ActivityKind::Post, 14), 0.6); // 70%
        assert_eq!(anti_spam(ActivityKind::Post, 19), 0.2); // 95%
        assert_eq!(anti_spam(ActivityKind::Post, 20), 0.0); // 100%
        assert_eq!(anti_spam(ActivityKind::Milestone, 999), 1.0); // uncapped kind
    }

    #[test]
    fn xp_delta_is_clamped() {
        let d = xp_delta(ActivityKind::ViralContent, Platform::YouTube, 2.0, 40, 1, 0);
        assert!(d <= XP_DELTA_MAX);
        let d2 = xp_delta(ActivityKind::Like, Platform::OwnApp, 0.5, 0, 500, 300);
        assert!(d2 >= XP_DELTA_MIN);
    }

    #[test]
    fn s1_pioneer_honest_user_mining_rate() {
        // S1: total_users=50_000, KYC, level 1, no referrals, quality=1.3.
        let rate = mining_rate(50_000, true, 0, 0.0, 1, RpTier::Explorer, 1.3, 0, 0.0);
        // base_rate=0.10, pioneer=1.95, referral=1.0, security=1.2,
        // regression=1.0, xp_factor=1.0, rp_factor=1.0, quality=1.3, network=1.0
        let expected = 0.10 * 1.95 * 1.0 * 1.2 * 1.0 * 1.0 * 1.0 * 1.3 * 1.0;
        assert!((rate - expected).abs() < 1e-9);
        assert!((rate - 0.304).abs() < 1e-3);
    }
}
