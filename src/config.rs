//! Engine configuration — policy parameters the spec leaves to deployment
//! (daily cap, referral depth, anomaly-weighting, anti-bot thresholds),
//! as distinct from the formula constants fixed by the spec itself.
//!
//! Loaded the way the teacher's `Config::from_env` loads deployment
//! settings: `dotenv` + `std::env::var` with typed fallbacks, but every
//! field also carries the spec-correct default so `EngineConfig::default()`
//! is usable with no environment at all.

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub daily_cap: f64,
    pub max_referral_depth: u8,
    /// Window, in days, over which a referral must have at least one
    /// qualifying activity event to count toward `active_referrals_30d`.
    /// Resolves Open Question (a): a referee who churns mid-window simply
    /// drops out of the numerator on their first inactive day.
    pub active_referral_window_days: i64,
    /// Weight given to the heuristic anti-bot score vs. the pluggable ML
    /// anomaly score when combining into `human_probability`.
    pub heuristic_weight: f64,
    pub ml_weight: f64,
    /// XP retained for gated (VERIFY/SUSPEND) events, per §9(c).
    pub gated_xp_retention: f64,
    pub max_retry_attempts: u8,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            daily_cap: crate::reward::DAILY_CAP,
            max_referral_depth: crate::referral::MAX_REFERRAL_DEPTH,
            active_referral_window_days: 30,
            heuristic_weight: 0.7,
            ml_weight: 0.3,
            gated_xp_retention: 0.1,
            max_retry_attempts: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> EngineConfig {
        dotenv::dotenv().ok();

        let defaults = EngineConfig::default();

        EngineConfig {
            daily_cap: std::env::var("FINENGINE_DAILY_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.daily_cap),
            max_referral_depth: std::env::var("FINENGINE_MAX_REFERRAL_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_referral_depth),
            active_referral_window_days: std::env::var("FINENGINE_ACTIVE_REFERRAL_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.active_referral_window_days),
            heuristic_weight: std::env::var("FINENGINE_HEURISTIC_WEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.heuristic_weight),
            ml_weight: std::env::var("FINENGINE_ML_WEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ml_weight),
            gated_xp_retention: std::env::var("FINENGINE_GATED_XP_RETENTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gated_xp_retention),
            max_retry_attempts: std::env::var("FINENGINE_MAX_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retry_attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.daily_cap, 15.0);
        assert_eq!(cfg.max_referral_depth, 3);
        assert_eq!(cfg.heuristic_weight + cfg.ml_weight, 1.0);
    }
}
