//! Phase oracle — maps total-network-user-count to mining-phase parameters.
//!
//! Boundaries belong to the upper phase (half-open intervals); a boundary
//! crossing takes effect on the next event, never retroactively, since the
//! engine only ever reads a [`crate::store::NetworkState`] snapshot at the
//! moment an event is processed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Pioneer,
    Growth,
    Maturity,
    Stability,
}

impl Phase {
    pub fn from_total_users(total_users: u64) -> Phase {
        match total_users {
            0..=99_999 => Phase::Pioneer,
            100_000..=999_999 => Phase::Growth,
            1_000_000..=9_999_999 => Phase::Maturity,
            _ => Phase::Stability,
        }
    }

    /// Base mining rate in units/hour for this phase.
    pub fn base_rate(self) -> f64 {
        match self {
            Phase::Pioneer => 0.10,
            Phase::Growth => 0.05,
            Phase::Maturity => 0.025,
            Phase::Stability => 0.01,
        }
    }
}

/// `pioneer(total_users)`: `max(1.0, min(2.0, 2.0 - total_users/1_000_000))`
/// in Pioneer phase, `1.0` in every other phase.
pub fn pioneer_multiplier(total_users: u64) -> f64 {
    if Phase::from_total_users(total_users) != Phase::Pioneer {
        return 1.0;
    }
    let raw = 2.0 - (total_users as f64) / 1_000_000.0;
    raw.clamp(1.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_upper_phase() {
        assert_eq!(Phase::from_total_users(99_999), Phase::Pioneer);
        assert_eq!(Phase::from_total_users(100_000), Phase::Growth);
        assert_eq!(Phase::from_total_users(999_999), Phase::Growth);
        assert_eq!(Phase::from_total_users(1_000_000), Phase::Maturity);
        assert_eq!(Phase::from_total_users(9_999_999), Phase::Maturity);
        assert_eq!(Phase::from_total_users(10_000_000), Phase::Stability);
    }

    #[test]
    fn pioneer_multiplier_clamped() {
        assert_eq!(pioneer_multiplier(0), 2.0);
        assert_eq!(pioneer_multiplier(50_000), 1.95);
        assert_eq!(pioneer_multiplier(99_999), 2.0 - 99_999.0 / 1_000_000.0);
        assert_eq!(pioneer_multiplier(500_000), 1.0); // Growth phase
    }

    #[test]
    fn base_rates_match_table() {
        assert_eq!(Phase::Pioneer.base_rate(), 0.10);
        assert_eq!(Phase::Growth.base_rate(), 0.05);
        assert_eq!(Phase::Maturity.base_rate(), 0.025);
        assert_eq!(Phase::Stability.base_rate(), 0.01);
    }
}
