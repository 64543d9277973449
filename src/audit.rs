//! Audit channel — an append-only stream of suspicious-activity records.
//! Consumers are external; the engine never waits on them (`spec.md` §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::antibot::{FactorBreakdown, RiskLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user_id: String,
    pub event_id: String,
    pub risk: RiskLevel,
    pub human_probability: f64,
    pub factor_breakdown: FactorBreakdown,
    pub timestamp: DateTime<Utc>,
}
