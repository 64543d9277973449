//! Behavioral anti-bot scorer — weighted heuristics combined with a
//! pluggable learned anomaly detector into a human-probability, risk
//! classification, recommended action, and confidence.

mod factors;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::EngineConfig;

pub use factors::{
    click_cadence_variance, content_originality, device_consistency,
    session_rhythm_consistency, social_graph_authenticity, temporal_pattern,
};

const W_CLICK_CADENCE: f64 = 0.20;
const W_SESSION_RHYTHM: f64 = 0.15;
const W_CONTENT_ORIGINALITY: f64 = 0.25;
const W_SOCIAL_GRAPH: f64 = 0.20;
const W_DEVICE_CONSISTENCY: f64 = 0.10;
const W_TEMPORAL_PATTERN: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    None,
    Watch,
    Verify,
    Suspend,
}

impl Action {
    fn from_human_probability(p: f64) -> Action {
        if p >= 0.85 {
            Action::None
        } else if p >= 0.6 {
            Action::Watch
        } else if p >= 0.3 {
            Action::Verify
        } else {
            Action::Suspend
        }
    }

    /// Per the spec's gate semantics: VERIFY and SUSPEND zero mining and
    /// freeze RP for the event.
    pub fn is_gated(self) -> bool {
        matches!(self, Action::Verify | Action::Suspend)
    }
}

fn risk_from_action(action: Action) -> RiskLevel {
    match action {
        Action::None => RiskLevel::Low,
        Action::Watch => RiskLevel::Medium,
        Action::Verify => RiskLevel::High,
        Action::Suspend => RiskLevel::Critical,
    }
}

/// A behavioral sample collected per-event or per-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralSample {
    pub user_id: String,
    pub click_intervals_ms: Vec<u64>,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    /// 24-bucket hour-of-day histogram, need not be pre-normalized.
    pub hour_histogram: [f64; 24],
    pub device_id: String,
    pub distinct_devices_30d: u32,
    pub primary_device_share: f64,
    pub mutual_connections: u32,
    pub connection_age_days: u32,
    /// Content hash for originality lookup, if this sample accompanies a
    /// content submission.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub click_cadence: f64,
    pub session_rhythm: f64,
    pub content_originality: f64,
    pub social_graph: f64,
    pub device_consistency: f64,
    pub temporal_pattern: f64,
    pub ml_anomaly: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiBotResult {
    pub human_probability: f64,
    pub risk: RiskLevel,
    pub action: Action,
    pub confidence: f64,
    pub factors: FactorBreakdown,
}

/// A pluggable, synchronous-per-call outlier detector. Implementations may
/// be swapped atomically behind an `ArcSwap` (see `Engine`); in-flight
/// evaluations continue against the version they started with.
#[async_trait]
pub trait AnomalyScorer: Send + Sync {
    async fn score(&self, sample: &BehavioralSample) -> f64;
}

/// A zero-dependency default scorer returning a fixed constant. Used in
/// tests and the demo binary; real deployments plug in a trained model
/// behind the same trait.
pub struct StubAnomalyScorer {
    pub constant: f64,
}

impl Default for StubAnomalyScorer {
    fn default() -> Self {
        StubAnomalyScorer { constant: 0.5 }
    }
}

#[async_trait]
impl AnomalyScorer for StubAnomalyScorer {
    async fn score(&self, _sample: &BehavioralSample) -> f64 {
        self.constant
    }
}

/// Score a behavioral sample against the weighted heuristics plus the
/// supplied anomaly score, producing the full [`AntiBotResult`].
///
/// `content_originality_score` is the quality assessor's originality
/// signal for this event's content, or `0.5` if the event carried no
/// content. `heuristic_weight`/`ml_weight` come from [`EngineConfig`] so a
/// deployment can retune the ML/heuristic blend without a code change.
pub fn evaluate(
    sample: &BehavioralSample,
    content_originality_score: f64,
    ml_anomaly: f64,
    config: &EngineConfig,
) -> AntiBotResult {
    let click = click_cadence_variance(sample);
    let session = session_rhythm_consistency(sample);
    let originality = content_originality(content_originality_score);
    let social = social_graph_authenticity(sample);
    let device = device_consistency(sample);
    let temporal = temporal_pattern(&sample.hour_histogram);

    let heuristic = W_CLICK_CADENCE * click
        + W_SESSION_RHYTHM * session
        + W_CONTENT_ORIGINALITY * originality
        + W_SOCIAL_GRAPH * social
        + W_DEVICE_CONSISTENCY * device
        + W_TEMPORAL_PATTERN * temporal;

    let human_probability =
        (config.heuristic_weight * heuristic + config.ml_weight * ml_anomaly).clamp(0.0, 1.0);

    let action = Action::from_human_probability(human_probability);
    let risk = risk_from_action(action);

    let factor_scores = vec![click, session, originality, social, device, temporal];
    let variance = factor_scores.variance();
    let confidence = (1.0 - variance).clamp(0.5, 1.0);

    AntiBotResult {
        human_probability,
        risk,
        action,
        confidence,
        factors: FactorBreakdown {
            click_cadence: click,
            session_rhythm: session,
            content_originality: originality,
            social_graph: social,
            device_consistency: device,
            temporal_pattern: temporal,
            ml_anomaly,
        },
    }
}
