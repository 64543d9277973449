//! Per-factor heuristics for the anti-bot scorer.
//!
//! Each function mirrors one analyzer method from the original behavioral
//! model (`behavior_analyzer.py` / `behavioral_features.py`) — click
//! cadence, session rhythm, circadian/temporal distribution, device
//! consistency — reimplemented as independent, deterministic free
//! functions instead of a class hierarchy, matching the spec's
//! weighted-heuristic design (`spec.md` §4.6).

use statrs::statistics::Statistics;

use super::BehavioralSample;

/// Human click intervals have natural variance; near-zero variance is
/// bot-like. Returns a score in `[0, 1]`.
pub fn click_cadence_variance(sample: &BehavioralSample) -> f64 {
    if sample.click_intervals_ms.len() < 3 {
        return 0.5;
    }
    let intervals: Vec<f64> = sample.click_intervals_ms.iter().map(|v| *v as f64).collect();
    let mean = intervals.clone().mean();
    let std = intervals.std_dev();
    if mean <= 0.0 {
        return 0.2;
    }
    let cv = std / mean;
    if std < 1.0 {
        0.1 // suspiciously uniform intervals
    } else if (0.2..=1.2).contains(&cv) {
        0.9
    } else {
        0.5
    }
}

/// Sessions with breaks between 5 minutes and 8 hours read as human; always
/// active or always instantaneous reads as bot-like.
pub fn session_rhythm_consistency(sample: &BehavioralSample) -> f64 {
    let duration = sample.session_end - sample.session_start;
    let minutes = duration.num_seconds() as f64 / 60.0;
    if (5.0..=480.0).contains(&minutes) {
        0.85
    } else if minutes < 1.0 {
        0.2
    } else {
        0.5
    }
}

/// Low similarity to the user's own past content reads as human; this is
/// the antibot-facing wrapper over the quality assessor's originality
/// signal, taking an already-computed score so the two subsystems never
/// duplicate the fingerprint-comparison logic.
pub fn content_originality(originality_score: f64) -> f64 {
    originality_score.clamp(0.0, 1.0)
}

/// Mutual connections and connection age read as human-authentic.
pub fn social_graph_authenticity(sample: &BehavioralSample) -> f64 {
    let mutual = sample.mutual_connections as f64;
    let age_days = sample.connection_age_days as f64;
    let mutual_score = (mutual / 10.0).clamp(0.0, 1.0);
    let age_score = (age_days / 90.0).clamp(0.0, 1.0);
    (0.5 * mutual_score + 0.5 * age_score).clamp(0.0, 1.0)
}

/// At most 3 primary devices, with at least 60% of activity from one,
/// reads as human.
pub fn device_consistency(sample: &BehavioralSample) -> f64 {
    if sample.distinct_devices_30d == 0 {
        return 0.5;
    }
    if sample.distinct_devices_30d > 3 {
        return 0.2;
    }
    if sample.primary_device_share >= 0.6 {
        0.9
    } else {
        0.5
    }
}

/// Low night activity, high day activity reads as human. `hour_histogram`
/// has 24 buckets normalized to sum to 1.0.
pub fn temporal_pattern(hour_histogram: &[f64; 24]) -> f64 {
    const EXPECTED: [f64; 24] = [
        0.02, 0.01, 0.01, 0.01, 0.02, 0.03, 0.06, 0.08, 0.09, 0.08, 0.07, 0.06, 0.07, 0.08, 0.09,
        0.08, 0.07, 0.06, 0.05, 0.04, 0.03, 0.03, 0.02, 0.02,
    ];
    let total: f64 = hour_histogram.iter().sum();
    if total <= 0.0 {
        return 0.5;
    }
    let normalized: Vec<f64> = hour_histogram.iter().map(|v| v / total).collect();
    let l1_distance: f64 = normalized
        .iter()
        .zip(EXPECTED.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    (1.0 - l1_distance / 2.0).clamp(0.1, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn base_sample() -> BehavioralSample {
        BehavioralSample {
            user_id: "u1".into(),
            click_intervals_ms: vec![],
            session_start: Utc::now(),
            session_end: Utc::now() + Duration::minutes(30),
            hour_histogram: [1.0 / 24.0; 24],
            device_id: "d1".into(),
            distinct_devices_30d: 1,
            primary_device_share: 1.0,
            mutual_connections: 5,
            connection_age_days: 60,
            content_hash: None,
        }
    }

    #[test]
    fn uniform_clicks_are_suspicious() {
        let mut s = base_sample();
        s.click_intervals_ms = vec![500, 500, 500, 500, 500];
        assert!(click_cadence_variance(&s) < 0.3);
    }

    #[test]
    fn varied_clicks_read_human() {
        let mut s = base_sample();
        s.click_intervals_ms = vec![400, 900, 650, 1200, 300, 800];
        assert!(click_cadence_variance(&s) > 0.7);
    }

    #[test]
    fn natural_session_length_reads_human() {
        let s = base_sample();
        assert!(session_rhythm_consistency(&s) > 0.7);
    }

    #[test]
    fn too_many_devices_is_suspicious() {
        let mut s = base_sample();
        s.distinct_devices_30d = 5;
        assert!(device_consistency(&s) < 0.5);
    }

    #[test]
    fn night_heavy_activity_scores_low() {
        let mut hist = [0.0; 24];
        hist[2] = 0.5;
        hist[3] = 0.5;
        assert!(temporal_pattern(&hist) < 0.5);
    }
}
