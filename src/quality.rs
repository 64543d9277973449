//! Content-quality assessor — content + platform + recent fingerprints to a
//! bounded multiplier `q in [0.5, 2.0]`.
//!
//! Signal decomposition grounded on the original Python originality/
//! engagement/safety models (`content-analyzer/src/models/*`): each signal
//! is a small, independently testable function rather than a learned model,
//! matching the spec's explicit formula-driven weighting.

use std::collections::HashSet;

use crate::event::{ContentPayload, Platform};

pub const QUALITY_MIN: f64 = 0.5;
pub const QUALITY_MAX: f64 = 2.0;

const W_ORIGINALITY: f64 = 0.30;
const W_ENGAGEMENT: f64 = 0.25;
const W_PLATFORM: f64 = 0.20;
const W_SAFETY: f64 = 0.15;
const W_HUMAN: f64 = 0.10;

/// Unsafe-term lexicon; a crude stand-in for the original's moderation
/// model. Matching any term drags the safety signal toward 0.
const UNSAFE_TERMS: &[&str] = &["scam", "nsfw", "hate", "violence", "fraud"];

const GENERIC_PHRASES: &[&str] = &["check it out", "like and subscribe", "link in bio", "dm me"];

/// A user's recent content fingerprints, used for originality comparison.
#[derive(Debug, Clone, Default)]
pub struct ContentHistory {
    /// Shingled (3-gram) token-hash sets for each of the user's last 30
    /// days of submissions, newest last.
    pub fingerprints: Vec<HashSet<u64>>,
}

pub(crate) fn shingle_hashes(text: &str) -> HashSet<u64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return HashSet::new();
    }
    if tokens.len() < 3 {
        return tokens
            .iter()
            .map(|t| fnv1a(t.as_bytes()))
            .collect();
    }
    tokens
        .windows(3)
        .map(|w| fnv1a(w.join(" ").as_bytes()))
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// `originality = 1 - max Jaccard similarity` against the user's last 30
/// days of content fingerprints.
pub(crate) fn originality_score(text: &str, history: &ContentHistory) -> f64 {
    let current = shingle_hashes(text);
    if current.is_empty() {
        return 0.0;
    }
    let max_sim = history
        .fingerprints
        .iter()
        .map(|past| jaccard(&current, past))
        .fold(0.0_f64, f64::max);
    (1.0 - max_sim).clamp(0.0, 1.0)
}

/// Length/structure/interrogative/CTA heuristics, platform-conditioned.
fn engagement_score(text: &str, platform: Platform) -> f64 {
    let len = text.chars().count();
    let ideal = match platform {
        Platform::TikTok | Platform::Instagram => 80..=220,
        Platform::X => 40..=280,
        Platform::YouTube => 100..=500,
        Platform::Facebook | Platform::LinkedIn => 100..=600,
        Platform::OwnApp => 20..=500,
    };
    let mut score: f64 = if ideal.contains(&len) { 0.6 } else { 0.35 };
    if text.contains('?') {
        score += 0.2;
    }
    let lower = text.to_lowercase();
    if lower.contains("comment") || lower.contains("share") || lower.contains("follow") {
        score += 0.2;
    }
    score.clamp(0.0, 1.0)
}

/// Hashtag, length, and idiom checks per platform.
fn platform_relevance_score(text: &str, platform: Platform) -> f64 {
    let hashtags = text.matches('#').count();
    let ideal_hashtags: std::ops::RangeInclusive<usize> = match platform {
        Platform::TikTok | Platform::Instagram => 3..=10,
        Platform::X => 1..=3,
        Platform::LinkedIn | Platform::Facebook => 0..=3,
        Platform::YouTube | Platform::OwnApp => 0..=5,
    };
    if ideal_hashtags.contains(&hashtags) {
        0.8
    } else if hashtags == 0 {
        0.5
    } else {
        0.4
    }
}

/// Multiplicative penalty in `[0.1, 1.5]` from the unsafe-term lexicon.
fn safety_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let hits = UNSAFE_TERMS.iter().filter(|t| lower.contains(**t)).count();
    match hits {
        0 => 1.0,
        1 => 0.4,
        _ => 0.1,
    }
}

/// Repetition rate, generic-phrase density, punctuation ratio.
fn human_authored_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut score: f64 = 0.8;

    let generic_hits = GENERIC_PHRASES.iter().filter(|p| lower.contains(**p)).count();
    score -= 0.15 * generic_hits as f64;

    let words: Vec<&str> = lower.split_whitespace().collect();
    if !words.is_empty() {
        let unique: HashSet<&str> = words.iter().copied().collect();
        let repetition_rate = 1.0 - (unique.len() as f64 / words.len() as f64);
        score -= repetition_rate * 0.5;
    }

    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    let punctuation_ratio = if text.is_empty() {
        0.0
    } else {
        punctuation as f64 / text.chars().count() as f64
    };
    if punctuation_ratio > 0.3 {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// Assess a submitted content item, returning a multiplier in
/// `[QUALITY_MIN, QUALITY_MAX]`. Empty or sub-threshold content, and any
/// content whose safety signal alone is below `0.3`, yields `QUALITY_MIN`.
pub fn assess_quality(
    content: Option<&ContentPayload>,
    platform: Platform,
    history: &ContentHistory,
) -> f64 {
    let text = match content.and_then(|c| c.text.as_deref()) {
        Some(t) if !t.trim().is_empty() => t,
        _ => return QUALITY_MIN,
    };

    let safety = safety_score(text);
    if safety < 0.3 {
        return QUALITY_MIN;
    }

    let originality = originality_score(text, history);
    let engagement = engagement_score(text, platform);
    let platform_fit = platform_relevance_score(text, platform);
    let human = human_authored_score(text);

    let weighted = W_ORIGINALITY * originality
        + W_ENGAGEMENT * engagement
        + W_PLATFORM * platform_fit
        + W_SAFETY * safety
        + W_HUMAN * human;

    // Affine map of the weighted sum (in [0, 1]) onto [QUALITY_MIN, QUALITY_MAX].
    let mapped = QUALITY_MIN + weighted.clamp(0.0, 1.0) * (QUALITY_MAX - QUALITY_MIN);
    mapped.clamp(QUALITY_MIN, QUALITY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> ContentPayload {
        ContentPayload {
            text_hash: format!("{:x}", fnv1a(text.as_bytes())),
            text: Some(text.to_string()),
            media_descriptor: None,
        }
    }

    #[test]
    fn empty_content_is_minimum_quality() {
        let history = ContentHistory::default();
        assert_eq!(assess_quality(None, Platform::Instagram, &history), QUALITY_MIN);
    }

    #[test]
    fn quality_stays_in_bounds() {
        let history = ContentHistory::default();
        let c = content("What an amazing sunset today? #travel #nature #wanderlust");
        let q = assess_quality(Some(&c), Platform::Instagram, &history);
        assert!((QUALITY_MIN..=QUALITY_MAX).contains(&q));
    }

    #[test]
    fn unsafe_content_forced_to_minimum() {
        let history = ContentHistory::default();
        let c = content("this is a total scam and fraud, beware of this hate");
        assert_eq!(assess_quality(Some(&c), Platform::X, &history), QUALITY_MIN);
    }

    #[test]
    fn repeated_content_scores_lower_than_fresh() {
        let text = "Check out my new travel vlog from Bali! #travel #bali #vlog";
        let mut history = ContentHistory::default();
        history.fingerprints.push(shingle_hashes(text));

        let c = content(text);
        let repeated = assess_quality(Some(&c), Platform::YouTube, &history);
        let fresh = assess_quality(Some(&c), Platform::YouTube, &ContentHistory::default());
        assert!(repeated < fresh);
    }
}
