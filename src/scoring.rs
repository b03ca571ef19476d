//! Scoring functions for title matching.
//!
//! This module contains:
//! - Fuzzy title similarity
//! - Extra (non-song) track detection
//! - The suspicious-tag predicate used by arbitration

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Thresholds;
use crate::models::MatchResult;
use crate::normalize::count_segue_markers;

// ============================================================================
// Regex Patterns
// ============================================================================

/// Tokens marking a free-form jam description rather than a song title
pub static JAM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bjam(?:s|ming)?\b").unwrap(),
        Regex::new(r"(?i)\bimprov(?:isation|isational)?\b").unwrap(),
        Regex::new(r"(?i)\btease[sd]?\b").unwrap(),
        Regex::new(r"(?i)\bnoodling\b").unwrap(),
        Regex::new(r"(?i)\bspace\s+jam\b").unwrap(),
    ]
});

/// Filename-like titles: "d1t07", "D2T12"
pub static DISC_TRACK_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^d\dt\d{1,2}").unwrap());

/// Substrings marking non-song tracks that are kept but not matched as songs
pub const EXTRA_TRACK_PATTERNS: [&str; 25] = [
    "tuning",
    "crowd",
    "banter",
    "applause",
    "introduction",
    "intro",
    "stage banter",
    "band introductions",
    "band intros",
    "announcements",
    "soundcheck",
    "warmup",
    "fade in",
    "fade out",
    "cut",
    "tape flip",
    "tape cut",
    "unknown",
    "encore break",
    "technical",
    "set break",
    "d1t",
    "d2t",
    "d3t",
    "d4t",
];

/// More segue markers than this means a compound title
pub const MAX_SEGUE_MARKERS: usize = 2;

// ============================================================================
// Similarity
// ============================================================================

/// Similarity of two normalized titles on a 0-100 scale.
pub fn similarity_score(a: &str, b: &str) -> u8 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Extra Tracks
// ============================================================================

/// Check if a title is a non-song extra (tuning, crowd, banter, filename leftovers).
pub fn is_extra_track(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    if DISC_TRACK_TITLE.is_match(&lower) {
        return true;
    }
    EXTRA_TRACK_PATTERNS.iter().any(|p| lower.contains(p))
}

fn has_jam_indicator(title: &str) -> bool {
    JAM_PATTERNS.iter().any(|p| p.is_match(title))
}

// ============================================================================
// Suspicious Tags
// ============================================================================

/// Reasons an existing tag should not be trusted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Suspicion {
    pub compound: bool,
    pub description: bool,
    pub low_confidence: bool,
}

impl Suspicion {
    pub fn any(&self) -> bool {
        self.compound || self.description || self.low_confidence
    }

    /// True when low confidence is the only problem
    pub fn only_low_confidence(&self) -> bool {
        self.low_confidence && !self.compound && !self.description
    }
}

/// Evaluate a raw tag against its match result.
pub fn suspicion(raw: &str, result: &MatchResult, thresholds: &Thresholds) -> Suspicion {
    Suspicion {
        compound: count_segue_markers(raw) > MAX_SEGUE_MARKERS,
        description: has_jam_indicator(raw)
            && raw.chars().count() > thresholds.description_length,
        low_confidence: !thresholds.is_confident(result.confidence),
    }
}

/// True when alternate sources should be preferred over this tag.
pub fn is_suspicious_tag(raw: &str, result: &MatchResult, thresholds: &Thresholds) -> bool {
    suspicion(raw, result, thresholds).any()
}

// ============================================================================
// TESTS
// ============================================================================
