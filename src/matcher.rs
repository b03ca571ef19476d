//! Multi-tier song title matcher.
//!
//! Tiers, in order:
//! 1. Exact match against the canonical vocabulary (100)
//! 2. Learned corrections (100)
//! 3. Known non-song labels (100), then extra-track heuristics (90 / 80)
//! 4. Fuzzy similarity against every canonical title
//!
//! The matcher never mutates the corrections store. Persisting a confident
//! fuzzy match is the arbitration policy's call.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::config::Thresholds;
use crate::corrections::{CorrectionsStore, ExtraLabels};
use crate::models::{MatchResult, MatchSource};
use crate::normalize::{clean_title, title_case, title_key};
use crate::reference::ReferenceSetlist;
use crate::scoring::{is_extra_track, is_suspicious_tag, similarity_score};

pub struct SongMatcher {
    /// title key → display title
    vocabulary: FxHashMap<String, String>,
    extras: ExtraLabels,
    thresholds: Thresholds,
}

/// Best fuzzy candidate with the sort keys used for tie-breaking
struct Candidate<'a> {
    key: &'a str,
    score: u8,
    position: Option<usize>,
}

impl Candidate<'_> {
    /// Higher score first, then earliest setlist position, then songs
    /// absent from the setlist, then lexicographic key.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| match (self.position, other.position) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.key.cmp(other.key))
    }
}

impl SongMatcher {
    pub fn new(
        titles: impl IntoIterator<Item = String>,
        extras: ExtraLabels,
        thresholds: Thresholds,
    ) -> Self {
        let mut vocabulary = FxHashMap::default();
        for title in titles {
            let key = title_key(&title);
            if !key.is_empty() {
                vocabulary.entry(key).or_insert(title);
            }
        }
        Self {
            vocabulary,
            extras,
            thresholds,
        }
    }

    /// Add a show's reference titles so setlist songs always resolve exactly.
    pub fn extend_vocabulary(&mut self, reference: &ReferenceSetlist) {
        for song in reference.songs() {
            self.vocabulary
                .entry(title_key(&song.title))
                .or_insert_with(|| song.title.clone());
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Match a raw title. Deterministic for a given store and reference.
    pub fn match_title(
        &self,
        raw: &str,
        corrections: &CorrectionsStore,
        reference: &ReferenceSetlist,
    ) -> MatchResult {
        let cleaned = clean_title(raw);
        let mut result = MatchResult {
            original: raw.to_string(),
            cleaned: cleaned.text.clone(),
            matched: None,
            candidate: None,
            confidence: 0,
            source: MatchSource::Unmatched,
            has_segue: cleaned.has_segue,
            needs_review: false,
            suspicious: false,
        };
        let key = title_key(&cleaned.text);
        if key.is_empty() {
            result.suspicious = is_suspicious_tag(raw, &result, &self.thresholds);
            return result;
        }

        self.resolve(&mut result, &key, corrections, reference);
        result.suspicious = is_suspicious_tag(raw, &result, &self.thresholds);
        result
    }

    fn resolve(
        &self,
        result: &mut MatchResult,
        key: &str,
        corrections: &CorrectionsStore,
        reference: &ReferenceSetlist,
    ) {
        // Tier 1: canonical vocabulary
        if let Some(title) = self.vocabulary.get(key) {
            Self::accept(result, title.clone(), 100, MatchSource::Exact);
            return;
        }

        // Tier 2: learned corrections
        if let Some(title) = corrections.lookup(key) {
            Self::accept(result, title.to_string(), 100, MatchSource::Learned);
            return;
        }

        // Tier 3: known non-song labels, then heuristics
        if let Some(label) = self.extras.get(key) {
            Self::accept(result, label.to_string(), 100, MatchSource::Extra);
            return;
        }
        if is_extra_track(&result.cleaned) {
            match self.extras.find_within(key) {
                Some(label) => Self::accept(result, label.to_string(), 90, MatchSource::Extra),
                None => {
                    let label = title_case(&result.cleaned);
                    Self::accept(result, label, 80, MatchSource::Extra)
                }
            }
            return;
        }

        // Tier 4: fuzzy
        let Some(best) = self.best_candidate(key, reference) else {
            return;
        };
        let title = self.vocabulary[best.key].clone();
        result.candidate = Some(title.clone());
        result.confidence = best.score;
        if self.thresholds.is_confident(best.score) {
            result.matched = Some(title);
            result.source = MatchSource::Fuzzy;
        } else if self.thresholds.in_review_band(best.score) {
            result.matched = Some(title);
            result.source = MatchSource::Fuzzy;
            result.needs_review = true;
        }
    }

    fn accept(result: &mut MatchResult, title: String, confidence: u8, source: MatchSource) {
        result.candidate = Some(title.clone());
        result.matched = Some(title);
        result.confidence = confidence;
        result.source = source;
    }

    fn best_candidate<'a>(
        &'a self,
        key: &str,
        reference: &ReferenceSetlist,
    ) -> Option<Candidate<'a>> {
        self.vocabulary
            .keys()
            .map(|candidate| Candidate {
                key: candidate.as_str(),
                score: similarity_score(key, candidate),
                position: None,
            })
            .filter(|c| c.score > 0)
            .map(|mut c| {
                c.position = reference.position_of(c.key);
                c
            })
            .min_by(|a, b| a.rank(b))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::PROVENANCE_LEARNED;
    use crate::testing::{song, vocabulary};

    fn matcher() -> SongMatcher {
        SongMatcher::new(
            vocabulary(),
            ExtraLabels::from_pairs([("tuning", "Tuning"), ("crowd", "Crowd")]),
            Thresholds::default(),
        )
    }

    #[test]
    fn test_exact_match() {
        let m = matcher();
        let r = m.match_title(
            "SUGAREE ->",
            &CorrectionsStore::in_memory(),
            &ReferenceSetlist::empty(),
        );
        assert_eq!(r.matched.as_deref(), Some("Sugaree"));
        assert_eq!(r.source, MatchSource::Exact);
        assert_eq!(r.confidence, 100);
        assert!(r.has_segue);
        assert!(!r.suspicious);
    }

    #[test]
    fn test_corrections_tier() {
        let m = matcher();
        let mut store = CorrectionsStore::in_memory();
        store.learn("Minglewood", "New Minglewood Blues", PROVENANCE_LEARNED);
        let r = m.match_title("Minglewood", &store, &ReferenceSetlist::empty());
        assert_eq!(r.matched.as_deref(), Some("New Minglewood Blues"));
        assert_eq!(r.source, MatchSource::Learned);
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn test_extra_tiers() {
        let m = matcher();
        let store = CorrectionsStore::in_memory();
        let empty = ReferenceSetlist::empty();

        let r = m.match_title("Tuning", &store, &empty);
        assert_eq!((r.matched.as_deref(), r.confidence), (Some("Tuning"), 100));
        assert!(r.is_extra());

        let r = m.match_title("more tuning", &store, &empty);
        assert_eq!((r.matched.as_deref(), r.confidence), (Some("Tuning"), 90));

        let r = m.match_title("stage banter", &store, &empty);
        assert_eq!((r.matched.as_deref(), r.confidence), (Some("Stage Banter"), 80));
        assert_eq!(r.song(), None);
    }

    #[test]
    fn test_fuzzy_bands() {
        let m = matcher();
        let store = CorrectionsStore::in_memory();
        let empty = ReferenceSetlist::empty();

        // One edit in seven characters: 86
        let r = m.match_title("Sugeree", &store, &empty);
        assert_eq!(r.source, MatchSource::Fuzzy);
        assert_eq!(r.matched.as_deref(), Some("Sugaree"));
        assert!(r.confidence >= 85);
        assert!(!r.needs_review);

        // Two edits in ten characters: 80, review band
        let r = m.match_title("Jak Strow", &store, &empty);
        assert!(r.confidence >= 75 && r.confidence < 85, "{}", r.confidence);
        assert_eq!(r.matched.as_deref(), Some("Jack Straw"));
        assert!(r.needs_review);
        assert!(r.suspicious);

        let r = m.match_title("Completely Different", &store, &empty);
        assert_eq!(r.source, MatchSource::Unmatched);
        assert_eq!(r.matched, None);
        assert!(r.confidence < 75);
    }

    #[test]
    fn test_tie_break_prefers_setlist_position() {
        let m = SongMatcher::new(
            vec!["Abcd".to_string(), "Abce".to_string()],
            ExtraLabels::default(),
            Thresholds::default(),
        );
        let store = CorrectionsStore::in_memory();

        // Equal scores, no setlist: lexicographic
        let r = m.match_title("Abcx", &store, &ReferenceSetlist::empty());
        assert_eq!(r.candidate.as_deref(), Some("Abcd"));

        // Setlist position wins over lexicographic order
        let reference = ReferenceSetlist::new(vec![song("Abce", 1, false)]);
        let r = m.match_title("Abcx", &store, &reference);
        assert_eq!(r.candidate.as_deref(), Some("Abce"));
    }

    #[test]
    fn test_idempotent() {
        let m = matcher();
        let store = CorrectionsStore::in_memory();
        let reference = ReferenceSetlist::new(vec![song("Sugaree", 1, false)]);
        for raw in ["Sugeree", "Jak Strow //", "crowd", "???"] {
            assert_eq!(
                m.match_title(raw, &store, &reference),
                m.match_title(raw, &store, &reference)
            );
        }
    }

    #[test]
    fn test_empty_title() {
        let m = matcher();
        let r = m.match_title("  ", &CorrectionsStore::in_memory(), &ReferenceSetlist::empty());
        assert_eq!(r.source, MatchSource::Unmatched);
        assert!(r.suspicious);
    }
}
