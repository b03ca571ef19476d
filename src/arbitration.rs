//! Source arbitration policy.
//!
//! Each file gets one resolution picked from three sources: its existing tag,
//! the setlist text mapping and the reference setlist. The policy is an
//! ordered rule list per trust mode; the first rule that applies wins.
//!
//! Default mode:
//! 1. Confident existing tag, in the show's setlist, not suspicious
//! 2. Text mapping, whatever its confidence band
//! 3. Existing tag rejected only for low confidence, flagged for review
//! 4. Unmatched
//!
//! Strict text mode:
//! 1. Text mapping
//! 2. Existing tag
//! 3. No text mapping (confidence 0, review), unless the reference is authoritative
//! 4. Reference setlist entry at the file's position, flagged for review

use tracing::info;

use crate::config::Thresholds;
use crate::corrections::{CorrectionsStore, PROVENANCE_LEARNED};
use crate::matcher::SongMatcher;
use crate::models::{MatchResult, MatchSource, Resolution, ResolutionSource, Winner};
use crate::reference::ReferenceSetlist;
use crate::scoring::suspicion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    Default,
    StrictText,
}

impl TrustMode {
    pub fn from_trust_text(trust_text: bool) -> Self {
        if trust_text {
            TrustMode::StrictText
        } else {
            TrustMode::Default
        }
    }

    pub fn rules(self) -> &'static [Rule] {
        match self {
            TrustMode::Default => DEFAULT_RULES,
            TrustMode::StrictText => STRICT_RULES,
        }
    }
}

/// Per-file inputs to arbitration.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileInput<'a> {
    pub existing_title: Option<&'a str>,
    pub text_title: Option<&'a str>,
    /// Index among the folder's files that carry a disc/track key
    pub key_ordinal: Option<usize>,
}

/// Matcher output for each available source, computed once per file.
#[derive(Debug, Clone)]
pub struct Evidence {
    pub tag: Option<MatchResult>,
    pub text: Option<MatchResult>,
    pub key_ordinal: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    ConfidentTag,
    TextMapping,
    LowConfidenceTag,
    TagFallback,
    NoTextMapping,
    ReferencePosition,
    Unmatched,
}

pub const DEFAULT_RULES: &[Rule] = &[
    Rule::ConfidentTag,
    Rule::TextMapping,
    Rule::LowConfidenceTag,
    Rule::Unmatched,
];

pub const STRICT_RULES: &[Rule] = &[
    Rule::TextMapping,
    Rule::TagFallback,
    Rule::NoTextMapping,
    Rule::ReferencePosition,
    Rule::Unmatched,
];

pub struct Arbiter<'a> {
    matcher: &'a SongMatcher,
    reference: &'a ReferenceSetlist,
    mode: TrustMode,
    /// Coverage gate admitted the folder on the reference count alone
    reference_authoritative: bool,
}

impl<'a> Arbiter<'a> {
    pub fn new(
        matcher: &'a SongMatcher,
        reference: &'a ReferenceSetlist,
        mode: TrustMode,
        reference_authoritative: bool,
    ) -> Self {
        Self {
            matcher,
            reference,
            mode,
            reference_authoritative,
        }
    }

    fn thresholds(&self) -> &Thresholds {
        self.matcher.thresholds()
    }

    /// Run the matcher over every source the file has.
    pub fn gather(&self, input: &FileInput<'_>, corrections: &CorrectionsStore) -> Evidence {
        let run = |title: Option<&str>| {
            title
                .filter(|s| !s.trim().is_empty())
                .map(|s| self.matcher.match_title(s, corrections, self.reference))
        };
        Evidence {
            tag: run(input.existing_title),
            text: run(input.text_title),
            key_ordinal: input.key_ordinal,
        }
    }

    /// Resolve one file and persist a newly confirmed fuzzy match.
    pub fn resolve(&self, input: &FileInput<'_>, corrections: &mut CorrectionsStore) -> Resolution {
        let evidence = self.gather(input, corrections);
        let resolution = self.decide(&evidence);
        self.learn(&resolution, corrections);
        resolution
    }

    /// Apply the mode's rules in order.
    pub fn decide(&self, evidence: &Evidence) -> Resolution {
        self.mode
            .rules()
            .iter()
            .find_map(|rule| self.apply(*rule, evidence))
            .unwrap_or_else(|| Resolution::unmatched(evidence.tag.clone()))
    }

    /// A single rule; None means the rule does not apply.
    pub fn apply(&self, rule: Rule, evidence: &Evidence) -> Option<Resolution> {
        match rule {
            Rule::ConfidentTag => {
                let tag = evidence.tag.as_ref()?;
                let s = suspicion(&tag.original, tag, self.thresholds());
                if s.any() || tag.matched.is_none() || !self.is_member(tag) {
                    return None;
                }
                Some(self.canonicalize(Resolution::from_match(
                    tag.clone(),
                    ResolutionSource::ExistingTag,
                )))
            }
            Rule::TextMapping => {
                let text = evidence.text.as_ref()?;
                Some(self.canonicalize(Resolution::from_match(
                    text.clone(),
                    ResolutionSource::TextFile,
                )))
            }
            Rule::LowConfidenceTag => {
                let tag = evidence.tag.as_ref()?;
                let s = suspicion(&tag.original, tag, self.thresholds());
                if !s.only_low_confidence() {
                    return None;
                }
                let winner = match (&tag.matched, tag.source) {
                    (Some(label), MatchSource::Extra) => Winner::Extra(label.clone()),
                    (Some(song), _) if self.is_member(tag) => Winner::Song(song.clone()),
                    (Some(_), _) => return None,
                    // Below the review band the best candidate is noise; keep the tag text
                    (None, _) if !tag.cleaned.is_empty() => Winner::Raw(tag.cleaned.clone()),
                    _ => return None,
                };
                Some(self.canonicalize(Resolution {
                    winner,
                    source: ResolutionSource::ExistingTagLowConfidence,
                    confidence: tag.confidence,
                    needs_review: true,
                    has_segue: tag.has_segue,
                    matched: Some(tag.clone()),
                }))
            }
            Rule::TagFallback => {
                let tag = evidence.tag.as_ref()?;
                let mut resolution = Resolution::from_match(tag.clone(), ResolutionSource::ExistingTag);
                if !self.thresholds().is_confident(tag.confidence) {
                    resolution.source = ResolutionSource::ExistingTagLowConfidence;
                    resolution.needs_review = true;
                }
                Some(self.canonicalize(resolution))
            }
            Rule::NoTextMapping => {
                if self.reference_authoritative {
                    return None;
                }
                Some(Resolution {
                    winner: Winner::None,
                    source: ResolutionSource::NoTextMapping,
                    confidence: 0,
                    needs_review: true,
                    has_segue: false,
                    matched: evidence.tag.clone(),
                })
            }
            Rule::ReferencePosition => {
                if !self.reference_authoritative {
                    return None;
                }
                let song = self.reference.songs().get(evidence.key_ordinal?)?;
                Some(Resolution {
                    winner: Winner::Song(song.title.clone()),
                    source: ResolutionSource::ReferencePosition,
                    confidence: 0,
                    needs_review: true,
                    has_segue: song.segue,
                    matched: evidence.tag.clone(),
                })
            }
            Rule::Unmatched => Some(Resolution::unmatched(evidence.tag.clone())),
        }
    }

    /// Setlist membership for the tag rules. Extras are exempt; an unknown
    /// show (empty reference) waives the check.
    fn is_member(&self, result: &MatchResult) -> bool {
        if self.reference.is_empty() || result.is_extra() {
            return true;
        }
        result.song().is_some_and(|s| self.reference.contains(s))
    }

    /// Use the reference setlist's spelling of a song when it lists it.
    fn canonicalize(&self, mut resolution: Resolution) -> Resolution {
        if let Winner::Song(song) = &resolution.winner {
            if let Some(canonical) = self.reference.canonical(song) {
                resolution.winner = Winner::Song(canonical.to_string());
            }
        }
        resolution
    }

    fn learn(&self, resolution: &Resolution, corrections: &mut CorrectionsStore) {
        let Some(result) = &resolution.matched else {
            return;
        };
        let Some(song) = resolution.song() else {
            return;
        };
        let accepted = matches!(
            resolution.source,
            ResolutionSource::ExistingTag | ResolutionSource::TextFile
        );
        if accepted
            && result.source == MatchSource::Fuzzy
            && self.thresholds().is_confident(result.confidence)
            && corrections.learn(&result.cleaned, song, PROVENANCE_LEARNED)
        {
            info!(
                raw = %result.cleaned,
                canonical = %song,
                confidence = result.confidence,
                "Learned correction"
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::ExtraLabels;
    use crate::testing::{song, vocabulary};

    fn matcher() -> SongMatcher {
        SongMatcher::new(
            vocabulary(),
            ExtraLabels::from_pairs([("tuning", "Tuning")]),
            Thresholds::default(),
        )
    }

    fn show() -> ReferenceSetlist {
        ReferenceSetlist::new(vec![
            song("Bertha", 1, false),
            song("Sugaree", 1, false),
            song("Jack Straw", 1, false),
            song("Scarlet Begonias", 2, true),
            song("Fire on the Mountain", 2, false),
        ])
    }

    fn input<'a>(tag: Option<&'a str>, text: Option<&'a str>) -> FileInput<'a> {
        FileInput {
            existing_title: tag,
            text_title: text,
            key_ordinal: Some(0),
        }
    }

    #[test]
    fn test_default_accepts_confident_member_tag() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(Some("Sugaree"), Some("Bertha")), &mut store);
        assert_eq!(r.source, ResolutionSource::ExistingTag);
        assert_eq!(r.song(), Some("Sugaree"));
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn test_default_non_member_tag_falls_to_text() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        // Dark Star is a real song but not played at this show
        let r = arbiter.resolve(&input(Some("Dark Star"), Some("Jack Straw")), &mut store);
        assert_eq!(r.source, ResolutionSource::TextFile);
        assert_eq!(r.song(), Some("Jack Straw"));
    }

    #[test]
    fn test_default_compound_tag_falls_to_text() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let tag = "Scarlet Begonias > Fire on the Mountain > Drums > Space";
        let r = arbiter.resolve(&input(Some(tag), Some("Fire on the Mountain")), &mut store);
        assert_eq!(r.source, ResolutionSource::TextFile);
        assert_eq!(r.song(), Some("Fire on the Mountain"));
    }

    #[test]
    fn test_default_text_accepted_in_any_band() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(None, Some("Jak Strow")), &mut store);
        assert_eq!(r.source, ResolutionSource::TextFile);
        assert!(r.needs_review);
        assert_eq!(r.song(), Some("Jack Straw"));
        // Review band matches are never learned
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_default_low_confidence_tag_surfaces_for_review() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(Some("Jak Strow"), None), &mut store);
        assert_eq!(r.source, ResolutionSource::ExistingTagLowConfidence);
        assert!(r.needs_review);
        assert_eq!(r.song(), Some("Jack Straw"));
    }

    #[test]
    fn test_default_below_band_tag_keeps_tag_text() {
        let m = matcher();
        // Every vocabulary song is in the setlist, so membership cannot reject
        let reference = ReferenceSetlist::new(vocabulary().iter().map(|t| song(t, 1, false)).collect());
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        for tag in ["Bass Solo", "Grateful Dead Live"] {
            let r = arbiter.resolve(&input(Some(tag), None), &mut store);
            assert!(r.confidence < m.thresholds().review, "{} scored {}", tag, r.confidence);
            assert_eq!(r.source, ResolutionSource::ExistingTagLowConfidence);
            assert_eq!(r.winner, Winner::Raw(tag.to_string()));
            assert_eq!(r.song(), None);
            assert!(r.needs_review);
        }
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_default_unmatched() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(None, None), &mut store);
        assert_eq!(r.source, ResolutionSource::Unmatched);
        assert_eq!(r.winner, Winner::None);

        // Compound tag with no text mapping: rejected for more than confidence
        let tag = "Scarlet Begonias > Fire on the Mountain > Drums > Space";
        let r = arbiter.resolve(&input(Some(tag), None), &mut store);
        assert_eq!(r.source, ResolutionSource::Unmatched);
    }

    #[test]
    fn test_empty_reference_waives_membership() {
        let m = matcher();
        let reference = ReferenceSetlist::empty();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(Some("Dark Star"), None), &mut store);
        assert_eq!(r.source, ResolutionSource::ExistingTag);
        assert_eq!(r.song(), Some("Dark Star"));
    }

    #[test]
    fn test_confident_fuzzy_learned_once() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(Some("Sugeree"), None), &mut store);
        assert_eq!(r.source, ResolutionSource::ExistingTag);
        assert_eq!(store.pending(), 1);

        // Next time the corrections tier answers at 100
        let r = arbiter.resolve(&input(Some("Sugeree"), None), &mut store);
        assert_eq!(r.confidence, 100);
        assert_eq!(r.matched.unwrap().source, MatchSource::Learned);
        assert_eq!(store.pending(), 1);
    }

    #[test]
    fn test_strict_prefers_text_over_tag() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::StrictText, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(Some("Sugaree"), Some("Bertha")), &mut store);
        assert_eq!(r.source, ResolutionSource::TextFile);
        assert_eq!(r.song(), Some("Bertha"));

        let r = arbiter.resolve(&input(Some("Sugaree"), None), &mut store);
        assert_eq!(r.source, ResolutionSource::ExistingTag);
        assert_eq!(r.song(), Some("Sugaree"));
    }

    #[test]
    fn test_strict_no_text_mapping() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::StrictText, false);
        let mut store = CorrectionsStore::in_memory();

        let r = arbiter.resolve(&input(None, None), &mut store);
        assert_eq!(r.source, ResolutionSource::NoTextMapping);
        assert_eq!(r.confidence, 0);
        assert!(r.needs_review);
        assert_eq!(r.winner, Winner::None);
    }

    #[test]
    fn test_strict_reference_position_when_authoritative() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::StrictText, true);
        let mut store = CorrectionsStore::in_memory();

        let file = FileInput {
            existing_title: None,
            text_title: None,
            key_ordinal: Some(3),
        };
        let r = arbiter.resolve(&file, &mut store);
        assert_eq!(r.source, ResolutionSource::ReferencePosition);
        assert_eq!(r.song(), Some("Scarlet Begonias"));
        assert!(r.has_segue);
        assert!(r.needs_review);
    }

    #[test]
    fn test_rules_independently() {
        let m = matcher();
        let reference = show();
        let arbiter = Arbiter::new(&m, &reference, TrustMode::Default, false);
        let store = CorrectionsStore::in_memory();
        let evidence = arbiter.gather(&input(Some("Sugaree"), None), &store);

        assert!(arbiter.apply(Rule::ConfidentTag, &evidence).is_some());
        assert!(arbiter.apply(Rule::TextMapping, &evidence).is_none());
        assert!(arbiter.apply(Rule::LowConfidenceTag, &evidence).is_none());
        assert!(arbiter.apply(Rule::ReferencePosition, &evidence).is_none());
        assert!(arbiter.apply(Rule::NoTextMapping, &evidence).is_some());
    }
}
