//! Title cleaning and normalization shared by the matcher, the setlist text
//! parser and the reports.
//!
//! Two different outputs come out of here:
//! - `clean_title` keeps the title human-readable (display casing intact) and
//!   strips recording artifacts: durations, hashes, tape cuts, segue markers.
//! - `title_key` is the lookup key used for every exact and fuzzy comparison.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Trailing MD5-style hash left over from ffp sections: "Song:e0129245cbbe36646809993036a6e6a7"
pub static HASH_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r":[a-f0-9]{32}$").unwrap());

/// Matches file extensions in titles
pub static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(flac|shn|mp3|wav|m4a|ogg)$").unwrap());

/// Artifact patterns applied in order. Each one is replaced by a single space
/// or removed; whitespace is collapsed afterwards.
pub static ARTIFACT_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // Embedded duration at end: "SONG NAME  05:09", "SONG\t07:03"
        (Regex::new(r"\s+\d{1,2}:\d{2}(?:\.\d+)?\s*$").unwrap(), ""),
        // Colon-prefixed duration at end: "Song :10:27"
        (Regex::new(r"\s*:\d{1,2}:\d{2}\s*$").unwrap(), ""),
        // Bracketed timing anywhere: "[0:41]", "[ 7:22]", "[10:57#]"
        (Regex::new(r"\s*\[\s*\d{1,2}:\d{2}#?\]\s*").unwrap(), " "),
        // Curly-brace timing anywhere: "{7:56.21}"
        (Regex::new(r"\s*\{\s*\d{1,2}:\d{2}(?:\.\d+)?\s*\}\s*").unwrap(), " "),
        // Parenthesized duration at end: "(5:20)"
        (Regex::new(r"\s*\(\s*\d{1,2}:\d{2}\s*\)\s*$").unwrap(), ""),
        // Studio outtake breakdowns: "Lovelight take 1 [0:41] = [0:22] ; Lovelight"
        (Regex::new(r"\s*=\s*.*$").unwrap(), ""),
    ]
});

/// Regex to collapse runs of whitespace into a single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One segue marker occurrence: "->", "-->", ">>", ">"
pub static SEGUE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-*>+").unwrap());

/// Tape cut markers, longest first so "////" is not left as "//"
pub const TAPE_MARKERS: [&str; 3] = ["////", "///", "//"];

/// Trailing segue markers, checked in order
pub const SEGUE_SUFFIXES: [&str; 4] = [" -->", " ->", ">>", " >"];

/// Words kept lowercase in Title Case unless they start the title
const LOWERCASE_WORDS: [&str; 17] = [
    "a", "an", "the", "and", "but", "or", "for", "nor", "on", "at", "to", "from", "by", "of",
    "in", "with", "vs",
];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII via NFKD decomposition and transliteration.
/// e.g., "Señor" → "senor"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Normalize punctuation: curly quotes to straight quotes, "&" to "and".
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'")
        .replace(" & ", " and ")
}

// ============================================================================
// CLEANING
// ============================================================================

/// A raw title with recording artifacts removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTitle {
    pub text: String,
    pub has_segue: bool,
}

/// Clean a raw title from a tag or a setlist text line.
///
/// Removes quotes, hash suffixes, file extensions, tape cut markers, embedded
/// timings and one trailing segue marker. Take numbers are kept since they
/// distinguish outtakes.
pub fn clean_title(raw: &str) -> CleanedTitle {
    let mut title = raw.trim().replace('"', "");

    title = HASH_SUFFIX.replace(&title, "").to_string();
    title = FILE_EXTENSION.replace(&title, "").to_string();

    // Tape markers first: later patterns anchor on the end of the string
    for marker in TAPE_MARKERS {
        title = title.replace(marker, "");
    }

    for (pattern, replacement) in ARTIFACT_PATTERNS.iter() {
        title = pattern.replace_all(&title, *replacement).to_string();
    }

    title = MULTI_SPACE.replace_all(&title, " ").trim().to_string();

    let mut has_segue = false;
    for marker in SEGUE_SUFFIXES {
        if let Some(stripped) = title.strip_suffix(marker) {
            has_segue = true;
            title = stripped.trim().to_string();
            break;
        }
    }
    if title.ends_with('>') {
        has_segue = true;
        title = title.trim_end_matches('>').trim().to_string();
    }

    let text = title
        .trim_matches(|c| c == '/' || c == '-' || c == '>')
        .trim()
        .to_string();

    CleanedTitle { text, has_segue }
}

/// Lookup key for exact and fuzzy comparisons.
pub fn title_key(title: &str) -> String {
    let folded = fold_to_ascii(&normalize_punctuation(title.trim()));
    MULTI_SPACE.replace_all(&folded, " ").trim().to_string()
}

/// Count segue marker occurrences anywhere in a raw title.
/// "Scarlet Begonias > Fire on the Mountain -> Drums" has two.
pub fn count_segue_markers(raw: &str) -> usize {
    SEGUE_MARKER.find_iter(raw).count()
}

/// Convert text to Title Case for song titles.
///
/// Small words stay lowercase unless first, all-caps words (acronyms, roman
/// numerals) are kept, hyphenated words capitalize each part.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if word.len() > 1 && word.chars().any(char::is_alphabetic) && word == word.to_uppercase()
            {
                return word.to_string();
            }
            let lower = word.to_lowercase();
            if i > 0 && LOWERCASE_WORDS.contains(&lower.as_str()) {
                return lower;
            }
            if word.contains('-') {
                return word.split('-').map(capitalize).collect::<Vec<_>>().join("-");
            }
            capitalize(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
