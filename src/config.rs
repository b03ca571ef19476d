//! Run configuration.
//!
//! Every field has a default so an absent or partial TOML file is valid.
//! Command-line flags are applied on top by the binaries.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, TaggerError};

// ============================================================================
// Defaults
// ============================================================================

/// Minimum score to auto-apply a fuzzy match
pub const AUTO_APPLY_THRESHOLD: u8 = 85;

/// Minimum score for the manual review band
pub const REVIEW_THRESHOLD: u8 = 75;

/// Jam-indicator titles longer than this are treated as descriptions
pub const DESCRIPTION_LENGTH: usize = 40;

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub auto_apply: u8,
    pub review: u8,
    pub description_length: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            auto_apply: AUTO_APPLY_THRESHOLD,
            review: REVIEW_THRESHOLD,
            description_length: DESCRIPTION_LENGTH,
        }
    }
}

impl Thresholds {
    /// True if the score clears the auto-apply threshold
    pub fn is_confident(&self, score: u8) -> bool {
        score >= self.auto_apply
    }

    /// True if the score falls in [review, auto_apply)
    pub fn in_review_band(&self, score: u8) -> bool {
        score >= self.review && score < self.auto_apply
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub database: PathBuf,
    pub corrections: PathBuf,
    pub extra_songs: PathBuf,
    pub review_queue: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            database: PathBuf::from("jerrybase.db"),
            corrections: PathBuf::from("data/song_corrections.txt"),
            extra_songs: PathBuf::from("data/extra_songs.txt"),
            review_queue: PathBuf::from("logs/review_queue.csv"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl Paths {
    pub fn unmatched_report(&self) -> PathBuf {
        self.logs_dir.join("unmatched_songs.txt")
    }

    pub fn segue_report(&self) -> PathBuf {
        self.logs_dir.join("segue_discrepancies.txt")
    }

    pub fn discrepancy_report(&self) -> PathBuf {
        self.logs_dir.join("setlist_discrepancies.txt")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Setlist text file is the primary source ahead of existing tags
    pub trust_text: bool,
    /// Resolve and assign without writing tags
    pub dry_run: bool,
    pub recursive: bool,
    /// Act flag for the reference lookup (1 = Grateful Dead)
    pub gd: i64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            trust_text: false,
            dry_run: false,
            recursive: true,
            gd: 1,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub paths: Paths,
    pub run: RunOptions,
}

impl Config {
    /// Load from a TOML file. The result is not validated yet.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reject threshold combinations that would make the review band meaningless.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if t.auto_apply > 100 || t.review > 100 || t.review > t.auto_apply {
            return Err(TaggerError::InvalidThresholds {
                auto_apply: t.auto_apply,
                review: t.review,
            });
        }
        if t.description_length == 0 {
            return Err(TaggerError::Config(
                "description_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.thresholds.auto_apply, 85);
        assert_eq!(config.thresholds.review, 75);
        assert_eq!(config.thresholds.description_length, 40);
        assert!(!config.run.trust_text);
        assert!(config.run.recursive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [thresholds]
            auto_apply = 90

            [run]
            trust_text = true
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.auto_apply, 90);
        assert_eq!(config.thresholds.review, 75);
        assert!(config.run.trust_text);
        assert_eq!(config.paths, Paths::default());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = Config::default();
        config.thresholds.review = 90;
        assert!(matches!(
            config.validate(),
            Err(TaggerError::InvalidThresholds {
                auto_apply: 85,
                review: 90
            })
        ));

        config.thresholds = Thresholds {
            auto_apply: 120,
            review: 75,
            description_length: 40,
        };
        assert!(config.validate().is_err());

        config.thresholds = Thresholds {
            description_length: 0,
            ..Thresholds::default()
        };
        assert!(matches!(config.validate(), Err(TaggerError::Config(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml("[thresholds]\nauto_apply = \"high\""),
            Err(TaggerError::ConfigDecode(_))
        ));
    }

    #[test]
    fn test_bands() {
        let t = Thresholds::default();
        assert!(t.is_confident(85));
        assert!(!t.is_confident(84));
        assert!(t.in_review_band(75));
        assert!(t.in_review_band(84));
        assert!(!t.in_review_band(85));
        assert!(!t.in_review_band(74));
    }
}
