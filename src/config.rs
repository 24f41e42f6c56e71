//! Scan configuration.
//!
//! Loaded from TOML; every section and field falls back to its default when absent.

use crate::domain::fragment::BoundingBox;
use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Issuer, network and boilerplate phrases that look like names but never are.
/// A fragment containing any of these as whole words is not a name.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "VALID THRU",
    "VALID FROM",
    "GOOD THRU",
    "EXPIRES",
    "EXPIRY",
    "MONTH YEAR",
    "MEMBER SINCE",
    "CARD HOLDER",
    "CARDHOLDER",
    "BANK",
    "VISA",
    "MASTERCARD",
    "MAESTRO",
    "CIRRUS",
    "AMERICAN EXPRESS",
    "AMEX",
    "DINERS CLUB",
    "UNIONPAY",
    "JCB",
    "HUMO",
    "UZCARD",
    "CONTACTLESS",
];

/// Card tier and product words that double as surnames. Only a fragment made up
/// entirely of these is rejected, so `GOLD` is dropped but `DAVID GOLD` is kept.
pub const DEFAULT_GENERIC_WORDS: &[&str] = &[
    "VALID",
    "THRU",
    "EXP",
    "DEBIT",
    "CREDIT",
    "PREPAID",
    "ELECTRON",
    "DISCOVER",
    "MIR",
    "PLATINUM",
    "GOLD",
    "CLASSIC",
    "STANDARD",
    "BUSINESS",
    "CORPORATE",
    "WORLD",
    "ELITE",
    "SIGNATURE",
    "INFINITE",
    "PREMIER",
    "CARD",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub consensus: ConsensusConfig,
    pub parser: ParserConfig,
}

/// Voting parameters for the consensus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Identical readings a value needs before it locks.
    pub threshold: u32,
    /// Frame budget after which the scan finishes with whatever is locked.
    pub max_frames: u32,
}

impl ConsensusConfig {
    pub const DEFAULT_THRESHOLD: u32 = 2;
    pub const DEFAULT_MAX_FRAMES: u32 = 50;

    pub fn new(threshold: u32, max_frames: u32) -> Self {
        Self {
            threshold,
            max_frames,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold < 1 {
            return Err(ScanError::InvalidConfig(
                "consensus threshold must be at least 1".to_string(),
            ));
        }
        if self.max_frames < self.threshold {
            return Err(ScanError::InvalidConfig(format!(
                "max_frames ({}) must not be lower than the consensus threshold ({})",
                self.max_frames, self.threshold
            )));
        }
        Ok(())
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Self::DEFAULT_MAX_FRAMES)
    }
}

/// Parameters of the per-frame field parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Max vertical distance between two fragment centers on the same band,
    /// as a fraction of the taller fragment's height.
    pub band_tolerance: f32,
    /// Max horizontal gap between neighbouring fragments of one digit run,
    /// as a multiple of the taller fragment's height.
    pub max_gap: f32,
    /// Card outline in frame coordinates. The union of all fragments is used when unset.
    pub card_region: Option<BoundingBox>,
    pub denylist: Vec<String>,
    pub generic_words: Vec<String>,
}

impl ParserConfig {
    pub const DEFAULT_BAND_TOLERANCE: f32 = 0.5;
    pub const DEFAULT_MAX_GAP: f32 = 1.5;

    pub fn validate(&self) -> Result<()> {
        if !self.band_tolerance.is_finite() || self.band_tolerance < 0.0 {
            return Err(ScanError::InvalidConfig(
                "band_tolerance must be a non-negative number".to_string(),
            ));
        }
        if !self.max_gap.is_finite() || self.max_gap < 0.0 {
            return Err(ScanError::InvalidConfig(
                "max_gap must be a non-negative number".to_string(),
            ));
        }
        if let Some(region) = &self.card_region
            && !region.is_proper()
        {
            return Err(ScanError::InvalidConfig(
                "card_region must have a positive width and height".to_string(),
            ));
        }
        if self.denylist.iter().any(|term| term.trim().is_empty()) {
            return Err(ScanError::InvalidConfig(
                "denylist entries must not be empty".to_string(),
            ));
        }
        if self.generic_words.iter().any(|word| word.split_whitespace().count() != 1) {
            return Err(ScanError::InvalidConfig(
                "generic_words entries must be single words".to_string(),
            ));
        }
        Ok(())
    }

    /// Denylist terms in the same form names are compared in.
    pub fn normalized_denylist(&self) -> Vec<String> {
        self.denylist.iter().map(|t| normalize_words(t)).collect()
    }

    pub fn normalized_generic_words(&self) -> Vec<String> {
        self.generic_words.iter().map(|w| normalize_words(w)).collect()
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            band_tolerance: Self::DEFAULT_BAND_TOLERANCE,
            max_gap: Self::DEFAULT_MAX_GAP,
            card_region: None,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            generic_words: DEFAULT_GENERIC_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScanConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.consensus.validate()?;
        self.parser.validate()
    }
}

/// Upper-cases and collapses runs of whitespace into single spaces.
pub(crate) fn normalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}
