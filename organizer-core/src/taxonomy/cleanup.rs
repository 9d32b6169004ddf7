//! Noisy-tag heuristics

use once_cell::sync::Lazy;
use organizer_common::config::CleanupSettings;
use organizer_common::TaxonomyItem;
use regex::Regex;
use serde::Serialize;

/// Whole-word phrases that mark a tag as a recipe title rather than a
/// reusable concept
pub const NOISY_PHRASES: [&str; 5] = [
    "recipe",
    "how to make",
    "from scratch",
    "without drippings",
    "from drippings",
];

static NOISY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternation = NOISY_PHRASES
        .iter()
        .map(|phrase| regex::escape(phrase))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("valid noisy phrase regex")
});

pub fn is_noisy_name(name: &str) -> bool {
    NOISY_PATTERN.is_match(name)
}

/// Why a tag was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
    LowUsage,
    NameTooLong,
    NoisyPhrase,
}

/// Cleanup candidate selection
///
/// A tag is a candidate when its usage is at most `min_usage`, or when
/// `delete_noisy` is set and its name is over-long or contains a noisy
/// phrase. `only_unused` additionally requires zero usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub max_name_length: usize,
    pub min_usage: u32,
    pub delete_noisy: bool,
    pub only_unused: bool,
}

impl CleanupPolicy {
    pub fn from_settings(settings: &CleanupSettings) -> Self {
        Self {
            max_name_length: settings.max_name_length,
            min_usage: settings.min_usage,
            delete_noisy: settings.delete_noisy,
            only_unused: settings.only_unused,
        }
    }

    /// Reasons the item qualifies; empty when it is not a candidate
    pub fn reasons(&self, item: &TaxonomyItem) -> Vec<CleanupReason> {
        if self.only_unused && item.usage_count != 0 {
            return Vec::new();
        }

        let mut reasons = Vec::new();
        if item.usage_count <= self.min_usage {
            reasons.push(CleanupReason::LowUsage);
        }
        if self.delete_noisy {
            if item.name.chars().count() > self.max_name_length {
                reasons.push(CleanupReason::NameTooLong);
            }
            if is_noisy_name(&item.name) {
                reasons.push(CleanupReason::NoisyPhrase);
            }
        }
        reasons
    }

    pub fn is_candidate(&self, item: &TaxonomyItem) -> bool {
        !self.reasons(item).is_empty()
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from_settings(&CleanupSettings::default())
    }
}
