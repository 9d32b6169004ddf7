//! Read-only taxonomy quality report
//!
//! Usage counts, duplicate and near-duplicate names, problem tags and cleanup
//! candidates. Nothing here mutates the store.

use crate::error::OrganizerResult;
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::{RecipeFilter, RecipeStore};
use crate::taxonomy::{is_noisy_name, CleanupPolicy, CleanupReason};
use once_cell::sync::Lazy;
use organizer_common::{OrganizerConfig, Recipe, TaxonomyItem, TaxonomyKind};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid similarity regex"));

const RECOMMENDATIONS: [&str; 4] = [
    "Merge or delete tags marked as noisy_or_over_specific.",
    "Prefer short reusable tags (single concept) over recipe-title tags.",
    "Run categorizer in missing-tags mode weekly to improve tag coverage.",
    "Keep category list stable; use tags for user-facing discovery.",
];

/// Audit thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuditOptions {
    /// Tag names at least this long are flagged
    pub long_tag_threshold: usize,
    /// Tags used by fewer recipes are flagged
    pub min_useful_usage: u32,
    /// Normalized similarity at or above which two names are near-duplicates
    pub similarity_threshold: f64,
    pub cleanup: CleanupPolicy,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            long_tag_threshold: 24,
            min_useful_usage: 2,
            similarity_threshold: 0.85,
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl AuditOptions {
    pub fn from_config(config: &OrganizerConfig) -> Self {
        Self {
            long_tag_threshold: config.tag_max_name_length,
            cleanup: CleanupPolicy::from_settings(&config.cleanup),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub recipes: usize,
    pub categories: usize,
    pub tags: usize,
    pub recipes_without_categories: usize,
    pub recipes_without_tags: usize,
    pub unused_categories: usize,
    pub unused_tags: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEntry {
    pub name: String,
    pub usage: u32,
}

/// Two names that differ after normalization but are still very close
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearDuplicate {
    pub first: String,
    pub second: String,
    pub similarity: f64,
}

/// Per-kind section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindAudit {
    /// Ascending by usage, then name
    pub usage: Vec<UsageEntry>,
    pub unused: Vec<String>,
    /// Names colliding after case/punctuation normalization
    pub similar_groups: Vec<Vec<String>>,
    pub near_duplicates: Vec<NearDuplicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemReason {
    NameTooLong,
    LowUsage,
    NoisyOrOverSpecific,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemTag {
    pub name: String,
    pub usage: u32,
    pub reasons: Vec<ProblemReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupCandidate {
    pub name: String,
    pub usage: u32,
    pub reasons: Vec<CleanupReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub categories: KindAudit,
    pub tags: KindAudit,
    pub problematic_tags: Vec<ProblemTag>,
    /// Tags the configured cleanup would select
    pub cleanup_candidates: Vec<CleanupCandidate>,
    pub recommendations: Vec<String>,
}

impl AuditReport {
    pub fn to_json_pretty(&self) -> organizer_common::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Normalized name used for duplicate detection
pub fn normalize_for_similarity(name: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&name.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Groups of distinct names that collide after normalization, largest first
pub fn similar_groups(items: &[TaxonomyItem]) -> Vec<Vec<String>> {
    let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items {
        let name = item.name.trim();
        if name.is_empty() {
            continue;
        }
        by_key
            .entry(normalize_for_similarity(name))
            .or_default()
            .push(name.to_string());
    }

    let mut groups: Vec<Vec<String>> = by_key
        .into_values()
        .map(|mut names| {
            names.sort();
            names.dedup();
            names
        })
        .filter(|names| names.len() > 1)
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    groups
}

/// Pairs of names whose normalized forms are distinct but similar
pub fn near_duplicates(items: &[TaxonomyItem], threshold: f64) -> Vec<NearDuplicate> {
    let mut normalized: Vec<(String, &str)> = items
        .iter()
        .map(|item| (normalize_for_similarity(&item.name), item.name.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup_by(|a, b| a.0 == b.0);

    let mut pairs = Vec::new();
    for (i, (key_a, name_a)) in normalized.iter().enumerate() {
        for (key_b, name_b) in normalized.iter().skip(i + 1) {
            let similarity = strsim::normalized_damerau_levenshtein(key_a, key_b);
            if similarity >= threshold {
                pairs.push(NearDuplicate {
                    first: name_a.to_string(),
                    second: name_b.to_string(),
                    similarity: (similarity * 1000.0).round() / 1000.0,
                });
            }
        }
    }
    pairs
}

fn usage_section(items: &[TaxonomyItem], threshold: f64) -> KindAudit {
    let mut usage: Vec<UsageEntry> = items
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .map(|item| UsageEntry {
            name: item.name.clone(),
            usage: item.usage_count,
        })
        .collect();
    usage.sort_by(|a, b| a.usage.cmp(&b.usage).then_with(|| a.name.cmp(&b.name)));

    let mut unused: Vec<String> = usage
        .iter()
        .filter(|entry| entry.usage == 0)
        .map(|entry| entry.name.clone())
        .collect();
    unused.sort();

    KindAudit {
        usage,
        unused,
        similar_groups: similar_groups(items),
        near_duplicates: near_duplicates(items, threshold),
    }
}

fn problematic_tags(tags: &[TaxonomyItem], options: &AuditOptions) -> Vec<ProblemTag> {
    let mut sorted: Vec<&TaxonomyItem> = tags.iter().collect();
    sorted.sort_by(|a, b| a.usage_count.cmp(&b.usage_count).then_with(|| a.name.cmp(&b.name)));

    sorted
        .into_iter()
        .filter_map(|tag| {
            let mut reasons = Vec::new();
            if tag.name.chars().count() >= options.long_tag_threshold {
                reasons.push(ProblemReason::NameTooLong);
            }
            if tag.usage_count < options.min_useful_usage {
                reasons.push(ProblemReason::LowUsage);
            }
            if is_noisy_name(&tag.name) {
                reasons.push(ProblemReason::NoisyOrOverSpecific);
            }
            (!reasons.is_empty()).then(|| ProblemTag {
                name: tag.name.clone(),
                usage: tag.usage_count,
                reasons,
            })
        })
        .collect()
}

/// Build the report from snapshots; pure
pub fn build_report(
    recipes: &[Recipe],
    categories: &[TaxonomyItem],
    tags: &[TaxonomyItem],
    options: &AuditOptions,
) -> AuditReport {
    let category_section = usage_section(categories, options.similarity_threshold);
    let tag_section = usage_section(tags, options.similarity_threshold);

    let mut cleanup_candidates: Vec<CleanupCandidate> = tags
        .iter()
        .filter_map(|tag| {
            let reasons = options.cleanup.reasons(tag);
            (!reasons.is_empty()).then(|| CleanupCandidate {
                name: tag.name.clone(),
                usage: tag.usage_count,
                reasons,
            })
        })
        .collect();
    cleanup_candidates.sort_by(|a, b| a.usage.cmp(&b.usage).then_with(|| a.name.cmp(&b.name)));

    AuditReport {
        summary: AuditSummary {
            recipes: recipes.len(),
            categories: categories.len(),
            tags: tags.len(),
            recipes_without_categories: recipes.iter().filter(|r| r.missing_categories()).count(),
            recipes_without_tags: recipes.iter().filter(|r| r.missing_tags()).count(),
            unused_categories: category_section.unused.len(),
            unused_tags: tag_section.unused.len(),
        },
        problematic_tags: problematic_tags(tags, options),
        categories: category_section,
        tags: tag_section,
        cleanup_candidates,
        recommendations: RECOMMENDATIONS.iter().map(|r| r.to_string()).collect(),
    }
}

/// Collects snapshots from the store and builds an [`AuditReport`]
pub struct AuditEngine {
    store: Arc<dyn RecipeStore>,
    retry: RetryPolicy,
    options: AuditOptions,
}

impl AuditEngine {
    pub fn new(store: Arc<dyn RecipeStore>, config: &OrganizerConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(config.retry_ceiling, config.retry_base_ms),
            options: AuditOptions::from_config(config),
        }
    }

    pub fn with_options(mut self, options: AuditOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run(&self) -> OrganizerResult<AuditReport> {
        let recipes = retry_transient("list_recipes", &self.retry, || {
            self.store.list_recipes(RecipeFilter::All)
        })
        .await?;
        let categories = retry_transient("list_taxonomy", &self.retry, || {
            self.store.list_taxonomy(TaxonomyKind::Category)
        })
        .await?;
        let tags = retry_transient("list_taxonomy", &self.retry, || {
            self.store.list_taxonomy(TaxonomyKind::Tag)
        })
        .await?;

        let report = build_report(&recipes, &categories, &tags, &self.options);
        tracing::info!(
            recipes = report.summary.recipes,
            categories = report.summary.categories,
            tags = report.summary.tags,
            unused_tags = report.summary.unused_tags,
            problematic_tags = report.problematic_tags.len(),
            similar_groups = report.tags.similar_groups.len(),
            "Taxonomy audit complete"
        );
        Ok(report)
    }
}
