//! Recipe eligibility and prompt candidate selection

use crate::store::RecipeFilter;
use crate::taxonomy::is_noisy_name;
use organizer_common::{CategorizeMode, Recipe, TaxonomyItem};

/// Whether a recipe needs enrichment in `mode`
pub fn is_eligible(recipe: &Recipe, mode: CategorizeMode) -> bool {
    RecipeFilter::for_mode(mode).matches(recipe)
}

/// Tags offered to the provider
///
/// Drops tags with over-long names, tags used by fewer than `min_usage`
/// recipes (when `min_usage > 0`) and noisy names. Falls back to every tag
/// when nothing survives.
pub fn prompt_tag_candidates(
    tags: &[TaxonomyItem],
    max_name_length: usize,
    min_usage: u32,
) -> Vec<TaxonomyItem> {
    let filtered: Vec<TaxonomyItem> = tags
        .iter()
        .filter(|tag| tag.name.chars().count() <= max_name_length)
        .filter(|tag| min_usage == 0 || tag.usage_count >= min_usage)
        .filter(|tag| !is_noisy_name(&tag.name))
        .cloned()
        .collect();

    if filtered.is_empty() && !tags.is_empty() {
        tracing::warn!(
            total = tags.len(),
            max_name_length,
            min_usage,
            "Tag candidate filter removed every tag; offering the full tag list"
        );
        return tags.to_vec();
    }

    if filtered.len() < tags.len() {
        tracing::debug!(
            offered = filtered.len(),
            total = tags.len(),
            "Filtered tag candidates for prompts"
        );
    }
    filtered
}

/// Display names in store order
pub fn names(items: &[TaxonomyItem]) -> Vec<String> {
    items.iter().map(|item| item.name.clone()).collect()
}
