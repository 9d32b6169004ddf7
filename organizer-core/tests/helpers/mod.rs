//! Test Helper Utilities
//!
//! Shared fixtures for organizer-core integration tests

#![allow(dead_code)]

pub mod memory_store;
pub mod scripted_provider;

pub use memory_store::MemoryStore;
pub use scripted_provider::ScriptedProvider;

use organizer_common::{OrganizerConfig, Recipe, TaxonomyItem, TaxonomyKind};

/// Default configuration with millisecond backoff
pub fn test_config() -> OrganizerConfig {
    let _ = organizer_common::logging::init_tracing("debug");
    OrganizerConfig {
        retry_base_ms: 1,
        ..OrganizerConfig::default()
    }
}

pub fn desired(kind: TaxonomyKind, names: &[&str]) -> Vec<TaxonomyItem> {
    names
        .iter()
        .map(|name| TaxonomyItem::desired(kind, *name))
        .collect()
}

/// Recipe with existing assignments resolved against the store's ids
pub fn recipe(id: &str, name: &str, categories: &[&str], tags: &[&str]) -> Recipe {
    let mut recipe = Recipe::new(id, name);
    recipe.description = format!("A recipe for {}", name);
    recipe.ingredients = vec!["salt".to_string(), "pepper".to_string()];
    recipe.categories = categories
        .iter()
        .map(|n| TaxonomyItem::desired(TaxonomyKind::Category, *n))
        .collect();
    recipe.tags = tags
        .iter()
        .map(|n| TaxonomyItem::desired(TaxonomyKind::Tag, *n))
        .collect();
    recipe
}

pub fn item_names(items: &[TaxonomyItem]) -> Vec<String> {
    let mut names: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
    names.sort();
    names
}
