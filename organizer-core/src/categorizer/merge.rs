//! Response validation and non-destructive merge

use organizer_common::{taxonomy::name_key, TaxonomyItem};
use std::collections::{HashMap, HashSet};

/// Names resolved against the allowed set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validated {
    /// Canonical store items, in response order, without duplicates
    pub items: Vec<TaxonomyItem>,
    /// Returned names outside the allowed set
    pub dropped: Vec<String>,
}

/// Keep only names present in `allowed` (case-insensitive)
pub fn validate(names: &[String], allowed: &[TaxonomyItem]) -> Validated {
    let by_name: HashMap<String, &TaxonomyItem> =
        allowed.iter().map(|item| (item.name_key(), item)).collect();

    let mut validated = Validated::default();
    let mut seen = HashSet::new();

    for name in names {
        let key = name_key(name);
        if key.is_empty() {
            continue;
        }
        match by_name.get(&key) {
            Some(item) => {
                if seen.insert(key) {
                    validated.items.push((*item).clone());
                }
            }
            None => validated.dropped.push(name.trim().to_string()),
        }
    }

    validated
}

/// Merge validated items into an existing assignment
///
/// Without `replace` the result is the union and nothing existing is lost.
/// With `replace` a non-empty validated set becomes the assignment; an empty
/// one leaves the existing set untouched.
pub fn merge_assignment(
    existing: &[TaxonomyItem],
    validated: &[TaxonomyItem],
    replace: bool,
) -> Vec<TaxonomyItem> {
    if replace && !validated.is_empty() {
        return validated.to_vec();
    }

    let mut merged = existing.to_vec();
    let mut present: HashSet<String> = existing.iter().map(TaxonomyItem::name_key).collect();
    for item in validated {
        if present.insert(item.name_key()) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Whether two assignments hold the same names
pub fn same_assignment(a: &[TaxonomyItem], b: &[TaxonomyItem]) -> bool {
    let a: HashSet<String> = a.iter().map(TaxonomyItem::name_key).collect();
    let b: HashSet<String> = b.iter().map(TaxonomyItem::name_key).collect();
    a == b
}
