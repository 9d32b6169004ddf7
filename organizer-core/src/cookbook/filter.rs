//! Cookbook query filter normalization and name → id compilation
//!
//! The store's cookbook editor only understands id-based organizer filters,
//! while desired cookbook documents are written with names. Name clauses are
//! rewritten to id clauses when every name resolves; otherwise the clause is
//! kept as written.

use once_cell::sync::Lazy;
use organizer_common::{taxonomy::name_key, TaxonomyItem};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

static CONTAINS_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCONTAINS[_ ]ANY\b").expect("valid operator regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));
static CATEGORY_NAME_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:recipe_category|recipeCategory)\.name\s+(?P<op>IN|CONTAINS\s+ALL)\s*\[(?P<vals>[^\]]*)\]",
    )
    .expect("valid category clause regex")
});
static TAG_NAME_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btags\.name\s+(?P<op>IN|CONTAINS\s+ALL)\s*\[(?P<vals>[^\]]*)\]")
        .expect("valid tag clause regex")
});
static CATEGORY_ID_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\brecipeCategory\.id\b").expect("valid attribute regex"));

/// Rewrite `CONTAINS ANY` / `CONTAINS_ANY` to `IN` and collapse whitespace
pub fn normalize_query_filter(filter: &str) -> String {
    let normalized = CONTAINS_ANY.replace_all(filter, "IN");
    WHITESPACE.replace_all(&normalized, " ").trim().to_string()
}

/// Lowercased name → id lookups for both kinds
#[derive(Debug, Clone, Default)]
pub struct NameIdMaps {
    pub categories: HashMap<String, String>,
    pub tags: HashMap<String, String>,
}

impl NameIdMaps {
    pub fn from_items(categories: &[TaxonomyItem], tags: &[TaxonomyItem]) -> Self {
        fn lookup(items: &[TaxonomyItem]) -> HashMap<String, String> {
            items
                .iter()
                .filter(|item| !item.name.trim().is_empty())
                .filter_map(|item| item.id.as_ref().map(|id| (item.name_key(), id.clone())))
                .collect()
        }

        Self {
            categories: lookup(categories),
            tags: lookup(tags),
        }
    }
}

/// Compile name clauses to id clauses for the cookbook editor
pub fn compile_query_filter(filter: &str, maps: &NameIdMaps) -> String {
    let compiled = normalize_query_filter(filter);
    let compiled = replace_names_with_ids(
        &compiled,
        &CATEGORY_NAME_CLAUSE,
        "recipe_category.id",
        &maps.categories,
        "category",
    );
    let compiled =
        replace_names_with_ids(&compiled, &TAG_NAME_CLAUSE, "tags.id", &maps.tags, "tag");
    let compiled = CATEGORY_ID_ATTRIBUTE.replace_all(&compiled, "recipe_category.id");
    normalize_query_filter(&compiled)
}

fn replace_names_with_ids(
    filter: &str,
    clause: &Regex,
    target_attribute: &str,
    lookup: &HashMap<String, String>,
    entity: &str,
) -> String {
    clause
        .replace_all(filter, |caps: &Captures| {
            let original = caps[0].to_string();
            let operator = caps["op"]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase();

            let Some(names) = parse_filter_values(&caps["vals"]) else {
                tracing::warn!(entity, clause = %original, "Could not parse name list in query filter");
                return original;
            };

            let mut ids = Vec::with_capacity(names.len());
            let mut missing = Vec::new();
            for name in &names {
                match lookup.get(&name_key(name)) {
                    Some(id) => ids.push(id.as_str()),
                    None => missing.push(name.as_str()),
                }
            }

            if !missing.is_empty() || ids.is_empty() {
                let unresolved = if missing.is_empty() {
                    names.join(", ")
                } else {
                    missing.join(", ")
                };
                tracing::warn!(
                    entity,
                    names = %unresolved,
                    "Could not resolve names in query filter; keeping original clause"
                );
                return original;
            }

            let id_list = ids
                .iter()
                .map(|id| format!("\"{}\"", id))
                .collect::<Vec<_>>()
                .join(",");
            format!("{} {} [{}]", target_attribute, operator, id_list)
        })
        .into_owned()
}

/// Parse the inside of a `[...]` value list as JSON values
fn parse_filter_values(raw: &str) -> Option<Vec<String>> {
    let values: Vec<Value> = serde_json::from_str(&format!("[{}]", raw)).ok()?;
    Some(
        values
            .into_iter()
            .map(|value| match value {
                Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|text| !text.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_common::TaxonomyKind;

    fn maps() -> NameIdMaps {
        NameIdMaps::from_items(
            &[TaxonomyItem::existing(TaxonomyKind::Category, "cat-1", "Dinner", "", 0)],
            &[
                TaxonomyItem::existing(TaxonomyKind::Tag, "tag-1", "Quick", "", 0),
                TaxonomyItem::existing(TaxonomyKind::Tag, "tag-2", "Weeknight", "", 0),
            ],
        )
    }

    #[test]
    fn test_normalize_operators_and_spacing() {
        assert_eq!(
            normalize_query_filter("  tags.name   contains_any [\"Quick\"]\n"),
            "tags.name IN [\"Quick\"]"
        );
        assert_eq!(
            normalize_query_filter("tags.name CONTAINS ANY [\"Quick\"]"),
            "tags.name IN [\"Quick\"]"
        );
    }

    #[test]
    fn test_compile_names_to_ids() {
        let filter =
            r#"recipeCategory.name IN ["dinner"] AND tags.name CONTAINS ANY ["Quick", "Weeknight"]"#;
        assert_eq!(
            compile_query_filter(filter, &maps()),
            r#"recipe_category.id IN ["cat-1"] AND tags.id IN ["tag-1","tag-2"]"#
        );
    }

    #[test]
    fn test_contains_all_operator_is_preserved() {
        let filter = r#"tags.name contains   all ["Quick","Weeknight"]"#;
        assert_eq!(
            compile_query_filter(filter, &maps()),
            r#"tags.id CONTAINS ALL ["tag-1","tag-2"]"#
        );
    }

    #[test]
    fn test_unresolved_names_keep_clause() {
        let filter = r#"tags.name IN ["Quick", "Unknown"]"#;
        assert_eq!(compile_query_filter(filter, &maps()), filter);
    }

    #[test]
    fn test_category_id_attribute_is_normalized() {
        assert_eq!(
            compile_query_filter(r#"recipeCategory.id IN ["cat-1"]"#, &NameIdMaps::default()),
            r#"recipe_category.id IN ["cat-1"]"#
        );
    }
}
