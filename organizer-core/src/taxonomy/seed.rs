//! Desired taxonomy documents and refresh options

use organizer_common::{Error, Result, TaxonomyItem, TaxonomyKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse a desired-set document: a JSON array of names or
/// `{"name": ..., "groupId": ...}` objects. Blank string entries are
/// ignored; an object without a name is rejected.
pub fn parse_desired_items(kind: TaxonomyKind, json: &str) -> Result<Vec<TaxonomyItem>> {
    let raw: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = raw else {
        return Err(Error::InvalidInput(format!(
            "{} document must contain an array",
            kind.plural()
        )));
    };

    let mut items = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let position = idx + 1;
        match entry {
            Value::String(name) => {
                if !name.trim().is_empty() {
                    items.push(TaxonomyItem::desired(kind, name.as_str()));
                }
            }
            Value::Object(fields) => {
                let name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "Item #{} is missing a non-empty 'name'",
                            position
                        ))
                    })?;
                let mut item = TaxonomyItem::desired(kind, name);
                if let Some(group_id) = fields.get("groupId").and_then(Value::as_str) {
                    item = item.with_group_id(group_id);
                }
                items.push(item);
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Item #{} must be a string or object",
                    position
                )));
            }
        }
    }

    if items.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no valid {} found in document",
            kind.plural()
        )));
    }

    Ok(items)
}

/// Refresh strategy for both kinds at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Keep existing items and add missing ones
    #[default]
    Merge,
    /// Delete existing items not in the desired set
    Replace,
}

/// Per-kind replace flags: `Replace` forces both, `Merge` honours the
/// individual switches.
pub fn resolve_refresh_replace_flags(
    mode: RefreshMode,
    replace_categories: bool,
    replace_tags: bool,
) -> (bool, bool) {
    match mode {
        RefreshMode::Replace => (true, true),
        RefreshMode::Merge => (replace_categories, replace_tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strings_and_objects() {
        let json = r#"["Dinner", "  ", {"name": "Breakfast", "groupId": "g1"}]"#;
        let items = parse_desired_items(TaxonomyKind::Category, json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].slug, "dinner");
        assert_eq!(items[1].group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn test_parse_rejects_nameless_object() {
        let result = parse_desired_items(TaxonomyKind::Tag, r#"[{"groupId": "g1"}]"#);
        assert!(matches!(result, Err(Error::InvalidInput(msg)) if msg.contains("#1")));
    }

    #[test]
    fn test_parse_rejects_non_array_and_empty() {
        assert!(parse_desired_items(TaxonomyKind::Tag, r#"{"name": "x"}"#).is_err());
        assert!(parse_desired_items(TaxonomyKind::Tag, r#"[""]"#).is_err());
        assert!(matches!(
            parse_desired_items(TaxonomyKind::Tag, "[not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_resolve_refresh_replace_flags() {
        assert_eq!(
            resolve_refresh_replace_flags(RefreshMode::Replace, false, false),
            (true, true)
        );
        assert_eq!(
            resolve_refresh_replace_flags(RefreshMode::Merge, true, false),
            (true, false)
        );
        assert_eq!(
            resolve_refresh_replace_flags(RefreshMode::Merge, false, false),
            (false, false)
        );
    }
}
