//! Prompt construction and lenient parsing of model output
//!
//! The allowed taxonomy is embedded verbatim in every prompt so the model can
//! only pick existing names. Model output is frequently almost-JSON (code
//! fences, smart quotes, bare keys, trailing commas); the parser repairs the
//! common defects before giving up.

use super::{ClassificationRequest, ProviderError};
use once_cell::sync::Lazy;
use organizer_common::CategorizeMode;
use regex::Regex;
use serde_json::Value;

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("valid fence regex"));
static FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").expect("valid fence regex"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[\]}])").expect("valid comma regex"));
static BARE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+):").expect("valid key regex"));
static ARRAY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid span regex"));
static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid span regex"));
static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,]").expect("valid split regex"));

/// Build the classification prompt for one recipe
pub fn build_prompt(request: &ClassificationRequest) -> String {
    let tags_text = bullet_list(&request.allowed_tags);

    if !request.mode.requests_categories() {
        return format!(
            "You are a food recipe tagging assistant.\n\n\
             Select at least one applicable tag for the recipe from THIS LIST ONLY:\n\
             {tags}\n\n\
             Return ONLY valid JSON like:\n\
             {{\"slug\": \"recipe-slug\", \"tags\": [\"Quick\", \"Weeknight\"]}}\n\n\
             If absolutely no tags match, use an empty array. No commentary.\n\n\
             Recipe:\n- slug={slug} | {text}",
            tags = tags_text,
            slug = request.recipe_slug,
            text = request.recipe_text,
        );
    }

    let categories_text = bullet_list(&request.allowed_categories);
    format!(
        "You are a food recipe classifier.\n\n\
         For the recipe below:\n\
         1) Select one or more matching categories FROM THIS LIST ONLY.\n\
         2) Select one or more relevant tags FROM THIS LIST ONLY. Use an empty array ONLY if nothing fits.\n\n\
         Return results ONLY as valid JSON like:\n\
         {{\"slug\": \"recipe-slug\", \"categories\": [\"Dinner\"], \"tags\": [\"Quick\"]}}\n\n\
         If nothing matches, use empty arrays. Do not invent new names. No extra commentary.\n\n\
         Categories:\n{categories}\n\n\
         Tags:\n{tags}\n\n\
         Recipe:\n- slug={slug} | {text}",
        categories = categories_text,
        tags = tags_text,
        slug = request.recipe_slug,
        text = request.recipe_text,
    )
}

fn bullet_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse almost-JSON model output
///
/// Returns `None` when nothing usable can be recovered.
pub fn parse_json_response(result_text: &str) -> Option<Value> {
    let cleaned = result_text.trim();
    let cleaned = FENCE_OPEN.replace(cleaned, "");
    let cleaned = FENCE_CLOSE.replace(&cleaned, "");

    // Well-formed output must not go through the quote repair below
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if is_structured(&value) {
            return Some(value);
        }
    }

    let cleaned = cleaned
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace('\'', "\"");
    let cleaned = TRAILING_COMMA.replace_all(&cleaned, "$1");
    let cleaned = BARE_KEY.replace_all(&cleaned, "\"${1}\":");

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if is_structured(&value) {
            return Some(value);
        }
    }

    for span in [&*ARRAY_SPAN, &*OBJECT_SPAN] {
        if let Some(found) = span.find(&cleaned) {
            if let Ok(value) = serde_json::from_str::<Value>(found.as_str()) {
                if is_structured(&value) {
                    return Some(value);
                }
            }
        }
    }

    None
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Pull category and tag names for `recipe_slug` out of a parsed response.
///
/// Accepts a single object or an array of per-recipe objects. Tags may be
/// reported under `tags`, `tag` or `labels`, as a list or as a `;`/`,`
/// separated string.
pub fn extract_assignment(
    value: &Value,
    recipe_slug: &str,
) -> Result<(Vec<String>, Vec<String>), ProviderError> {
    let entry = match value {
        Value::Object(_) => Some(value),
        Value::Array(items) => {
            let objects: Vec<&Value> = items.iter().filter(|v| v.is_object()).collect();
            objects
                .iter()
                .find(|v| {
                    v.get("slug")
                        .and_then(Value::as_str)
                        .map(|s| s.trim() == recipe_slug)
                        .unwrap_or(false)
                })
                .or_else(|| if objects.len() == 1 { objects.first() } else { None })
                .copied()
        }
        _ => None,
    };

    let Some(entry) = entry else {
        if matches!(value, Value::Array(items) if items.is_empty()) {
            return Ok((Vec::new(), Vec::new()));
        }
        return Err(ProviderError::InvalidResponse(format!(
            "no entry for recipe '{}'",
            recipe_slug
        )));
    };

    let categories = entry
        .get("categories")
        .or_else(|| entry.get("category"))
        .map(names_from_field)
        .unwrap_or_default();
    let tags = entry
        .get("tags")
        .filter(|v| !v.is_null())
        .or_else(|| entry.get("tag"))
        .or_else(|| entry.get("labels"))
        .map(names_from_field)
        .unwrap_or_default();

    Ok((categories, tags))
}

fn names_from_field(field: &Value) -> Vec<String> {
    match field {
        Value::String(text) => LIST_SEPARATOR
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => item
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Shortened model output for log lines and error messages
pub fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = text.trim();
    if trimmed.chars().count() <= LIMIT {
        trimmed.to_string()
    } else {
        format!("{}...", trimmed.chars().take(LIMIT).collect::<String>())
    }
}

/// Mode description for log lines
pub fn describe_mode(mode: CategorizeMode) -> &'static str {
    match mode {
        CategorizeMode::Recat => "RE-CATEGORIZATION (All Recipes)",
        CategorizeMode::MissingCategories => "Categorize Missing Categories",
        CategorizeMode::MissingTags => "Tag Missing Tags",
        CategorizeMode::MissingEither => "Categorize/Tag Missing Categories Or Tags",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: CategorizeMode) -> ClassificationRequest {
        ClassificationRequest {
            recipe_slug: "chili".to_string(),
            recipe_text: "name=\"Chili\" | ingredients: beans".to_string(),
            allowed_categories: vec!["Dinner".to_string(), "Lunch".to_string()],
            allowed_tags: vec!["Quick".to_string(), "Spicy".to_string()],
            mode,
        }
    }

    #[test]
    fn test_prompt_embeds_allowed_names_verbatim() {
        let prompt = build_prompt(&request(CategorizeMode::MissingEither));
        assert!(prompt.contains("- Dinner\n- Lunch"));
        assert!(prompt.contains("- Quick\n- Spicy"));
        assert!(prompt.contains("slug=chili"));
        assert!(prompt.contains("FROM THIS LIST ONLY"));
    }

    #[test]
    fn test_tag_prompt_omits_categories() {
        let prompt = build_prompt(&request(CategorizeMode::MissingTags));
        assert!(!prompt.contains("Dinner"));
        assert!(prompt.contains("- Spicy"));
    }

    #[test]
    fn test_parse_handles_json_fence() {
        let raw = "```json\n[{\"slug\":\"abc\",\"categories\":[\"Dinner\"],\"tags\":[\"Quick\"]}]\n```";
        let parsed = parse_json_response(raw).unwrap();
        assert_eq!(parsed[0]["slug"], "abc");
    }

    #[test]
    fn test_parse_handles_unquoted_keys_and_trailing_comma() {
        let raw = "[{slug: 'abc', categories: ['Dinner'], tags: ['Quick'],}]";
        let parsed = parse_json_response(raw).unwrap();
        assert_eq!(parsed[0]["categories"][0], "Dinner");
    }

    #[test]
    fn test_parse_extracts_embedded_array() {
        let raw = "Sure! Here you go: [{\"tags\": [\"Quick\"]}] Hope that helps";
        let parsed = parse_json_response(raw).unwrap();
        assert_eq!(parsed[0]["tags"][0], "Quick");
    }

    #[test]
    fn test_parse_keeps_apostrophes_in_valid_json() {
        let raw = "{\"tags\": [\"Mom's Favorites\"]}";
        let parsed = parse_json_response(raw).unwrap();
        assert_eq!(parsed["tags"][0], "Mom's Favorites");
    }

    #[test]
    fn test_parse_returns_none_for_invalid_payload() {
        assert!(parse_json_response("not-json-output").is_none());
    }

    #[test]
    fn test_extract_matches_slug_in_array() {
        let value = serde_json::json!([
            {"slug": "other", "tags": ["Wrong"]},
            {"slug": "chili", "categories": ["Dinner"], "tags": ["Spicy"]}
        ]);
        let (categories, tags) = extract_assignment(&value, "chili").unwrap();
        assert_eq!(categories, vec!["Dinner"]);
        assert_eq!(tags, vec!["Spicy"]);
    }

    #[test]
    fn test_extract_accepts_separated_label_string() {
        let value = serde_json::json!({"labels": "Quick; Weeknight, Spicy"});
        let (categories, tags) = extract_assignment(&value, "chili").unwrap();
        assert!(categories.is_empty());
        assert_eq!(tags, vec!["Quick", "Weeknight", "Spicy"]);
    }

    #[test]
    fn test_extract_rejects_ambiguous_array() {
        let value = serde_json::json!([{"slug": "a"}, {"slug": "b"}]);
        assert!(extract_assignment(&value, "chili").is_err());
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), 123);
    }
}
