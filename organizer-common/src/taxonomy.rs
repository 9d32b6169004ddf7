//! Taxonomy, recipe and cookbook models
//!
//! These are read/modify views of entities owned by the recipe store. The
//! organizer never keeps a durable copy of them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of ingredient lines included in a recipe's classifiable content
pub const MAX_CONTENT_INGREDIENTS: usize = 10;

/// Kind of taxonomy organizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Category,
    Tag,
}

impl TaxonomyKind {
    /// Plural name, as used by organizer endpoints and log lines
    pub fn plural(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "categories",
            TaxonomyKind::Tag => "tags",
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonomyKind::Category => write!(f, "category"),
            TaxonomyKind::Tag => write!(f, "tag"),
        }
    }
}

/// Where a taxonomy item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Desired,
    Existing,
}

/// Identity of a taxonomy item: slugs are unique per kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxonomyKey {
    pub kind: TaxonomyKind,
    pub slug: String,
}

/// A category or tag, either desired or read from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyItem {
    pub kind: TaxonomyKind,
    /// Store identifier; `None` for desired items not yet created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Number of recipes using the item, as reported by the store
    #[serde(default)]
    pub usage_count: u32,
    pub source: ItemSource,
}

impl TaxonomyItem {
    /// Desired item built from a display name
    pub fn desired(kind: TaxonomyKind, name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            kind,
            id: None,
            slug: slugify(&name),
            name,
            group_id: None,
            usage_count: 0,
            source: ItemSource::Desired,
        }
    }

    /// Item read from the store. An empty slug is derived from the name.
    pub fn existing(
        kind: TaxonomyKind,
        id: impl Into<String>,
        name: impl Into<String>,
        slug: impl Into<String>,
        usage_count: u32,
    ) -> Self {
        let name = name.into().trim().to_string();
        let slug = slug.into();
        let slug = if slug.trim().is_empty() {
            slugify(&name)
        } else {
            slug.trim().to_string()
        };
        Self {
            kind,
            id: Some(id.into()),
            name,
            slug,
            group_id: None,
            usage_count,
            source: ItemSource::Existing,
        }
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn key(&self) -> TaxonomyKey {
        TaxonomyKey {
            kind: self.kind,
            slug: self.slug.clone(),
        }
    }

    /// Case-insensitive lookup key used to match provider output and
    /// desired documents against store names
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Trimmed, lowercased name used for case-insensitive matching
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Derive a URL slug from a display name: lowercase alphanumerics
/// separated by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.trim().chars().flat_map(|c| c.to_lowercase()) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Recipe view used by the categorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub categories: Vec<TaxonomyItem>,
    #[serde(default)]
    pub tags: Vec<TaxonomyItem>,
}

impl Recipe {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            slug: slugify(&name),
            name,
            description: String::new(),
            ingredients: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn missing_categories(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn missing_tags(&self) -> bool {
        self.tags.is_empty()
    }

    /// Text handed to the classification provider: name, description and
    /// the first ingredient lines.
    pub fn classifiable_text(&self) -> String {
        let ingredients = self
            .ingredients
            .iter()
            .take(MAX_CONTENT_INGREDIENTS)
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let mut text = format!("name=\"{}\"", self.name.trim());
        if !self.description.trim().is_empty() {
            text.push_str(&format!(" | description: {}", self.description.trim()));
        }
        text.push_str(&format!(" | ingredients: {}", ingredients));
        text
    }

    /// Stable SHA-256 digest over the classifiable content
    pub fn content_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.classifiable_text().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Cookbook: a saved recipe query with display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookbookDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "queryFilterString")]
    pub query_filter: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub position: u32,
    #[serde(default, rename = "groupId", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, rename = "householdId", skip_serializing_if = "Option::is_none")]
    pub household_id: Option<String>,
}

impl CookbookDefinition {
    pub fn new(name: impl Into<String>, query_filter: impl Into<String>, position: u32) -> Self {
        let name = name.into().trim().to_string();
        Self {
            id: None,
            slug: slugify(&name),
            name,
            description: String::new(),
            query_filter: query_filter.into(),
            public: false,
            position,
            group_id: None,
            household_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}
