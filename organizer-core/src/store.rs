//! Recipe store port
//!
//! The organizer depends on a recipe-store client capability (list, create,
//! update and delete categories, tags, cookbooks and recipes). HTTP transport,
//! authentication and persistence live behind this trait.

use crate::error::OrganizerError;
use crate::retry::Transient;
use async_trait::async_trait;
use organizer_common::{CategorizeMode, CookbookDefinition, Recipe, TaxonomyItem, TaxonomyKind};
use thiserror::Error;

/// Recipe store client errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store cannot be reached (connection refused, DNS, timeout, 5xx)
    #[error("Recipe store unreachable: {0}")]
    Unreachable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Item already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

impl From<StoreError> for OrganizerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unreachable(msg) => OrganizerError::RemoteUnavailable(msg),
            other => OrganizerError::StoreRejected(other.to_string()),
        }
    }
}

/// Which recipes to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFilter {
    All,
    MissingCategories,
    MissingTags,
    MissingEither,
}

impl RecipeFilter {
    pub fn for_mode(mode: CategorizeMode) -> Self {
        match mode {
            CategorizeMode::MissingTags => RecipeFilter::MissingTags,
            CategorizeMode::MissingCategories => RecipeFilter::MissingCategories,
            CategorizeMode::MissingEither => RecipeFilter::MissingEither,
            CategorizeMode::Recat => RecipeFilter::All,
        }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            RecipeFilter::All => true,
            RecipeFilter::MissingCategories => recipe.missing_categories(),
            RecipeFilter::MissingTags => recipe.missing_tags(),
            RecipeFilter::MissingEither => recipe.missing_categories() || recipe.missing_tags(),
        }
    }
}

/// Recipe store client capability
///
/// Listing operations report usage counts on every category and tag.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn list_taxonomy(&self, kind: TaxonomyKind) -> Result<Vec<TaxonomyItem>, StoreError>;

    /// Create an organizer; returns the stored item with its identifier
    async fn create_taxonomy_item(&self, item: &TaxonomyItem) -> Result<TaxonomyItem, StoreError>;

    async fn delete_taxonomy_item(&self, item: &TaxonomyItem) -> Result<(), StoreError>;

    async fn list_cookbooks(&self) -> Result<Vec<CookbookDefinition>, StoreError>;

    async fn create_cookbook(
        &self,
        cookbook: &CookbookDefinition,
    ) -> Result<CookbookDefinition, StoreError>;

    async fn update_cookbook(&self, cookbook: &CookbookDefinition) -> Result<(), StoreError>;

    async fn delete_cookbook(&self, cookbook: &CookbookDefinition) -> Result<(), StoreError>;

    /// Recipes matching `filter`. Implementations may return a superset.
    async fn list_recipes(&self, filter: RecipeFilter) -> Result<Vec<Recipe>, StoreError>;

    /// Replace a recipe's category and tag assignments
    async fn update_recipe_taxonomy(
        &self,
        recipe_id: &str,
        categories: &[TaxonomyItem],
        tags: &[TaxonomyItem],
    ) -> Result<(), StoreError>;

    async fn list_categories(&self) -> Result<Vec<TaxonomyItem>, StoreError> {
        self.list_taxonomy(TaxonomyKind::Category).await
    }

    async fn list_tags(&self) -> Result<Vec<TaxonomyItem>, StoreError> {
        self.list_taxonomy(TaxonomyKind::Tag).await
    }

    async fn list_recipes_missing(&self, mode: CategorizeMode) -> Result<Vec<Recipe>, StoreError> {
        self.list_recipes(RecipeFilter::for_mode(mode)).await
    }
}
