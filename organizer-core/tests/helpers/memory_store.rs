//! In-memory recipe store
//!
//! Records every mutating call and can be told to fail them.

use async_trait::async_trait;
use organizer_common::{CookbookDefinition, Recipe, TaxonomyItem, TaxonomyKind};
use organizer_core::store::{RecipeFilter, RecipeStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    categories: Vec<TaxonomyItem>,
    tags: Vec<TaxonomyItem>,
    cookbooks: Vec<CookbookDefinition>,
    recipes: Vec<Recipe>,
    mutations: Vec<String>,
    next_id: usize,
    /// Every call fails as unreachable
    unreachable: bool,
    /// Listing works, mutations fail as unreachable
    mutations_unreachable: bool,
    conflicts: HashSet<String>,
    failing_recipes: HashMap<String, StoreError>,
    /// Remaining failures before updates to the recipe succeed
    flaky_recipes: HashMap<String, (StoreError, usize)>,
}

impl State {
    fn items_mut(&mut self, kind: TaxonomyKind) -> &mut Vec<TaxonomyItem> {
        match kind {
            TaxonomyKind::Category => &mut self.categories,
            TaxonomyKind::Tag => &mut self.tags,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_mutation(&self) -> Result<(), StoreError> {
        self.check_reachable()?;
        if self.mutations_unreachable {
            return Err(StoreError::Unreachable("connection reset".to_string()));
        }
        Ok(())
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Seed existing items as `(name, usage)` pairs
    pub fn with_items(self, kind: TaxonomyKind, items: &[(&str, u32)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for (name, usage) in items {
                let prefix = match kind {
                    TaxonomyKind::Category => "cat",
                    TaxonomyKind::Tag => "tag",
                };
                let id = state.next_id(prefix);
                let item = TaxonomyItem::existing(kind, id, *name, "", *usage);
                state.items_mut(kind).push(item);
            }
        }
        self
    }

    pub fn with_recipe(self, recipe: Recipe) -> Self {
        self.state.lock().unwrap().recipes.push(recipe);
        self
    }

    pub fn with_cookbook(self, cookbook: CookbookDefinition) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut cookbook = cookbook;
            if cookbook.id.is_none() {
                cookbook.id = Some(state.next_id("cookbook"));
            }
            state.cookbooks.push(cookbook);
        }
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_mutations_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().mutations_unreachable = unreachable;
    }

    /// Creating an item with this name reports a conflict
    pub fn reject_create(&self, name: &str) {
        self.state.lock().unwrap().conflicts.insert(name.to_lowercase());
    }

    pub fn fail_recipe_update(&self, recipe_id: &str, error: StoreError) {
        self.state
            .lock()
            .unwrap()
            .failing_recipes
            .insert(recipe_id.to_string(), error);
    }

    /// Fail the next `times` updates of the recipe, then succeed
    pub fn fail_recipe_update_times(&self, recipe_id: &str, error: StoreError, times: usize) {
        self.state
            .lock()
            .unwrap()
            .flaky_recipes
            .insert(recipe_id.to_string(), (error, times));
    }

    /// Mutating calls in order, e.g. `create tags Quick`
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations.len()
    }

    pub fn names(&self, kind: TaxonomyKind) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .items_mut(kind)
            .iter()
            .map(|item| item.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn recipe(&self, id: &str) -> Option<Recipe> {
        self.state
            .lock()
            .unwrap()
            .recipes
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn cookbooks(&self) -> Vec<CookbookDefinition> {
        self.state.lock().unwrap().cookbooks.clone()
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn list_taxonomy(&self, kind: TaxonomyKind) -> Result<Vec<TaxonomyItem>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_reachable()?;
        Ok(state.items_mut(kind).clone())
    }

    async fn create_taxonomy_item(&self, item: &TaxonomyItem) -> Result<TaxonomyItem, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        let exists = state.conflicts.contains(&item.name.to_lowercase())
            || state.items_mut(item.kind).iter().any(|i| i.slug == item.slug);
        if exists {
            return Err(StoreError::Conflict(format!("{} already exists", item.name)));
        }

        let prefix = match item.kind {
            TaxonomyKind::Category => "cat",
            TaxonomyKind::Tag => "tag",
        };
        let id = state.next_id(prefix);
        let created = TaxonomyItem::existing(item.kind, id, &item.name, &item.slug, 0);
        state
            .mutations
            .push(format!("create {} {}", item.kind.plural(), item.name));
        state.items_mut(item.kind).push(created.clone());
        Ok(created)
    }

    async fn delete_taxonomy_item(&self, item: &TaxonomyItem) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        let items = state.items_mut(item.kind);
        let before = items.len();
        items.retain(|i| i.id != item.id);
        if items.len() == before {
            return Err(StoreError::NotFound(item.name.clone()));
        }
        state
            .mutations
            .push(format!("delete {} {}", item.kind.plural(), item.name));
        Ok(())
    }

    async fn list_cookbooks(&self) -> Result<Vec<CookbookDefinition>, StoreError> {
        let state = self.state.lock().unwrap();
        state.check_reachable()?;
        Ok(state.cookbooks.clone())
    }

    async fn create_cookbook(
        &self,
        cookbook: &CookbookDefinition,
    ) -> Result<CookbookDefinition, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        let mut created = cookbook.clone();
        created.id = Some(state.next_id("cookbook"));
        state
            .mutations
            .push(format!("create cookbooks {}", cookbook.name));
        state.cookbooks.push(created.clone());
        Ok(created)
    }

    async fn update_cookbook(&self, cookbook: &CookbookDefinition) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        let existing = state
            .cookbooks
            .iter_mut()
            .find(|c| c.id == cookbook.id)
            .ok_or_else(|| StoreError::NotFound(cookbook.name.clone()))?;
        *existing = cookbook.clone();
        state
            .mutations
            .push(format!("update cookbooks {}", cookbook.name));
        Ok(())
    }

    async fn delete_cookbook(&self, cookbook: &CookbookDefinition) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        let before = state.cookbooks.len();
        state.cookbooks.retain(|c| c.id != cookbook.id);
        if state.cookbooks.len() == before {
            return Err(StoreError::NotFound(cookbook.name.clone()));
        }
        state
            .mutations
            .push(format!("delete cookbooks {}", cookbook.name));
        Ok(())
    }

    async fn list_recipes(&self, filter: RecipeFilter) -> Result<Vec<Recipe>, StoreError> {
        let state = self.state.lock().unwrap();
        state.check_reachable()?;
        Ok(state
            .recipes
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update_recipe_taxonomy(
        &self,
        recipe_id: &str,
        categories: &[TaxonomyItem],
        tags: &[TaxonomyItem],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_mutation()?;

        if let Some(error) = state.failing_recipes.get(recipe_id) {
            return Err(error.clone());
        }
        if let Some((error, remaining)) = state.flaky_recipes.get_mut(recipe_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        let recipe = state
            .recipes
            .iter_mut()
            .find(|r| r.id == recipe_id)
            .ok_or_else(|| StoreError::NotFound(recipe_id.to_string()))?;
        recipe.categories = categories.to_vec();
        recipe.tags = tags.to_vec();
        state.mutations.push(format!("update recipes {}", recipe_id));
        Ok(())
    }
}
