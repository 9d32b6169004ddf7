//! Categorization engine
//!
//! Selects recipes that need enrichment, classifies them through the
//! configured provider (or the result cache) and writes merged assignments
//! back to the store. Recipes are processed by a bounded worker pool; every
//! failure is scoped to its recipe except an unreachable store or provider,
//! which stops new work and ends the run as aborted.

pub mod merge;
pub mod progress;
pub mod selection;

pub use merge::{merge_assignment, same_assignment, validate, Validated};
pub use progress::ProgressTracker;
pub use selection::{is_eligible, prompt_tag_candidates};

use crate::cache::{self, CacheEntry, ResultCache};
use crate::error::{OrganizerError, OrganizerResult};
use crate::provider::{prompt, ClassificationProvider, ClassificationRequest};
use crate::report::CompletionStatus;
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::{RecipeStore, StoreError};
use futures::stream::{self, StreamExt};
use organizer_common::{CategorizeMode, OrganizerConfig, Recipe, TaxonomyItem};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What happened to one recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Assignment changed and was written (or planned, in dry-run)
    Updated,
    /// Validated result added nothing new
    Unchanged,
    /// Provider returned nothing usable from the allowed set
    NoAssignment,
    Failed,
    /// Not started because the run was cancelled or aborted
    NotAttempted,
}

/// Per-recipe result, reported in recipe id order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeOutcome {
    pub recipe_id: String,
    pub recipe_name: String,
    pub status: OutcomeStatus,
    pub cache_hit: bool,
    pub planned: bool,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecipeOutcome {
    fn new(recipe: &Recipe, status: OutcomeStatus) -> Self {
        Self {
            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            status,
            cache_hit: false,
            planned: false,
            categories: Vec::new(),
            tags: Vec::new(),
            error: None,
        }
    }

    fn failed(recipe: &Recipe, error: String, cache_hit: bool) -> Self {
        let mut outcome = Self::new(recipe, OutcomeStatus::Failed);
        outcome.error = Some(error);
        outcome.cache_hit = cache_hit;
        outcome
    }
}

/// Aggregated run result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: CategorizeMode,
    /// Updated or unchanged recipes
    pub processed: usize,
    /// No assignment, or never attempted
    pub skipped: usize,
    pub cache_hits: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub outcomes: Vec<RecipeOutcome>,
    pub status: CompletionStatus,
}

impl RunSummary {
    fn from_outcomes(
        mode: CategorizeMode,
        dry_run: bool,
        mut outcomes: Vec<RecipeOutcome>,
        status: CompletionStatus,
    ) -> Self {
        outcomes.sort_by(|a, b| a.recipe_id.cmp(&b.recipe_id));

        let count = |wanted: &[OutcomeStatus]| {
            outcomes
                .iter()
                .filter(|o| wanted.contains(&o.status))
                .count()
        };

        Self {
            mode,
            processed: count(&[OutcomeStatus::Updated, OutcomeStatus::Unchanged]),
            skipped: count(&[OutcomeStatus::NoAssignment, OutcomeStatus::NotAttempted]),
            cache_hits: outcomes.iter().filter(|o| o.cache_hit).count(),
            failed: count(&[OutcomeStatus::Failed]),
            dry_run,
            outcomes,
            status,
        }
    }

    fn aborted(mode: CategorizeMode, dry_run: bool, reason: String) -> Self {
        Self::from_outcomes(mode, dry_run, Vec::new(), CompletionStatus::Aborted(reason))
    }

    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Updated)
            .count()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            mode = %self.mode,
            processed = self.processed,
            updated = self.updated(),
            skipped = self.skipped,
            cache_hits = self.cache_hits,
            failed = self.failed,
            dry_run = self.dry_run,
            status = %self.status,
            "Categorization finished"
        );
    }
}

/// Shared, read-only state of one run
struct RunContext {
    mode: CategorizeMode,
    allowed_categories: Vec<TaxonomyItem>,
    allowed_tags: Vec<TaxonomyItem>,
    category_names: Vec<String>,
    tag_names: Vec<String>,
    taxonomy_version: String,
    progress: ProgressTracker,
    /// Cancelled on a resource-scoped failure
    abort: CancellationToken,
    abort_reason: OnceLock<String>,
}

impl RunContext {
    fn abort_run(&self, reason: String) {
        tracing::error!(error = %reason, "Remote unavailable, stopping new work");
        let _ = self.abort_reason.set(reason);
        self.abort.cancel();
    }
}

/// Batched, concurrent, cached recipe enrichment
pub struct CategorizationEngine {
    store: Arc<dyn RecipeStore>,
    provider: Arc<dyn ClassificationProvider>,
    cache: Arc<ResultCache>,
    retry: RetryPolicy,
    mode: CategorizeMode,
    batch_size: usize,
    max_workers: usize,
    dry_run: bool,
    tag_max_name_length: usize,
    tag_min_usage: u32,
}

impl CategorizationEngine {
    pub fn new(
        store: Arc<dyn RecipeStore>,
        provider: Arc<dyn ClassificationProvider>,
        cache: Arc<ResultCache>,
        config: &OrganizerConfig,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            retry: RetryPolicy::new(config.retry_ceiling, config.retry_base_ms),
            mode: config.mode,
            batch_size: config.batch_size,
            max_workers: config.max_workers,
            dry_run: config.dry_run,
            tag_max_name_length: config.tag_max_name_length,
            tag_min_usage: config.tag_min_usage,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn mode(&self) -> CategorizeMode {
        self.mode
    }

    /// Run with the configured mode and worker count
    pub async fn run_configured(&self, cancel: &CancellationToken) -> OrganizerResult<RunSummary> {
        self.run(self.mode, self.max_workers, cancel).await
    }

    /// Categorize every eligible recipe with `concurrency` workers
    ///
    /// Returns `Err` only for invalid arguments. Remote failures end up in
    /// the summary's status and counts.
    pub async fn run(
        &self,
        mode: CategorizeMode,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> OrganizerResult<RunSummary> {
        if concurrency == 0 {
            return Err(OrganizerError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let start_time = Instant::now();
        tracing::info!(
            mode = %mode,
            description = prompt::describe_mode(mode),
            provider = self.provider.provider_id(),
            model = self.provider.model_id(),
            workers = concurrency,
            batch_size = self.batch_size,
            dry_run = self.dry_run,
            "Starting categorization"
        );

        let (categories, tags) = match self.load_taxonomy().await {
            Ok(taxonomy) => taxonomy,
            Err(e) => return Ok(RunSummary::aborted(mode, self.dry_run, e.to_string())),
        };

        let recipes = match retry_transient("list_recipes", &self.retry, || {
            self.store.list_recipes_missing(mode)
        })
        .await
        {
            Ok(recipes) => recipes,
            Err(e) => {
                tracing::error!(error = %e, "Could not list recipes");
                return Ok(RunSummary::aborted(mode, self.dry_run, e.to_string()));
            }
        };

        let mut targets: Vec<Recipe> = recipes
            .into_iter()
            .filter(|recipe| is_eligible(recipe, mode))
            .collect();
        targets.sort_by(|a, b| a.id.cmp(&b.id));

        let allowed_categories = if mode.requests_categories() {
            categories
        } else {
            Vec::new()
        };
        let allowed_tags = prompt_tag_candidates(&tags, self.tag_max_name_length, self.tag_min_usage);
        let category_names = selection::names(&allowed_categories);
        let tag_names = selection::names(&allowed_tags);

        let ctx = RunContext {
            mode,
            taxonomy_version: cache::taxonomy_version(&category_names, &tag_names),
            allowed_categories,
            allowed_tags,
            category_names,
            tag_names,
            progress: ProgressTracker::new(targets.len(), self.batch_size),
            abort: cancel.child_token(),
            abort_reason: OnceLock::new(),
        };

        tracing::info!(
            eligible = targets.len(),
            categories = ctx.category_names.len(),
            tags = ctx.tag_names.len(),
            "Recipes selected for categorization"
        );

        let ctx = &ctx;
        let outcomes: Vec<RecipeOutcome> = stream::iter(targets)
            .map(|recipe| async move {
                // Check cancellation before starting a recipe
                if ctx.abort.is_cancelled() {
                    return RecipeOutcome::new(&recipe, OutcomeStatus::NotAttempted);
                }

                let outcome = self.process_recipe(ctx, &recipe).await;
                ctx.progress.complete_one();
                outcome
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let status = match ctx.abort_reason.get() {
            Some(reason) => CompletionStatus::Aborted(reason.clone()),
            None if cancel.is_cancelled() => CompletionStatus::Cancelled,
            None => CompletionStatus::Completed,
        };

        let summary = RunSummary::from_outcomes(mode, self.dry_run, outcomes, status);
        tracing::info!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Categorization run complete"
        );
        summary.log_summary();
        Ok(summary)
    }

    async fn load_taxonomy(&self) -> Result<(Vec<TaxonomyItem>, Vec<TaxonomyItem>), StoreError> {
        let categories =
            retry_transient("list_categories", &self.retry, || self.store.list_categories())
                .await;
        let categories = categories.map_err(|e| {
            tracing::error!(error = %e, "Could not list categories");
            e
        })?;
        let tags = retry_transient("list_tags", &self.retry, || self.store.list_tags())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Could not list tags");
                e
            })?;
        Ok((categories, tags))
    }

    async fn process_recipe(&self, ctx: &RunContext, recipe: &Recipe) -> RecipeOutcome {
        let fingerprint = cache::fingerprint(
            recipe,
            self.provider.provider_id(),
            self.provider.model_id(),
            &ctx.taxonomy_version,
        );

        let cached = if ctx.mode == CategorizeMode::Recat {
            None
        } else {
            self.cache.get(&fingerprint).await
        };
        let cache_hit = cached.is_some();

        let (category_names, tag_names) = match cached {
            Some(entry) => {
                tracing::debug!(recipe = %recipe.id, "Cache hit");
                (entry.categories, entry.tags)
            }
            None => match self.classify(ctx, recipe).await {
                Ok(names) => names,
                Err(e) => {
                    if e.is_fatal() {
                        ctx.abort_run(e.to_string());
                    } else {
                        tracing::warn!(recipe = %recipe.id, error = %e, "Classification failed");
                    }
                    return RecipeOutcome::failed(recipe, e.to_string(), false);
                }
            },
        };

        let categories = if ctx.mode.requests_categories() {
            validate(&category_names, &ctx.allowed_categories)
        } else {
            Validated::default()
        };
        let mut tags = validate(&tag_names, &ctx.allowed_tags);

        // A full answer with no usable tags gets one tag-only follow-up
        if !cache_hit
            && ctx.mode.requests_categories()
            && tags.items.is_empty()
            && !ctx.allowed_tags.is_empty()
        {
            match self.classify_tags(ctx, recipe).await {
                Ok(names) => {
                    let followup = validate(&names, &ctx.allowed_tags);
                    tags.items = followup.items;
                    tags.dropped.extend(followup.dropped);
                }
                Err(e) if e.is_fatal() => {
                    ctx.abort_run(e.to_string());
                    return RecipeOutcome::failed(recipe, e.to_string(), false);
                }
                Err(e) => {
                    tracing::warn!(recipe = %recipe.id, error = %e, "Tag follow-up failed");
                }
            }
        }

        let dropped: Vec<&str> = categories
            .dropped
            .iter()
            .chain(&tags.dropped)
            .map(String::as_str)
            .collect();
        if !dropped.is_empty() {
            let failure = OrganizerError::ValidationFailure(format!(
                "names outside the allowed taxonomy: {}",
                dropped.join(", ")
            ));
            tracing::warn!(recipe = %recipe.id, error = %failure, "Dropped unknown names");
        }

        if categories.items.is_empty() && tags.items.is_empty() {
            tracing::info!(recipe = %recipe.id, name = %recipe.name, "No assignment");
            let mut outcome = RecipeOutcome::new(recipe, OutcomeStatus::NoAssignment);
            outcome.cache_hit = cache_hit;
            return outcome;
        }

        let replace = ctx.mode == CategorizeMode::Recat;
        let merged_categories = if ctx.mode.requests_categories() {
            merge_assignment(&recipe.categories, &categories.items, replace)
        } else {
            recipe.categories.clone()
        };
        let merged_tags = merge_assignment(&recipe.tags, &tags.items, replace);

        let changed = !same_assignment(&recipe.categories, &merged_categories)
            || !same_assignment(&recipe.tags, &merged_tags);

        let mut outcome = RecipeOutcome::new(recipe, OutcomeStatus::Unchanged);
        outcome.cache_hit = cache_hit;
        outcome.categories = selection::names(&merged_categories);
        outcome.tags = selection::names(&merged_tags);

        let entry = CacheEntry::new(
            &fingerprint,
            &recipe.id,
            selection::names(&categories.items),
            selection::names(&tags.items),
        );

        if !changed {
            tracing::debug!(recipe = %recipe.id, "Assignment already complete");
            if !cache_hit && !self.dry_run {
                self.store_in_cache(&fingerprint, entry).await;
            }
            return outcome;
        }

        outcome.status = OutcomeStatus::Updated;

        if self.dry_run {
            tracing::info!(
                planned = true,
                recipe = %recipe.id,
                name = %recipe.name,
                categories = ?outcome.categories,
                tags = ?outcome.tags,
                "Planned recipe update"
            );
            outcome.planned = true;
            return outcome;
        }

        let write = retry_transient("update_recipe_taxonomy", &self.retry, || {
            self.store
                .update_recipe_taxonomy(&recipe.id, &merged_categories, &merged_tags)
        })
        .await;

        match write {
            Ok(()) => {
                tracing::info!(
                    recipe = %recipe.id,
                    name = %recipe.name,
                    categories = ?outcome.categories,
                    tags = ?outcome.tags,
                    "Updated recipe"
                );
                if !cache_hit {
                    self.store_in_cache(&fingerprint, entry).await;
                }
                outcome
            }
            Err(e) => {
                let err: OrganizerError = e.into();
                if err.is_fatal() {
                    ctx.abort_run(err.to_string());
                } else {
                    tracing::warn!(recipe = %recipe.id, error = %err, "Recipe update failed");
                }
                RecipeOutcome::failed(recipe, err.to_string(), cache_hit)
            }
        }
    }

    async fn classify(
        &self,
        ctx: &RunContext,
        recipe: &Recipe,
    ) -> Result<(Vec<String>, Vec<String>), OrganizerError> {
        let request = ClassificationRequest {
            recipe_slug: recipe.slug.clone(),
            recipe_text: recipe.classifiable_text(),
            allowed_categories: ctx.category_names.clone(),
            allowed_tags: ctx.tag_names.clone(),
            mode: ctx.mode,
        };
        self.send(recipe, request).await
    }

    /// Ask for tags alone, against the same candidate list
    async fn classify_tags(
        &self,
        ctx: &RunContext,
        recipe: &Recipe,
    ) -> Result<Vec<String>, OrganizerError> {
        tracing::debug!(recipe = %recipe.id, "Requesting tags only");
        let request = ClassificationRequest {
            recipe_slug: recipe.slug.clone(),
            recipe_text: recipe.classifiable_text(),
            allowed_categories: Vec::new(),
            allowed_tags: ctx.tag_names.clone(),
            mode: CategorizeMode::MissingTags,
        };
        let (_, tags) = self.send(recipe, request).await?;
        Ok(tags)
    }

    async fn send(
        &self,
        recipe: &Recipe,
        request: ClassificationRequest,
    ) -> Result<(Vec<String>, Vec<String>), OrganizerError> {
        let response = retry_transient("classify", &self.retry, || {
            self.provider.classify(&request)
        })
        .await?;

        tracing::debug!(
            recipe = %recipe.id,
            raw = %prompt::preview(&response.raw),
            "Provider response"
        );
        Ok((response.categories, response.tags))
    }

    async fn store_in_cache(&self, fingerprint: &str, entry: CacheEntry) {
        if let Err(e) = self.cache.put(fingerprint, entry).await {
            tracing::warn!(error = %e, "Could not persist result cache entry");
        }
    }
}
