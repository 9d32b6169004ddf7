//! organizer-core library interface
//!
//! Taxonomy reconciliation and LLM-assisted categorization for a recipe
//! store. The store client and the resolved configuration are supplied by
//! the caller; this crate owns the provider adapters and the result cache.

pub mod audit;
pub mod cache;
pub mod categorizer;
pub mod cookbook;
pub mod error;
pub mod provider;
pub mod report;
pub mod retry;
pub mod store;
pub mod taxonomy;

pub use crate::audit::{AuditEngine, AuditReport};
pub use crate::cache::{CacheEntry, ResultCache};
pub use crate::categorizer::{CategorizationEngine, OutcomeStatus, RecipeOutcome, RunSummary};
pub use crate::cookbook::CookbookManager;
pub use crate::error::{OrganizerError, OrganizerResult};
pub use crate::provider::{ClassificationProvider, ProviderError};
pub use crate::report::{ApplyReport, CompletionStatus};
pub use crate::store::{RecipeFilter, RecipeStore, StoreError};
pub use crate::taxonomy::{PlanMode, TaxonomyDiff, TaxonomyReconciler};

use organizer_common::OrganizerConfig;
use std::sync::Arc;

/// Wired organizer components sharing one store, provider and cache
pub struct Organizer {
    pub config: OrganizerConfig,
    pub reconciler: TaxonomyReconciler,
    pub cookbooks: CookbookManager,
    pub categorizer: CategorizationEngine,
    pub audit: AuditEngine,
    provider: Arc<dyn ClassificationProvider>,
}

impl Organizer {
    /// Validate the configuration, then build the provider selected by it
    /// and open the result cache. No remote call is made.
    pub async fn new(
        config: OrganizerConfig,
        store: Arc<dyn RecipeStore>,
    ) -> OrganizerResult<Self> {
        let provider = Self::validated_provider(&config)?;
        Ok(Self::with_provider(config, store, provider).await)
    }

    fn validated_provider(
        config: &OrganizerConfig,
    ) -> OrganizerResult<Arc<dyn ClassificationProvider>> {
        config
            .validate()
            .map_err(|e| OrganizerError::Configuration(e.to_string()))?;
        provider::build_provider(config)
    }

    /// Build with an explicit provider. The configuration is trusted as
    /// already validated.
    pub async fn with_provider(
        config: OrganizerConfig,
        store: Arc<dyn RecipeStore>,
        provider: Arc<dyn ClassificationProvider>,
    ) -> Self {
        let cache = Arc::new(ResultCache::open(config.resolved_cache_path()).await);

        tracing::info!(
            provider = provider.provider_id(),
            model = provider.model_id(),
            mode = %config.mode,
            dry_run = config.dry_run,
            cache = %config.resolved_cache_path().display(),
            "Organizer initialized"
        );

        Self {
            reconciler: TaxonomyReconciler::new(store.clone(), &config),
            cookbooks: CookbookManager::new(store.clone(), &config),
            categorizer: CategorizationEngine::new(store.clone(), provider.clone(), cache, &config),
            audit: AuditEngine::new(store, &config),
            provider,
            config,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ClassificationProvider> {
        &self.provider
    }

    /// Provider reachability
    pub async fn health_check(&self) -> bool {
        let healthy = self.provider.health_check().await;
        if healthy {
            tracing::info!(provider = self.provider.provider_id(), "Provider healthy");
        } else {
            tracing::warn!(provider = self.provider.provider_id(), "Provider health check failed");
        }
        healthy
    }
}
