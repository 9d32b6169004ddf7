//! Taxonomy reconciliation
//!
//! Brings remote categories and tags in line with a desired declarative set,
//! or runs a scoped operation (import, reset, refresh, cleanup) over the same
//! plan/apply machinery. Planning is pure; [`apply::apply_diff`] is the only
//! step that talks to the store.

pub mod apply;
pub mod cleanup;
pub mod plan;
pub mod seed;

pub use apply::{apply_diff, ApplyOptions};
pub use cleanup::{is_noisy_name, CleanupPolicy, CleanupReason};
pub use plan::{plan, PlanMode, TaxonomyDiff};
pub use seed::{parse_desired_items, resolve_refresh_replace_flags, RefreshMode};

use crate::error::{OrganizerError, OrganizerResult};
use crate::report::{ApplyReport, CompletionStatus};
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::RecipeStore;
use organizer_common::{OrganizerConfig, TaxonomyItem, TaxonomyKind};
use std::sync::Arc;

/// Options for [`TaxonomyReconciler::refresh`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    pub mode: RefreshMode,
    pub replace_categories: bool,
    pub replace_tags: bool,
    /// Tag cleanup to run after the imports
    pub cleanup: Option<CleanupPolicy>,
}

/// Reconciles remote categories and tags with desired sets
pub struct TaxonomyReconciler {
    store: Arc<dyn RecipeStore>,
    retry: RetryPolicy,
    dry_run: bool,
    force: bool,
    cleanup_policy: CleanupPolicy,
}

impl TaxonomyReconciler {
    pub fn new(store: Arc<dyn RecipeStore>, config: &OrganizerConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(config.retry_ceiling, config.retry_base_ms),
            dry_run: config.dry_run,
            force: config.cleanup.force,
            cleanup_policy: CleanupPolicy::from_settings(&config.cleanup),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current remote items of one kind, with usage counts
    pub async fn snapshot(&self, kind: TaxonomyKind) -> OrganizerResult<Vec<TaxonomyItem>> {
        let items = retry_transient("list_taxonomy", &self.retry, || {
            self.store.list_taxonomy(kind)
        })
        .await?;
        tracing::debug!(kind = kind.plural(), count = items.len(), "Taxonomy snapshot");
        Ok(items)
    }

    pub fn plan(
        &self,
        desired: &[TaxonomyItem],
        actual: &[TaxonomyItem],
        mode: PlanMode,
    ) -> TaxonomyDiff {
        plan(desired, actual, mode)
    }

    /// Execute a diff. `dry_run` records every action as planned.
    pub async fn apply(&self, diff: &TaxonomyDiff, dry_run: bool) -> ApplyReport {
        let options = ApplyOptions {
            dry_run,
            force: self.force,
        };
        apply_diff(self.store.as_ref(), diff, options, &self.retry).await
    }

    /// Snapshot, plan and apply for one kind
    pub async fn reconcile(
        &self,
        kind: TaxonomyKind,
        desired: &[TaxonomyItem],
        mode: PlanMode,
    ) -> ApplyReport {
        if desired.iter().any(|item| item.kind != kind) {
            let mut report = ApplyReport::new(self.dry_run);
            report.status = CompletionStatus::Aborted(format!(
                "desired set for {} contains items of another kind",
                kind.plural()
            ));
            return report;
        }

        let actual = match self.snapshot(kind).await {
            Ok(actual) => actual,
            Err(e) => return Self::listing_failed(self.dry_run, kind, e),
        };

        let diff = plan(desired, &actual, mode);
        tracing::info!(
            kind = kind.plural(),
            mode = mode.name(),
            create = diff.to_create.len(),
            delete = diff.to_delete.len(),
            unchanged = diff.unchanged.len(),
            dry_run = self.dry_run,
            "Reconciliation planned"
        );

        let report = self.apply(&diff, self.dry_run).await;
        report.log_summary(kind.plural());
        report
    }

    fn listing_failed(dry_run: bool, kind: TaxonomyKind, error: OrganizerError) -> ApplyReport {
        tracing::error!(kind = kind.plural(), error = %error, "Could not list remote items");
        let mut report = ApplyReport::new(dry_run);
        report.status = CompletionStatus::Aborted(error.to_string());
        report
    }

    /// Add missing desired items; nothing is deleted
    pub async fn import(&self, kind: TaxonomyKind, desired: &[TaxonomyItem]) -> ApplyReport {
        self.reconcile(kind, desired, PlanMode::Import).await
    }

    /// Replace categories, and tags when a tag set is given
    pub async fn reset(
        &self,
        categories: &[TaxonomyItem],
        tags: Option<&[TaxonomyItem]>,
    ) -> ApplyReport {
        let mut report = self
            .reconcile(TaxonomyKind::Category, categories, PlanMode::Replace)
            .await;
        if !report.status.is_completed() {
            return report;
        }

        match tags {
            Some(tags) => {
                report.merge(self.reconcile(TaxonomyKind::Tag, tags, PlanMode::Replace).await);
            }
            None => tracing::warn!("No tag set provided; tags were not reset"),
        }
        report
    }

    /// Import both kinds, replacing per the resolved flags, then optionally
    /// clean up tags
    pub async fn refresh(
        &self,
        categories: &[TaxonomyItem],
        tags: Option<&[TaxonomyItem]>,
        options: RefreshOptions,
    ) -> ApplyReport {
        let (replace_categories, replace_tags) = resolve_refresh_replace_flags(
            options.mode,
            options.replace_categories,
            options.replace_tags,
        );
        tracing::info!(
            mode = ?options.mode,
            replace_categories,
            replace_tags,
            "Refreshing taxonomy"
        );

        let mut report = self
            .reconcile(
                TaxonomyKind::Category,
                categories,
                PlanMode::Refresh {
                    replace: replace_categories,
                },
            )
            .await;

        if report.status.is_completed() {
            match tags {
                Some(tags) => report.merge(
                    self.reconcile(
                        TaxonomyKind::Tag,
                        tags,
                        PlanMode::Refresh {
                            replace: replace_tags,
                        },
                    )
                    .await,
                ),
                None => tracing::warn!("No tag set provided; skipping tag import"),
            }
        }

        if let Some(policy) = options.cleanup {
            if report.status.is_completed() {
                report.merge(self.cleanup_with(policy).await);
            }
        }

        report
    }

    /// Delete noisy or unused tags per the configured policy
    pub async fn cleanup(&self) -> ApplyReport {
        self.cleanup_with(self.cleanup_policy).await
    }

    pub async fn cleanup_with(&self, policy: CleanupPolicy) -> ApplyReport {
        tracing::info!(
            max_name_length = policy.max_name_length,
            min_usage = policy.min_usage,
            delete_noisy = policy.delete_noisy,
            only_unused = policy.only_unused,
            "Tag cleanup"
        );
        self.reconcile(TaxonomyKind::Tag, &[], PlanMode::Cleanup(policy))
            .await
    }
}
