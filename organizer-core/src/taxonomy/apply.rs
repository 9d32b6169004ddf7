//! Diff execution against the recipe store

use super::plan::TaxonomyDiff;
use crate::report::{ActionKind, ApplyReport, CompletionStatus};
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::{RecipeStore, StoreError};

/// Apply switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Record every action as planned and send no mutation
    pub dry_run: bool,
    /// Allow deleting items that recipes still use
    pub force: bool,
}

/// Execute a diff: every create, then every delete
///
/// Item failures are recorded and the pass continues. An unreachable store
/// stops the pass and marks the report aborted.
pub async fn apply_diff(
    store: &dyn RecipeStore,
    diff: &TaxonomyDiff,
    options: ApplyOptions,
    retry: &RetryPolicy,
) -> ApplyReport {
    let mut report = ApplyReport::new(options.dry_run);

    for item in &diff.unchanged {
        report.record(
            ActionKind::Skip,
            item.kind.plural(),
            &item.name,
            Some("unchanged".to_string()),
        );
    }

    for item in &diff.to_create {
        let entity = item.kind.plural();

        if options.dry_run {
            report.record(ActionKind::Create, entity, &item.name, None);
            continue;
        }

        match retry_transient("create_taxonomy_item", retry, || store.create_taxonomy_item(item))
            .await
        {
            Ok(created) => {
                tracing::info!(
                    entity,
                    name = %created.name,
                    id = created.id.as_deref().unwrap_or(""),
                    "Created"
                );
                report.record(ActionKind::Create, entity, &item.name, None);
            }
            Err(StoreError::Conflict(message)) => {
                tracing::info!(entity, name = %item.name, "Already exists, skipping");
                report.record(ActionKind::Skip, entity, &item.name, Some(message));
            }
            Err(StoreError::Unreachable(message)) => {
                return abort(report, message);
            }
            Err(e) => report.record_failure(entity, &item.name, e.to_string()),
        }
    }

    for item in &diff.to_delete {
        let entity = item.kind.plural();

        let eligible = diff.mode.is_cleanup() || item.usage_count == 0 || options.force;
        if !eligible {
            tracing::info!(
                entity,
                name = %item.name,
                usage = item.usage_count,
                "Still in use, not deleting without force"
            );
            report.record(
                ActionKind::Skip,
                entity,
                &item.name,
                Some(format!("in use by {} recipes", item.usage_count)),
            );
            continue;
        }

        if item.id.is_none() {
            tracing::warn!(entity, name = %item.name, "Missing id, skipping delete");
            report.record(
                ActionKind::Skip,
                entity,
                &item.name,
                Some("missing id".to_string()),
            );
            continue;
        }

        if options.dry_run {
            report.record(
                ActionKind::Delete,
                entity,
                &item.name,
                Some(format!("usage={}", item.usage_count)),
            );
            continue;
        }

        match retry_transient("delete_taxonomy_item", retry, || store.delete_taxonomy_item(item))
            .await
        {
            Ok(()) => {
                tracing::info!(entity, name = %item.name, usage = item.usage_count, "Deleted");
                report.record(
                    ActionKind::Delete,
                    entity,
                    &item.name,
                    Some(format!("usage={}", item.usage_count)),
                );
            }
            Err(StoreError::NotFound(_)) => {
                report.record(
                    ActionKind::Skip,
                    entity,
                    &item.name,
                    Some("already deleted".to_string()),
                );
            }
            Err(StoreError::Unreachable(message)) => {
                return abort(report, message);
            }
            Err(e) => report.record_failure(entity, &item.name, e.to_string()),
        }
    }

    report
}

fn abort(mut report: ApplyReport, message: String) -> ApplyReport {
    tracing::error!(error = %message, "Recipe store unreachable, aborting apply");
    report.status = CompletionStatus::Aborted(message);
    report
}
