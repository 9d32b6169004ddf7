//! Run reports shared by the reconciler, cookbook manager and categorizer

use serde::Serialize;
use std::fmt;

/// How an operation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum CompletionStatus {
    #[default]
    Completed,
    /// External interrupt; no new work was started after it
    Cancelled,
    /// Resource-scoped failure (store or provider unreachable)
    Aborted(String),
}

impl CompletionStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionStatus::Completed)
    }

    /// Process exit code an entrypoint should surface
    pub fn exit_code(&self) -> i32 {
        match self {
            CompletionStatus::Completed => 0,
            CompletionStatus::Cancelled => 130,
            CompletionStatus::Aborted(_) => 1,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::Completed => write!(f, "completed"),
            CompletionStatus::Cancelled => write!(f, "cancelled"),
            CompletionStatus::Aborted(reason) => write!(f, "aborted: {}", reason),
        }
    }
}

/// Per-item action recorded in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Skip,
}

/// One recorded action. `planned` is set for dry-run entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub action: ActionKind,
    /// Plural entity name, e.g. `tags` or `cookbooks`
    pub entity: &'static str,
    pub name: String,
    pub planned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Item-scoped failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub entity: &'static str,
    pub name: String,
    pub error: String,
}

/// Outcome of applying a diff
///
/// The shape is identical for dry runs and live runs; dry-run counts are
/// what a live run would have performed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub actions: Vec<ActionRecord>,
    pub failures: Vec<ItemFailure>,
    pub status: CompletionStatus,
}

impl ApplyReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub(crate) fn record(
        &mut self,
        action: ActionKind,
        entity: &'static str,
        name: &str,
        detail: Option<String>,
    ) {
        match action {
            ActionKind::Create => self.created += 1,
            ActionKind::Update => self.updated += 1,
            ActionKind::Delete => self.deleted += 1,
            ActionKind::Skip => self.skipped += 1,
        }

        let planned = self.dry_run && action != ActionKind::Skip;
        if planned {
            tracing::info!(planned = true, entity, name, action = ?action, "Planned action");
        }

        self.actions.push(ActionRecord {
            action,
            entity,
            name: name.to_string(),
            planned,
            detail,
        });
    }

    pub(crate) fn record_failure(&mut self, entity: &'static str, name: &str, error: String) {
        tracing::warn!(entity, name, error = %error, "Item failed");
        self.failed += 1;
        self.failures.push(ItemFailure {
            entity,
            name: name.to_string(),
            error,
        });
    }

    /// Fold another report into this one (e.g. categories then tags)
    pub fn merge(&mut self, other: ApplyReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.actions.extend(other.actions);
        self.failures.extend(other.failures);
        if self.status.is_completed() {
            self.status = other.status;
        }
    }

    /// Whether the live run would mutate nothing
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }

    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation,
            created = self.created,
            updated = self.updated,
            deleted = self.deleted,
            skipped = self.skipped,
            failed = self.failed,
            dry_run = self.dry_run,
            status = %self.status,
            "Operation finished"
        );
    }
}
