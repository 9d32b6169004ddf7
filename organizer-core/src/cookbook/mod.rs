//! Cookbook synchronization
//!
//! Same plan/apply lifecycle as taxonomy reconciliation, applied to saved
//! recipe queries. Cookbooks the organizer creates carry a marker at the end
//! of their description; `sync(replace = true)` only ever deletes marked
//! cookbooks, so user-created ones survive.

pub mod filter;

pub use filter::{compile_query_filter, normalize_query_filter, NameIdMaps};

use crate::report::{ActionKind, ApplyReport, CompletionStatus};
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::{RecipeStore, StoreError};
use organizer_common::{CookbookDefinition, Error, OrganizerConfig, Result, TaxonomyKind};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Description suffix marking an engine-managed cookbook
pub const MANAGED_COOKBOOK_MARKER: &str = "[managed]";

const ENTITY: &str = "cookbooks";

pub fn is_managed(cookbook: &CookbookDefinition) -> bool {
    cookbook.description.trim_end().ends_with(MANAGED_COOKBOOK_MARKER)
}

/// Description with the managed marker appended exactly once
pub fn with_managed_marker(description: &str) -> String {
    let trimmed = description.trim_end();
    if trimmed.ends_with(MANAGED_COOKBOOK_MARKER) {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        MANAGED_COOKBOOK_MARKER.to_string()
    } else {
        format!("{} {}", trimmed, MANAGED_COOKBOOK_MARKER)
    }
}

/// Parse a desired cookbook document: a JSON array of
/// `{name, description?, queryFilterString?, public?, position?}` objects.
/// `position` defaults to the 1-based index of the entry.
pub fn parse_desired_cookbooks(json: &str) -> Result<Vec<CookbookDefinition>> {
    let raw: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = raw else {
        return Err(Error::InvalidInput(
            "Cookbook document must be a JSON array".to_string(),
        ));
    };

    let mut cookbooks = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let position = idx + 1;
        let Value::Object(fields) = entry else {
            return Err(Error::InvalidInput(format!(
                "Cookbook #{} must be an object",
                position
            )));
        };

        let field = |name: &str| format!("cookbooks[{}].{}", position, name);

        let name = require_str(fields.get("name"), &field("name"))?.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Cookbook #{} must include a non-empty 'name'",
                position
            )));
        }
        let description = require_str(fields.get("description"), &field("description"))?;
        let query_filter =
            require_str(fields.get("queryFilterString"), &field("queryFilterString"))?;
        let public = match fields.get("public") {
            Some(value) => require_bool(value, &field("public"))?,
            None => false,
        };
        let position = match fields.get("position") {
            Some(value) => require_u32(value, &field("position"))?,
            None => position as u32,
        };

        let mut cookbook =
            CookbookDefinition::new(name, normalize_query_filter(&query_filter), position)
                .with_description(description);
        cookbook.public = public;
        cookbooks.push(cookbook);
    }

    Ok(cookbooks)
}

fn require_str(value: Option<&Value>, field: &str) -> Result<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(Error::InvalidInput(format!(
            "Invalid value for '{}': expected string, got {}",
            field, other
        ))),
    }
}

fn require_bool(value: &Value, field: &str) -> Result<bool> {
    let parsed = match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| {
        Error::InvalidInput(format!(
            "Invalid value for '{}': expected boolean-like, got {}",
            field, value
        ))
    })
}

fn require_u32(value: &Value, field: &str) -> Result<u32> {
    let parsed = match value {
        Value::Bool(flag) => Some(u32::from(*flag)),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        Error::InvalidInput(format!(
            "Invalid value for '{}': expected integer-like, got {}",
            field, value
        ))
    })
}

/// Whether an existing cookbook must be updated to match the desired one
pub fn has_changes(existing: &CookbookDefinition, desired: &CookbookDefinition) -> bool {
    existing.name != desired.name
        || existing.description != desired.description
        || existing.public != desired.public
        || existing.position != desired.position
        || existing.query_filter != desired.query_filter
}

/// Planned cookbook changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookbookPlan {
    pub to_create: Vec<CookbookDefinition>,
    /// Desired definitions carrying the existing id, group and household
    pub to_update: Vec<CookbookDefinition>,
    pub to_delete: Vec<CookbookDefinition>,
    pub unchanged: Vec<CookbookDefinition>,
    /// Undesired cookbooks kept because they are not engine-managed
    pub kept_unmanaged: Vec<CookbookDefinition>,
}

impl CookbookPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Pure cookbook diff. Cookbooks are matched by case-insensitive name.
pub fn plan_cookbooks(
    desired: &[CookbookDefinition],
    actual: &[CookbookDefinition],
    replace: bool,
) -> CookbookPlan {
    let mut actual_by_name: HashMap<String, &CookbookDefinition> = HashMap::new();
    for cookbook in actual.iter().filter(|c| !c.name.trim().is_empty()) {
        actual_by_name.entry(cookbook.name_key()).or_insert(cookbook);
    }

    let mut plan = CookbookPlan::default();
    let mut desired_names: HashSet<String> = HashSet::new();

    for cookbook in desired {
        let key = cookbook.name_key();
        if !desired_names.insert(key.clone()) {
            continue;
        }

        match actual_by_name.get(&key) {
            None => plan.to_create.push(cookbook.clone()),
            Some(existing) if has_changes(existing, cookbook) => {
                let mut update = cookbook.clone();
                update.id = existing.id.clone();
                update.slug = existing.slug.clone();
                update.group_id = existing.group_id.clone();
                update.household_id = existing.household_id.clone();
                plan.to_update.push(update);
            }
            Some(existing) => plan.unchanged.push((*existing).clone()),
        }
    }

    if replace {
        let mut undesired: Vec<&CookbookDefinition> = actual_by_name
            .iter()
            .filter(|(key, _)| !desired_names.contains(*key))
            .map(|(_, cookbook)| *cookbook)
            .collect();
        undesired.sort_by_key(|c| c.name_key());

        for cookbook in undesired {
            if is_managed(cookbook) {
                plan.to_delete.push(cookbook.clone());
            } else {
                plan.kept_unmanaged.push(cookbook.clone());
            }
        }
    }

    plan
}

/// Keeps remote cookbooks in line with desired definitions
pub struct CookbookManager {
    store: Arc<dyn RecipeStore>,
    retry: RetryPolicy,
    dry_run: bool,
}

impl CookbookManager {
    pub fn new(store: Arc<dyn RecipeStore>, config: &OrganizerConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(config.retry_ceiling, config.retry_base_ms),
            dry_run: config.dry_run,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name → id maps for filter compilation. Listing failures degrade to
    /// empty maps, which keeps every name clause as written.
    pub async fn name_id_maps(&self) -> NameIdMaps {
        let categories = retry_transient("list_taxonomy", &self.retry, || {
            self.store.list_taxonomy(TaxonomyKind::Category)
        })
        .await;
        let tags = retry_transient("list_taxonomy", &self.retry, || {
            self.store.list_taxonomy(TaxonomyKind::Tag)
        })
        .await;

        match (categories, tags) {
            (Ok(categories), Ok(tags)) => NameIdMaps::from_items(&categories, &tags),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Could not build organizer id maps for cookbook filters");
                NameIdMaps::default()
            }
        }
    }

    /// Compile filters and apply the managed marker
    pub fn prepare(
        &self,
        desired: &[CookbookDefinition],
        maps: &NameIdMaps,
    ) -> Vec<CookbookDefinition> {
        desired
            .iter()
            .map(|cookbook| {
                let mut prepared = cookbook.clone();
                prepared.query_filter = compile_query_filter(&cookbook.query_filter, maps);
                prepared.description = with_managed_marker(&cookbook.description);
                prepared
            })
            .collect()
    }

    /// Create missing cookbooks, update changed ones and, with `replace`,
    /// delete managed cookbooks that are no longer desired
    pub async fn sync(&self, desired: &[CookbookDefinition], replace: bool) -> ApplyReport {
        let maps = self.name_id_maps().await;
        let prepared = self.prepare(desired, &maps);

        let actual = match retry_transient("list_cookbooks", &self.retry, || {
            self.store.list_cookbooks()
        })
        .await
        {
            Ok(actual) => actual,
            Err(e) => {
                tracing::error!(error = %e, "Could not list cookbooks");
                let mut report = ApplyReport::new(self.dry_run);
                report.status = CompletionStatus::Aborted(e.to_string());
                return report;
            }
        };

        let plan = plan_cookbooks(&prepared, &actual, replace);
        tracing::info!(
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            unchanged = plan.unchanged.len(),
            kept_unmanaged = plan.kept_unmanaged.len(),
            replace,
            dry_run = self.dry_run,
            "Cookbook sync planned"
        );

        let report = self.apply(&plan, self.dry_run).await;
        report.log_summary(ENTITY);
        report
    }

    /// Execute a cookbook plan: creates, then updates, then deletes
    pub async fn apply(&self, plan: &CookbookPlan, dry_run: bool) -> ApplyReport {
        let mut report = ApplyReport::new(dry_run);

        for cookbook in &plan.unchanged {
            report.record(
                ActionKind::Skip,
                ENTITY,
                &cookbook.name,
                Some("unchanged".to_string()),
            );
        }
        for cookbook in &plan.kept_unmanaged {
            report.record(
                ActionKind::Skip,
                ENTITY,
                &cookbook.name,
                Some("not managed".to_string()),
            );
        }

        for cookbook in &plan.to_create {
            if dry_run {
                report.record(ActionKind::Create, ENTITY, &cookbook.name, None);
                continue;
            }
            match retry_transient("create_cookbook", &self.retry, || {
                self.store.create_cookbook(cookbook)
            })
            .await
            {
                Ok(_) => {
                    tracing::info!(name = %cookbook.name, "Created cookbook");
                    report.record(ActionKind::Create, ENTITY, &cookbook.name, None);
                }
                Err(StoreError::Conflict(message)) => {
                    report.record(ActionKind::Skip, ENTITY, &cookbook.name, Some(message));
                }
                Err(StoreError::Unreachable(message)) => return abort(report, message),
                Err(e) => report.record_failure(ENTITY, &cookbook.name, e.to_string()),
            }
        }

        for cookbook in &plan.to_update {
            if cookbook.id.is_none() {
                report.record_failure(
                    ENTITY,
                    &cookbook.name,
                    "existing cookbook has no id".to_string(),
                );
                continue;
            }
            if dry_run {
                report.record(ActionKind::Update, ENTITY, &cookbook.name, None);
                continue;
            }
            match retry_transient("update_cookbook", &self.retry, || {
                self.store.update_cookbook(cookbook)
            })
            .await
            {
                Ok(()) => {
                    tracing::info!(name = %cookbook.name, "Updated cookbook");
                    report.record(ActionKind::Update, ENTITY, &cookbook.name, None);
                }
                Err(StoreError::Unreachable(message)) => return abort(report, message),
                Err(e) => report.record_failure(ENTITY, &cookbook.name, e.to_string()),
            }
        }

        for cookbook in &plan.to_delete {
            if cookbook.id.is_none() {
                report.record_failure(
                    ENTITY,
                    &cookbook.name,
                    "existing cookbook has no id".to_string(),
                );
                continue;
            }
            if dry_run {
                report.record(ActionKind::Delete, ENTITY, &cookbook.name, None);
                continue;
            }
            match retry_transient("delete_cookbook", &self.retry, || {
                self.store.delete_cookbook(cookbook)
            })
            .await
            {
                Ok(()) => {
                    tracing::info!(name = %cookbook.name, "Deleted cookbook");
                    report.record(ActionKind::Delete, ENTITY, &cookbook.name, None);
                }
                Err(StoreError::NotFound(_)) => report.record(
                    ActionKind::Skip,
                    ENTITY,
                    &cookbook.name,
                    Some("already deleted".to_string()),
                ),
                Err(StoreError::Unreachable(message)) => return abort(report, message),
                Err(e) => report.record_failure(ENTITY, &cookbook.name, e.to_string()),
            }
        }

        report
    }
}

fn abort(mut report: ApplyReport, message: String) -> ApplyReport {
    tracing::error!(error = %message, "Recipe store unreachable, aborting cookbook sync");
    report.status = CompletionStatus::Aborted(message);
    report
}
