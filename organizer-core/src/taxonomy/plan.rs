//! Pure taxonomy diff planning

use super::cleanup::CleanupPolicy;
use organizer_common::{TaxonomyItem, TaxonomyKey, TaxonomyKind};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Which side of the diff a plan populates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Create missing desired items; never delete
    Import,
    /// Create missing desired items and delete every remote item not desired
    Replace,
    /// `Replace` when `replace` is set, `Import` otherwise
    Refresh { replace: bool },
    /// Delete tags selected by the cleanup heuristics; the desired set is ignored
    Cleanup(CleanupPolicy),
}

impl PlanMode {
    pub fn deletes_undesired(&self) -> bool {
        matches!(
            self,
            PlanMode::Replace | PlanMode::Refresh { replace: true }
        )
    }

    pub fn is_cleanup(&self) -> bool {
        matches!(self, PlanMode::Cleanup(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlanMode::Import => "import",
            PlanMode::Replace => "replace",
            PlanMode::Refresh { .. } => "refresh",
            PlanMode::Cleanup(_) => "cleanup",
        }
    }
}

/// Planned changes. Computed once, consumed by one apply pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyDiff {
    pub mode: PlanMode,
    pub to_create: Vec<TaxonomyItem>,
    pub to_delete: Vec<TaxonomyItem>,
    /// Remote items already in the desired state
    pub unchanged: Vec<TaxonomyItem>,
}

impl TaxonomyDiff {
    /// No remote mutation planned
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }

    pub fn kinds(&self) -> Vec<TaxonomyKind> {
        let mut kinds: Vec<TaxonomyKind> = self
            .to_create
            .iter()
            .chain(&self.to_delete)
            .chain(&self.unchanged)
            .map(|item| item.kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Compute the diff between a desired and an actual taxonomy snapshot
///
/// Items are identified by (kind, slug); a desired item whose name matches a
/// remote item of the same kind case-insensitively is treated as present even
/// when the remote slug differs. Duplicate desired entries collapse to the
/// first one. Every list is sorted by identity, so planning the same inputs
/// twice yields the same diff.
pub fn plan(desired: &[TaxonomyItem], actual: &[TaxonomyItem], mode: PlanMode) -> TaxonomyDiff {
    let actual_by_key: BTreeMap<TaxonomyKey, &TaxonomyItem> =
        actual.iter().map(|item| (item.key(), item)).collect();

    let mut diff = TaxonomyDiff {
        mode,
        to_create: Vec::new(),
        to_delete: Vec::new(),
        unchanged: Vec::new(),
    };

    if let PlanMode::Cleanup(policy) = mode {
        for item in actual_by_key.values() {
            if item.kind == TaxonomyKind::Tag && policy.is_candidate(item) {
                diff.to_delete.push((*item).clone());
            } else {
                diff.unchanged.push((*item).clone());
            }
        }
        return diff;
    }

    let actual_by_name: HashMap<(TaxonomyKind, String), &TaxonomyItem> = actual
        .iter()
        .map(|item| ((item.kind, item.name_key()), item))
        .collect();

    let mut matched: HashSet<TaxonomyKey> = HashSet::new();
    let mut seen: HashSet<TaxonomyKey> = HashSet::new();

    for item in desired {
        if item.slug.is_empty() || !seen.insert(item.key()) {
            continue;
        }

        let existing = actual_by_key
            .get(&item.key())
            .copied()
            .or_else(|| actual_by_name.get(&(item.kind, item.name_key())).copied());

        match existing {
            Some(existing) => {
                if matched.insert(existing.key()) {
                    diff.unchanged.push(existing.clone());
                }
            }
            None => diff.to_create.push(item.clone()),
        }
    }

    if mode.deletes_undesired() {
        diff.to_delete = actual_by_key
            .iter()
            .filter(|(key, _)| !matched.contains(*key))
            .map(|(_, item)| (*item).clone())
            .collect();
    }

    diff.to_create.sort_by_key(TaxonomyItem::key);
    diff.unchanged.sort_by_key(TaxonomyItem::key);
    diff
}
