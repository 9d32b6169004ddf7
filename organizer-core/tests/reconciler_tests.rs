//! Taxonomy reconciliation against an in-memory store

mod helpers;

use helpers::{desired, test_config, MemoryStore};
use organizer_common::TaxonomyKind::{Category, Tag};
use organizer_core::report::{ActionKind, CompletionStatus};
use organizer_core::taxonomy::{CleanupPolicy, RefreshMode, RefreshOptions};
use organizer_core::TaxonomyReconciler;
use std::sync::Arc;

fn reconciler(store: &Arc<MemoryStore>) -> TaxonomyReconciler {
    TaxonomyReconciler::new(store.clone(), &test_config())
}

#[tokio::test]
async fn test_import_creates_missing_and_keeps_existing() {
    let store = Arc::new(MemoryStore::new().with_items(Category, &[("Dinner", 4), ("Dessert", 0)]));
    let reconciler = reconciler(&store);

    let report = reconciler
        .import(Category, &desired(Category, &["Dinner", "Breakfast", "Lunch"]))
        .await;

    assert_eq!(report.status, CompletionStatus::Completed);
    assert_eq!(report.created, 2);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        store.names(Category),
        vec!["Breakfast", "Dessert", "Dinner", "Lunch"]
    );
}

#[tokio::test]
async fn test_second_apply_is_a_noop() {
    let store = Arc::new(MemoryStore::new().with_items(Tag, &[("Old", 0)]));
    let reconciler = reconciler(&store);
    let wanted = desired(Tag, &["Quick", "Spicy"]);

    let first = reconciler.reset(&desired(Category, &["Dinner"]), Some(&wanted)).await;
    assert_eq!(first.created, 3);
    assert_eq!(first.deleted, 1);
    let mutations = store.mutation_count();

    let second = reconciler.reset(&desired(Category, &["Dinner"]), Some(&wanted)).await;
    assert!(second.is_noop());
    assert_eq!(second.status, CompletionStatus::Completed);
    assert_eq!(store.mutation_count(), mutations);
}

#[tokio::test]
async fn test_dry_run_plans_without_mutating() {
    let seed = || {
        MemoryStore::new()
            .with_items(Tag, &[("Old", 0), ("Spicy", 2)])
            .with_items(Category, &[("Dinner", 1)])
    };
    let wanted_tags = desired(Tag, &["Quick", "Spicy"]);
    let wanted_categories = desired(Category, &["Dinner", "Breakfast"]);

    let dry_store = Arc::new(seed());
    let mut config = test_config();
    config.dry_run = true;
    let dry = TaxonomyReconciler::new(dry_store.clone(), &config)
        .reset(&wanted_categories, Some(&wanted_tags))
        .await;

    assert!(dry.dry_run);
    assert_eq!(dry_store.mutation_count(), 0);
    assert!(dry
        .actions
        .iter()
        .filter(|a| a.action != ActionKind::Skip)
        .all(|a| a.planned));

    let live_store = Arc::new(seed());
    let live = reconciler(&live_store)
        .reset(&wanted_categories, Some(&wanted_tags))
        .await;

    assert_eq!(dry.created, live.created);
    assert_eq!(dry.deleted, live.deleted);
    assert_eq!(dry.skipped, live.skipped);
    assert!(live_store.mutation_count() > 0);
}

#[tokio::test]
async fn test_creates_run_before_deletes() {
    let store = Arc::new(MemoryStore::new().with_items(Tag, &[("Aaa", 0), ("Zzz", 0)]));
    reconciler(&store)
        .reconcile(
            Tag,
            &desired(Tag, &["Middle"]),
            organizer_core::PlanMode::Replace,
        )
        .await;

    assert_eq!(
        store.mutations(),
        vec!["create tags Middle", "delete tags Aaa", "delete tags Zzz"]
    );
}

#[tokio::test]
async fn test_conflict_is_counted_as_skipped() {
    let store = Arc::new(MemoryStore::new());
    store.reject_create("Quick");

    let report = reconciler(&store)
        .import(Tag, &desired(Tag, &["Quick", "Spicy"]))
        .await;

    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert!(report.status.is_completed());
}

#[tokio::test]
async fn test_unreachable_store_aborts() {
    let store = Arc::new(MemoryStore::new());
    store.set_mutations_unreachable(true);

    let report = reconciler(&store)
        .import(Tag, &desired(Tag, &["Quick", "Spicy"]))
        .await;

    assert!(matches!(report.status, CompletionStatus::Aborted(_)));
    assert_eq!(report.status.exit_code(), 1);
    assert_eq!(report.created, 0);

    store.set_unreachable(true);
    let listing = reconciler(&store).import(Tag, &desired(Tag, &["Quick"])).await;
    assert!(matches!(listing.status, CompletionStatus::Aborted(_)));
}

#[tokio::test]
async fn test_in_use_items_need_force() {
    let seed = || MemoryStore::new().with_items(Category, &[("Lunch", 3), ("Brunch", 0)]);

    let store = Arc::new(seed());
    let report = reconciler(&store).reset(&desired(Category, &[]), None).await;
    assert_eq!(report.deleted, 1);
    assert_eq!(store.names(Category), vec!["Lunch"]);
    let skip = report
        .actions
        .iter()
        .find(|a| a.name == "Lunch")
        .unwrap();
    assert_eq!(skip.action, ActionKind::Skip);

    let forced_store = Arc::new(seed());
    let mut config = test_config();
    config.cleanup.force = true;
    let forced = TaxonomyReconciler::new(forced_store.clone(), &config)
        .reset(&desired(Category, &[]), None)
        .await;
    assert_eq!(forced.deleted, 2);
    assert!(forced_store.names(Category).is_empty());
}

#[tokio::test]
async fn test_mixed_kinds_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut wanted = desired(Tag, &["Quick"]);
    wanted.extend(desired(Category, &["Dinner"]));

    let report = reconciler(&store).import(Tag, &wanted).await;
    assert!(matches!(report.status, CompletionStatus::Aborted(_)));
    assert_eq!(store.mutation_count(), 0);
}

#[tokio::test]
async fn test_refresh_merge_honours_per_kind_replace() {
    let store = Arc::new(
        MemoryStore::new()
            .with_items(Category, &[("Snacks", 0)])
            .with_items(Tag, &[("Stale", 0)]),
    );

    let options = RefreshOptions {
        mode: RefreshMode::Merge,
        replace_categories: false,
        replace_tags: true,
        cleanup: None,
    };
    let report = reconciler(&store)
        .refresh(
            &desired(Category, &["Dinner"]),
            Some(&desired(Tag, &["Quick"])),
            options,
        )
        .await;

    assert!(report.status.is_completed());
    assert_eq!(store.names(Category), vec!["Dinner", "Snacks"]);
    assert_eq!(store.names(Tag), vec!["Quick"]);
}

#[tokio::test]
async fn test_cleanup_threshold() {
    let store = Arc::new(MemoryStore::new().with_items(
        Tag,
        &[
            ("Rare", 1),
            ("Unused", 0),
            ("Popular", 5),
            ("Mom's Famous Lasagna Recipe", 9),
        ],
    ));

    let policy = CleanupPolicy {
        max_name_length: 24,
        min_usage: 1,
        delete_noisy: false,
        only_unused: false,
    };
    let report = reconciler(&store).cleanup_with(policy).await;

    assert_eq!(report.deleted, 2);
    assert_eq!(
        store.names(Tag),
        vec!["Mom's Famous Lasagna Recipe", "Popular"]
    );
}

#[tokio::test]
async fn test_cleanup_noisy_and_only_unused() {
    let seed = || {
        MemoryStore::new().with_items(
            Tag,
            &[
                ("Mom's Famous Lasagna Recipe", 9),
                ("How To Make Bread", 0),
                ("Quick", 4),
            ],
        )
    };

    let noisy = CleanupPolicy {
        max_name_length: 24,
        min_usage: 0,
        delete_noisy: true,
        only_unused: false,
    };
    let store = Arc::new(seed());
    reconciler(&store).cleanup_with(noisy).await;
    assert_eq!(store.names(Tag), vec!["Quick"]);

    let store = Arc::new(seed());
    reconciler(&store)
        .cleanup_with(CleanupPolicy {
            only_unused: true,
            ..noisy
        })
        .await;
    assert_eq!(store.names(Tag), vec!["Mom's Famous Lasagna Recipe", "Quick"]);
}
