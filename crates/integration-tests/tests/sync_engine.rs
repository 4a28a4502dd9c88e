//! Sync engine behavior against a recording fake platform.

#![allow(clippy::unwrap_used)]

use stock_sync_app::services::{Designation, SyncEngine, SyncError};
use stock_sync_app::shopify::ShopifyError;
use stock_sync_core::{ChildStatus, LinkageError, LinkageField, SyncState, SyncStatus};
use stock_sync_integration_tests::{FakePlatform, PlatformCall, pid, qty, test_namespace};

/// Master `P1` linked to `children`.
async fn linked(platform: &FakePlatform, children: &[&str]) {
    let ns = test_namespace();
    let engine = SyncEngine::new(platform, &ns);
    engine.designate_master(&pid("P1")).await.unwrap();
    engine
        .link_children(&pid("P1"), children.iter().map(|c| pid(c)).collect())
        .await
        .unwrap();
    platform.clear_calls();
}

// ============================================================================
// DesignateMaster
// ============================================================================

#[tokio::test]
async fn test_designate_master_writes_flag() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);

    let designation = engine.designate_master(&pid("P1")).await.unwrap();

    assert_eq!(designation, Designation::Designated);
    assert_eq!(
        platform.metafield(&pid("P1"), &ns, LinkageField::IsSyncMaster),
        Some("true".to_string())
    );
}

#[tokio::test]
async fn test_designate_master_is_idempotent() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);

    engine.designate_master(&pid("P1")).await.unwrap();
    platform.clear_calls();

    let second = engine.designate_master(&pid("P1")).await.unwrap();

    assert_eq!(second, Designation::AlreadyMaster);
    assert!(!second.wrote());
    assert!(platform.writes().is_empty());
}

#[tokio::test]
async fn test_child_cannot_become_master() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1", "C2"]).await;
    let ns = test_namespace();

    let err = SyncEngine::new(&platform, &ns)
        .designate_master(&pid("C1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ChildCannotBeMaster(ref p) if *p == pid("C1")));
    assert!(platform.writes().is_empty());
    assert_eq!(
        platform.metafield(&pid("C1"), &ns, LinkageField::IsSyncMaster),
        None
    );
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1"]).await;

    let other = stock_sync_core::Namespace::for_shop(stock_sync_core::ShopId::new(2002));
    let designation = SyncEngine::new(&platform, &other)
        .designate_master(&pid("C1"))
        .await
        .unwrap();

    assert_eq!(designation, Designation::Designated);
}

// ============================================================================
// LinkChildren / ReadLinkage
// ============================================================================

#[tokio::test]
async fn test_link_then_read_preserves_order() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);
    engine.designate_master(&pid("P1")).await.unwrap();

    let linkage = engine
        .link_children(&pid("P1"), vec![pid("C2"), pid("C1"), pid("C3")])
        .await
        .unwrap();
    assert_eq!(linkage.state().version, 1);

    let read = engine.linkage(&pid("P1")).await.unwrap();
    assert_eq!(read.children(), &[pid("C2"), pid("C1"), pid("C3")]);
    assert_eq!(read.master(), &pid("P1"));
    assert_eq!(read.state().version, 1);

    for child in ["C1", "C2", "C3"] {
        assert_eq!(
            platform.metafield(&pid(child), &ns, LinkageField::LinkedMaster),
            Some("gid://shopify/Product/P1".to_string())
        );
    }
}

#[tokio::test]
async fn test_link_stores_product_references() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1", "C2"]).await;

    let stored = platform
        .metafield(&pid("P1"), &test_namespace(), LinkageField::LinkedProducts)
        .unwrap();
    let gids: Vec<String> = serde_json::from_str(&stored).unwrap();
    assert_eq!(
        gids,
        vec!["gid://shopify/Product/C1", "gid://shopify/Product/C2"]
    );
}

#[tokio::test]
async fn test_link_rejects_invalid_requests_without_calls() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);

    let empty = engine.link_children(&pid("P1"), vec![]).await.unwrap_err();
    assert!(matches!(
        empty,
        SyncError::Validation(LinkageError::EmptyChildren)
    ));

    let duplicate = engine
        .link_children(&pid("P1"), vec![pid("C1"), pid("C1")])
        .await
        .unwrap_err();
    assert!(matches!(
        duplicate,
        SyncError::Validation(LinkageError::DuplicateChild(_))
    ));

    let self_link = engine
        .link_children(&pid("P1"), vec![pid("C1"), pid("P1")])
        .await
        .unwrap_err();
    assert!(matches!(
        self_link,
        SyncError::Validation(LinkageError::SelfLink(_))
    ));

    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_link_requires_designated_master() {
    let platform = FakePlatform::default();
    let ns = test_namespace();

    let err = SyncEngine::new(&platform, &ns)
        .link_children(&pid("P1"), vec![pid("C1")])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NotMaster(_)));
    assert!(platform.writes().is_empty());
}

#[tokio::test]
async fn test_master_cannot_be_linked_as_child() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);
    engine.designate_master(&pid("P1")).await.unwrap();
    engine.designate_master(&pid("P2")).await.unwrap();
    platform.clear_calls();

    let err = engine
        .link_children(&pid("P1"), vec![pid("C1"), pid("P2")])
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::MasterCannotBeChild(ref p) if *p == pid("P2")));
    assert!(platform.writes().is_empty());
}

#[tokio::test]
async fn test_child_of_another_master_is_rejected_before_any_write() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1"]).await;
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);
    engine.designate_master(&pid("P2")).await.unwrap();
    platform.clear_calls();

    let err = engine
        .link_children(&pid("P2"), vec![pid("C9"), pid("C1")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::AlreadyLinked { ref child, ref master } if *child == pid("C1") && *master == pid("P1")
    ));
    assert!(platform.writes().is_empty());
    assert_eq!(
        platform.metafield(&pid("C9"), &ns, LinkageField::LinkedMaster),
        None
    );
}

#[tokio::test]
async fn test_relink_releases_dropped_children() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1", "C2"]).await;
    let ns = test_namespace();

    let linkage = SyncEngine::new(&platform, &ns)
        .link_children(&pid("P1"), vec![pid("C2"), pid("C3")])
        .await
        .unwrap();

    assert_eq!(linkage.children(), &[pid("C2"), pid("C3")]);
    assert_eq!(linkage.state().version, 2);
    assert_eq!(
        platform.metafield(&pid("C1"), &ns, LinkageField::LinkedMaster),
        None
    );
    assert!(
        platform
            .metafield(&pid("C3"), &ns, LinkageField::LinkedMaster)
            .is_some()
    );

    // Back-reference first, child list next, deletes last.
    let writes = platform.writes();
    assert!(matches!(
        writes.first(),
        Some(PlatformCall::SetMetafield { product, key: "linked_master", .. }) if *product == pid("C3")
    ));
    assert!(matches!(writes.last(), Some(PlatformCall::DeleteMetafield(_))));

    // A released child may now become a master.
    SyncEngine::new(&platform, &ns)
        .designate_master(&pid("C1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_linkage_without_children_is_not_found() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);
    engine.designate_master(&pid("P1")).await.unwrap();

    let err = engine.linkage(&pid("P1")).await.unwrap_err();

    assert!(matches!(err, SyncError::NoLinkage(_)));
}

#[tokio::test]
async fn test_corrupt_child_list_is_reported() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    platform.seed(&pid("P1"), &ns, LinkageField::LinkedProducts, "not json");

    let err = SyncEngine::new(&platform, &ns)
        .linkage(&pid("P1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::CorruptMetafield { key: "linked_products", .. }
    ));
}

// ============================================================================
// SyncInventory
// ============================================================================

#[tokio::test]
async fn test_sync_inventory_scenario() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1", "C2"]).await;
    let ns = test_namespace();

    let report = SyncEngine::new(&platform, &ns)
        .sync_inventory(&pid("P1"), qty(42))
        .await
        .unwrap();

    assert_eq!(
        platform.inventory_calls(),
        vec![(pid("C1"), 42), (pid("C2"), 42)]
    );
    assert_eq!(report.status(), SyncStatus::Complete);
    assert_eq!(report.updated_count(), 2);
    assert_eq!(report.master_product_id, pid("P1"));
}

#[tokio::test]
async fn test_sync_inventory_issues_one_call_per_child_in_order() {
    let platform = FakePlatform::default();
    let children = ["C5", "C3", "C9", "C1"];
    linked(&platform, &children).await;

    SyncEngine::new(&platform, &test_namespace())
        .sync_inventory(&pid("P1"), qty(7))
        .await
        .unwrap();

    let calls = platform.inventory_calls();
    assert_eq!(calls.len(), children.len());
    assert!(calls.iter().all(|(product, quantity)| *quantity == 7 && *product != pid("P1")));
    let order: Vec<_> = calls.into_iter().map(|(product, _)| product).collect();
    assert_eq!(order, children.iter().map(|c| pid(c)).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_sync_inventory_with_zero_children() {
    let platform = FakePlatform::default();
    let ns = test_namespace();
    platform.seed(&pid("P1"), &ns, LinkageField::IsSyncMaster, "true");
    platform.seed(&pid("P1"), &ns, LinkageField::LinkedProducts, "[]");

    let report = SyncEngine::new(&platform, &ns)
        .sync_inventory(&pid("P1"), qty(10))
        .await
        .unwrap();

    assert!(platform.inventory_calls().is_empty());
    assert!(report.outcomes.is_empty());
    assert_eq!(report.status(), SyncStatus::Complete);
}

#[tokio::test]
async fn test_sync_inventory_partial_failure_attempts_every_child() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1", "C2", "C3"]).await;
    platform.fail_inventory_for(&pid("C2"));

    let report = SyncEngine::new(&platform, &test_namespace())
        .sync_inventory(&pid("P1"), qty(5))
        .await
        .unwrap();

    assert_eq!(platform.inventory_calls().len(), 3);
    assert_eq!(report.status(), SyncStatus::Partial);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failed_products(), vec![&pid("C2")]);
    assert!(matches!(
        report.outcomes[1].status,
        ChildStatus::Failed { .. }
    ));
    assert_eq!(report.outcomes[2].status, ChildStatus::Updated);
}

#[tokio::test]
async fn test_sync_inventory_records_last_quantity() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1"]).await;
    let ns = test_namespace();

    SyncEngine::new(&platform, &ns)
        .sync_inventory(&pid("P1"), qty(13))
        .await
        .unwrap();

    let stored = platform
        .metafield(&pid("P1"), &ns, LinkageField::SyncState)
        .unwrap();
    let state: SyncState = serde_json::from_str(&stored).unwrap();
    assert_eq!(state.last_quantity, Some(13));
    assert!(state.last_synced_at.is_some());
    assert_eq!(state.version, 1);
}

#[tokio::test]
async fn test_sync_inventory_repeats_every_update() {
    let platform = FakePlatform::default();
    linked(&platform, &["C1"]).await;
    let ns = test_namespace();
    let engine = SyncEngine::new(&platform, &ns);

    engine.sync_inventory(&pid("P1"), qty(3)).await.unwrap();
    engine.sync_inventory(&pid("P1"), qty(3)).await.unwrap();

    assert_eq!(platform.inventory_calls(), vec![(pid("C1"), 3), (pid("C1"), 3)]);
}

#[tokio::test]
async fn test_sync_inventory_without_linkage() {
    let platform = FakePlatform::default();

    let err = SyncEngine::new(&platform, &test_namespace())
        .sync_inventory(&pid("P1"), qty(1))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoLinkage(_)));
    assert!(platform.inventory_calls().is_empty());
}

#[test]
fn test_upstream_errors_keep_their_source() {
    let err = SyncError::from(ShopifyError::RateLimited(2));
    assert!(matches!(err, SyncError::Upstream(ShopifyError::RateLimited(2))));
}
