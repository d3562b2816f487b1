use stockwatch_core::models::StockStatus;
use stockwatch_core::traits::ProductStore;
use stockwatch_db::ChangeKind;

use crate::integration::common::{product, setup_test_store};

#[tokio::test]
async fn status_and_price_changes_are_archived() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "10.00", StockStatus::Available))
        .await
        .unwrap();
    store
        .upsert(&product("p1", "12.50", StockStatus::OutOfStock))
        .await
        .unwrap();

    let changes = store.recent_changes(10).await.unwrap();
    assert_eq!(changes.len(), 2);

    let status = changes
        .iter()
        .find(|c| c.kind == ChangeKind::StatusChange)
        .expect("status change archived");
    assert_eq!(status.old_value.as_deref(), Some("Available"));
    assert_eq!(status.new_value.as_deref(), Some("Out of Stock"));
    assert_eq!(status.product_name.as_deref(), Some("Product p1"));

    let price = changes
        .iter()
        .find(|c| c.kind == ChangeKind::PriceChange)
        .expect("price change archived");
    assert_eq!(price.old_value.as_deref(), Some("10.00"));
    assert_eq!(price.new_value.as_deref(), Some("12.50"));
}

#[tokio::test]
async fn deletion_is_archived_and_outlives_product() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "10.00", StockStatus::Available))
        .await
        .unwrap();
    store.delete("p1").await.unwrap();

    let changes = store.recent_changes(10).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Deleted);
    assert_eq!(changes[0].product_id, "p1");
    assert_eq!(changes[0].old_value.as_deref(), Some("Product p1"));
    assert!(changes[0].product_name.is_none());
}

#[tokio::test]
async fn recent_changes_respects_limit() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "1.00", StockStatus::Available))
        .await
        .unwrap();
    for price in ["2.00", "3.00", "4.00"] {
        store
            .upsert(&product("p1", price, StockStatus::Available))
            .await
            .unwrap();
    }

    let changes = store.recent_changes(2).await.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].new_value.as_deref(), Some("4.00"));
    assert_eq!(changes[1].new_value.as_deref(), Some("3.00"));
}

#[tokio::test]
async fn prune_removes_only_old_rows() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "1.00", StockStatus::Available))
        .await
        .unwrap();
    store
        .upsert(&product("p1", "2.00", StockStatus::Available))
        .await
        .unwrap();

    let old = chrono::Utc::now() - chrono::Duration::days(45);
    sqlx::query(
        "INSERT INTO change_history (product_id, change_type, old_value, new_value, recorded_at)
         VALUES ('p0', 'deleted', 'Old product', NULL, ?)",
    )
    .bind(old)
    .execute(store.pool())
    .await
    .unwrap();

    let removed = store.prune_history(30).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = store.recent_changes(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].product_id, "p1");
}
