use std::time::Duration;

use stockwatch_core::models::StockStatus;
use stockwatch_core::stats::RunStats;
use stockwatch_core::traits::ProductStore;
use uuid::Uuid;

use crate::integration::common::{product, setup_test_store};

#[tokio::test]
async fn empty_store_loads_empty_snapshot() {
    let (store, _dir) = setup_test_store().await;

    let snapshot = store.load_snapshot().await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn insert_then_load_preserves_fields_and_order() {
    let (store, _dir) = setup_test_store().await;

    for id in ["zeta", "alpha", "mid"] {
        store
            .upsert(&product(id, "10.00", StockStatus::Available))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    store
        .upsert(&product("oos", "460.00", StockStatus::OutOfStock))
        .await
        .unwrap();

    let snapshot = store.load_snapshot().await.unwrap();
    assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid", "oos"]);

    let oos = snapshot.get("oos").unwrap();
    assert_eq!(oos.price, "460.00");
    assert_eq!(oos.status, StockStatus::OutOfStock);
    assert_eq!(oos.url, "https://shop.example/products/oos");
}

#[tokio::test]
async fn upsert_existing_updates_and_counts() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "10.00", StockStatus::Available))
        .await
        .unwrap();
    let first = store.get("p1").await.unwrap().unwrap();
    assert_eq!(first.times_checked, 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut renamed = product("p1", "10.00", StockStatus::Available);
    renamed.name = "Renamed".into();
    store.upsert(&renamed).await.unwrap();

    let second = store.get("p1").await.unwrap().unwrap();
    assert_eq!(second.times_checked, 2);
    assert_eq!(second.product.name, "Renamed");
    assert_eq!(second.first_seen, first.first_seen);
    assert!(second.last_updated > first.last_updated);

    // Name changes are not archived
    assert!(store.recent_changes(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_product() {
    let (store, _dir) = setup_test_store().await;

    store
        .upsert(&product("p1", "10.00", StockStatus::Available))
        .await
        .unwrap();
    store.delete("p1").await.unwrap();

    assert!(store.get("p1").await.unwrap().is_none());
    assert!(store.load_snapshot().await.unwrap().is_empty());

    // Unknown ids are ignored
    store.delete("missing").await.unwrap();
}

#[tokio::test]
async fn backup_writes_copy_into_backup_dir() {
    let (store, dir) = setup_test_store().await;
    store
        .upsert(&product("p1", "10.00", StockStatus::Available))
        .await
        .unwrap();

    let path = store.backup().await.unwrap();

    assert!(path.starts_with(dir.path().join("backups")));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("products_backup_"));
    assert!(name.ends_with(".db"));
    assert!(path.exists());
}

#[tokio::test]
async fn record_run_and_list_newest_first() {
    let (store, _dir) = setup_test_store().await;

    let older = RunStats {
        run_id: Uuid::new_v4(),
        checked_at: chrono::Utc::now() - chrono::Duration::hours(1),
        total: 5,
        available: 4,
        out_of_stock: 1,
        new: 5,
        deleted: 0,
        went_out: 0,
        back_in: 0,
        price_changes: 0,
        pages_processed: 1,
        errors: 0,
    };
    let newer = RunStats {
        run_id: Uuid::new_v4(),
        checked_at: chrono::Utc::now(),
        new: 0,
        went_out: 1,
        price_changes: 2,
        errors: 1,
        ..older.clone()
    };
    store.record_run(&older).await.unwrap();
    store.record_run(&newer).await.unwrap();

    let runs = store.recent_runs(10).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, newer.run_id);
    assert_eq!(runs[0].went_out, 1);
    assert_eq!(runs[0].price_changes, 2);
    assert_eq!(runs[0].errors, 1);
    assert_eq!(runs[1].run_id, older.run_id);
    assert_eq!(runs[1].new, 5);

    assert_eq!(store.recent_runs(1).await.unwrap().len(), 1);
}
