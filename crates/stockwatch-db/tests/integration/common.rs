use stockwatch_core::models::{Product, StockStatus};
use stockwatch_db::{SqliteStore, StoreConfig};
use tempfile::TempDir;

/// Opens a fresh store in a temporary directory.
///
/// The `TempDir` must be kept in scope for the test duration;
/// dropping it removes the database file.
pub async fn setup_test_store() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = StoreConfig::new(dir.path().join("products.db"), dir.path().join("backups"));
    let store = SqliteStore::connect(&config)
        .await
        .expect("Failed to open test database");
    (store, dir)
}

pub fn product(id: &str, price: &str, status: StockStatus) -> Product {
    Product {
        id: id.into(),
        name: format!("Product {id}"),
        url: format!("https://shop.example/products/{id}"),
        price: price.into(),
        status,
    }
}
