use serde::Serialize;

use crate::models::{Product, Snapshot, StockStatus};

/// A product whose price string differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceChange {
    pub product: Product,
    pub old_price: String,
    pub new_price: String,
}

/// Classified differences between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub new: Vec<Product>,
    /// Last known state of each product that disappeared
    pub deleted: Vec<Product>,
    pub went_out_of_stock: Vec<Product>,
    pub came_back_in_stock: Vec<Product>,
    pub price_changed: Vec<PriceChange>,
}

impl ChangeSet {
    pub fn total_changes(&self) -> usize {
        self.new.len()
            + self.deleted.len()
            + self.went_out_of_stock.len()
            + self.came_back_in_stock.len()
            + self.price_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Compare the previous snapshot against the current one.
///
/// Status transitions and price changes are classified independently, so one
/// product may appear in both a status list and `price_changed`. Prices are
/// compared as strings. Any other field change is ignored.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for product in current {
        let Some(old) = previous.get(&product.id) else {
            tracing::debug!(product_id = %product.id, name = %product.name, "New product");
            changes.new.push(product.clone());
            continue;
        };

        match (old.status, product.status) {
            (StockStatus::Available, StockStatus::OutOfStock) => {
                tracing::debug!(product_id = %product.id, "Went out of stock");
                changes.went_out_of_stock.push(product.clone());
            }
            (StockStatus::OutOfStock, StockStatus::Available) => {
                tracing::debug!(product_id = %product.id, "Back in stock");
                changes.came_back_in_stock.push(product.clone());
            }
            _ => {}
        }

        if old.price != product.price {
            tracing::debug!(
                product_id = %product.id,
                old_price = %old.price,
                new_price = %product.price,
                "Price changed"
            );
            changes.price_changed.push(PriceChange {
                product: product.clone(),
                old_price: old.price.clone(),
                new_price: product.price.clone(),
            });
        }
    }

    changes.deleted = previous
        .iter()
        .filter(|p| !current.contains(&p.id))
        .cloned()
        .collect();

    changes
}
