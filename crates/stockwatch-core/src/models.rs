use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    /// The token persisted in the store and shown in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Available => "Available",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(StockStatus::Available),
            "Out of Stock" => Ok(StockStatus::OutOfStock),
            _ => Err(format!("Unknown stock status: {}", s)),
        }
    }
}

/// One catalog entry as observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Last path segment of `url`, without query string
    pub id: String,
    pub name: String,
    pub url: String,
    /// Two-decimal numeral, e.g. `"1200.00"`
    pub price: String,
    pub status: StockStatus,
}

impl Product {
    pub fn is_available(&self) -> bool {
        self.status == StockStatus::Available
    }
}

/// A product as persisted, with tracking metadata.
#[derive(Debug, Clone, Serialize)]
pub struct StoredProduct {
    #[serde(flatten)]
    pub product: Product,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub times_checked: i64,
}

/// Products keyed by id, in insertion order.
///
/// Inserting an id that is already present replaces the record in place,
/// so the position of the first sighting is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product, returning the record it replaced, if any.
    pub fn insert(&mut self, product: Product) -> Option<Product> {
        match self.index.get(&product.id) {
            Some(&pos) => Some(std::mem::replace(&mut self.products[pos], product)),
            None => {
                self.index.insert(product.id.clone(), self.products.len());
                self.products.push(product);
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.index.get(id).map(|&pos| &self.products[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.products.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|p| p.id.as_str())
    }

    pub fn available_count(&self) -> usize {
        self.products.iter().filter(|p| p.is_available()).count()
    }
}

impl FromIterator<Product> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for product in iter {
            snapshot.insert(product);
        }
        snapshot
    }
}

impl Extend<Product> for Snapshot {
    fn extend<I: IntoIterator<Item = Product>>(&mut self, iter: I) {
        for product in iter {
            self.insert(product);
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = Product;
    type IntoIter = std::vec::IntoIter<Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.into_iter()
    }
}

/// Products found on a single catalog page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub products: Vec<Product>,
    /// Number of item containers matched, including ones that were skipped
    pub raw_items: usize,
    /// Items dropped for lacking a name, id or URL
    pub skipped: usize,
}
