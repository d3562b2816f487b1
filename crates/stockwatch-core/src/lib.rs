pub mod config;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod models;
pub mod monitor;
pub mod paginate;
pub mod retry;
pub mod stats;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::MonitorConfig;
pub use diff::{ChangeSet, PriceChange, diff};
pub use dispatch::{DispatchConfig, DispatchResult, Dispatcher};
pub use error::AppError;
pub use models::{PageExtraction, Product, Snapshot, StockStatus, StoredProduct};
pub use monitor::{MonitorService, RunReport};
pub use paginate::{Collection, PaginationConfig, Paginator};
pub use retry::{RetryPolicy, RetryingFetcher};
pub use stats::RunStats;
pub use traits::{Fetcher, MessageFormat, Notifier, ProductExtractor, ProductStore};
