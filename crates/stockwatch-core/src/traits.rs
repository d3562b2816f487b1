use std::future::Future;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::{PageExtraction, Product, Snapshot};
use crate::stats::RunStats;

/// Fetches a raw page body from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns one catalog page into product records.
///
/// Extraction never fails: items that cannot be resolved are counted in
/// [`PageExtraction::skipped`] and left out.
pub trait ProductExtractor: Send + Sync + Clone {
    fn extract(&self, html: &str) -> PageExtraction;
}

/// Markup used for an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Html,
    Plain,
}

/// Outbound notification channel.
pub trait Notifier: Send + Sync + Clone {
    /// Deliver one message. A single attempt; retrying is the caller's job.
    fn deliver(
        &self,
        text: &str,
        format: MessageFormat,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Connectivity probe. Returns a display name for the channel.
    fn identify(&self) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists the last observed state of every product.
pub trait ProductStore: Send + Sync + Clone {
    /// Load every stored product as the previous snapshot.
    fn load_snapshot(&self) -> impl Future<Output = Result<Snapshot, AppError>> + Send;

    /// Insert a product or refresh an existing one, bumping `times_checked`.
    fn upsert(&self, product: &Product) -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Write a timestamped copy of the store. Returns the backup path.
    fn backup(&self) -> impl Future<Output = Result<PathBuf, AppError>> + Send;

    /// Append one row to the run statistics log.
    fn record_run(&self, stats: &RunStats) -> impl Future<Output = Result<(), AppError>> + Send;
}
