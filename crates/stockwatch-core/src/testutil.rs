//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{PageExtraction, Product, Snapshot};
use crate::stats::RunStats;
use crate::traits::{Fetcher, MessageFormat, Notifier, ProductExtractor, ProductStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that replays a queue of responses and records requested URLs.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns one queued page per call.
/// If the queue is empty, returns an empty page.
#[derive(Clone)]
pub struct MockExtractor {
    pages: Arc<Mutex<Vec<PageExtraction>>>,
}

impl MockExtractor {
    pub fn with_pages(pages: Vec<PageExtraction>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
        }
    }
}

impl ProductExtractor for MockExtractor {
    fn extract(&self, _html: &str) -> PageExtraction {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            PageExtraction::default()
        } else {
            pages.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notifier that records delivered texts and the time of every attempt.
#[derive(Clone)]
pub struct MockNotifier {
    /// Queued delivery outcomes. When empty, `always_fail` decides.
    results: Arc<Mutex<Vec<Result<(), AppError>>>>,
    always_fail: bool,
    identify_error: Arc<Mutex<Option<AppError>>>,
    sent: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

impl MockNotifier {
    /// Notifier that accepts every message.
    pub fn new() -> Self {
        Self::build(Vec::new(), false)
    }

    /// Notifier that rejects every message.
    pub fn failing() -> Self {
        Self::build(Vec::new(), true)
    }

    /// Notifier that replays the given outcomes, then accepts everything.
    pub fn with_results(results: Vec<Result<(), AppError>>) -> Self {
        Self::build(results, false)
    }

    /// Notifier whose connectivity probe fails.
    pub fn with_identify_error(error: AppError) -> Self {
        let notifier = Self::new();
        *notifier.identify_error.lock().unwrap() = Some(error);
        notifier
    }

    fn build(results: Vec<Result<(), AppError>>, always_fail: bool) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            always_fail,
            identify_error: Arc::new(Mutex::new(None)),
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Texts that were delivered successfully.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Instants of every delivery attempt, successful or not.
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MockNotifier {
    async fn deliver(&self, text: &str, _format: MessageFormat) -> Result<(), AppError> {
        self.attempts.lock().unwrap().push(tokio::time::Instant::now());
        let queued = {
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        };
        let outcome = match queued {
            Some(r) => r,
            None if self.always_fail => Err(AppError::NotifyError("mock failure".into())),
            None => Ok(()),
        };
        if outcome.is_ok() {
            self.sent.lock().unwrap().push(text.to_string());
        }
        outcome
    }

    async fn identify(&self) -> Result<String, AppError> {
        match self.identify_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok("MockBot".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory product store that records every mutation.
#[derive(Clone)]
pub struct MockStore {
    pub products: Arc<Mutex<Snapshot>>,
    pub upserted: Arc<Mutex<Vec<Product>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    pub runs: Arc<Mutex<Vec<RunStats>>>,
    pub backups: Arc<Mutex<u32>>,
    backup_error: Arc<Mutex<Option<AppError>>>,
    upsert_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    /// Empty store, as on a first run.
    pub fn empty() -> Self {
        Self::with_products(Vec::new())
    }

    /// Store pre-filled with a previous snapshot.
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(Mutex::new(products.into_iter().collect())),
            upserted: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            runs: Arc::new(Mutex::new(Vec::new())),
            backups: Arc::new(Mutex::new(0)),
            backup_error: Arc::new(Mutex::new(None)),
            upsert_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Store whose next backup fails.
    pub fn with_backup_error(self, error: AppError) -> Self {
        *self.backup_error.lock().unwrap() = Some(error);
        self
    }

    /// Store whose next upsert fails.
    pub fn with_upsert_error(self, error: AppError) -> Self {
        *self.upsert_error.lock().unwrap() = Some(error);
        self
    }
}

impl ProductStore for MockStore {
    async fn load_snapshot(&self) -> Result<Snapshot, AppError> {
        Ok(self.products.lock().unwrap().clone())
    }

    async fn upsert(&self, product: &Product) -> Result<(), AppError> {
        if let Some(e) = self.upsert_error.lock().unwrap().take() {
            return Err(e);
        }
        self.upserted.lock().unwrap().push(product.clone());
        self.products.lock().unwrap().insert(product.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(id.to_string());
        let remaining: Snapshot = self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        *self.products.lock().unwrap() = remaining;
        Ok(())
    }

    async fn backup(&self) -> Result<PathBuf, AppError> {
        if let Some(e) = self.backup_error.lock().unwrap().take() {
            return Err(e);
        }
        *self.backups.lock().unwrap() += 1;
        Ok(PathBuf::from("backups/products_backup_test.db"))
    }

    async fn record_run(&self, stats: &RunStats) -> Result<(), AppError> {
        self.runs.lock().unwrap().push(stats.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a dummy RunStats for testing.
pub fn make_test_stats() -> RunStats {
    RunStats {
        run_id: Uuid::new_v4(),
        checked_at: Utc::now(),
        total: 10,
        available: 8,
        out_of_stock: 2,
        new: 0,
        deleted: 0,
        went_out: 0,
        back_in: 0,
        price_changes: 0,
        pages_processed: 1,
        errors: 0,
    }
}
