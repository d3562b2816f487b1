use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::diff::diff;
use crate::dispatch::{DispatchResult, Dispatcher};
use crate::error::AppError;
use crate::paginate::Paginator;
use crate::retry::RetryingFetcher;
use crate::stats::RunStats;
use crate::traits::{Fetcher, Notifier, ProductExtractor, ProductStore};

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub dispatch: DispatchResult,
    pub cold_start: bool,
    /// Items the extractor could not resolve
    pub skipped: usize,
}

/// Orchestrates one monitoring run:
/// probe → backup → load → collect → diff → persist → record → dispatch.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without real HTTP, storage or messaging.
pub struct MonitorService<F, X, S, N>
where
    F: Fetcher,
    X: ProductExtractor,
    S: ProductStore,
    N: Notifier,
{
    fetcher: RetryingFetcher<F>,
    paginator: Paginator<RetryingFetcher<F>, X>,
    store: S,
    dispatcher: Dispatcher<N>,
    category_url: String,
}

impl<F, X, S, N> MonitorService<F, X, S, N>
where
    F: Fetcher,
    X: ProductExtractor,
    S: ProductStore,
    N: Notifier,
{
    pub fn new(fetcher: F, extractor: X, store: S, notifier: N, config: &MonitorConfig) -> Self {
        let fetcher = RetryingFetcher::new(fetcher, config.fetch_retry);
        Self {
            paginator: Paginator::new(fetcher.clone(), extractor, config.pagination.clone()),
            fetcher,
            store,
            dispatcher: Dispatcher::new(notifier, config.dispatch.clone()),
            category_url: config.category_url.clone(),
        }
    }

    /// Probe the catalog site and the notification channel.
    ///
    /// Touches no state; any failure is an [`AppError::Setup`].
    pub async fn verify_setup(&self) -> Result<String, AppError> {
        self.fetcher
            .fetch(&self.category_url)
            .await
            .map_err(|e| AppError::Setup(format!("catalog site unreachable: {e}")))?;
        tracing::info!(url = %self.category_url, "Catalog site reachable");

        let name = self
            .dispatcher
            .notifier()
            .identify()
            .await
            .map_err(|e| AppError::Setup(format!("notification channel unreachable: {e}")))?;
        tracing::info!(channel = %name, "Notification channel reachable");
        Ok(name)
    }

    /// Run one full check.
    ///
    /// On failure a best-effort failure notification is sent before the
    /// error is returned.
    pub async fn run(&self) -> Result<RunReport, AppError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);

        match self.run_check(run_id).instrument(span).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(%run_id, error = %e, "Check failed");
                self.dispatcher.notify_failure(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run_check(&self, run_id: Uuid) -> Result<RunReport, AppError> {
        // 1. Probe
        self.verify_setup().await?;

        // 2. Backup
        match self.store.backup().await {
            Ok(path) => tracing::info!(path = %path.display(), "Backup created"),
            Err(e) => tracing::warn!(error = %e, "Backup failed, continuing"),
        }

        // 3. Load previous state
        let previous = self.store.load_snapshot().await?;
        let cold_start = previous.is_empty();
        tracing::info!(products = previous.len(), cold_start, "Loaded previous snapshot");

        // 4. Collect
        let collection = self.paginator.collect(&self.category_url).await?;

        // 5. Diff
        let changes = diff(&previous, &collection.snapshot);
        tracing::info!(
            new = changes.new.len(),
            deleted = changes.deleted.len(),
            went_out = changes.went_out_of_stock.len(),
            back_in = changes.came_back_in_stock.len(),
            price_changes = changes.price_changed.len(),
            "Changes classified"
        );

        // 6. Persist
        for product in &collection.snapshot {
            self.store.upsert(product).await?;
        }
        for product in &changes.deleted {
            self.store.delete(&product.id).await?;
        }

        // 7. Record statistics
        let stats = RunStats::compute(run_id, &collection.snapshot, &changes, &collection);
        self.store.record_run(&stats).await?;

        // 8. Dispatch
        let dispatch = self.dispatcher.dispatch(&changes, &stats, cold_start).await;

        tracing::info!(
            total = stats.total,
            available = stats.available,
            out_of_stock = stats.out_of_stock,
            changes = stats.total_changes(),
            sent = dispatch.sent,
            failed = dispatch.failed,
            "Check complete"
        );

        Ok(RunReport {
            stats,
            dispatch,
            cold_start,
            skipped: collection.skipped,
        })
    }
}
