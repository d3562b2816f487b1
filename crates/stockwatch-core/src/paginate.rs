use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::models::Snapshot;
use crate::traits::{Fetcher, ProductExtractor};

/// Stop conditions and pacing for a catalog walk.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// Hard ceiling on the number of pages requested.
    pub max_pages: u32,
    /// A page with fewer raw items than this is treated as the last one.
    pub short_page_threshold: usize,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            short_page_threshold: 5,
            page_delay: Duration::from_secs(2),
        }
    }
}

/// Result of walking every page of a category.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub snapshot: Snapshot,
    pub pages_processed: u32,
    /// Pages whose fetch failed for good (at most one, since it ends the walk)
    pub errors: u32,
    /// Items dropped by the extractor across all pages
    pub skipped: usize,
}

/// Drives a fetcher and an extractor across the pages of a category.
///
/// Holds no per-run state; every [`collect`](Self::collect) call starts
/// from zero and returns its own counters.
#[derive(Clone)]
pub struct Paginator<F, X>
where
    F: Fetcher,
    X: ProductExtractor,
{
    fetcher: F,
    extractor: X,
    config: PaginationConfig,
}

impl<F, X> Paginator<F, X>
where
    F: Fetcher,
    X: ProductExtractor,
{
    pub fn new(fetcher: F, extractor: X, config: PaginationConfig) -> Self {
        Self {
            fetcher,
            extractor,
            config,
        }
    }

    /// Collect the current snapshot of a category.
    ///
    /// A fetch that fails for good ends the walk but keeps everything
    /// gathered so far. Only an unparsable `category_url` is an error.
    pub async fn collect(&self, category_url: &str) -> Result<Collection, AppError> {
        let base = Url::parse(category_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid category URL '{category_url}': {e}")))?;

        let mut collection = Collection::default();
        tracing::info!(%category_url, max_pages = self.config.max_pages, "Scanning category");

        for page in 1..=self.config.max_pages {
            let url = page_url(&base, page);

            let html = match self.fetcher.fetch(url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::error!(page, error = %e, "Failed to load page, stopping");
                    collection.errors += 1;
                    break;
                }
            };

            let extraction = self.extractor.extract(&html);
            if extraction.raw_items == 0 {
                tracing::info!(page, "No products on page, catalog end reached");
                break;
            }

            tracing::info!(
                page,
                items = extraction.raw_items,
                parsed = extraction.products.len(),
                skipped = extraction.skipped,
                "Page processed"
            );
            collection.snapshot.extend(extraction.products);
            collection.skipped += extraction.skipped;
            collection.pages_processed += 1;

            if extraction.raw_items < self.config.short_page_threshold {
                tracing::info!(page, "Short page, treating as last");
                break;
            }

            if page < self.config.max_pages {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        tracing::info!(
            pages = collection.pages_processed,
            products = collection.snapshot.len(),
            skipped = collection.skipped,
            errors = collection.errors,
            "Category scan finished"
        );
        Ok(collection)
    }
}

/// `base` with its `page` query parameter set to `page`, other parameters kept.
pub fn page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    url
}
