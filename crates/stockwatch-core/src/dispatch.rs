use std::time::Duration;

use chrono::Local;
use serde::Serialize;

use crate::diff::{ChangeSet, PriceChange};
use crate::messages;
use crate::models::Product;
use crate::retry::RetryPolicy;
use crate::stats::RunStats;
use crate::traits::{MessageFormat, Notifier};

/// Delivery policy for notifications.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-message retry: 3 attempts, waiting 2s then 4s.
    pub retry: RetryPolicy,
    /// Pause after every delivery, successful or not.
    pub pause: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, Duration::from_secs(2)),
            pause: Duration::from_millis(500),
        }
    }
}

/// Outcome of dispatching one change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub sent: usize,
    pub failed: usize,
    /// Per-item tasks attempted (1 for the cold-start aggregate)
    pub total: usize,
    pub summary_sent: bool,
}

/// One notification to deliver.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    New(&'a Product),
    OutOfStock(&'a Product),
    BackInStock(&'a Product),
    Deleted(&'a Product),
    PriceChange(&'a PriceChange),
}

impl Notification<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::New(_) => "new",
            Notification::OutOfStock(_) => "out_of_stock",
            Notification::BackInStock(_) => "back_in_stock",
            Notification::Deleted(_) => "deleted",
            Notification::PriceChange(_) => "price_change",
        }
    }

    pub fn product_id(&self) -> &str {
        match self {
            Notification::New(p)
            | Notification::OutOfStock(p)
            | Notification::BackInStock(p)
            | Notification::Deleted(p) => &p.id,
            Notification::PriceChange(c) => &c.product.id,
        }
    }

    pub fn render(&self, timestamp: &str) -> String {
        match self {
            Notification::New(p) => messages::new_product(p, timestamp),
            Notification::OutOfStock(p) => messages::out_of_stock(p, timestamp),
            Notification::BackInStock(p) => messages::back_in_stock(p, timestamp),
            Notification::Deleted(p) => messages::deleted(p, timestamp),
            Notification::PriceChange(c) => messages::price_change(c, timestamp),
        }
    }
}

/// Build the per-item notification queue in priority order:
/// new, out of stock, back in stock, deleted, price changes.
pub fn plan(changes: &ChangeSet) -> Vec<Notification<'_>> {
    let mut tasks = Vec::with_capacity(changes.total_changes());
    tasks.extend(changes.new.iter().map(Notification::New));
    tasks.extend(changes.went_out_of_stock.iter().map(Notification::OutOfStock));
    tasks.extend(changes.came_back_in_stock.iter().map(Notification::BackInStock));
    tasks.extend(changes.deleted.iter().map(Notification::Deleted));
    tasks.extend(changes.price_changed.iter().map(Notification::PriceChange));
    tasks
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Turns a change set into delivered messages.
#[derive(Clone)]
pub struct Dispatcher<N: Notifier> {
    notifier: N,
    config: DispatchConfig,
}

impl<N: Notifier> Dispatcher<N> {
    pub fn new(notifier: N, config: DispatchConfig) -> Self {
        Self { notifier, config }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Deliver the notifications for one run.
    ///
    /// On a cold start only one aggregate message is sent and no summary
    /// follows. Otherwise every change is delivered in priority order, then
    /// the summary, which is sent even when nothing changed.
    pub async fn dispatch(&self, changes: &ChangeSet, stats: &RunStats, cold_start: bool) -> DispatchResult {
        let mut result = DispatchResult::default();

        if cold_start {
            tracing::info!(products = changes.new.len(), "First run, sending initial snapshot only");
            result.total = 1;
            let text = messages::cold_start(&changes.new, &timestamp());
            if self.deliver_with_retry(&text).await {
                result.sent = 1;
            } else {
                result.failed = 1;
            }
            return result;
        }

        let tasks = plan(changes);
        result.total = tasks.len();
        if tasks.is_empty() {
            tracing::info!("No notifications to send");
        } else {
            tracing::info!(count = tasks.len(), "Sending notifications");
        }

        for task in &tasks {
            let text = task.render(&timestamp());
            if self.deliver_with_retry(&text).await {
                result.sent += 1;
            } else {
                tracing::error!(kind = task.kind(), product_id = task.product_id(), "Notification not delivered");
                result.failed += 1;
            }
            tokio::time::sleep(self.config.pause).await;
        }

        tracing::info!(
            sent = result.sent,
            failed = result.failed,
            total = result.total,
            "Notifications dispatched"
        );

        result.summary_sent = self.deliver_with_retry(&messages::summary(stats, &timestamp())).await;
        if !result.summary_sent {
            tracing::error!("Summary report not delivered");
        }
        result
    }

    /// Deliver one message, retrying per the configured policy.
    pub async fn deliver_with_retry(&self, text: &str) -> bool {
        let policy = &self.config.retry;
        let mut attempt = 1;
        loop {
            match self.notifier.deliver(text, MessageFormat::Html).await {
                Ok(()) => return true,
                Err(e) => match policy.delay_after(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            error = %e,
                            wait_secs = delay.as_secs_f64(),
                            "Delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        tracing::error!(attempts = attempt, error = %e, "Delivery failed");
                        return false;
                    }
                },
            }
        }
    }

    /// Best-effort report of a failed run. Single attempt.
    pub async fn notify_failure(&self, error: &str) -> bool {
        match self
            .notifier
            .deliver(&messages::failure(error, &timestamp()), MessageFormat::Html)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Could not send failure notification");
                false
            }
        }
    }
}
