use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stockwatch_client::{ExtractorConfig, HtmlProductExtractor, ReqwestFetcher, TelegramConfig, TelegramNotifier};
use stockwatch_core::{MonitorConfig, MonitorService, RunReport};
use stockwatch_db::{SqliteStore, StoreConfig};

#[derive(Parser)]
#[command(name = "stockwatch", version, about = "Catalog stock and price monitor")]
struct Cli {
    /// SQLite database file (overrides STOCKWATCH_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the catalog once, record changes and send notifications
    Run {
        /// Category page to scan (overrides STOCKWATCH_CATEGORY_URL)
        #[arg(short, long)]
        url: Option<String>,

        /// Page ceiling (overrides STOCKWATCH_MAX_PAGES)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Print the run report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Verify the catalog site and the Telegram bot are reachable
    Check {
        /// Category page to probe (overrides STOCKWATCH_CATEGORY_URL)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// List stored products
    Products {
        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show archived changes, newest first
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show statistics of recent runs
    Stats {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Delete archived changes older than the given age
    Prune {
        /// Age threshold in days
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stockwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            url,
            max_pages,
            json,
        } => {
            let config = monitor_config(url, max_pages)?;
            let store = open_store(cli.db).await?;
            cmd_run(&config, store, json).await?;
        }
        Commands::Check { url } => {
            let config = monitor_config(url, None)?;
            let store = open_store(cli.db).await?;
            cmd_check(&config, store).await?;
        }
        Commands::Products { json } => {
            let store = open_store(cli.db).await?;
            cmd_products(&store, json).await?;
        }
        Commands::History { limit } => {
            let store = open_store(cli.db).await?;
            cmd_history(&store, limit).await?;
        }
        Commands::Stats { limit } => {
            let store = open_store(cli.db).await?;
            cmd_stats(&store, limit).await?;
        }
        Commands::Prune { days } => {
            let store = open_store(cli.db).await?;
            let removed = store
                .prune_history(days)
                .await
                .context("Failed to prune change history")?;
            println!("Removed {removed} history entries older than {days} days");
        }
    }

    Ok(())
}

/// Environment config with command-line overrides applied on top.
fn monitor_config(url: Option<String>, max_pages: Option<u32>) -> Result<MonitorConfig> {
    let mut overrides = HashMap::new();
    if let Some(url) = url {
        overrides.insert("STOCKWATCH_CATEGORY_URL", url);
    }
    if let Some(max_pages) = max_pages {
        overrides.insert("STOCKWATCH_MAX_PAGES", max_pages.to_string());
    }

    MonitorConfig::from_lookup(|key| overrides.get(key).cloned().or_else(|| std::env::var(key).ok()))
        .context("Invalid monitor configuration")
}

async fn open_store(db: Option<PathBuf>) -> Result<SqliteStore> {
    let mut config = StoreConfig::from_env().context("Invalid store configuration")?;
    if let Some(db) = db {
        config.db_path = db;
    }
    tracing::info!(path = %config.db_path.display(), "Opening database");
    SqliteStore::connect(&config)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))
}

type Service = MonitorService<ReqwestFetcher, HtmlProductExtractor, SqliteStore, TelegramNotifier>;

fn build_service(config: &MonitorConfig, store: SqliteStore) -> Result<Service> {
    let fetcher =
        ReqwestFetcher::with_timeout(config.request_timeout).context("Failed to create HTTP client")?;
    let extractor = HtmlProductExtractor::new(ExtractorConfig::with_base_url(&config.base_url))
        .context("Invalid extractor configuration")?;
    let telegram = TelegramConfig::from_env().context("Telegram is not configured")?;
    let notifier = TelegramNotifier::new(telegram).context("Failed to create Telegram client")?;

    Ok(MonitorService::new(fetcher, extractor, store, notifier, config))
}

async fn cmd_run(config: &MonitorConfig, store: SqliteStore, json: bool) -> Result<()> {
    let service = build_service(config, store)?;
    tracing::info!(
        url = %config.category_url,
        max_pages = config.pagination.max_pages,
        "Starting catalog check"
    );
    let report = service.run().await.context("Check failed")?;
    tracing::info!(
        run_id = %report.stats.run_id,
        changes = report.stats.total_changes(),
        cold_start = report.cold_start,
        "Catalog check complete"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let stats = &report.stats;
    println!("Run {}", stats.run_id);
    if report.cold_start {
        println!("  First run: initial snapshot recorded");
    }
    println!(
        "  Products: {} ({} available, {} out of stock)",
        stats.total, stats.available, stats.out_of_stock
    );
    println!(
        "  Changes: {} new, {} removed, {} out of stock, {} back in stock, {} price",
        stats.new, stats.deleted, stats.went_out, stats.back_in, stats.price_changes
    );
    println!(
        "  Pages: {} processed, {} failed, {} items skipped",
        stats.pages_processed, stats.errors, report.skipped
    );
    println!(
        "  Notifications: {}/{} sent, {} failed, summary {}",
        report.dispatch.sent,
        report.dispatch.total,
        report.dispatch.failed,
        if report.dispatch.summary_sent { "sent" } else { "not sent" }
    );
}

async fn cmd_check(config: &MonitorConfig, store: SqliteStore) -> Result<()> {
    let service = build_service(config, store)?;
    tracing::info!(url = %config.category_url, "Probing catalog and Telegram bot");
    let bot = service.verify_setup().await.context("Setup check failed")?;
    tracing::info!(bot = %bot, "Setup verified");
    println!("Catalog reachable: {}", config.category_url);
    println!("Telegram bot: {bot}");
    Ok(())
}

async fn cmd_products(store: &SqliteStore, json: bool) -> Result<()> {
    let products = store.list_products().await.context("Failed to load products")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products stored yet");
        return Ok(());
    }

    for stored in &products {
        let p = &stored.product;
        println!(
            "  [{}] {} — {} ({} SAR, seen {}x since {})",
            p.status,
            p.id,
            p.name,
            p.price,
            stored.times_checked,
            stored.first_seen.format("%Y-%m-%d"),
        );
    }
    let available = products.iter().filter(|s| s.product.is_available()).count();
    println!(
        "\nTotal: {} products ({} available, {} out of stock)",
        products.len(),
        available,
        products.len() - available
    );
    Ok(())
}

async fn cmd_history(store: &SqliteStore, limit: usize) -> Result<()> {
    let changes = store
        .recent_changes(limit)
        .await
        .context("Failed to load change history")?;

    if changes.is_empty() {
        println!("No changes recorded");
        return Ok(());
    }

    for change in &changes {
        println!(
            "  {} [{}] {}{}: {} -> {}",
            change.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            change.kind.as_str(),
            change.product_id,
            change
                .product_name
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default(),
            change.old_value.as_deref().unwrap_or("-"),
            change.new_value.as_deref().unwrap_or("-"),
        );
    }
    println!("\nTotal: {} changes", changes.len());
    Ok(())
}

async fn cmd_stats(store: &SqliteStore, limit: usize) -> Result<()> {
    let runs = store.recent_runs(limit).await.context("Failed to load statistics")?;

    if runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    for run in &runs {
        println!(
            "  {} — {} products ({} available), {} change(s), {} page(s){}",
            run.checked_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.total,
            run.available,
            run.total_changes(),
            run.pages_processed,
            if run.errors > 0 { ", stopped early" } else { "" },
        );
    }
    Ok(())
}
