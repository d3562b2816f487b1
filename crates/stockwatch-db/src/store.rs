use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use stockwatch_core::error::AppError;
use stockwatch_core::models::{Product, Snapshot, StockStatus, StoredProduct};
use stockwatch_core::stats::RunStats;
use stockwatch_core::traits::ProductStore;
use uuid::Uuid;

use crate::config::StoreConfig;

/// Kind of an archived change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    StatusChange,
    PriceChange,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::StatusChange => "status_change",
            ChangeKind::PriceChange => "price_change",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status_change" => Ok(ChangeKind::StatusChange),
            "price_change" => Ok(ChangeKind::PriceChange),
            "deleted" => Ok(ChangeKind::Deleted),
            other => Err(format!("unknown change type '{other}'")),
        }
    }
}

/// One row of the change-history archive.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub product_id: String,
    /// `None` once the product itself is gone.
    pub product_name: Option<String>,
    pub kind: ChangeKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed product store with change history and run statistics.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    backup_dir: PathBuf,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and apply migrations.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to open {}: {e}",
                    config.db_path.display()
                ))
            })?;

        let store = Self {
            pool,
            backup_dir: config.backup_dir.clone(),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get(&self, id: &str) -> Result<Option<StoredProduct>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, url, price, status, first_seen, last_updated, times_checked
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(TryInto::try_into).transpose()
    }

    /// Every stored product, oldest first.
    pub async fn list_products(&self) -> Result<Vec<StoredProduct>, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, url, price, status, first_seen, last_updated, times_checked
            FROM products
            ORDER BY first_seen, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Latest archived changes, newest first.
    pub async fn recent_changes(&self, limit: usize) -> Result<Vec<ChangeRecord>, AppError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT ch.product_id, p.name AS product_name, ch.change_type,
                   ch.old_value, ch.new_value, ch.recorded_at
            FROM change_history ch
            LEFT JOIN products p ON ch.product_id = p.id
            ORDER BY ch.recorded_at DESC, ch.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Latest run statistics, newest first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunStats>, AppError> {
        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT run_id, checked_at, total_products, available_products, out_of_stock_products,
                   new_products, deleted_products, went_out_of_stock, back_in_stock,
                   price_changes, pages_processed, errors
            FROM statistics
            ORDER BY checked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Delete history rows older than `days`. Returns the number removed.
    pub async fn prune_history(&self, days: u32) -> Result<u64, AppError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let result = sqlx::query("DELETE FROM change_history WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let removed = result.rows_affected();
        tracing::info!(removed, days, "Pruned change history");
        Ok(removed)
    }
}

impl ProductStore for SqliteStore {
    async fn load_snapshot(&self) -> Result<Snapshot, AppError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, url, price, status, first_seen, last_updated, times_checked
            FROM products
            ORDER BY first_seen, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| StoredProduct::try_from(row).map(|stored| stored.product))
            .collect()
    }

    async fn upsert(&self, product: &Product) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing: Option<(String, String)> =
            sqlx::query_as("SELECT price, status FROM products WHERE id = ?")
                .bind(&product.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

        match existing {
            Some((old_price, old_status)) => {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET name = ?, url = ?, price = ?, status = ?,
                        last_updated = ?, times_checked = times_checked + 1
                    WHERE id = ?
                    "#,
                )
                .bind(&product.name)
                .bind(&product.url)
                .bind(&product.price)
                .bind(product.status.as_str())
                .bind(now)
                .bind(&product.id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                if old_status != product.status.as_str() {
                    log_change(
                        &mut *tx,
                        &product.id,
                        ChangeKind::StatusChange,
                        Some(&old_status),
                        Some(product.status.as_str()),
                        now,
                    )
                    .await?;
                }
                if old_price != product.price {
                    log_change(
                        &mut *tx,
                        &product.id,
                        ChangeKind::PriceChange,
                        Some(&old_price),
                        Some(&product.price),
                        now,
                    )
                    .await?;
                }
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO products (id, name, url, price, status, first_seen, last_updated, times_checked)
                    VALUES (?, ?, ?, ?, ?, ?, ?, 1)
                    "#,
                )
                .bind(&product.id)
                .bind(&product.name)
                .bind(&product.url)
                .bind(&product.price)
                .bind(product.status.as_str())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let name: Option<(String,)> = sqlx::query_as("SELECT name FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some((name,)) = name else {
            tracing::debug!(product_id = id, "Delete of unknown product ignored");
            return Ok(());
        };

        log_change(&mut *tx, id, ChangeKind::Deleted, Some(&name), None, Utc::now()).await?;
        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        tracing::info!(product_id = id, "Product removed from store");
        Ok(())
    }

    async fn backup(&self) -> Result<PathBuf, AppError> {
        std::fs::create_dir_all(&self.backup_dir).map_err(|e| {
            AppError::DatabaseError(format!(
                "Cannot create backup directory {}: {e}",
                self.backup_dir.display()
            ))
        })?;

        let path = backup_path(&self.backup_dir, Utc::now());
        sqlx::query("VACUUM INTO ?")
            .bind(path.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Backup failed: {e}")))?;
        Ok(path)
    }

    async fn record_run(&self, stats: &RunStats) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO statistics (
                run_id, checked_at, total_products, available_products, out_of_stock_products,
                new_products, deleted_products, went_out_of_stock, back_in_stock,
                status_changes, price_changes, pages_processed, errors
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stats.run_id.to_string())
        .bind(stats.checked_at)
        .bind(stats.total as i64)
        .bind(stats.available as i64)
        .bind(stats.out_of_stock as i64)
        .bind(stats.new as i64)
        .bind(stats.deleted as i64)
        .bind(stats.went_out as i64)
        .bind(stats.back_in as i64)
        .bind(stats.status_changes() as i64)
        .bind(stats.price_changes as i64)
        .bind(i64::from(stats.pages_processed))
        .bind(i64::from(stats.errors))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

/// `<dir>/products_backup_<YYYYmmdd_HHMMSS>.db`
pub fn backup_path(dir: &Path, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("products_backup_{}.db", at.format("%Y%m%d_%H%M%S")))
}

async fn log_change(
    conn: &mut SqliteConnection,
    product_id: &str,
    kind: ChangeKind,
    old_value: Option<&str>,
    new_value: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO change_history (product_id, change_type, old_value, new_value, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(product_id)
    .bind(kind.as_str())
    .bind(old_value)
    .bind(new_value)
    .bind(at)
    .execute(conn)
    .await
    .map_err(db_err)?;

    tracing::debug!(product_id, kind = kind.as_str(), ?old_value, ?new_value, "Change archived");
    Ok(())
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    url: String,
    price: String,
    status: String,
    first_seen: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    times_checked: i64,
}

impl TryFrom<ProductRow> for StoredProduct {
    type Error = AppError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let status = StockStatus::from_str(&row.status).map_err(AppError::DatabaseError)?;
        Ok(StoredProduct {
            product: Product {
                id: row.id,
                name: row.name,
                url: row.url,
                price: row.price,
                status,
            },
            first_seen: row.first_seen,
            last_updated: row.last_updated,
            times_checked: row.times_checked,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    product_id: String,
    product_name: Option<String>,
    change_type: String,
    old_value: Option<String>,
    new_value: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<ChangeRow> for ChangeRecord {
    type Error = AppError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        Ok(ChangeRecord {
            kind: row.change_type.parse().map_err(AppError::DatabaseError)?,
            product_id: row.product_id,
            product_name: row.product_name,
            old_value: row.old_value,
            new_value: row.new_value,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    run_id: String,
    checked_at: DateTime<Utc>,
    total_products: i64,
    available_products: i64,
    out_of_stock_products: i64,
    new_products: i64,
    deleted_products: i64,
    went_out_of_stock: i64,
    back_in_stock: i64,
    price_changes: i64,
    pages_processed: i64,
    errors: i64,
}

impl TryFrom<StatsRow> for RunStats {
    type Error = AppError;

    fn try_from(row: StatsRow) -> Result<Self, Self::Error> {
        let run_id = Uuid::parse_str(&row.run_id)
            .map_err(|e| AppError::DatabaseError(format!("Invalid run id '{}': {e}", row.run_id)))?;
        Ok(RunStats {
            run_id,
            checked_at: row.checked_at,
            total: count(row.total_products),
            available: count(row.available_products),
            out_of_stock: count(row.out_of_stock_products),
            new: count(row.new_products),
            deleted: count(row.deleted_products),
            went_out: count(row.went_out_of_stock),
            back_in: count(row.back_in_stock),
            price_changes: count(row.price_changes),
            pages_processed: u32::try_from(row.pages_processed).unwrap_or_default(),
            errors: u32::try_from(row.errors).unwrap_or_default(),
        })
    }
}

fn count(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}
