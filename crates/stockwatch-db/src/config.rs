use std::path::PathBuf;

use stockwatch_core::AppError;

/// Location of the SQLite database and its backups.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `STOCKWATCH_DB_PATH` (optional, defaults to `products.db`)
    /// - `STOCKWATCH_BACKUP_DIR` (optional, defaults to `backups`)
    pub fn from_env() -> Result<Self, AppError> {
        let db_path = non_empty_var("STOCKWATCH_DB_PATH").unwrap_or_else(|| "products.db".into());
        let backup_dir = non_empty_var("STOCKWATCH_BACKUP_DIR").unwrap_or_else(|| "backups".into());

        if backup_dir == db_path {
            return Err(AppError::ConfigError(
                "STOCKWATCH_BACKUP_DIR must differ from STOCKWATCH_DB_PATH".into(),
            ));
        }

        Ok(Self::new(db_path, backup_dir))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
