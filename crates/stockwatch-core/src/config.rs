use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::dispatch::DispatchConfig;
use crate::error::AppError;
use crate::paginate::PaginationConfig;
use crate::retry::RetryPolicy;

/// Settings for one monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Catalog page to scan; `?page=N` is appended per page.
    pub category_url: String,
    /// Base for resolving relative product links.
    pub base_url: String,
    pub pagination: PaginationConfig,
    /// Per-page fetch retry.
    pub fetch_retry: RetryPolicy,
    pub request_timeout: Duration,
    pub dispatch: DispatchConfig,
}

impl MonitorConfig {
    /// Config for a category with every other setting at its default.
    pub fn new(category_url: impl Into<String>) -> Result<Self, AppError> {
        let category_url = category_url.into();
        let base_url = origin_of(&category_url)?;
        Ok(Self {
            category_url,
            base_url,
            pagination: PaginationConfig::default(),
            fetch_retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            dispatch: DispatchConfig::default(),
        })
    }

    /// Read configuration from environment variables.
    ///
    /// - `STOCKWATCH_CATEGORY_URL` (required)
    /// - `STOCKWATCH_BASE_URL` (optional, defaults to the category URL's origin)
    /// - `STOCKWATCH_MAX_PAGES` (optional, defaults to 50)
    /// - `STOCKWATCH_SHORT_PAGE_THRESHOLD` (optional, defaults to 5)
    /// - `STOCKWATCH_PAGE_DELAY_SECS` (optional, defaults to 2)
    /// - `STOCKWATCH_REQUEST_TIMEOUT_SECS` (optional, defaults to 30)
    /// - `STOCKWATCH_RETRY_ATTEMPTS` (optional, defaults to 3)
    /// - `STOCKWATCH_RETRY_DELAY_SECS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let category_url = lookup("STOCKWATCH_CATEGORY_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError("STOCKWATCH_CATEGORY_URL not set".into()))?;

        let mut config = Self::new(category_url)?;

        if let Some(base) = lookup("STOCKWATCH_BASE_URL").filter(|v| !v.trim().is_empty()) {
            Url::parse(&base)
                .map_err(|e| AppError::ConfigError(format!("Invalid STOCKWATCH_BASE_URL '{base}': {e}")))?;
            config.base_url = base;
        }

        let max_pages: u32 = parse_var(&lookup, "STOCKWATCH_MAX_PAGES", 50)?;
        if max_pages == 0 {
            return Err(AppError::ConfigError("STOCKWATCH_MAX_PAGES must be at least 1".into()));
        }
        config.pagination = PaginationConfig {
            max_pages,
            short_page_threshold: parse_var(&lookup, "STOCKWATCH_SHORT_PAGE_THRESHOLD", 5)?,
            page_delay: Duration::from_secs(parse_var(&lookup, "STOCKWATCH_PAGE_DELAY_SECS", 2)?),
        };

        let attempts: u32 = parse_var(&lookup, "STOCKWATCH_RETRY_ATTEMPTS", 3)?;
        if attempts == 0 {
            return Err(AppError::ConfigError("STOCKWATCH_RETRY_ATTEMPTS must be at least 1".into()));
        }
        config.fetch_retry = RetryPolicy::new(
            attempts,
            Duration::from_secs(parse_var(&lookup, "STOCKWATCH_RETRY_DELAY_SECS", 5)?),
        );
        config.request_timeout =
            Duration::from_secs(parse_var(&lookup, "STOCKWATCH_REQUEST_TIMEOUT_SECS", 30)?);

        Ok(config)
    }
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("Invalid {key} '{raw}'"))),
    }
}

/// `scheme://host[:port]` of an absolute URL.
fn origin_of(url: &str) -> Result<String, AppError> {
    let parsed = Url::parse(url)
        .map_err(|e| AppError::ConfigError(format!("Invalid category URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::ConfigError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }
    Ok(parsed.origin().ascii_serialization())
}
