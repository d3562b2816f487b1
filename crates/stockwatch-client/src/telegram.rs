use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use stockwatch_core::error::AppError;
use stockwatch_core::traits::{MessageFormat, Notifier};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials and endpoint for the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID` (both required).
    pub fn from_env() -> Result<Self, AppError> {
        let token = required_env("TELEGRAM_TOKEN")?;
        let chat_id = required_env("TELEGRAM_CHAT_ID")?;
        Ok(Self::new(token, chat_id))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

fn required_env(key: &str) -> Result<String, AppError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::ConfigError(format!("{key} not set")))
}

/// [`Notifier`] backed by a Telegram bot posting into one chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    timeout_secs: u64,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token,
            chat_id: config.chat_id,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::NotifyError(e.to_string())
        }
    }
}

// ---- Bot API types ----

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

impl<'a> SendMessage<'a> {
    fn new(chat_id: &'a str, text: &'a str, format: MessageFormat) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: match format {
                MessageFormat::Html => Some("HTML"),
                MessageFormat::Plain => None,
            },
            disable_web_page_preview: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, AppError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::NotifyError(
                self.description
                    .unwrap_or_else(|| "Telegram API returned ok=false".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotUser {
    first_name: String,
    #[serde(default)]
    username: Option<String>,
}

/// Body text of a failed call, preferring the API's own description.
fn failure_message(status_code: u16, body: &str) -> String {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|r| r.description)
        .map(|d| format!("HTTP {status_code}: {d}"))
        .unwrap_or_else(|| format!("HTTP {status_code}: {body}"))
}

impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str, format: MessageFormat) -> Result<(), AppError> {
        let request = SendMessage::new(&self.chat_id, text, format);

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifyError(failure_message(status.as_u16(), &body)));
        }

        let reply: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::NotifyError(format!("Failed to parse Telegram response: {e}")))?;
        reply.into_result()?;
        Ok(())
    }

    async fn identify(&self) -> Result<String, AppError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifyError(failure_message(status.as_u16(), &body)));
        }

        let reply: ApiResponse<BotUser> = response
            .json()
            .await
            .map_err(|e| AppError::NotifyError(format!("Failed to parse Telegram response: {e}")))?;
        let bot = reply.into_result()?;
        tracing::debug!(username = bot.username.as_deref().unwrap_or(""), "Bot identified");
        Ok(bot.first_name)
    }
}
