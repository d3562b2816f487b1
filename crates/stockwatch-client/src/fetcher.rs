use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use stockwatch_core::error::AppError;
use stockwatch_core::traits::Fetcher;

/// Browser User-Agents rotated across requests.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// HTTP fetcher using reqwest.
///
/// One attempt per call with a fixed timeout; retrying is left to
/// [`RetryingFetcher`](stockwatch_core::retry::RetryingFetcher). Every request
/// carries browser-like headers and the next User-Agent from [`USER_AGENTS`].
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    next_agent: Arc<AtomicUsize>,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            next_agent: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Round-robin pick; clones share the cursor.
    fn user_agent(&self) -> &'static str {
        let i = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[i % USER_AGENTS.len()]
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let user_agent = self.user_agent();
        tracing::debug!(%url, user_agent, "GET");

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

/// Headers sent with every catalog request besides the User-Agent.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("ar,en-US;q=0.7,en;q=0.3"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answer one GET with the given status line; yields the raw request head.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/category"), handle)
    }

    #[test]
    fn user_agents_rotate_round_robin() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let picked: Vec<_> = (0..USER_AGENTS.len() + 2).map(|_| fetcher.user_agent()).collect();

        assert_eq!(picked[0], USER_AGENTS[0]);
        assert_eq!(picked[1], USER_AGENTS[1]);
        assert_eq!(picked[USER_AGENTS.len()], USER_AGENTS[0]);
        assert_eq!(picked[USER_AGENTS.len() + 1], USER_AGENTS[1]);
    }

    #[test]
    fn clones_share_rotation() {
        let a = ReqwestFetcher::new().unwrap();
        let b = a.clone();
        assert_eq!(a.user_agent(), USER_AGENTS[0]);
        assert_eq!(b.user_agent(), USER_AGENTS[1]);
    }

    #[test]
    fn browser_headers_present() {
        let headers = browser_headers();
        assert!(headers.contains_key(header::ACCEPT));
        assert!(headers.contains_key(header::ACCEPT_LANGUAGE));
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::UPGRADE_INSECURE_REQUESTS], "1");
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, AppError::NetworkError(_)), "{err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn success_returns_body_and_sends_browser_headers() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "<html>catalog</html>").await;
        let fetcher = ReqwestFetcher::new().unwrap();

        let body = fetcher.fetch(&url).await.unwrap();
        let request = server.await.unwrap().to_lowercase();

        assert_eq!(body, "<html>catalog</html>");
        assert!(request.starts_with("get /category"));
        assert!(request.contains(&format!("user-agent: {}", USER_AGENTS[0].to_lowercase())));
        assert!(request.contains("accept-language: ar,en-us;q=0.7,en;q=0.3"));
    }

    #[tokio::test]
    async fn non_2xx_status_is_http_error() {
        let (url, server) = serve_once("HTTP/1.1 503 Service Unavailable", "busy").await;
        let fetcher = ReqwestFetcher::new().unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, AppError::HttpError(ref m) if m.contains("503")), "{err:?}");
        assert!(err.is_retryable());
    }
}
