use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use thiserror::Error;

use crate::color::{clean_hex_code, NamedColor};
use crate::config::{LookupConfig, DEFAULT_LOOKUP_URL};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("not a 6-digit hex color code: {0:?}")]
    InvalidHex(String),
    #[error("request to color service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("color service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode color service response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can turn a hex code into a named color.
#[async_trait]
pub trait ColorNamer: Send + Sync {
    /// `hex` is six hex digits, with or without a leading `#`.
    async fn lookup(&self, hex: &str) -> Result<NamedColor, LookupError>;
}

/// Client for a thecolorapi.com-compatible naming service.
pub struct ColorApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ColorApiClient {
    /// Client with reqwest defaults and no timeout.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Uses a preconfigured `reqwest::Client` (proxies, TLS, timeouts).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Applies the configured base URL and optional request timeout.
    pub fn from_config(config: &LookupConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/id", self.base_url)
    }
}

impl Default for ColorApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_URL)
    }
}

#[async_trait]
impl ColorNamer for ColorApiClient {
    async fn lookup(&self, hex: &str) -> Result<NamedColor, LookupError> {
        let code = clean_hex_code(hex).ok_or_else(|| LookupError::InvalidHex(hex.to_string()))?;
        debug!("Looking up color name for {}", code);

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("hex", code.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let color: NamedColor = serde_json::from_slice(&bytes)?;
        debug!("Color service named {} as {:?}", code, color.name.value);
        Ok(color)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every lookup with white, or fails every lookup.
    pub struct MockNamer {
        pub should_fail: bool,
        pub calls: AtomicUsize,
    }

    impl MockNamer {
        pub fn succeeding() -> Self {
            Self {
                should_fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                should_fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ColorNamer for MockNamer {
        async fn lookup(&self, hex: &str) -> Result<NamedColor, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                return Err(LookupError::Status {
                    status: 502,
                    body: "bad server response".to_string(),
                });
            }
            let code = clean_hex_code(hex).ok_or_else(|| LookupError::InvalidHex(hex.to_string()))?;
            Ok(NamedColor::new(&code, "white", "#FFF", true, 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn local_client(url: &str) -> ColorApiClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ColorApiClient::with_client(client, url)
    }

    const WHITE_BODY: &str = r##"{"hex":{"value":"#FFFFFF","clean":"FFFFFF"},"name":{"value":"White","closest_named_hex":"#FFFFFF","exact_match_name":true,"distance":0}}"##;

    /// Serves one canned HTTP response and returns the request line it saw.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            let request = String::from_utf8_lossy(&request).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });

        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_lookup_decodes_named_color() {
        let (url, server) = serve_once("200 OK", WHITE_BODY).await;
        let client = local_client(&url);

        let color = client.lookup("#ffffff").await.unwrap();
        assert_eq!(color.name.value, "White");
        assert!(color.name.exact_match_name);
        assert_eq!(color.name.distance, 0);
        assert_eq!(color.hex.value, "#FFFFFF");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /id?hex=FFFFFF "), "{}", request_line);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (url, _server) = serve_once("404 Not Found", "{}").await;
        let client = local_client(&url);

        match client.lookup("00FF00").await {
            Err(LookupError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let (url, _server) = serve_once("200 OK", r#"{"name": "just a string"}"#).await;
        let client = local_client(&url);

        assert!(matches!(client.lookup("00FF00").await, Err(LookupError::Decode(_))));
    }

    #[tokio::test]
    async fn test_invalid_hex_is_rejected_before_sending() {
        let client = ColorApiClient::new("http://127.0.0.1:9");
        assert!(matches!(client.lookup("#FFF").await, Err(LookupError::InvalidHex(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_request_error() {
        // Bind then drop so the port is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(&format!("http://{}", addr));
        assert!(matches!(client.lookup("123456").await, Err(LookupError::Request(_))));
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let config = LookupConfig {
            base_url: "https://example.test/".to_string(),
            timeout_secs: Some(2),
        };
        let client = ColorApiClient::from_config(&config);
        assert_eq!(client.base_url(), "https://example.test");
        assert_eq!(client.endpoint(), "https://example.test/id");
    }
}
