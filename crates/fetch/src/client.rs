//! The single outbound HTTP client abstraction

use crate::bypass::BrowserBypass;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{GatewayError, Result};
use tracing::{debug, warn};

/// Host suffixes that sit behind a browser-verification interstitial.
/// Matched against the URL host with a suffix comparison.
const PROTECTED_HOST_SUFFIXES: &[&str] = &[
    "torrentio.strem.fun",
    "thepiratebay.org",
    "apibay.org",
    "eztvx.to",
];

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the outbound client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Default per-call deadline in seconds.
    pub timeout: u64,
    /// Extra host suffixes to treat as challenge-protected.
    pub extra_protected_hosts: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 20,
            extra_protected_hosts: Vec::new(),
        }
    }
}

/// Protection-aware HTTP client.
///
/// Open hosts use a plain client with redirects enabled. Protected hosts
/// use the impersonation client first and fall back to the shared headless
/// browser when the response still looks like a challenge page.
pub struct FetchClient {
    plain: Client,
    impersonate: Client,
    bypass: Arc<BrowserBypass>,
    config: FetchConfig,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let plain = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(CHROME_UA)
            .build()
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        let impersonate = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .default_headers(impersonation_headers())
            .build()
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to build impersonation client: {}", e),
            })?;

        Ok(Self {
            plain,
            impersonate,
            bypass: Arc::new(BrowserBypass::new()),
            config,
        })
    }

    /// Is the URL's host on the challenge-protected list?
    pub fn is_protected(&self, url: &str) -> bool {
        let host = match reqwest::Url::parse(url) {
            Ok(u) => u.host_str().map(|h| h.to_string()),
            Err(_) => None,
        };
        let Some(host) = host else { return false };
        PROTECTED_HOST_SUFFIXES
            .iter()
            .any(|suffix| host.ends_with(suffix))
            || self
                .config
                .extra_protected_hosts
                .iter()
                .any(|suffix| host.ends_with(suffix.as_str()))
    }

    /// Fetch a URL and parse the body as JSON, routing through the bypass
    /// path when the host is protected.
    pub async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        if self.is_protected(url) {
            self.get_json_protected(url, timeout).await
        } else {
            self.get_json_open(url, timeout).await
        }
    }

    async fn get_json_open(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        let response = self
            .plain
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ExternalServiceError {
                service: host_of(url),
                error: format!("HTTP {}", status),
            });
        }

        let text = response.text().await.map_err(|e| GatewayError::UpstreamMalformed {
            source_tag: host_of(url),
            detail: format!("body read failed: {}", e),
        })?;
        parse_json(url, &text)
    }

    async fn get_json_protected(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        debug!(url, "fetching challenge-protected host");

        match self.impersonate.get(url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => {
                if let Ok(text) = response.text().await {
                    if !looks_like_challenge(&text) {
                        if let Ok(value) = parse_json(url, &text) {
                            return Ok(value);
                        }
                    }
                }
            }
            Ok(response) => {
                debug!(url, status = %response.status(), "impersonation fetch rejected");
            }
            Err(e) => {
                debug!(url, error = %e, "impersonation fetch failed");
            }
        }

        warn!(url, "falling back to headless-browser bypass");
        self.bypass.fetch_json(url).await
    }
}

/// Chromium-ordered header profile for the impersonation transport.
fn impersonation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static(CHROME_UA));
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Accept-Encoding", HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(
        "Sec-Ch-Ua",
        HeaderValue::from_static("\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\""),
    );
    headers.insert("Sec-Ch-Ua-Mobile", HeaderValue::from_static("?0"));
    headers.insert("Sec-Ch-Ua-Platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

pub(crate) fn looks_like_challenge(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("just a moment") || lower.contains("cloudflare")
}

fn parse_json(url: &str, text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| GatewayError::UpstreamMalformed {
        source_tag: host_of(url),
        detail: format!("non-JSON body: {}", e),
    })
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::UpstreamTimeout {
            source_tag: host_of(url),
        }
    } else {
        GatewayError::ExternalServiceError {
            service: host_of(url),
            error: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_hosts_match_by_suffix() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        assert!(client.is_protected("https://torrentio.strem.fun/stream/movie/tt1.json"));
        assert!(client.is_protected("https://mirror.apibay.org/q.php?q=x"));
        assert!(!client.is_protected("https://v3-cinemeta.strem.io/meta/movie/tt1.json"));
        assert!(!client.is_protected("not a url"));
    }

    #[test]
    fn challenge_detection() {
        assert!(looks_like_challenge("<title>Just a moment...</title>"));
        assert!(looks_like_challenge("Checking your browser - Cloudflare"));
        assert!(!looks_like_challenge("{\"streams\":[]}"));
    }

    #[tokio::test]
    async fn open_fetch_parses_json() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let value = client
            .get_json(&format!("{}/data.json", server.uri()), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn open_fetch_rejects_non_json() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let err = client
            .get_json(&format!("{}/page", server.uri()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamMalformed { .. }));
    }
}
