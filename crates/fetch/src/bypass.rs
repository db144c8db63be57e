//! Headless-browser fallback for challenge-protected hosts
//!
//! Drives a system Chromium in headless mode to sit out the verification
//! interstitial, then extracts the JSON payload from the rendered DOM.
//! One instance per process; startup is lazy and serialized by a mutex so
//! concurrent callers never race two browser launches.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use streamgate_core::{GatewayError, Result};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Challenge pages resolve within one of these waits, or not at all.
const CHALLENGE_BACKOFF_SECS: &[u64] = &[5, 10, 15];

static PRE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<pre[^>]*>(.*?)</pre>").expect("static regex"));

/// Lazily-located, mutex-guarded headless browser runner.
pub struct BrowserBypass {
    /// Some(path) once located; inner None until first use.
    binary: Mutex<Option<PathBuf>>,
}

impl Default for BrowserBypass {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserBypass {
    pub fn new() -> Self {
        Self {
            binary: Mutex::new(None),
        }
    }

    /// Fetch a URL through the headless browser and parse JSON out of the
    /// rendered page. Retries with backoff while the DOM still shows the
    /// challenge interstitial.
    pub async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        // Single-instance guard: only one navigation at a time process-wide.
        let mut guard = self.binary.lock().await;
        if guard.is_none() {
            *guard = Some(locate_browser()?);
            info!(browser = ?guard.as_ref(), "headless browser located for challenge bypass");
        }
        let binary = guard.as_ref().expect("set above").clone();

        let mut dom = dump_dom(&binary, url).await?;
        if crate::client::looks_like_challenge(&dom) {
            for wait in CHALLENGE_BACKOFF_SECS {
                debug!(url, wait, "challenge interstitial still up, backing off");
                tokio::time::sleep(Duration::from_secs(*wait)).await;
                dom = dump_dom(&binary, url).await?;
                if !crate::client::looks_like_challenge(&dom) {
                    info!(url, "challenge cleared after {}s", wait);
                    break;
                }
            }
        }

        if crate::client::looks_like_challenge(&dom) {
            return Err(GatewayError::UpstreamProtected {
                host: host_of(url),
            });
        }

        extract_json(&dom).ok_or_else(|| GatewayError::UpstreamMalformed {
            source_tag: host_of(url),
            detail: "no JSON payload in rendered page".to_string(),
        })
    }
}

/// Find a Chromium-family binary on PATH.
fn locate_browser() -> Result<PathBuf> {
    for candidate in ["chromium", "chromium-browser", "google-chrome", "google-chrome-stable"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }
    warn!("no Chromium binary on PATH, challenge bypass unavailable");
    Err(GatewayError::UpstreamProtected {
        host: "bypass-browser".to_string(),
    })
}

async fn dump_dom(binary: &PathBuf, url: &str) -> Result<String> {
    let output = Command::new(binary)
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--virtual-time-budget=10000")
        .arg("--dump-dom")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| GatewayError::ExternalServiceError {
            service: "bypass-browser".to_string(),
            error: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(GatewayError::ExternalServiceError {
            service: "bypass-browser".to_string(),
            error: format!("browser exited with {}", output.status),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| GatewayError::UpstreamMalformed {
        source_tag: host_of(url),
        detail: format!("non-UTF8 DOM: {}", e),
    })
}

/// JSON payloads come back either inside a `<pre>` wrapper (how browsers
/// render raw JSON responses) or as the whole body text.
fn extract_json(dom: &str) -> Option<serde_json::Value> {
    if let Some(captures) = PRE_TAG.captures(dom) {
        let inner = html_unescape(captures.get(1)?.as_str());
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }
    let stripped = strip_tags(dom);
    serde_json::from_str(stripped.trim()).ok()
}

fn strip_tags(dom: &str) -> String {
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
    html_unescape(&TAG.replace_all(dom, ""))
}

fn html_unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_pre_tag() {
        let dom = r#"<html><body><pre style="word-wrap: break-word;">{"streams": [1, 2]}</pre></body></html>"#;
        let value = extract_json(dom).unwrap();
        assert_eq!(value["streams"][1], serde_json::json!(2));
    }

    #[test]
    fn extracts_escaped_json_from_body() {
        let dom = "<html><body>{&quot;ok&quot;: true}</body></html>";
        let value = extract_json(dom).unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[test]
    fn rejects_html_without_payload() {
        assert!(extract_json("<html><body><h1>hi</h1></body></html>").is_none());
    }
}
