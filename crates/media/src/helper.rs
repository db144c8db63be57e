//! External torrent-streaming helper proxy
//!
//! Alternate deployment: instead of the embedded swarm engine, an external
//! helper process owns the torrent sessions and exposes
//! `GET /stream/{hash}` and `GET /status/{hash}`. The gateway forwards
//! ranges verbatim and streams the body back untouched.

use reqwest::Client;
use std::time::Duration;
use streamgate_core::{GatewayError, Result};
use tracing::{debug, warn};

/// Headers that must not be forwarded across a proxy hop.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Client for the external torrent-streaming helper.
pub struct HelperClient {
    base_url: String,
    client: Client,
}

impl HelperClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            // status calls get their own timeout; streams are long-lived
            .build()
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to build helper client: {}", e),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fire-and-forget session start: poke the stream endpoint and drop
    /// the connection.
    pub fn start(&self, info_hash: &str) {
        let url = format!("{}/stream/{}", self.base_url, info_hash);
        let client = self.client.clone();
        tokio::spawn(async move {
            debug!(%url, "triggering helper session start");
            let request = client
                .get(&url)
                .header("Range", "bytes=0-0")
                .timeout(Duration::from_secs(10));
            if let Err(e) = request.send().await {
                warn!(%url, error = %e, "helper start trigger failed");
            }
        });
    }

    /// Status passthrough.
    pub async fn status(&self, info_hash: &str) -> Result<serde_json::Value> {
        let url = format!("{}/status/{}", self.base_url, info_hash);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| GatewayError::ExternalServiceError {
                service: "torrent-helper".to_string(),
                error: e.to_string(),
            })?;
        response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: "torrent-helper".to_string(),
                detail: e.to_string(),
            })
    }

    /// Open the helper's byte stream, forwarding the client Range header
    /// verbatim. The caller relays status (200/206) and headers minus the
    /// hop-by-hop set.
    pub async fn stream(&self, info_hash: &str, range: Option<&str>) -> Result<reqwest::Response> {
        let url = format!("{}/stream/{}", self.base_url, info_hash);
        let mut request = self.client.get(&url);
        if let Some(range) = range {
            request = request.header("Range", range);
        }
        request
            .send()
            .await
            .map_err(|e| GatewayError::ExternalServiceError {
                service: "torrent-helper".to_string(),
                error: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_detection_is_case_insensitive() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-range"));
        assert!(!is_hop_by_hop("content-type"));
    }
}
