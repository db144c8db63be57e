//! Live TV channel connector
//!
//! `ustv*` ids route here exclusively. Channels come from a TV add-on and
//! are locator-style streams: a playback URL, no info-hash, so they never
//! participate in hash dedup.

use crate::connector::SourceConnector;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{ContentType, Fingerprint, GatewayError, Result, Stream, TitleHint};
use streamgate_fetch::FetchClient;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TvStream {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvStreamResponse {
    #[serde(default)]
    streams: Vec<TvStream>,
}

pub struct TvChannelConnector {
    display_name: String,
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl TvChannelConnector {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            display_name: "USA TV".to_string(),
            base_url: base_url.into(),
            fetch,
        }
    }
}

#[async_trait]
impl SourceConnector for TvChannelConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        content_type == ContentType::Tv
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, _hint: &TitleHint) -> Result<Vec<Stream>> {
        let url = format!("{}/stream/tv/{}.json", self.base_url, fingerprint.content_id);
        debug!(%url, "fetching TV channel streams");

        let value = self.fetch.get_json(&url, self.budget()).await?;
        let response: TvStreamResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        Ok(response
            .streams
            .into_iter()
            .filter_map(|raw| {
                let url = raw.url?;
                let name = raw
                    .name
                    .or(raw.title)
                    .unwrap_or_else(|| fingerprint.content_id.clone());
                Some(Stream::direct(url, name))
            })
            .collect())
    }
}
