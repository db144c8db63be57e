//! Series torrent index keyed by IMDB id (EZTV protocol)

use crate::connector::{imdb_digits, SourceConnector};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{
    ContentType, Fingerprint, GatewayError, InfoHash, QualityTier, Result, Stream, TitleHint,
};
use streamgate_fetch::FetchClient;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct GetTorrentsResponse {
    #[serde(default)]
    torrents: Vec<SeriesTorrent>,
}

/// The API serializes numerics inconsistently across versions; strings and
/// numbers both appear for the same fields.
#[derive(Debug, Deserialize)]
struct SeriesTorrent {
    title: String,
    hash: String,
    #[serde(default)]
    seeds: Option<serde_json::Value>,
    #[serde(default)]
    size_bytes: Option<serde_json::Value>,
    #[serde(default)]
    season: Option<serde_json::Value>,
    #[serde(default)]
    episode: Option<serde_json::Value>,
}

fn loose_u64(value: &Option<serde_json::Value>) -> Option<u64> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Built-in series index: one query per base IMDB id, filtered down to the
/// requested episode when the fingerprint names one.
pub struct SeriesIndexConnector {
    display_name: String,
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl SeriesIndexConnector {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            display_name: "EZTV".to_string(),
            base_url: base_url.into(),
            fetch,
        }
    }
}

#[async_trait]
impl SourceConnector for SeriesIndexConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        content_type == ContentType::Series
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(12)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, _hint: &TitleHint) -> Result<Vec<Stream>> {
        let url = format!(
            "{}?imdb_id={}&limit=50",
            self.base_url,
            imdb_digits(fingerprint.base_id())
        );
        debug!(%url, "querying series index");

        let value = self.fetch.get_json(&url, self.budget()).await?;
        let response: GetTorrentsResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        let wanted = fingerprint.episode();
        let mut streams = Vec::new();
        for torrent in response.torrents {
            if let Some((season, episode)) = wanted {
                let entry_season = loose_u64(&torrent.season);
                let entry_episode = loose_u64(&torrent.episode);
                // entries without season/episode markers are kept; the index
                // uses 0 for specials and season packs
                if let (Some(s), Some(e)) = (entry_season, entry_episode) {
                    if s != 0 && e != 0 && (s != season as u64 || e != episode as u64) {
                        continue;
                    }
                }
            }

            let Ok(info_hash) = InfoHash::parse(&torrent.hash) else {
                continue;
            };
            let seeders = loose_u64(&torrent.seeds).unwrap_or(0).min(u32::MAX as u64) as u32;
            let display_title = match loose_u64(&torrent.size_bytes) {
                Some(bytes) => format!("{} ({:.2} GB)", torrent.title, bytes as f64 / 1e9),
                None => torrent.title.clone(),
            };
            streams.push(
                Stream::magnet(info_hash, torrent.title.clone())
                    .with_quality(QualityTier::from_title(&torrent.title))
                    .with_seeders(seeders)
                    .with_display_title(display_title),
            );
        }
        Ok(streams)
    }
}
