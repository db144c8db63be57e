//! Add-on catalog client: `GET {base}/stream/{type}/{id}.json`

use crate::connector::SourceConnector;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{
    ContentType, Fingerprint, InfoHash, QualityTier, Result, Stream, TitleHint,
};
use streamgate_fetch::FetchClient;
use tracing::debug;

/// Wire shape of one add-on stream entry. Upstreams are loose about which
/// fields they fill; everything is optional and validated on conversion.
#[derive(Debug, Deserialize)]
struct AddonStream {
    name: Option<String>,
    title: Option<String>,
    #[serde(rename = "infoHash")]
    info_hash: Option<String>,
    url: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddonStreamResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

/// Client for one installed add-on's stream resource.
pub struct AddonStreamConnector {
    display_name: String,
    base_url: String,
    supports_movies: bool,
    supports_series: bool,
    fetch: Arc<FetchClient>,
}

impl AddonStreamConnector {
    pub fn new(
        display_name: impl Into<String>,
        manifest_url: &str,
        supports_movies: bool,
        supports_series: bool,
        fetch: Arc<FetchClient>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            base_url: base_from_manifest(manifest_url),
            supports_movies,
            supports_series,
            fetch,
        }
    }

    fn convert(&self, raw: AddonStream) -> Option<Stream> {
        let display_name = raw
            .name
            .clone()
            .unwrap_or_else(|| self.display_name.clone());
        let combined = format!(
            "{} {}",
            raw.name.as_deref().unwrap_or(""),
            raw.title.as_deref().unwrap_or("")
        );

        let mut stream = match (&raw.info_hash, &raw.url) {
            (Some(hash), _) => {
                // streams failing hash validation are dropped, not surfaced
                let info_hash = InfoHash::parse(hash).ok()?;
                let trackers = raw
                    .sources
                    .iter()
                    .filter_map(|s| s.strip_prefix("tracker:"))
                    .map(|s| s.to_string())
                    .collect();
                Stream::magnet(info_hash, display_name).with_trackers(trackers)
            }
            (None, Some(url)) => Stream::direct(url.clone(), display_name),
            (None, None) => return None,
        };

        stream.quality = QualityTier::from_title(&combined);
        stream.seeders = parse_seeders_glyph(raw.title.as_deref().unwrap_or(""));
        if let Some(title) = raw.title {
            stream = stream.with_display_title(title);
        }
        Some(stream)
    }
}

#[async_trait]
impl SourceConnector for AddonStreamConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        match content_type {
            ContentType::Movie => self.supports_movies,
            ContentType::Series => self.supports_series,
            ContentType::Tv => false,
        }
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, _hint: &TitleHint) -> Result<Vec<Stream>> {
        let url = format!(
            "{}/stream/{}/{}.json",
            self.base_url, fingerprint.content_type, fingerprint.content_id
        );
        debug!(addon = %self.display_name, %url, "fetching add-on streams");

        let value = self.fetch.get_json(&url, self.budget()).await?;
        let response: AddonStreamResponse =
            serde_json::from_value(value).map_err(|e| streamgate_core::GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        Ok(response
            .streams
            .into_iter()
            .filter_map(|raw| self.convert(raw))
            .collect())
    }
}

/// Add-on endpoints are configured by manifest URL; the stream resource
/// lives next to it.
fn base_from_manifest(manifest_url: &str) -> String {
    manifest_url
        .trim_end_matches("/manifest.json")
        .trim_end_matches('/')
        .to_string()
}

/// Torrent add-ons embed seeders in the title line as a glyph, e.g.
/// `"👤 150"`. Absent glyph means unknown, which normalizes to zero.
fn parse_seeders_glyph(title: &str) -> u32 {
    title
        .split('👤')
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_fetch::FetchConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetch() -> Arc<FetchClient> {
        Arc::new(FetchClient::new(FetchConfig::default()).unwrap())
    }

    #[test]
    fn base_url_strips_manifest_suffix() {
        assert_eq!(
            base_from_manifest("https://torrentio.strem.fun/manifest.json"),
            "https://torrentio.strem.fun"
        );
        assert_eq!(base_from_manifest("https://x.example/"), "https://x.example");
    }

    #[test]
    fn seeders_glyph_parses() {
        assert_eq!(parse_seeders_glyph("Movie 1080p\n👤 150 💾 1.2 GB"), 150);
        assert_eq!(parse_seeders_glyph("Movie 1080p"), 0);
    }

    #[tokio::test]
    async fn fetch_normalizes_and_drops_invalid_hashes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream/movie/tt14364480.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!({
                    "streams": [
                        {
                            "name": "Torrentio 1080p",
                            "title": "Movie.2024.1080p\n👤 88 💾 2 GB",
                            "infoHash": "AABBCCDDEEFF00112233445566778899AABBCCDD",
                            "sources": ["tracker:udp://tracker.example:1337", "dht:aabb"]
                        },
                        { "name": "bad", "title": "x", "infoHash": "nothex" },
                        { "name": "Direct", "title": "Movie 720p", "url": "https://cdn/x.mp4" }
                    ]
                })
                .to_string(),
            ))
            .mount(&server)
            .await;

        let connector = AddonStreamConnector::new(
            "Torrentio",
            &format!("{}/manifest.json", server.uri()),
            true,
            true,
            fetch(),
        );
        let fp = Fingerprint::new(ContentType::Movie, "tt14364480");
        let streams = connector.fetch(&fp, &TitleHint::default()).await.unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(
            streams[0].info_hash.as_ref().unwrap().as_str(),
            "aabbccddeeff00112233445566778899aabbccdd"
        );
        assert_eq!(streams[0].seeders, 88);
        assert_eq!(streams[0].quality, QualityTier::Hd1080);
        assert_eq!(streams[0].trackers, vec!["udp://tracker.example:1337"]);
        assert_eq!(streams[1].url.as_deref(), Some("https://cdn/x.mp4"));
    }
}
