//! Movie torrent index with a simple-query API (YTS protocol)

use crate::connector::{first_words, SourceConnector};
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
struct ListMoviesResponse {
    status: String,
    data: Option<ListMoviesData>,
}

#[derive(Debug, Deserialize)]
struct ListMoviesData {
    #[serde(default)]
    movie_count: i64,
    #[serde(default)]
    movies: Vec<IndexedMovie>,
}

#[derive(Debug, Deserialize)]
struct IndexedMovie {
    title: String,
    #[serde(default)]
    torrents: Vec<IndexedTorrent>,
}

#[derive(Debug, Deserialize)]
struct IndexedTorrent {
    hash: String,
    quality: String,
    #[serde(default)]
    seeds: u32,
    #[serde(default)]
    size: Option<String>,
}

/// Built-in movie index: one stream per (quality, hash) pair the API lists.
pub struct MovieIndexConnector {
    display_name: String,
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl MovieIndexConnector {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            display_name: "YTS".to_string(),
            base_url: base_url.into(),
            fetch,
        }
    }
}

#[async_trait]
impl SourceConnector for MovieIndexConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        content_type == ContentType::Movie
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(12)
    }

    async fn fetch(&self, _fingerprint: &Fingerprint, hint: &TitleHint) -> Result<Vec<Stream>> {
        let Some(title) = hint.title.as_deref() else {
            return Ok(Vec::new());
        };
        let query = first_words(title, 3);
        let url = format!(
            "{}?query_term={}&limit=20",
            self.base_url,
            urlencoding::encode(&query)
        );
        debug!(%url, "querying movie index");

        let value = self.fetch.get_json(&url, self.budget()).await?;
        let response: ListMoviesResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        if response.status != "ok" {
            return Err(GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: format!("status {}", response.status),
            });
        }

        let Some(data) = response.data else {
            return Ok(Vec::new());
        };
        if data.movie_count == 0 {
            return Ok(Vec::new());
        }

        let mut streams = Vec::new();
        for movie in data.movies {
            for torrent in movie.torrents {
                let Ok(info_hash) = InfoHash::parse(&torrent.hash) else {
                    continue;
                };
                let display_title = match &torrent.size {
                    Some(size) => format!("{} [{}] {}", movie.title, torrent.quality, size),
                    None => format!("{} [{}]", movie.title, torrent.quality),
                };
                streams.push(
                    Stream::magnet(info_hash, movie.title.clone())
                        .with_quality(QualityTier::from_title(&torrent.quality))
                        .with_seeders(torrent.seeds)
                        .with_display_title(display_title),
                );
            }
        }
        Ok(streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_fetch::FetchConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn emits_one_stream_per_quality_hash_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .and(query_param("query_term", "The Holdovers"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!({
                    "status": "ok",
                    "data": {
                        "movie_count": 1,
                        "movies": [{
                            "title": "The Holdovers",
                            "torrents": [
                                {"hash": "A".repeat(40), "quality": "1080p", "seeds": 120},
                                {"hash": "B".repeat(40), "quality": "720p", "seeds": 60},
                                {"hash": "short", "quality": "2160p", "seeds": 5}
                            ]
                        }]
                    }
                })
                .to_string(),
            ))
            .mount(&server)
            .await;

        let connector = MovieIndexConnector::new(
            format!("{}/list", server.uri()),
            Arc::new(FetchClient::new(FetchConfig::default()).unwrap()),
        );
        let fp = Fingerprint::new(ContentType::Movie, "tt14849194");
        let hint = TitleHint::new("The Holdovers", Some(2023));
        let streams = connector.fetch(&fp, &hint).await.unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].quality, QualityTier::Hd1080);
        assert_eq!(streams[0].seeders, 120);
        assert_eq!(streams[1].quality, QualityTier::Hd720);
    }

    #[tokio::test]
    async fn no_title_hint_yields_empty() {
        let connector = MovieIndexConnector::new(
            "http://127.0.0.1:1/list",
            Arc::new(FetchClient::new(FetchConfig::default()).unwrap()),
        );
        let fp = Fingerprint::new(ContentType::Movie, "tt1");
        let streams = connector.fetch(&fp, &TitleHint::default()).await.unwrap();
        assert!(streams.is_empty());
    }
}
