//! Catalog-metadata service client (Cinemeta protocol)

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{ContentType, Fingerprint, GatewayError, Result, TitleHint};
use streamgate_fetch::FetchClient;
use tracing::{debug, warn};

/// Catalog row: enough to render a poster grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, rename = "releaseInfo", skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetaPreview {
    /// First 4-digit run of the release info, e.g. `"2011-2019"` -> 2011.
    pub fn year(&self) -> Option<i32> {
        let info = self.release_info.as_deref()?;
        let digits: String = info.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }
}

/// One episode of a series, normalized from the meta `videos` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub season: u32,
    pub episode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MetaVideo {
    id: String,
    #[serde(default)]
    season: Option<u32>,
    #[serde(default)]
    episode: Option<u32>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    released: Option<String>,
}

/// Full title metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "releaseInfo", skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    metas: Vec<MetaPreview>,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    meta: serde_json::Value,
}

/// Client for the catalog-metadata HTTP service. Also reused against any
/// add-on base that serves the same catalog protocol.
pub struct MetadataClient {
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fetch,
        }
    }

    pub async fn search(&self, content_type: ContentType, query: &str) -> Result<Vec<MetaPreview>> {
        let url = format!(
            "{}/catalog/{}/top/search={}.json",
            self.base_url,
            content_type,
            urlencoding::encode(query)
        );
        let value = self.fetch.get_json(&url, Duration::from_secs(10)).await?;
        let response: CatalogResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: "metadata".to_string(),
                detail: e.to_string(),
            })?;
        Ok(response.metas)
    }

    /// Paginated catalog fetch from this service's base.
    pub async fn catalog(
        &self,
        content_type: &str,
        catalog_id: &str,
        skip: Option<u32>,
    ) -> Result<Vec<MetaPreview>> {
        self.catalog_on(&self.base_url, content_type, catalog_id, skip)
            .await
    }

    /// Catalog fetch against an arbitrary add-on base (discover surfaces).
    pub async fn catalog_on(
        &self,
        base_url: &str,
        content_type: &str,
        catalog_id: &str,
        skip: Option<u32>,
    ) -> Result<Vec<MetaPreview>> {
        let base = base_url.trim_end_matches("/manifest.json").trim_end_matches('/');
        let url = match skip {
            Some(skip) if skip > 0 => format!(
                "{}/catalog/{}/{}/skip={}.json",
                base, content_type, catalog_id, skip
            ),
            _ => format!("{}/catalog/{}/{}.json", base, content_type, catalog_id),
        };
        debug!(%url, "fetching catalog");
        let value = self.fetch.get_json(&url, Duration::from_secs(15)).await?;
        let response: CatalogResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: "catalog".to_string(),
                detail: e.to_string(),
            })?;
        Ok(response.metas)
    }

    /// Full metadata for one title, with the series `videos` array
    /// normalized into an episode list.
    pub async fn meta(&self, content_type: ContentType, content_id: &str) -> Result<MetaItem> {
        let url = format!(
            "{}/meta/{}/{}.json",
            self.base_url, content_type, content_id
        );
        let value = self.fetch.get_json(&url, Duration::from_secs(10)).await?;
        let response: MetaResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: "metadata".to_string(),
                detail: e.to_string(),
            })?;
        parse_meta(response.meta)
    }

    /// Best-effort title hint for torrent queries. A miss is empty, never
    /// an error: the aggregator still runs add-on connectors without it.
    pub async fn title_hint(&self, fingerprint: &Fingerprint) -> TitleHint {
        let lookup_type = match fingerprint.content_type {
            ContentType::Tv => return TitleHint::default(),
            other => other,
        };
        match self.meta(lookup_type, fingerprint.base_id()).await {
            Ok(meta) => {
                let year = meta
                    .release_info
                    .as_deref()
                    .map(|info| info.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
                    .filter(|digits| digits.len() == 4)
                    .and_then(|digits| digits.parse().ok());
                TitleHint {
                    title: Some(meta.name),
                    year,
                }
            }
            Err(e) => {
                warn!(content_id = %fingerprint.content_id, error = %e, "title hint lookup failed");
                TitleHint::default()
            }
        }
    }
}

fn parse_meta(value: serde_json::Value) -> Result<MetaItem> {
    #[derive(Deserialize)]
    struct RawMeta {
        id: String,
        #[serde(rename = "type")]
        content_type: String,
        name: String,
        #[serde(default)]
        poster: Option<String>,
        #[serde(default)]
        background: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default, rename = "releaseInfo")]
        release_info: Option<String>,
        #[serde(default)]
        videos: Vec<MetaVideo>,
    }

    let raw: RawMeta = serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
        source_tag: "metadata".to_string(),
        detail: e.to_string(),
    })?;

    let mut episodes: Vec<Episode> = raw
        .videos
        .into_iter()
        .filter_map(|video| {
            Some(Episode {
                season: video.season?,
                episode: video.episode?,
                title: video.name.or(video.title),
                released: video.released,
                id: video.id,
            })
        })
        .collect();
    episodes.sort_by_key(|e| (e.season, e.episode));

    Ok(MetaItem {
        id: raw.id,
        content_type: raw.content_type,
        name: raw.name,
        poster: raw.poster,
        background: raw.background,
        description: raw.description,
        release_info: raw.release_info,
        episodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_fetch::FetchConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> MetadataClient {
        MetadataClient::new(
            base,
            Arc::new(FetchClient::new(FetchConfig::default()).unwrap()),
        )
    }

    #[tokio::test]
    async fn meta_normalizes_episodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/series/tt0944947.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!({
                    "meta": {
                        "id": "tt0944947",
                        "type": "series",
                        "name": "Game of Thrones",
                        "releaseInfo": "2011-2019",
                        "videos": [
                            {"id": "tt0944947:2:3", "season": 2, "episode": 3, "name": "What Is Dead May Never Die"},
                            {"id": "tt0944947:1:1", "season": 1, "episode": 1, "title": "Winter Is Coming"},
                            {"id": "tt0944947:0:1", "season": 0, "episode": 1, "name": "Special"},
                            {"id": "trailer", "name": "Trailer"}
                        ]
                    }
                })
                .to_string(),
            ))
            .mount(&server)
            .await;

        let meta = client(&server.uri())
            .meta(ContentType::Series, "tt0944947")
            .await
            .unwrap();
        assert_eq!(meta.episodes.len(), 3);
        assert_eq!(meta.episodes[0].season, 0);
        assert_eq!(meta.episodes[1].title.as_deref(), Some("Winter Is Coming"));
        assert_eq!(meta.episodes[2].episode, 3);
    }

    #[tokio::test]
    async fn title_hint_resolves_name_and_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/series/tt0944947.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!({
                    "meta": {
                        "id": "tt0944947",
                        "type": "series",
                        "name": "Game of Thrones",
                        "releaseInfo": "2011-2019"
                    }
                })
                .to_string(),
            ))
            .mount(&server)
            .await;

        let fp = Fingerprint::new(ContentType::Series, "tt0944947:2:3");
        let hint = client(&server.uri()).title_hint(&fp).await;
        assert_eq!(hint.title.as_deref(), Some("Game of Thrones"));
        assert_eq!(hint.year, Some(2011));
    }

    #[tokio::test]
    async fn title_hint_failure_is_empty() {
        let fp = Fingerprint::new(ContentType::Movie, "tt1");
        let hint = client("http://127.0.0.1:1").title_hint(&fp).await;
        assert!(hint.title.is_none());
    }
}
