//! Generic piratebay-style q.php free-text index

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
struct QphpEntry {
    id: String,
    name: String,
    info_hash: String,
    /// Serialized as a string by the API.
    seeders: String,
    #[serde(default)]
    size: Option<String>,
}

/// Built-in free-text index with the q.php API's quirks folded in: a
/// sentinel "no results" row, string-typed numerics, and queries that work
/// best with the year attached but sometimes only without it.
pub struct FreeTextConnector {
    display_name: String,
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl FreeTextConnector {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            display_name: "PirateBay".to_string(),
            base_url: base_url.into(),
            fetch,
        }
    }

    /// The three-tier retry ladder. Later tiers only run when the previous
    /// one matched nothing.
    fn query_tiers(title: &str, year: Option<i32>) -> Vec<String> {
        let full = match year {
            Some(y) => format!("{} {}", title, y),
            None => title.to_string(),
        };

        let head = first_words(&full, 5);
        let mut tiers = vec![head.clone()];

        let tokens: Vec<&str> = head.split_whitespace().collect();
        if let Some(last) = tokens.last() {
            if last.len() == 4 && last.chars().all(|c| c.is_ascii_digit()) {
                let without_year = tokens[..tokens.len() - 1].join(" ");
                tiers.push(first_words(&without_year, 4));
            }
        }

        tiers.push(first_words(title, 3));
        tiers.dedup();
        tiers
    }

    async fn query_once(&self, query: &str) -> Result<Vec<Stream>> {
        let url = format!(
            "{}?q={}&cat=200",
            self.base_url,
            urlencoding::encode(query)
        );
        debug!(%url, "querying free-text index");

        let value = self.fetch.get_json(&url, Duration::from_secs(10)).await?;
        let entries: Vec<QphpEntry> =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: self.display_name.clone(),
                detail: e.to_string(),
            })?;

        // id == "0" on the first row is the API's "no match" sentinel
        if entries.first().map(|e| e.id.as_str()) == Some("0") {
            return Ok(Vec::new());
        }

        let mut streams = Vec::new();
        for entry in entries {
            let seeders: u32 = entry.seeders.parse().unwrap_or(0);
            if seeders == 0 {
                continue;
            }
            let Ok(info_hash) = InfoHash::parse(&entry.info_hash) else {
                continue;
            };
            let display_title = match entry.size.as_deref().and_then(|s| s.parse::<u64>().ok()) {
                Some(bytes) => format!("{} ({:.2} GB)", entry.name, bytes as f64 / 1e9),
                None => entry.name.clone(),
            };
            streams.push(
                Stream::magnet(info_hash, entry.name.clone())
                    .with_quality(QualityTier::from_title(&entry.name))
                    .with_seeders(seeders)
                    .with_display_title(display_title),
            );
        }
        Ok(streams)
    }
}

#[async_trait]
impl SourceConnector for FreeTextConnector {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn supports(&self, content_type: ContentType) -> bool {
        matches!(content_type, ContentType::Movie | ContentType::Series)
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, hint: &TitleHint) -> Result<Vec<Stream>> {
        // Episodes search by "{title} SxxEyy"; the year ladder only applies
        // to base-title queries.
        let (queries, year) = match fingerprint.episode() {
            Some((season, episode)) => match hint.episode_query(season, episode) {
                Some(q) => (vec![q], None),
                None => return Ok(Vec::new()),
            },
            None => match hint.title.as_deref() {
                Some(title) => (vec![title.to_string()], hint.year),
                None => return Ok(Vec::new()),
            },
        };

        for base in &queries {
            for query in Self::query_tiers(base, year) {
                let streams = self.query_once(&query).await?;
                if !streams.is_empty() {
                    return Ok(streams);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_fetch::FetchConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn tiers_include_year_then_drop_it() {
        let tiers = FreeTextConnector::query_tiers("Wake Up Dead Man: A Knives Out Mystery", Some(2025));
        assert_eq!(tiers[0], "Wake Up Dead Man: A");
        // last token of tier 0 input is the year only when the title is short
        let short = FreeTextConnector::query_tiers("The Holdovers", Some(2023));
        assert_eq!(short[0], "The Holdovers 2023");
        assert_eq!(short[1], "The Holdovers");
        assert_eq!(*short.last().unwrap(), "The Holdovers");
    }

    #[test]
    fn tiers_without_year() {
        let tiers = FreeTextConnector::query_tiers("Oppenheimer", None);
        assert_eq!(tiers, vec!["Oppenheimer".to_string()]);
    }

    #[tokio::test]
    async fn sentinel_row_means_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/q.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!([
                    {"id": "0", "name": "No results returned", "info_hash": "0".repeat(40), "seeders": "0"}
                ])
                .to_string(),
            ))
            .mount(&server)
            .await;

        let connector = FreeTextConnector::new(
            format!("{}/q.php", server.uri()),
            Arc::new(FetchClient::new(FetchConfig::default()).unwrap()),
        );
        let fp = Fingerprint::new(ContentType::Movie, "tt1");
        let hint = TitleHint::new("Nonexistent", None);
        let streams = connector.fetch(&fp, &hint).await.unwrap();
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn keeps_only_seeded_entries_and_builds_episode_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/q.php"))
            .and(query_param("q", "Game of Thrones S02E03"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                serde_json::json!([
                    {"id": "1", "name": "Game of Thrones S02E03 1080p", "info_hash": "E".repeat(40), "seeders": "50", "size": "2000000000"},
                    {"id": "2", "name": "Game of Thrones S02E03 dead", "info_hash": "F".repeat(40), "seeders": "0"}
                ])
                .to_string(),
            ))
            .mount(&server)
            .await;

        let connector = FreeTextConnector::new(
            format!("{}/q.php", server.uri()),
            Arc::new(FetchClient::new(FetchConfig::default()).unwrap()),
        );
        let fp = Fingerprint::new(ContentType::Series, "tt0944947:2:3");
        let hint = TitleHint::new("Game of Thrones", Some(2011));
        let streams = connector.fetch(&fp, &hint).await.unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].seeders, 50);
    }
}
