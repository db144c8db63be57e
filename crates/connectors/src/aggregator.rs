//! Fan-out aggregation: merge, dedupe, rank

use crate::{
    connector::SourceConnector, AddonStreamConnector, FreeTextConnector, MovieIndexConnector,
    SeriesIndexConnector,
};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use streamgate_core::{ContentType, Fingerprint, SourceDescriptor, SourceEndpoint, Stream, TitleHint};
use streamgate_fetch::FetchClient;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Base URLs of the built-in indexers.
#[derive(Debug, Clone)]
pub struct BuiltinEndpoints {
    pub movie_index: String,
    pub series_index: String,
    pub free_text: String,
}

impl Default for BuiltinEndpoints {
    fn default() -> Self {
        Self {
            movie_index: "https://yts.mx/api/v2/list_movies.json".to_string(),
            series_index: "https://eztvx.to/api/get-torrents".to_string(),
            free_text: "https://apibay.org/q.php".to_string(),
        }
    }
}

/// Static descriptors for the built-in indexers, for surfaces that list
/// sources. Add-on descriptors come from the store.
pub fn builtin_descriptors() -> Vec<SourceDescriptor> {
    let builtin = |id: &str, name: &str, movies: bool, series: bool| SourceDescriptor {
        id: id.to_string(),
        display_name: name.to_string(),
        supports_movies: movies,
        supports_series: series,
        endpoint: SourceEndpoint::Builtin { tag: id.to_string() },
        requires_protection_bypass: id == "apibay",
    };
    vec![
        builtin("yts", "YTS", true, false),
        builtin("eztv", "EZTV", false, true),
        builtin("apibay", "PirateBay", true, true),
    ]
}

/// Fans out one stream request across every configured source and merges
/// the results.
pub struct StreamAggregator {
    fetch: Arc<FetchClient>,
    endpoints: BuiltinEndpoints,
}

impl StreamAggregator {
    pub fn new(fetch: Arc<FetchClient>, endpoints: BuiltinEndpoints) -> Self {
        Self { fetch, endpoints }
    }

    /// Aggregate streams for a fingerprint across the caller's add-ons plus
    /// the built-in indexers for that content type.
    ///
    /// Partial failure is the normal case: a connector that errors or
    /// overruns its budget contributes nothing. The merged order depends
    /// only on the task-definition order, never on completion order.
    pub async fn aggregate(
        &self,
        fingerprint: &Fingerprint,
        addons: &[SourceDescriptor],
        hint: &TitleHint,
    ) -> Vec<Stream> {
        let connectors = self.build_task_set(fingerprint.content_type, addons, hint);
        debug!(
            content_id = %fingerprint.content_id,
            tasks = connectors.len(),
            "starting stream aggregation"
        );

        let streams = run_fan_out(connectors, fingerprint, hint).await;
        let deduped = dedup_streams(streams);
        let ranked = rank_streams(deduped);

        info!(
            content_id = %fingerprint.content_id,
            results = ranked.len(),
            "stream aggregation complete"
        );
        ranked
    }

    fn build_task_set(
        &self,
        content_type: ContentType,
        addons: &[SourceDescriptor],
        hint: &TitleHint,
    ) -> Vec<Arc<dyn SourceConnector>> {
        let mut connectors: Vec<Arc<dyn SourceConnector>> = Vec::new();

        for descriptor in addons {
            if !descriptor.supports(content_type) {
                continue;
            }
            if let SourceEndpoint::Manifest { base_url } = &descriptor.endpoint {
                connectors.push(Arc::new(AddonStreamConnector::new(
                    descriptor.display_name.clone(),
                    base_url,
                    descriptor.supports_movies,
                    descriptor.supports_series,
                    self.fetch.clone(),
                )));
            }
        }

        match content_type {
            ContentType::Movie => {
                if hint.title.is_some() {
                    connectors.push(Arc::new(MovieIndexConnector::new(
                        self.endpoints.movie_index.clone(),
                        self.fetch.clone(),
                    )));
                    connectors.push(Arc::new(FreeTextConnector::new(
                        self.endpoints.free_text.clone(),
                        self.fetch.clone(),
                    )));
                }
            }
            ContentType::Series => {
                connectors.push(Arc::new(SeriesIndexConnector::new(
                    self.endpoints.series_index.clone(),
                    self.fetch.clone(),
                )));
                if hint.title.is_some() {
                    connectors.push(Arc::new(FreeTextConnector::new(
                        self.endpoints.free_text.clone(),
                        self.fetch.clone(),
                    )));
                }
            }
            ContentType::Tv => {}
        }

        connectors
    }
}

/// Run every connector in parallel under its own budget; collect results in
/// task-definition order. Errors and overruns become empty contributions.
pub(crate) async fn run_fan_out(
    connectors: Vec<Arc<dyn SourceConnector>>,
    fingerprint: &Fingerprint,
    hint: &TitleHint,
) -> Vec<Stream> {
    let tasks = connectors.into_iter().map(|connector| {
        let fingerprint = fingerprint.clone();
        let hint = hint.clone();
        async move {
            let tag = connector.display_name().to_string();
            let budget = connector.budget();
            let handle = tokio::spawn(async move {
                let inner_tag = connector.display_name().to_string();
                match timeout(budget, connector.fetch(&fingerprint, &hint)).await {
                    Ok(Ok(streams)) => streams,
                    Ok(Err(e)) => {
                        warn!(source = %inner_tag, error = %e, "connector failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(source = %inner_tag, ?budget, "connector deadline elapsed");
                        Vec::new()
                    }
                }
            });
            let mut streams = handle.await.unwrap_or_default();
            for stream in &mut streams {
                stream.source_tag = tag.clone();
            }
            streams
        }
    });

    join_all(tasks).await.into_iter().flatten().collect()
}

/// Group by info-hash, first occurrence wins. Streams without a hash
/// (direct URLs) always pass through.
pub fn dedup_streams(streams: Vec<Stream>) -> Vec<Stream> {
    let mut seen: HashSet<String> = HashSet::new();
    streams
        .into_iter()
        .filter(|stream| match &stream.info_hash {
            Some(hash) => seen.insert(hash.as_str().to_string()),
            None => true,
        })
        .collect()
}

/// Stable sort descending by score, so equal scores keep connector order.
pub fn rank_streams(mut streams: Vec<Stream>) -> Vec<Stream> {
    streams.sort_by(|a, b| b.score().cmp(&a.score()));
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use streamgate_core::{InfoHash, QualityTier, Result};

    fn hashed(c: char, quality: QualityTier, seeders: u32) -> Stream {
        Stream::magnet(
            InfoHash::parse(&c.to_string().repeat(40)).unwrap(),
            format!("s-{}", c),
        )
        .with_quality(quality)
        .with_seeders(seeders)
    }

    /// Scenario: mixed tiers and seeders rank by tier first.
    #[test]
    fn ranking_orders_by_tier_then_seeders() {
        let input = vec![
            hashed('1', QualityTier::Hd1080, 100),
            hashed('2', QualityTier::Uhd4k, 5),
            hashed('3', QualityTier::Hd720, 500),
            hashed('4', QualityTier::Sd, 9999),
            hashed('5', QualityTier::Hd1080, 100),
        ];
        let ranked = rank_streams(dedup_streams(input));
        let got: Vec<(QualityTier, u32)> =
            ranked.iter().map(|s| (s.quality, s.seeders)).collect();
        assert_eq!(
            got,
            vec![
                (QualityTier::Uhd4k, 5),
                (QualityTier::Hd1080, 100),
                (QualityTier::Hd1080, 100),
                (QualityTier::Hd720, 500),
                (QualityTier::Sd, 9999),
            ]
        );
        // stable within the equal-score bucket
        assert_eq!(ranked[1].display_name, "s-1");
        assert_eq!(ranked[2].display_name, "s-5");
    }

    /// Scenario: same hash from two connectors, first wins even with fewer
    /// seeders.
    #[test]
    fn dedup_is_first_wins() {
        let first = hashed('a', QualityTier::Hd1080, 50);
        let second = hashed('a', QualityTier::Hd1080, 80);
        let deduped = dedup_streams(vec![first, second]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].seeders, 50);
    }

    #[test]
    fn builtin_descriptors_cover_both_content_types() {
        let builtins = builtin_descriptors();
        assert!(builtins.iter().any(|d| d.supports(ContentType::Movie)));
        assert!(builtins.iter().any(|d| d.supports(ContentType::Series)));
        // built-ins never fan out for TV channels
        assert!(builtins.iter().all(|d| !d.supports(ContentType::Tv)));
        assert!(builtins
            .iter()
            .all(|d| matches!(d.endpoint, SourceEndpoint::Builtin { .. })));
    }

    #[test]
    fn dedup_never_touches_direct_urls() {
        let a = Stream::direct("https://cdn/a.mp4", "a");
        let b = Stream::direct("https://cdn/a.mp4", "b");
        assert_eq!(dedup_streams(vec![a, b]).len(), 2);
    }

    #[test]
    fn all_hashes_distinct_after_dedup() {
        let input = vec![
            hashed('a', QualityTier::Hd720, 1),
            hashed('b', QualityTier::Hd720, 2),
            hashed('a', QualityTier::Uhd4k, 3),
            hashed('c', QualityTier::Sd, 4),
            hashed('b', QualityTier::Hd1080, 5),
        ];
        let out = dedup_streams(input);
        let mut hashes: Vec<&str> = out
            .iter()
            .filter_map(|s| s.info_hash.as_ref().map(|h| h.as_str()))
            .collect();
        let before = hashes.len();
        hashes.sort();
        hashes.dedup();
        assert_eq!(before, hashes.len());
    }

    struct FixedConnector {
        name: String,
        delay: Duration,
        streams: Vec<Stream>,
        budget: Duration,
    }

    #[async_trait]
    impl SourceConnector for FixedConnector {
        fn display_name(&self) -> &str {
            &self.name
        }
        fn supports(&self, _ct: ContentType) -> bool {
            true
        }
        fn budget(&self) -> Duration {
            self.budget
        }
        async fn fetch(&self, _fp: &Fingerprint, _hint: &TitleHint) -> Result<Vec<Stream>> {
            tokio::time::sleep(self.delay).await;
            Ok(self.streams.clone())
        }
    }

    /// Output order is task-definition order regardless of which connector
    /// finishes first.
    #[tokio::test]
    async fn merge_order_ignores_completion_order() {
        let slow = Arc::new(FixedConnector {
            name: "slow".into(),
            delay: Duration::from_millis(80),
            streams: vec![hashed('a', QualityTier::Hd720, 10)],
            budget: Duration::from_secs(1),
        });
        let fast = Arc::new(FixedConnector {
            name: "fast".into(),
            delay: Duration::from_millis(1),
            streams: vec![hashed('b', QualityTier::Hd720, 10)],
            budget: Duration::from_secs(1),
        });

        let fp = Fingerprint::new(ContentType::Movie, "tt1");
        let merged = run_fan_out(vec![slow, fast], &fp, &TitleHint::default()).await;
        assert_eq!(merged[0].source_tag, "slow");
        assert_eq!(merged[1].source_tag, "fast");
    }

    /// A connector past its deadline contributes nothing and poisons
    /// nothing.
    #[tokio::test]
    async fn deadline_overrun_contributes_nothing() {
        let hung = Arc::new(FixedConnector {
            name: "hung".into(),
            delay: Duration::from_secs(30),
            streams: vec![hashed('a', QualityTier::Uhd4k, 10)],
            budget: Duration::from_millis(20),
        });
        let ok = Arc::new(FixedConnector {
            name: "ok".into(),
            delay: Duration::from_millis(1),
            streams: vec![hashed('b', QualityTier::Hd720, 10)],
            budget: Duration::from_secs(1),
        });

        let fp = Fingerprint::new(ContentType::Movie, "tt1");
        let merged = run_fan_out(vec![hung, ok], &fp, &TitleHint::default()).await;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_tag, "ok");
    }
}
