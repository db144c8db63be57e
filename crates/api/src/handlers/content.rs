//! Catalog surfaces: discover, category pages, search, metadata

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::streams::stream_descriptors;
use crate::models::{DiscoverResponse, PageQuery, SearchQuery, SectionContent};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;
use streamgate_core::{ContentType, Fingerprint, TitleHint};
use streamgate_infrastructure::{AddonRecord, MetaItem, MetaPreview};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Streaming-service add-ons we bucket into their own home-page sections.
const SERVICE_NAMES: &[&str] = &[
    "Netflix",
    "HBO Max",
    "Disney+",
    "Hulu",
    "Prime Video",
    "Apple TV+",
    "Max",
];

/// Catalog names that are internal bookkeeping, not home-page sections.
const HIDDEN_CATALOGS: &[&str] = &["calendar-videos", "last-videos"];

const CATALOG_BUDGET: Duration = Duration::from_secs(12);
const SECTION_LIMIT: usize = 40;

fn section_for(record: &AddonRecord, catalog_type: &str, catalog_name: Option<&str>) -> Option<String> {
    if catalog_type == "tv" || catalog_type == "channel" {
        return Some("USA TV Channels".to_string());
    }

    let kind = match catalog_type {
        "movie" => "Movies",
        "series" => "Series",
        _ => return None,
    };

    if let Some(service) = SERVICE_NAMES
        .iter()
        .find(|service| record.manifest.name.contains(*service))
    {
        return Some(format!("{} {}", service, kind));
    }

    let label = catalog_name.unwrap_or("Popular");
    if HIDDEN_CATALOGS
        .iter()
        .any(|hidden| label.to_ascii_lowercase().contains(hidden))
    {
        return None;
    }
    Some(format!("{} {}", label, kind))
}

fn push_section(sections: &mut BTreeMap<String, SectionContent>, name: &str, catalog_type: &str, metas: Vec<MetaPreview>) {
    let section = sections.entry(name.to_string()).or_default();
    let bucket = match catalog_type {
        "movie" => &mut section.movies,
        "series" => &mut section.series,
        _ => &mut section.channels,
    };
    bucket.extend(metas);
    bucket.truncate(SECTION_LIMIT);
}

/// Build the home page: every catalog of every installed add-on, bucketed
/// by the add-on's semantic role. Catalog failures cost their section
/// nothing but a log line.
pub async fn discover_organized(
    State(state): State<AppState>,
    caller: AuthUser,
) -> ApiResult<Json<DiscoverResponse>> {
    let addons = state
        .addons
        .list_for_user(caller.id)
        .await
        .map_err(ApiError::Core)?;

    let mut tasks = Vec::new();
    for record in &addons {
        if !record.manifest.has_resource("catalog") {
            continue;
        }
        for catalog in &record.manifest.catalogs {
            let Some(section) =
                section_for(record, &catalog.content_type, catalog.name.as_deref())
            else {
                continue;
            };
            let metadata = state.metadata.clone();
            let base = record.manifest_url.clone();
            let catalog_type = catalog.content_type.clone();
            let catalog_id = catalog.id.clone();
            tasks.push(async move {
                let result = timeout(
                    CATALOG_BUDGET,
                    metadata.catalog_on(&base, &catalog_type, &catalog_id, None),
                )
                .await;
                match result {
                    Ok(Ok(metas)) => Some((section, catalog_type, metas)),
                    Ok(Err(e)) => {
                        warn!(%base, catalog = %catalog_id, error = %e, "catalog fetch failed");
                        None
                    }
                    Err(_) => {
                        warn!(%base, catalog = %catalog_id, "catalog fetch timed out");
                        None
                    }
                }
            });
        }
    }

    let mut sections = BTreeMap::new();
    for outcome in join_all(tasks).await.into_iter().flatten() {
        let (section, catalog_type, metas) = outcome;
        push_section(&mut sections, &section, &catalog_type, metas);
    }

    Ok(Json(DiscoverResponse { services: sections }))
}

/// Paginated catalog page. The section name is matched against the
/// installed add-ons' catalogs; unmatched names fall through to the
/// metadata service's own catalog ids.
pub async fn category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((section_name, content_type)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<MetaPreview>>> {
    let addons = state
        .addons
        .list_for_user(caller.id)
        .await
        .map_err(ApiError::Core)?;

    let wanted = section_name.to_ascii_lowercase();
    let matched = addons.iter().find_map(|record| {
        record.manifest.catalogs.iter().find_map(|catalog| {
            let matches_name = catalog
                .name
                .as_deref()
                .map(|name| name.eq_ignore_ascii_case(&section_name))
                .unwrap_or(false);
            if catalog.content_type == content_type && (matches_name || catalog.id == wanted) {
                Some((record.manifest_url.clone(), catalog.id.clone()))
            } else {
                None
            }
        })
    });

    let metas = match matched {
        Some((base, catalog_id)) => state
            .metadata
            .catalog_on(&base, &content_type, &catalog_id, page.skip)
            .await
            .map_err(ApiError::Core)?,
        None => state
            .metadata
            .catalog(&content_type, &wanted, page.skip)
            .await
            .map_err(ApiError::Core)?,
    };

    let limit = page.limit.unwrap_or(50);
    Ok(Json(metas.into_iter().take(limit).collect()))
}

/// Relevance buckets for title search, best first.
fn search_rank(query: &str, title: &str) -> Option<u8> {
    let query_lower = query.to_ascii_lowercase();
    let title_lower = title.to_ascii_lowercase();

    if title_lower == query_lower {
        return Some(0);
    }
    if title_lower.starts_with(&query_lower) {
        return Some(1);
    }
    if title_lower.contains(&query_lower) {
        return Some(2);
    }

    let significant: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|word| word.len() > 2)
        .collect();
    if !significant.is_empty() && significant.iter().all(|word| title_lower.contains(word)) {
        return Some(3);
    }
    None
}

/// How many top-ranked results get a stream-availability probe.
const PROBE_LIMIT: usize = 10;
const PROBE_BUDGET: Duration = Duration::from_secs(8);

/// Title search: fan out to the metadata service for both content types,
/// rank by match quality, then drop results that a quick probe shows have
/// no streams at all.
pub async fn search(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<MetaPreview>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let (movies, series) = tokio::join!(
        state.metadata.search(ContentType::Movie, q),
        state.metadata.search(ContentType::Series, q),
    );

    let mut ranked: Vec<(u8, MetaPreview)> = movies
        .unwrap_or_default()
        .into_iter()
        .chain(series.unwrap_or_default())
        .filter_map(|meta| search_rank(q, &meta.name).map(|rank| (rank, meta)))
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    let descriptors = stream_descriptors(&state, caller.id).await?;

    // probe the head of the ranking; a title with zero streams anywhere is
    // dead weight on a search page
    let probes = ranked.iter().take(PROBE_LIMIT).map(|(_, meta)| {
        let aggregator = state.aggregator.clone();
        let descriptors = descriptors.clone();
        let content_type = ContentType::parse(&meta.content_type).unwrap_or(ContentType::Movie);
        let fingerprint = Fingerprint::new(content_type, meta.id.clone());
        let hint = TitleHint {
            title: Some(meta.name.clone()),
            year: meta.year(),
        };
        async move {
            timeout(
                PROBE_BUDGET,
                aggregator.aggregate(&fingerprint, &descriptors, &hint),
            )
            .await
            .map(|streams| !streams.is_empty())
            .unwrap_or(true)
        }
    });
    let has_streams = join_all(probes).await;

    let results: Vec<MetaPreview> = ranked
        .into_iter()
        .enumerate()
        .filter_map(|(index, (_, meta))| {
            if index < has_streams.len() && !has_streams[index] {
                debug!(title = %meta.name, "dropping search result with no streams");
                None
            } else {
                Some(meta)
            }
        })
        .collect();
    Ok(Json(results))
}

/// Metadata passthrough with episode normalization for series.
pub async fn meta(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path((content_type, content_id)): Path<(String, String)>,
) -> ApiResult<Json<MetaItem>> {
    let content_type = ContentType::parse(&content_type).ok_or_else(|| ApiError::BadRequest {
        message: format!("unknown content type '{}'", content_type),
    })?;
    let item = state
        .metadata
        .meta(content_type, &content_id)
        .await
        .map_err(ApiError::Core)?;
    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_rank_buckets() {
        assert_eq!(search_rank("dune", "Dune"), Some(0));
        assert_eq!(search_rank("dune", "Dune: Part Two"), Some(1));
        assert_eq!(search_rank("part two", "Dune: Part Two"), Some(2));
        assert_eq!(search_rank("dune part", "Part of the Dune saga"), Some(3));
        assert_eq!(search_rank("alien", "Dune"), None);
    }

    #[test]
    fn short_words_are_not_significant() {
        // "of" and "is" are too short to count as significant words
        assert_eq!(search_rank("of is dune", "Dune"), Some(3));
    }
}
