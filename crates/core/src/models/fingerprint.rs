//! Content fingerprints: the lookup key for one title

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Movie,
    Series,
    Tv,
}

impl ContentType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "movie" | "movies" => Some(ContentType::Movie),
            "series" | "show" | "shows" => Some(ContentType::Series),
            "tv" | "channel" | "channels" => Some(ContentType::Tv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
            ContentType::Tv => "tv",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(content_type, content_id)` pair identifying one title.
///
/// Series ids may carry a `:{season}:{episode}` suffix; `base_id` strips it
/// when resolving base metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub content_type: ContentType,
    pub content_id: String,
}

impl Fingerprint {
    pub fn new(content_type: ContentType, content_id: impl Into<String>) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
        }
    }

    /// The id with any `:s:e` suffix stripped.
    pub fn base_id(&self) -> &str {
        match self.episode() {
            Some(_) => self.content_id.split(':').next().unwrap_or(&self.content_id),
            None => &self.content_id,
        }
    }

    /// Parse a `{imdb}:{season}:{episode}` id, if this is one.
    pub fn episode(&self) -> Option<(u32, u32)> {
        let mut parts = self.content_id.split(':');
        let _imdb = parts.next()?;
        let season = parts.next()?.parse().ok()?;
        let episode = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((season, episode))
    }

    /// True when the id itself is a playable URL (direct-resolver routing).
    pub fn is_url_id(&self) -> bool {
        self.content_id.starts_with("http://") || self.content_id.starts_with("https://")
    }

    /// True for live TV channel ids (`ustv*`).
    pub fn is_tv_channel(&self) -> bool {
        self.content_id.starts_with("ustv")
    }
}

/// Best-effort title metadata injected by the orchestration layer.
///
/// An empty hint means the metadata service could not be reached; the
/// built-in free-text connectors are skipped in that case.
#[derive(Debug, Clone, Default)]
pub struct TitleHint {
    pub title: Option<String>,
    pub year: Option<i32>,
}

impl TitleHint {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: Some(title.into()),
            year,
        }
    }

    /// Search query for an episode: `"{title} S{ss}E{ee}"`.
    pub fn episode_query(&self, season: u32, episode: u32) -> Option<String> {
        self.title
            .as_ref()
            .map(|t| format!("{} S{:02}E{:02}", t, season, episode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_id_strips_episode_suffix() {
        let fp = Fingerprint::new(ContentType::Series, "tt0944947:2:3");
        assert_eq!(fp.base_id(), "tt0944947");
        assert_eq!(fp.episode(), Some((2, 3)));
    }

    #[test]
    fn movie_id_passes_through() {
        let fp = Fingerprint::new(ContentType::Movie, "tt14364480");
        assert_eq!(fp.base_id(), "tt14364480");
        assert_eq!(fp.episode(), None);
    }

    #[test]
    fn episode_query_is_zero_padded() {
        let hint = TitleHint::new("Game of Thrones", Some(2011));
        assert_eq!(
            hint.episode_query(2, 3).as_deref(),
            Some("Game of Thrones S02E03")
        );
    }

    #[test]
    fn url_and_tv_routing_flags() {
        assert!(Fingerprint::new(ContentType::Movie, "https://cdn/x.mp4").is_url_id());
        assert!(Fingerprint::new(ContentType::Tv, "ustv-cbs").is_tv_channel());
        assert!(!Fingerprint::new(ContentType::Movie, "tt123").is_url_id());
    }
}
