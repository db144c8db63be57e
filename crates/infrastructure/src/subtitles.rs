//! Subtitles add-on client
//!
//! The gateway only lists available tracks; rendering is the player's
//! problem. Results are collapsed to one entry per language, English
//! first, then alphabetical.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use streamgate_core::{Fingerprint, GatewayError, Result};
use streamgate_fetch::FetchClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub id: String,
    pub lang: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SubtitlesResponse {
    #[serde(default)]
    subtitles: Vec<SubtitleTrack>,
}

pub struct SubtitlesClient {
    base_url: String,
    fetch: Arc<FetchClient>,
}

impl SubtitlesClient {
    pub fn new(base_url: impl Into<String>, fetch: Arc<FetchClient>) -> Self {
        Self {
            base_url: base_url
                .into()
                .trim_end_matches("/manifest.json")
                .trim_end_matches('/')
                .to_string(),
            fetch,
        }
    }

    pub async fn list(&self, fingerprint: &Fingerprint) -> Result<Vec<SubtitleTrack>> {
        let url = format!(
            "{}/subtitles/{}/{}.json",
            self.base_url, fingerprint.content_type, fingerprint.content_id
        );
        let value = self.fetch.get_json(&url, Duration::from_secs(10)).await?;
        let response: SubtitlesResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::UpstreamMalformed {
                source_tag: "subtitles".to_string(),
                detail: e.to_string(),
            })?;
        Ok(normalize(response.subtitles))
    }
}

/// One track per language; English leads, the rest alphabetical.
fn normalize(tracks: Vec<SubtitleTrack>) -> Vec<SubtitleTrack> {
    let mut by_lang: BTreeMap<String, SubtitleTrack> = BTreeMap::new();
    for track in tracks {
        by_lang.entry(track.lang.to_ascii_lowercase()).or_insert(track);
    }

    let english = by_lang
        .remove("eng")
        .or_else(|| by_lang.remove("en"))
        .or_else(|| by_lang.remove("english"));

    let mut ordered: Vec<SubtitleTrack> = english.into_iter().collect();
    ordered.extend(by_lang.into_values());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, id: &str) -> SubtitleTrack {
        SubtitleTrack {
            id: id.to_string(),
            lang: lang.to_string(),
            url: format!("https://subs.example/{}.srt", id),
        }
    }

    #[test]
    fn one_track_per_language_english_first() {
        let tracks = vec![
            track("ger", "1"),
            track("eng", "2"),
            track("eng", "3"),
            track("fre", "4"),
            track("ger", "5"),
        ];
        let normalized = normalize(tracks);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].lang, "eng");
        assert_eq!(normalized[0].id, "2");
        assert_eq!(normalized[1].lang, "fre");
        assert_eq!(normalized[2].lang, "ger");
    }
}
