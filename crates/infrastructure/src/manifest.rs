//! Add-on manifest model and the static fallback table

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Catalog declared by an add-on manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestCatalog {
    #[serde(rename = "type")]
    pub content_type: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A validated add-on manifest. `id` and `name` are the only hard
/// requirements; the rest is carried through for catalog surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonManifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
    #[serde(default)]
    pub catalogs: Vec<ManifestCatalog>,
}

impl AddonManifest {
    /// Parse and validate: a manifest without `id` or `name` is rejected.
    pub fn parse(value: serde_json::Value) -> Option<Self> {
        let manifest: AddonManifest = serde_json::from_value(value).ok()?;
        if manifest.id.is_empty() || manifest.name.is_empty() {
            return None;
        }
        Some(manifest)
    }

    /// Resources may be plain strings (`"stream"`) or objects
    /// (`{"name": "stream", ...}`); both forms count.
    pub fn has_resource(&self, wanted: &str) -> bool {
        self.resources.iter().any(|resource| match resource {
            serde_json::Value::String(name) => name == wanted,
            serde_json::Value::Object(map) => map
                .get("name")
                .and_then(|name| name.as_str())
                .map(|name| name == wanted)
                .unwrap_or(false),
            _ => false,
        })
    }

    pub fn supports_type(&self, content_type: &str) -> bool {
        self.types.iter().any(|t| t == content_type)
    }
}

/// Known manifests for challenge-protected hosts, keyed by URL substring.
/// Used when the live manifest fetch fails on install.
pub fn fallback_manifest(manifest_url: &str) -> Option<AddonManifest> {
    let table: &[(&str, serde_json::Value)] = &[
        (
            "torrentio.strem.fun",
            json!({
                "id": "com.stremio.torrentio.addon",
                "name": "Torrentio",
                "version": "0.0.15",
                "description": "Provides torrent streams from scraped torrent providers",
                "types": ["movie", "series"],
                "resources": ["stream"],
                "catalogs": []
            }),
        ),
        (
            "v3-cinemeta.strem.io",
            json!({
                "id": "com.linvo.cinemeta",
                "name": "Cinemeta",
                "version": "3.0.13",
                "description": "The official add-on for movie and series catalogs",
                "types": ["movie", "series"],
                "resources": ["catalog", "meta"],
                "catalogs": [
                    {"type": "movie", "id": "top", "name": "Popular"},
                    {"type": "series", "id": "top", "name": "Popular"}
                ]
            }),
        ),
        (
            "opensubtitles-v3.strem.io",
            json!({
                "id": "org.stremio.opensubtitlesv3",
                "name": "OpenSubtitles v3",
                "version": "1.0.0",
                "types": ["movie", "series"],
                "resources": ["subtitles"],
                "catalogs": []
            }),
        ),
    ];

    table
        .iter()
        .find(|(key, _)| manifest_url.contains(key))
        .and_then(|(_, value)| AddonManifest::parse(value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_id_and_name() {
        assert!(AddonManifest::parse(json!({"id": "x", "name": "X"})).is_some());
        assert!(AddonManifest::parse(json!({"id": "x"})).is_none());
        assert!(AddonManifest::parse(json!({"name": "X"})).is_none());
        assert!(AddonManifest::parse(json!({"id": "", "name": "X"})).is_none());
    }

    #[test]
    fn resources_match_both_wire_forms() {
        let manifest = AddonManifest::parse(json!({
            "id": "x",
            "name": "X",
            "resources": ["stream", {"name": "subtitles", "types": ["movie"]}]
        }))
        .unwrap();
        assert!(manifest.has_resource("stream"));
        assert!(manifest.has_resource("subtitles"));
        assert!(!manifest.has_resource("meta"));
    }

    #[test]
    fn torrentio_fallback_has_canonical_id() {
        let manifest =
            fallback_manifest("https://torrentio.strem.fun/manifest.json").unwrap();
        assert_eq!(manifest.id, "com.stremio.torrentio.addon");
        assert!(manifest.has_resource("stream"));
    }

    #[test]
    fn unknown_hosts_have_no_fallback() {
        assert!(fallback_manifest("https://example.com/manifest.json").is_none());
    }
}
