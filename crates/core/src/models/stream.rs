//! Playable stream candidates and their ranking model

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated torrent info-hash: 40 lowercase hexadecimal characters.
///
/// Connectors lowercase upstream hashes before parsing; anything that does
/// not survive validation is dropped at the connector boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoHash(String);

impl InfoHash {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.len() != 40 || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GatewayError::ValidationError {
                field: "info_hash".to_string(),
                message: format!("expected 40 hex chars, got {:?}", raw),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed, ordered quality ladder used to rank streams independently of
/// bitrate. Unknown upstream qualities map to HD720.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    Sd,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "4K")]
    Uhd4k,
}

impl QualityTier {
    /// Derive the tier from a release title. Case-insensitive; `2160p`,
    /// `4k` or `uhd` win over lower resolutions when both appear.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_ascii_lowercase();
        if lower.contains("2160p") || lower.contains("4k") || lower.contains("uhd") {
            QualityTier::Uhd4k
        } else if lower.contains("1080p") {
            QualityTier::Hd1080
        } else if lower.contains("720p") {
            QualityTier::Hd720
        } else if lower.contains("480p") || lower.contains("360p") || lower.contains("dvdrip") {
            QualityTier::Sd
        } else {
            QualityTier::Hd720
        }
    }

    pub fn rank(&self) -> u32 {
        match self {
            QualityTier::Sd => 1,
            QualityTier::Hd720 => 2,
            QualityTier::Hd1080 => 3,
            QualityTier::Uhd4k => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Sd => "SD",
            QualityTier::Hd720 => "720p",
            QualityTier::Hd1080 => "1080p",
            QualityTier::Uhd4k => "4K",
        }
    }
}

/// How a stream is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    DirectUrl,
    Magnet,
}

/// One playable candidate for a title.
///
/// Exactly one of `url` / `info_hash` is present; the constructors are the
/// only way to build one, which keeps that invariant out of reach of
/// serialization round-trips inside the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub kind: StreamKind,

    /// Direct playback URL (direct_url streams only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Torrent info-hash (magnet streams only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<InfoHash>,

    /// Tracker hints collected from the upstream, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trackers: Vec<String>,

    /// Short human-facing origin label ("Torrentio", "YTS", ...).
    pub display_name: String,

    /// Upstream title line; may carry size/seeder glyphs verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,

    pub quality: QualityTier,

    /// Seeder count; 0 when unknown or for direct URLs.
    pub seeders: u32,

    /// Name of the connector that produced this stream.
    pub source_tag: String,
}

impl Stream {
    pub fn direct(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::DirectUrl,
            url: Some(url.into()),
            info_hash: None,
            trackers: Vec::new(),
            display_name: display_name.into(),
            display_title: None,
            quality: QualityTier::Hd720,
            seeders: 0,
            source_tag: String::new(),
        }
    }

    pub fn magnet(info_hash: InfoHash, display_name: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::Magnet,
            url: None,
            info_hash: Some(info_hash),
            trackers: Vec::new(),
            display_name: display_name.into(),
            display_title: None,
            quality: QualityTier::Hd720,
            seeders: 0,
            source_tag: String::new(),
        }
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_seeders(mut self, seeders: u32) -> Self {
        self.seeders = seeders;
        self
    }

    pub fn with_display_title(mut self, title: impl Into<String>) -> Self {
        self.display_title = Some(title.into());
        self
    }

    pub fn with_trackers(mut self, trackers: Vec<String>) -> Self {
        self.trackers = trackers;
        self
    }

    /// Ranking score: quality dominates, seeders break ties within a tier.
    /// Seeders are capped so a popular SD rip can never outrank 720p.
    pub fn score(&self) -> u32 {
        self.quality.rank() * 10_000 + self.seeders.min(9_999)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_hash_accepts_lowercased_hex() {
        let h = InfoHash::parse("AABBCCDDEEFF00112233445566778899AABBCCDD").unwrap();
        assert_eq!(h.as_str(), "aabbccddeeff00112233445566778899aabbccdd");
    }

    #[test]
    fn info_hash_rejects_bad_lengths_and_chars() {
        assert!(InfoHash::parse("abc").is_err());
        assert!(InfoHash::parse("zzbbccddeeff00112233445566778899aabbccdd").is_err());
        assert!(InfoHash::parse("").is_err());
    }

    #[test]
    fn quality_from_title() {
        assert_eq!(QualityTier::from_title("Movie.2160p.UHD"), QualityTier::Uhd4k);
        assert_eq!(QualityTier::from_title("movie 4K hdr"), QualityTier::Uhd4k);
        assert_eq!(QualityTier::from_title("Movie.1080p.WEB"), QualityTier::Hd1080);
        assert_eq!(QualityTier::from_title("Movie 720p"), QualityTier::Hd720);
        assert_eq!(QualityTier::from_title("Movie.480p.DVDRip"), QualityTier::Sd);
        // nothing recognizable defaults to 720p
        assert_eq!(QualityTier::from_title("Movie CAM"), QualityTier::Hd720);
    }

    #[test]
    fn quality_rank_is_total_order() {
        let tiers = [
            QualityTier::Sd,
            QualityTier::Hd720,
            QualityTier::Hd1080,
            QualityTier::Uhd4k,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn higher_tier_beats_any_seeder_count() {
        let hi = Stream::magnet(
            InfoHash::parse("a".repeat(40).as_str()).unwrap(),
            "x",
        )
        .with_quality(QualityTier::Uhd4k)
        .with_seeders(0);
        let lo = Stream::magnet(
            InfoHash::parse("b".repeat(40).as_str()).unwrap(),
            "y",
        )
        .with_quality(QualityTier::Hd1080)
        .with_seeders(999_999);
        assert!(hi.score() > lo.score());
    }
}
