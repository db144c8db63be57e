//! Direct-URL resolver
//!
//! URL-shaped content ids bypass aggregation entirely: the id is already a
//! locator, it just needs wrapping in the common stream shape.

use crate::connector::SourceConnector;
use async_trait::async_trait;
use std::time::Duration;
use streamgate_core::{ContentType, Fingerprint, QualityTier, Result, Stream, TitleHint};

pub struct DirectUrlConnector;

#[async_trait]
impl SourceConnector for DirectUrlConnector {
    fn display_name(&self) -> &str {
        "Direct"
    }

    fn supports(&self, _content_type: ContentType) -> bool {
        true
    }

    fn budget(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, hint: &TitleHint) -> Result<Vec<Stream>> {
        if !fingerprint.is_url_id() {
            return Ok(Vec::new());
        }
        let url = fingerprint.content_id.clone();
        let name = hint
            .title
            .clone()
            .or_else(|| file_name_of(&url))
            .unwrap_or_else(|| "Direct stream".to_string());
        let quality = QualityTier::from_title(&url);
        Ok(vec![Stream::direct(url, name).with_quality(quality)])
    }
}

fn file_name_of(url: &str) -> Option<String> {
    url.rsplit('/')
        .next()
        .map(|tail| tail.split('?').next().unwrap_or(tail))
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wraps_url_ids() {
        let connector = DirectUrlConnector;
        let fp = Fingerprint::new(ContentType::Movie, "https://cdn.example/movie.1080p.mp4?sig=1");
        let streams = connector.fetch(&fp, &TitleHint::default()).await.unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].display_name, "movie.1080p.mp4");
        assert_eq!(streams[0].quality, QualityTier::Hd1080);
    }

    #[tokio::test]
    async fn ignores_non_url_ids() {
        let connector = DirectUrlConnector;
        let fp = Fingerprint::new(ContentType::Movie, "tt123");
        assert!(connector.fetch(&fp, &TitleHint::default()).await.unwrap().is_empty());
    }
}
