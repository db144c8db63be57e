//! Source descriptors: configuration of one aggregator input

use crate::models::ContentType;
use serde::{Deserialize, Serialize};

/// Where a connector gets its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEndpoint {
    /// A third-party add-on manifest base URL.
    Manifest { base_url: String },
    /// One of the built-in indexers, identified by tag.
    Builtin { tag: String },
}

/// Configuration of one aggregator input.
///
/// Add-on descriptors are created on install and destroyed on uninstall;
/// the built-in indexer descriptors are static.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub display_name: String,
    pub supports_movies: bool,
    pub supports_series: bool,
    pub endpoint: SourceEndpoint,
    pub requires_protection_bypass: bool,
}

impl SourceDescriptor {
    pub fn supports(&self, content_type: ContentType) -> bool {
        match content_type {
            ContentType::Movie => self.supports_movies,
            ContentType::Series => self.supports_series,
            // TV channels are routed to a dedicated connector, never fanned out
            ContentType::Tv => false,
        }
    }
}
