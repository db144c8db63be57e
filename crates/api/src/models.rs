//! Request/response DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use streamgate_core::Stream;
use streamgate_infrastructure::MetaPreview;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    #[serde(rename = "manifestUrl")]
    pub manifest_url: String,
}

#[derive(Debug, Serialize)]
pub struct InstallOutcome {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<Stream>,
}

/// One home-page section: content bucketed by kind.
#[derive(Debug, Default, Serialize)]
pub struct SectionContent {
    pub movies: Vec<MetaPreview>,
    pub series: Vec<MetaPreview>,
    pub channels: Vec<MetaPreview>,
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    pub services: BTreeMap<String, SectionContent>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryAddRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}
