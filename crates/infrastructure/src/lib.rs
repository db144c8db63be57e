//! Persistence and external-service clients
//!
//! The document-store side of the gateway (users, installed add-ons, the
//! per-user library) lives in PostgreSQL behind small repository types;
//! the catalog-metadata service and the subtitles add-on get thin clients.
//! All of it is constructor-injected into the API layer.

pub mod database;
pub mod manifest;
pub mod metadata;
pub mod repositories;
pub mod subtitles;

pub use database::{create_pool, DatabaseConfig, DatabasePool};
pub use manifest::{fallback_manifest, AddonManifest, ManifestCatalog};
pub use metadata::{MetadataClient, MetaItem, MetaPreview};
pub use repositories::{
    AddonRecord, AddonRepository, LibraryEntry, LibraryRepository, User, UserRepository,
};
pub use subtitles::{SubtitleTrack, SubtitlesClient};
