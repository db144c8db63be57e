//! Core domain models for the Streamgate gateway
//!
//! This crate holds the shared vocabulary of the gateway: playable streams,
//! content fingerprints, source descriptors, torrent session state, and the
//! error type every other crate maps into. It performs no I/O.

pub mod error;
pub mod models;

pub use error::{GatewayError, Result};
pub use models::{
    ContentType, Fingerprint, InfoHash, QualityTier, SessionState, SessionStatus, SourceDescriptor,
    SourceEndpoint, Stream, StreamKind, TitleHint, VideoFile,
};
