//! Domain model types shared across the gateway

pub mod fingerprint;
pub mod session;
pub mod source;
pub mod stream;

pub use fingerprint::{ContentType, Fingerprint, TitleHint};
pub use session::{SessionState, SessionStatus, VideoFile};
pub use source::{SourceDescriptor, SourceEndpoint};
pub use stream::{InfoHash, QualityTier, Stream, StreamKind};
