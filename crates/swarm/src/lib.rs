//! Swarm session management
//!
//! One torrent session per info-hash, tuned for sequential streaming: the
//! head of the chosen video file is fetched first so playback can start
//! within seconds, the tail is pulled early for container seek metadata,
//! and everything else follows in order. Sessions are registered in a
//! process-wide registry and evicted by age.
//!
//! The swarm engine itself sits behind [`engine::SwarmEngine`], so the
//! session logic (file selection, piece planning, readiness, eviction)
//! stays engine-agnostic; [`rqbit::RqbitEngine`] is the embedded
//! implementation.

pub mod engine;
pub mod piece_plan;
pub mod rqbit;
pub mod session;
pub mod trackers;

pub use engine::{EngineFile, EngineHandle, EngineMetadata, EngineStats, SwarmEngine, SwarmTuning};
pub use piece_plan::{PiecePlan, VIDEO_EXTENSIONS};
pub use rqbit::RqbitEngine;
pub use session::{SessionManager, SessionManagerConfig, TorrentSession};
pub use trackers::{magnet_uri, DEFAULT_TRACKERS};
