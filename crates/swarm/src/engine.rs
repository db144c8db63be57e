//! Engine façade: the swarm client behind a trait
//!
//! The session manager reasons in terms of this trait; the embedded
//! librqbit implementation lives in [`crate::rqbit`]. Blocking work inside
//! an engine is the engine's business - everything here is async from the
//! caller's point of view.

use crate::piece_plan::PiecePlan;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use streamgate_core::Result;

/// Opaque reference to one torrent inside the engine.
pub type EngineHandle = usize;

/// Swarm tuning profile.
///
/// These values exist to keep time-to-first-byte low: aggressive peer
/// acquisition dominates the first minute, unresponsive peers must not
/// block the connect queue, and the head of the file has to stay in cache.
/// Engines apply the subset of knobs they expose; the rest document intent.
#[derive(Debug, Clone)]
pub struct SwarmTuning {
    /// Peer connection attempts per second during ramp-up.
    pub connection_attempts_per_second: u32,
    /// Connection ceiling, sized for hostile-NAT/VPN conditions.
    pub max_connections: u32,
    /// Peer handshake timeout.
    pub peer_handshake_timeout: Duration,
    /// Extra connection boost applied to newly added torrents.
    pub connect_boost: u32,
    /// Disk cache budget, keeps head pieces in RAM.
    pub disk_cache_bytes: u64,
    /// Request-queue look-ahead window.
    pub request_queue_lookahead: Duration,
    /// Request pieces in ascending order.
    pub sequential_download: bool,
}

impl Default for SwarmTuning {
    fn default() -> Self {
        Self {
            connection_attempts_per_second: 500,
            max_connections: 800,
            peer_handshake_timeout: Duration::from_secs(7),
            connect_boost: 50,
            disk_cache_bytes: 128 * 1024 * 1024,
            request_queue_lookahead: Duration::from_secs(1),
            sequential_download: true,
        }
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFile {
    pub index: usize,
    /// Path relative to the torrent's output directory.
    pub relative_path: PathBuf,
    pub size: u64,
    /// Byte offset of this file within the torrent's piece space.
    pub offset: u64,
}

/// Torrent metadata snapshot, available once the swarm has produced it.
#[derive(Debug, Clone)]
pub struct EngineMetadata {
    pub piece_length: u64,
    pub total_pieces: u32,
    pub files: Vec<EngineFile>,
}

/// Transfer counters for one torrent.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub total_bytes: u64,
    pub progress_bytes: u64,
    pub uploaded_bytes: u64,
    pub peers: u32,
    pub finished: bool,
}

#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Add a magnet and return the engine handle. `output_dir` is the
    /// per-torrent subtree everything for this torrent is written under.
    async fn add_magnet(&self, magnet: &str, output_dir: &Path) -> Result<EngineHandle>;

    /// Metadata snapshot, or `None` while the swarm is still resolving it.
    fn metadata(&self, handle: EngineHandle) -> Result<Option<EngineMetadata>>;

    fn stats(&self, handle: EngineHandle) -> Result<EngineStats>;

    /// Apply a piece plan: restrict downloading to the chosen file and bias
    /// the head/tail windows.
    async fn apply_piece_plan(&self, handle: EngineHandle, plan: &PiecePlan) -> Result<()>;

    /// Detach the torrent from the swarm; `delete_files` also releases the
    /// on-disk subtree.
    async fn remove(&self, handle: EngineHandle, delete_files: bool) -> Result<()>;
}
