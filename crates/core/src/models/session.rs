//! Torrent session state machine types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of one per-info-hash torrent session.
///
/// Transitions are monotone except `Ready ⇆ Buffering`: the on-disk prefix
/// can shrink below the readiness floor when the swarm writes out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for torrent metadata from the swarm.
    Metadata,
    /// Video file chosen, not enough contiguous data yet.
    Buffering,
    /// Enough data on disk to start playback.
    Ready,
    /// No playable video file in the torrent. Sticky.
    Failed,
    /// Removed by the age sweep.
    Evicted,
}

/// The file chosen for playback. Set exactly once per session, as soon as
/// metadata resolves, and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    pub index: usize,
    pub path: PathBuf,
    pub size: u64,
}

/// Readiness floor for a video file: 3 MB absolute, or 2% of the final size
/// for small files.
pub fn ready_threshold(video_size: u64) -> u64 {
    const FLOOR: u64 = 3 * 1024 * 1024;
    FLOOR.min((video_size as f64 * 0.02) as u64).max(1)
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: String,
    pub progress: f64,
    pub peers: u32,
    pub download_rate: u64,
    pub upload_rate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_threshold: Option<u64>,
}

impl SessionStatus {
    pub fn bare(state: &str) -> Self {
        Self {
            state: state.to_string(),
            progress: 0.0,
            peers: 0,
            download_rate: 0,
            upload_rate: 0,
            video_file: None,
            video_size: None,
            downloaded: None,
            ready_threshold: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_three_megabytes_for_large_files() {
        // 800 MB file: 2% would be 16 MB, the 3 MB floor wins
        assert_eq!(ready_threshold(800 * 1024 * 1024), 3 * 1024 * 1024);
    }

    #[test]
    fn threshold_scales_down_for_small_files() {
        // 100 MB file: 2% = 2 MB, below the floor
        assert_eq!(ready_threshold(100 * 1024 * 1024), 2 * 1024 * 1024);
    }
}
