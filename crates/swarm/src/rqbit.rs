//! Embedded swarm engine backed by librqbit

use crate::engine::{EngineFile, EngineHandle, EngineMetadata, EngineStats, SwarmEngine, SwarmTuning};
use crate::piece_plan::PiecePlan;
use async_trait::async_trait;
use dashmap::DashMap;
use librqbit::api::{Api, TorrentIdOrHash};
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, PeerConnectionOptions,
    Session, SessionOptions,
};
use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use streamgate_core::{GatewayError, Result};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tracing::{debug, info, warn};

/// Anything we can hold open to keep a priority window alive.
trait PrimeStream: AsyncRead + AsyncSeek + Send + Sync + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Sync + Unpin> PrimeStream for T {}

struct ManagedEntry {
    handle: Arc<ManagedTorrent>,
    /// Streams held open purely to bias the engine's piece scheduling
    /// toward the head and tail windows of the chosen file.
    prime_windows: Vec<Box<dyn PrimeStream>>,
}

/// librqbit-backed [`SwarmEngine`].
///
/// The engine exposes a subset of the tuning profile directly (peer
/// connect/read timeouts, per-torrent output subtrees). Sequential
/// head-biased scheduling is expressed through its streaming machinery:
/// an open stream positioned at an offset makes the scheduler pull pieces
/// around that offset first, which is how the piece plan's head and tail
/// bands are realized. Priorities the engine cannot express stay recorded
/// in the plan itself.
pub struct RqbitEngine {
    session: Arc<Session>,
    api: Api,
    tuning: SwarmTuning,
    torrents: DashMap<EngineHandle, ManagedEntry>,
}

impl RqbitEngine {
    pub async fn new(download_root: &Path, tuning: SwarmTuning) -> Result<Self> {
        tokio::fs::create_dir_all(download_root)
            .await
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to create download dir: {}", e),
            })?;

        let opts = SessionOptions {
            disable_dht_persistence: true,
            peer_opts: Some(PeerConnectionOptions {
                connect_timeout: Some(tuning.peer_handshake_timeout),
                read_write_timeout: Some(tuning.request_queue_lookahead * 10),
                ..Default::default()
            }),
            ..Default::default()
        };

        let session = Session::new_with_opts(download_root.to_path_buf(), opts)
            .await
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to start swarm session: {}", e),
            })?;
        let api = Api::new(session.clone(), None);

        info!(root = %download_root.display(), "swarm engine started");
        Ok(Self {
            session,
            api,
            tuning,
            torrents: DashMap::new(),
        })
    }

    pub fn tuning(&self) -> &SwarmTuning {
        &self.tuning
    }

    fn entry(&self, handle: EngineHandle) -> Result<dashmap::mapref::one::Ref<'_, EngineHandle, ManagedEntry>> {
        self.torrents.get(&handle).ok_or_else(|| GatewayError::NotFound {
            resource: format!("torrent handle {}", handle),
        })
    }
}

#[async_trait]
impl SwarmEngine for RqbitEngine {
    async fn add_magnet(&self, magnet: &str, output_dir: &Path) -> Result<EngineHandle> {
        let response = self
            .session
            .add_torrent(
                AddTorrent::from_url(magnet),
                Some(AddTorrentOptions {
                    overwrite: true,
                    output_folder: Some(output_dir.to_string_lossy().into_owned()),
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| GatewayError::SessionFailed {
                info_hash: magnet.chars().take(60).collect(),
                reason: e.to_string(),
            })?;

        let (id, handle) = match response {
            AddTorrentResponse::Added(id, handle) => (id, handle),
            AddTorrentResponse::AlreadyManaged(id, handle) => (id, handle),
            AddTorrentResponse::ListOnly(_) => {
                return Err(GatewayError::Internal {
                    message: "unexpected list-only response for magnet".to_string(),
                })
            }
        };

        debug!(id, "magnet added to swarm engine");
        self.torrents.insert(
            id,
            ManagedEntry {
                handle,
                prime_windows: Vec::new(),
            },
        );
        Ok(id)
    }

    fn metadata(&self, handle: EngineHandle) -> Result<Option<EngineMetadata>> {
        let entry = self.entry(handle)?;
        // with_metadata errors while the swarm is still resolving metadata
        let snapshot = entry.handle.with_metadata(|meta| EngineMetadata {
            piece_length: meta.lengths.default_piece_length() as u64,
            total_pieces: meta.lengths.total_pieces(),
            files: meta
                .file_infos
                .iter()
                .enumerate()
                .map(|(index, file)| EngineFile {
                    index,
                    relative_path: file.relative_filename.clone(),
                    size: file.len,
                    offset: file.offset_in_torrent,
                })
                .collect(),
        });
        Ok(snapshot.ok())
    }

    fn stats(&self, handle: EngineHandle) -> Result<EngineStats> {
        let entry = self.entry(handle)?;
        let stats = entry.handle.stats();
        let peers = stats
            .live
            .as_ref()
            .map(|live| live.snapshot.peer_stats.live as u32)
            .unwrap_or(0);
        Ok(EngineStats {
            total_bytes: stats.total_bytes,
            progress_bytes: stats.progress_bytes,
            uploaded_bytes: stats.uploaded_bytes,
            peers,
            finished: stats.finished,
        })
    }

    async fn apply_piece_plan(&self, handle: EngineHandle, plan: &PiecePlan) -> Result<()> {
        let torrent = self.entry(handle)?.handle.clone();
        let only: HashSet<usize> = [plan.file_index].into_iter().collect();
        self.session
            .update_only_files(&torrent, &only)
            .await
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to select video file: {}", e),
            })?;

        let idx = TorrentIdOrHash::from(handle);
        let mut windows: Vec<Box<dyn PrimeStream>> = Vec::new();

        // Head window: an open stream at offset 0 keeps the scheduler
        // pulling the start of the file first.
        match self.api.api_stream(idx, plan.file_index) {
            Ok(stream) => windows.push(Box::new(stream)),
            Err(e) => warn!(handle, error = %e, "failed to open head priority window"),
        }

        // Tail window for seek/duration metadata.
        if plan.tail_offset > 0 {
            match self.api.api_stream(idx, plan.file_index) {
                Ok(stream) => {
                    let mut stream: Box<dyn PrimeStream> = Box::new(stream);
                    match stream.seek(SeekFrom::Start(plan.tail_offset)).await {
                        Ok(_) => windows.push(stream),
                        Err(e) => warn!(handle, error = %e, "failed to seek tail priority window"),
                    }
                }
                Err(e) => warn!(handle, error = %e, "failed to open tail priority window"),
            }
        }

        if let Some(mut entry) = self.torrents.get_mut(&handle) {
            entry.prime_windows = windows;
        }
        Ok(())
    }

    async fn remove(&self, handle: EngineHandle, delete_files: bool) -> Result<()> {
        // drop prime windows before the engine tears the torrent down
        self.torrents.remove(&handle);
        self.session
            .delete(TorrentIdOrHash::from(handle), delete_files)
            .await
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to remove torrent: {}", e),
            })?;
        Ok(())
    }
}
