//! Per-info-hash session registry, readiness, and eviction

use crate::engine::{EngineHandle, SwarmEngine};
use crate::piece_plan::{choose_video_file, PiecePlan};
use crate::trackers::magnet_uri;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamgate_core::{
    models::session::ready_threshold, GatewayError, InfoHash, Result, SessionState, SessionStatus,
    VideoFile,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Root of all per-torrent download subtrees.
    pub download_dir: PathBuf,
    /// Sessions older than this are released by the sweep.
    pub max_age: Duration,
    /// Sweep cadence.
    pub sweep_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir().join("streamgate"),
            max_age: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateSample {
    at: Instant,
    progress: u64,
    uploaded: u64,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    video_file: Option<VideoFile>,
    last_sample: Option<RateSample>,
    download_rate: u64,
    upload_rate: u64,
}

/// One torrent session. All mutation happens under the inner mutex; the
/// registry hands out `Arc`s so readers never block each other.
pub struct TorrentSession {
    pub info_hash: InfoHash,
    handle: EngineHandle,
    created_at: Instant,
    inner: Mutex<SessionInner>,
}

impl TorrentSession {
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// The chosen video file, if file selection has happened.
    pub async fn video_file(&self) -> Option<VideoFile> {
        self.inner.lock().await.video_file.clone()
    }
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Metadata => "downloading_metadata",
        SessionState::Buffering => "buffering",
        SessionState::Ready => "ready",
        SessionState::Failed => "failed",
        // an evicted session that still answers a poll looks gone
        SessionState::Evicted => "not_found",
    }
}

/// Process-wide registry of torrent sessions.
pub struct SessionManager {
    engine: Arc<dyn SwarmEngine>,
    config: SessionManagerConfig,
    registry: DashMap<String, Arc<TorrentSession>>,
    create_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn SwarmEngine>, config: SessionManagerConfig) -> Self {
        Self {
            engine,
            config,
            registry: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.config.download_dir
    }

    /// Idempotently ensure a session exists for the hash. Any number of
    /// parallel calls create exactly one engine handle.
    pub async fn ensure_session(&self, info_hash: &InfoHash) -> Result<Arc<TorrentSession>> {
        if let Some(existing) = self.registry.get(info_hash.as_str()) {
            return Ok(existing.clone());
        }

        let _guard = self.create_lock.lock().await;
        if let Some(existing) = self.registry.get(info_hash.as_str()) {
            return Ok(existing.clone());
        }

        let magnet = magnet_uri(info_hash, &[]);
        let output_dir = self.config.download_dir.join(info_hash.as_str());
        let handle = self.engine.add_magnet(&magnet, &output_dir).await?;

        let session = Arc::new(TorrentSession {
            info_hash: info_hash.clone(),
            handle,
            created_at: Instant::now(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Metadata,
                video_file: None,
                last_sample: None,
                download_rate: 0,
                upload_rate: 0,
            }),
        });
        self.registry
            .insert(info_hash.as_str().to_string(), session.clone());

        info!(info_hash = %info_hash, "torrent session created");
        Ok(session)
    }

    /// Status snapshot; re-checks readiness and, on the first poll after
    /// metadata resolves, performs file selection and programs priorities.
    pub async fn status(&self, info_hash: &InfoHash) -> SessionStatus {
        let Some(session) = self
            .registry
            .get(info_hash.as_str())
            .map(|entry| entry.clone())
        else {
            return SessionStatus::bare("not_found");
        };
        self.refresh(&session).await
    }

    /// The on-disk video file for a playback request. Requires the session
    /// to exist and the file to be chosen; drives the same refresh path as
    /// a status poll so a direct play after start still works.
    pub async fn video_source(&self, info_hash: &InfoHash) -> Result<VideoFile> {
        let session = self
            .registry
            .get(info_hash.as_str())
            .map(|entry| entry.clone())
            .ok_or_else(|| GatewayError::NotFound {
                resource: format!("session {}", info_hash),
            })?;

        let status = self.refresh(&session).await;
        match status.state.as_str() {
            "ready" | "buffering" => {
                session
                    .video_file()
                    .await
                    .ok_or_else(|| GatewayError::SessionFailed {
                        info_hash: info_hash.as_str().to_string(),
                        reason: "video file not selected yet".to_string(),
                    })
            }
            "failed" => Err(GatewayError::SessionFailed {
                info_hash: info_hash.as_str().to_string(),
                reason: "no playable video file in torrent".to_string(),
            }),
            other => Err(GatewayError::SessionFailed {
                info_hash: info_hash.as_str().to_string(),
                reason: format!("session not playable yet (state {})", other),
            }),
        }
    }

    async fn refresh(&self, session: &Arc<TorrentSession>) -> SessionStatus {
        let mut inner = session.inner.lock().await;

        // failure is sticky: no retry on later polls
        if inner.state == SessionState::Failed {
            return SessionStatus::bare("failed");
        }

        let stats = match self.engine.stats(session.handle) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(info_hash = %session.info_hash, error = %e, "engine stats unavailable");
                return SessionStatus::bare(state_name(inner.state));
            }
        };

        if inner.video_file.is_none() {
            match self.engine.metadata(session.handle) {
                Ok(None) => {
                    inner.state = SessionState::Metadata;
                    let mut status = SessionStatus::bare("downloading_metadata");
                    status.peers = stats.peers;
                    return status;
                }
                Ok(Some(meta)) => match choose_video_file(&meta) {
                    Some(file) => {
                        let path = self
                            .config
                            .download_dir
                            .join(session.info_hash.as_str())
                            .join(&file.relative_path);
                        let plan = PiecePlan::for_file(&meta, &file);
                        debug!(
                            info_hash = %session.info_hash,
                            file = %path.display(),
                            start_piece = plan.start_piece,
                            end_piece = plan.end_piece,
                            "video file selected"
                        );
                        if let Err(e) = self.engine.apply_piece_plan(session.handle, &plan).await {
                            warn!(info_hash = %session.info_hash, error = %e, "piece plan failed");
                        }
                        inner.video_file = Some(VideoFile {
                            index: file.index,
                            path,
                            size: file.size,
                        });
                        inner.state = SessionState::Buffering;
                    }
                    None => {
                        warn!(info_hash = %session.info_hash, "torrent has no playable video file");
                        inner.state = SessionState::Failed;
                        return SessionStatus::bare("failed");
                    }
                },
                Err(e) => {
                    warn!(info_hash = %session.info_hash, error = %e, "metadata unavailable");
                    return SessionStatus::bare(state_name(inner.state));
                }
            }
        }

        let Some(video) = inner.video_file.clone() else {
            return SessionStatus::bare(state_name(inner.state));
        };
        let threshold = ready_threshold(video.size);
        let on_disk = tokio::fs::metadata(&video.path)
            .await
            .map(|meta| meta.len())
            .ok();

        // readiness may oscillate; the chosen path never changes
        inner.state = match on_disk {
            Some(size) if size >= threshold => SessionState::Ready,
            _ => SessionState::Buffering,
        };

        let now = Instant::now();
        if let Some(sample) = inner.last_sample {
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            if elapsed > 0.2 {
                inner.download_rate =
                    (stats.progress_bytes.saturating_sub(sample.progress) as f64 / elapsed) as u64;
                inner.upload_rate =
                    (stats.uploaded_bytes.saturating_sub(sample.uploaded) as f64 / elapsed) as u64;
            }
        }
        inner.last_sample = Some(RateSample {
            at: now,
            progress: stats.progress_bytes,
            uploaded: stats.uploaded_bytes,
        });

        let progress = if stats.total_bytes > 0 {
            stats.progress_bytes as f64 / stats.total_bytes as f64
        } else {
            0.0
        };

        SessionStatus {
            state: state_name(inner.state).to_string(),
            progress,
            peers: stats.peers,
            download_rate: inner.download_rate,
            upload_rate: inner.upload_rate,
            video_file: Some(
                video
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            video_size: Some(video.size),
            downloaded: on_disk,
            ready_threshold: Some(threshold),
        }
    }

    /// Remove sessions past their age limit, releasing swarm handles and
    /// disk. An active reader's own file handle keeps streaming; only the
    /// directory entries go away.
    pub async fn evict_expired(&self) -> usize {
        let expired: Vec<Arc<TorrentSession>> = self
            .registry
            .iter()
            .filter(|entry| entry.value().age() > self.config.max_age)
            .map(|entry| entry.value().clone())
            .collect();

        let mut evicted = 0;
        for session in expired {
            self.registry.remove(session.info_hash.as_str());
            {
                let mut inner = session.inner.lock().await;
                inner.state = SessionState::Evicted;
            }
            if let Err(e) = self.engine.remove(session.handle, true).await {
                warn!(info_hash = %session.info_hash, error = %e, "eviction failed to release engine handle");
            }
            info!(info_hash = %session.info_hash, "session evicted");
            evicted += 1;
        }
        evicted
    }

    /// Background sweep loop.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = manager.evict_expired().await;
                if evicted > 0 {
                    debug!(evicted, "eviction sweep complete");
                }
            }
        })
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineFile, EngineMetadata, EngineStats};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct StubEngine {
        added: AtomicUsize,
        metadata: StdMutex<Option<EngineMetadata>>,
        stats: StdMutex<EngineStats>,
        removed: StdMutex<Vec<(EngineHandle, bool)>>,
        plans: StdMutex<Vec<PiecePlan>>,
    }

    impl StubEngine {
        fn set_metadata(&self, meta: EngineMetadata) {
            *self.metadata.lock().unwrap() = Some(meta);
        }
    }

    #[async_trait]
    impl SwarmEngine for StubEngine {
        async fn add_magnet(&self, _magnet: &str, _output_dir: &Path) -> Result<EngineHandle> {
            // simulate the metadata round-trip so racing callers overlap
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(self.added.fetch_add(1, Ordering::SeqCst))
        }

        fn metadata(&self, _handle: EngineHandle) -> Result<Option<EngineMetadata>> {
            Ok(self.metadata.lock().unwrap().clone())
        }

        fn stats(&self, _handle: EngineHandle) -> Result<EngineStats> {
            Ok(self.stats.lock().unwrap().clone())
        }

        async fn apply_piece_plan(&self, _handle: EngineHandle, plan: &PiecePlan) -> Result<()> {
            self.plans.lock().unwrap().push(plan.clone());
            Ok(())
        }

        async fn remove(&self, handle: EngineHandle, delete_files: bool) -> Result<()> {
            self.removed.lock().unwrap().push((handle, delete_files));
            Ok(())
        }
    }

    fn test_hash(c: char) -> InfoHash {
        InfoHash::parse(&c.to_string().repeat(40)).unwrap()
    }

    fn manager_with(engine: Arc<StubEngine>, dir: &Path) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            engine,
            SessionManagerConfig {
                download_dir: dir.to_path_buf(),
                max_age: Duration::from_secs(7200),
                sweep_interval: Duration::from_secs(300),
            },
        ))
    }

    #[tokio::test]
    async fn parallel_ensure_creates_one_handle() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine.clone(), dir.path());
        let hash = test_hash('a');

        let calls = (0..8).map(|_| {
            let manager = manager.clone();
            let hash = hash.clone();
            tokio::spawn(async move { manager.ensure_session(&hash).await.unwrap() })
        });
        for call in calls {
            call.await.unwrap();
        }

        assert_eq!(engine.added.load(Ordering::SeqCst), 1);
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn unknown_hash_reports_not_found() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine, dir.path());
        let status = manager.status(&test_hash('b')).await;
        assert_eq!(status.state, "not_found");
    }

    #[tokio::test]
    async fn metadata_phase_reports_peers() {
        let engine = Arc::new(StubEngine::default());
        *engine.stats.lock().unwrap() = EngineStats {
            peers: 12,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine, dir.path());
        let hash = test_hash('c');
        manager.ensure_session(&hash).await.unwrap();

        let status = manager.status(&hash).await;
        assert_eq!(status.state, "downloading_metadata");
        assert_eq!(status.peers, 12);
    }

    fn single_video_meta(name: &str, size: u64) -> EngineMetadata {
        EngineMetadata {
            piece_length: 1024 * 1024,
            total_pieces: size.div_ceil(1024 * 1024) as u32,
            files: vec![EngineFile {
                index: 0,
                relative_path: PathBuf::from(name),
                size,
                offset: 0,
            }],
        }
    }

    /// Readiness walks buffering -> ready -> buffering as the on-disk file
    /// grows and shrinks, and the chosen path never changes.
    #[tokio::test]
    async fn readiness_tracks_on_disk_size() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine.clone(), dir.path());
        let hash = test_hash('d');
        manager.ensure_session(&hash).await.unwrap();

        let video_size: u64 = 800 * 1024 * 1024;
        engine.set_metadata(single_video_meta("movie.mkv", video_size));

        let file_path = dir.path().join(hash.as_str()).join("movie.mkv");
        tokio::fs::create_dir_all(file_path.parent().unwrap())
            .await
            .unwrap();

        // 2.9 MB on disk: below the 3 MB floor
        tokio::fs::write(&file_path, vec![0u8; (2.9 * 1024.0 * 1024.0) as usize])
            .await
            .unwrap();
        let status = manager.status(&hash).await;
        assert_eq!(status.state, "buffering");
        assert_eq!(status.ready_threshold, Some(3 * 1024 * 1024));

        // 3.1 MB: ready
        tokio::fs::write(&file_path, vec![0u8; (3.1 * 1024.0 * 1024.0) as usize])
            .await
            .unwrap();
        let status = manager.status(&hash).await;
        assert_eq!(status.state, "ready");

        // truncated back to 1 MB: buffering again, same path
        let before = manager
            .registry
            .get(hash.as_str())
            .unwrap()
            .video_file()
            .await
            .unwrap()
            .path;
        tokio::fs::write(&file_path, vec![0u8; 1024 * 1024]).await.unwrap();
        let status = manager.status(&hash).await;
        assert_eq!(status.state, "buffering");
        let after = manager
            .registry
            .get(hash.as_str())
            .unwrap()
            .video_file()
            .await
            .unwrap()
            .path;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn no_video_file_is_sticky_failure() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine.clone(), dir.path());
        let hash = test_hash('e');
        manager.ensure_session(&hash).await.unwrap();

        engine.set_metadata(EngineMetadata {
            piece_length: 1024 * 1024,
            total_pieces: 1,
            files: vec![EngineFile {
                index: 0,
                relative_path: PathBuf::from("readme.txt"),
                size: 100,
                offset: 0,
            }],
        });

        assert_eq!(manager.status(&hash).await.state, "failed");
        // now hand the engine a video file: failure must not heal
        engine.set_metadata(single_video_meta("movie.mp4", 10_000_000));
        assert_eq!(manager.status(&hash).await.state, "failed");
        assert!(manager.video_source(&hash).await.is_err());
    }

    #[tokio::test]
    async fn file_selection_programs_the_piece_plan_once() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with(engine.clone(), dir.path());
        let hash = test_hash('f');
        manager.ensure_session(&hash).await.unwrap();
        engine.set_metadata(single_video_meta("movie.mp4", 100 * 1024 * 1024));

        manager.status(&hash).await;
        manager.status(&hash).await;
        manager.status(&hash).await;

        let plans = engine.plans.lock().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].file_index, 0);
    }

    #[tokio::test]
    async fn eviction_releases_engine_and_registry() {
        let engine = Arc::new(StubEngine::default());
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(
            engine.clone(),
            SessionManagerConfig {
                download_dir: dir.path().to_path_buf(),
                max_age: Duration::from_millis(0),
                sweep_interval: Duration::from_secs(300),
            },
        ));
        let hash = test_hash('a');
        manager.ensure_session(&hash).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let evicted = manager.evict_expired().await;
        assert_eq!(evicted, 1);
        assert_eq!(manager.session_count(), 0);
        assert_eq!(*engine.removed.lock().unwrap(), vec![(0, true)]);
        assert_eq!(manager.status(&hash).await.state, "not_found");
    }
}
