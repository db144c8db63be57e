//! The backpressured transcoder byte pipe

use crate::ffmpeg::{ffmpeg_args, is_remuxable, locate_ffmpeg};
use bytes::Bytes;
use std::collections::VecDeque;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use streamgate_core::{GatewayError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

/// Read granularity of the output pipe. Nothing is buffered beyond one
/// chunk between the tool and the client socket.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// How long a signalled tool gets to die before we stop waiting on it.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Last bytes of tool stderr, kept for the failure log line.
const STDERR_TAIL_BYTES: usize = 4096;

type SharedTail = Arc<Mutex<VecDeque<u8>>>;

fn tail_to_string(tail: &SharedTail) -> String {
    let buffer = tail.lock().unwrap_or_else(|poison| poison.into_inner());
    let bytes: Vec<u8> = buffer.iter().copied().collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Owns the spawned tool and its stdout. Dropping the pipe signals the
/// tool and reaps it in the background within a bounded grace window, so
/// a client disconnect can never leave an orphaned encoder running.
pub struct TranscodePipe {
    child: Option<Child>,
    stdout: ChildStdout,
    stderr_tail: SharedTail,
}

impl AsyncRead for TranscodePipe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl Drop for TranscodePipe {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let tail = self.stderr_tail.clone();
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                // process teardown: kill_on_drop covers the child
                let _ = child.start_kill();
                return;
            };
            runtime.spawn(async move {
                let _ = child.start_kill();
                match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                    Ok(Ok(status)) if status.success() => {
                        debug!("media tool exited cleanly");
                    }
                    Ok(Ok(status)) => {
                        let stderr = tail_to_string(&tail);
                        if stderr.is_empty() {
                            debug!(%status, "media tool terminated");
                        } else {
                            warn!(%status, stderr = %stderr, "media tool terminated");
                        }
                    }
                    Ok(Err(e)) => warn!(error = %e, "failed waiting for media tool"),
                    Err(_) => warn!("media tool did not exit within the grace window"),
                }
            });
        }
    }
}

/// An open media byte stream: the first chunk (already produced, proving
/// the tool is alive) plus the live pipe for the rest.
pub struct MediaStream {
    pub first_chunk: Bytes,
    pub pipe: TranscodePipe,
    /// True when a Range header was honored by skipping output bytes.
    pub partial: bool,
}

/// Spawn the media tool against the on-disk source and return a live
/// stream.
///
/// Range handling on a local spawn is synthesized: the requested start
/// offset is consumed from the tool's output before the first byte goes to
/// the client. An error here always means zero bytes were produced, which
/// callers surface as 503; once a `MediaStream` exists, any later tool
/// death just ends the stream.
pub async fn open_media_stream(source: &Path, range_start: Option<u64>) -> Result<MediaStream> {
    let ffmpeg = locate_ffmpeg()?;
    let remux = is_remuxable(source);
    let args = ffmpeg_args(source, remux);
    debug!(source = %source.display(), remux, "spawning media tool");

    let mut child = Command::new(&ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| GatewayError::Internal {
            message: format!("failed to spawn media tool: {}", e),
        })?;

    let stdout = child.stdout.take().ok_or_else(|| GatewayError::Internal {
        message: "media tool stdout unavailable".to_string(),
    })?;
    let stderr = child.stderr.take();

    let stderr_tail: SharedTail = Arc::new(Mutex::new(VecDeque::new()));
    if let Some(mut stderr) = stderr {
        let tail = stderr_tail.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            while let Ok(n) = stderr.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                let mut guard = tail.lock().unwrap_or_else(|poison| poison.into_inner());
                guard.extend(buf[..n].iter().copied());
                while guard.len() > STDERR_TAIL_BYTES {
                    guard.pop_front();
                }
            }
        });
    }

    let mut pipe = TranscodePipe {
        child: Some(child),
        stdout,
        stderr_tail: stderr_tail.clone(),
    };

    // synthesize Range by discarding output up to the requested offset
    let skip = range_start.unwrap_or(0);
    if skip > 0 {
        if let Err(e) = discard_exact(&mut pipe, skip).await {
            warn!(error = %e, "media tool died while seeking output");
            return Err(zero_byte_failure(&stderr_tail));
        }
    }

    let mut first = vec![0u8; CHUNK_SIZE];
    let n = pipe
        .read(&mut first)
        .await
        .map_err(|e| GatewayError::PipeBroken {
            detail: format!("first read failed: {}", e),
        })?;
    if n == 0 {
        return Err(zero_byte_failure(&stderr_tail));
    }
    first.truncate(n);

    Ok(MediaStream {
        first_chunk: Bytes::from(first),
        pipe,
        partial: skip > 0,
    })
}

fn zero_byte_failure(tail: &SharedTail) -> GatewayError {
    let stderr = tail_to_string(tail);
    warn!(stderr = %stderr, "media tool produced no output");
    GatewayError::PipeBroken {
        detail: if stderr.is_empty() {
            "media tool produced no output".to_string()
        } else {
            format!("media tool produced no output: {}", stderr)
        },
    }
}

async fn discard_exact(reader: &mut (impl AsyncRead + Unpin), mut remaining: u64) -> std::io::Result<()> {
    let mut scratch = vec![0u8; CHUNK_SIZE];
    while remaining > 0 {
        let want = scratch.len().min(remaining as usize);
        let n = reader.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended before requested offset",
            ));
        }
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn discard_exact_consumes_offset() {
        let mut reader = Cursor::new(vec![7u8; 1000]);
        discard_exact(&mut reader, 600).await.unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len(), 400);
    }

    #[tokio::test]
    async fn discard_exact_errors_past_eof() {
        let mut reader = Cursor::new(vec![7u8; 100]);
        let err = discard_exact(&mut reader, 200).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    /// The pipe guard kills its child on drop: use a long-running `cat`
    /// stand-in for the media tool.
    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_the_pipe_reaps_the_child() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let pid = child.id().unwrap();

        let pipe = TranscodePipe {
            child: Some(child),
            stdout,
            stderr_tail: Arc::new(Mutex::new(VecDeque::new())),
        };
        drop(pipe);

        // within the grace window the process must be gone
        tokio::time::sleep(Duration::from_millis(500)).await;
        let alive = std::path::Path::new(&format!("/proc/{}", pid)).exists()
            && std::fs::read_to_string(format!("/proc/{}/stat", pid))
                .map(|stat| !stat.contains(") Z "))
                .unwrap_or(false);
        assert!(!alive, "child process should be dead after pipe drop");
    }
}
