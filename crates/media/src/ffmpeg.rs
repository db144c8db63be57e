//! ffmpeg invocation shapes

use std::path::{Path, PathBuf};
use streamgate_core::{GatewayError, Result};

/// MP4 sources keep their video track untouched; everything else gets the
/// low-latency transcode.
pub fn is_remuxable(source: &Path) -> bool {
    source
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false)
}

pub fn locate_ffmpeg() -> Result<PathBuf> {
    which::which("ffmpeg").map_err(|_| GatewayError::Internal {
        message: "ffmpeg not found on PATH".to_string(),
    })
}

/// Argument list for streaming `source` to stdout as fragmented MP4.
///
/// Probe limits are capped so startup is dominated by the swarm, not by
/// container scanning. Audio is always AAC 128k: the one codec every
/// browser decodes. The short keyframe interval on the transcode path is
/// what makes seeking over the fragmented stream possible at all.
pub fn ffmpeg_args(source: &Path, remux: bool) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "warning".into(),
        "-probesize".into(),
        "5M".into(),
        "-analyzeduration".into(),
        "3000000".into(),
        "-i".into(),
        source.to_string_lossy().into_owned(),
    ];

    if remux {
        args.push("-c:v".into());
        args.push("copy".into());
    } else {
        args.extend(
            [
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-tune",
                "zerolatency",
                "-crf",
                "28",
                "-g",
                "30",
            ]
            .map(String::from),
        );
    }

    args.extend(
        [
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-ac",
            "2",
            "-movflags",
            "frag_keyframe+empty_moov+faststart",
            "-f",
            "mp4",
            "pipe:1",
        ]
        .map(String::from),
    );
    args
}
