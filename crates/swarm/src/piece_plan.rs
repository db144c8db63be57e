//! Piece priority planning for sequential streaming

use crate::engine::{EngineFile, EngineMetadata};

/// Extensions we will pick a playback file from.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm", "mov", "m4v", "ts"];

/// Priority scale: 0 = skip, 7 = critical.
pub const PRIORITY_SKIP: u8 = 0;
pub const PRIORITY_BASELINE: u8 = 1;
pub const PRIORITY_TAIL: u8 = 4;
pub const PRIORITY_HIGH: u8 = 6;
pub const PRIORITY_CRITICAL: u8 = 7;

/// Head band sized so the readiness floor plus container headers arrive
/// first; tail band covers duration/seek metadata that players probe for.
const HEAD_BYTES: u64 = 5 * 1024 * 1024;
const TAIL_BYTES: u64 = 2 * 1024 * 1024;

/// The full priority program for one torrent once a video file is chosen.
#[derive(Debug, Clone)]
pub struct PiecePlan {
    pub file_index: usize,
    pub start_piece: u32,
    pub end_piece: u32,
    /// One priority per piece across the whole torrent.
    pub piece_priorities: Vec<u8>,
    /// In-file offset where the head window starts (always 0).
    pub head_offset: u64,
    /// In-file offset where the tail window starts.
    pub tail_offset: u64,
}

impl PiecePlan {
    /// Program priorities for streaming `file`:
    /// - everything outside the file: skip
    /// - the file itself: baseline
    /// - first pieces covering ~5 MB: critical
    /// - the following window of twice that size: high
    /// - last ~2 MB: tail priority, for seek/duration metadata
    pub fn for_file(meta: &EngineMetadata, file: &EngineFile) -> Self {
        let piece_length = meta.piece_length.max(1);
        let start_piece = (file.offset / piece_length) as u32;
        let end_piece = ((file.offset + file.size.saturating_sub(1)) / piece_length) as u32;
        let end_piece = end_piece.min(meta.total_pieces.saturating_sub(1));

        let mut priorities = vec![PRIORITY_SKIP; meta.total_pieces as usize];
        for priority in priorities
            .iter_mut()
            .take(end_piece as usize + 1)
            .skip(start_piece as usize)
        {
            *priority = PRIORITY_BASELINE;
        }

        let head_pieces = (HEAD_BYTES / piece_length).max(1) as u32;
        let tail_pieces = (TAIL_BYTES / piece_length).max(1) as u32;

        // tail first so the head bands win any overlap on small files
        let tail_start = end_piece.saturating_sub(tail_pieces.saturating_sub(1)).max(start_piece);
        for piece in tail_start..=end_piece {
            priorities[piece as usize] = PRIORITY_TAIL;
        }

        let head_end = (start_piece + head_pieces - 1).min(end_piece);
        for piece in start_piece..=head_end {
            priorities[piece as usize] = PRIORITY_CRITICAL;
        }
        let high_end = (head_end + 2 * head_pieces).min(end_piece);
        for piece in (head_end + 1)..=high_end {
            if priorities[piece as usize] == PRIORITY_BASELINE {
                priorities[piece as usize] = PRIORITY_HIGH;
            }
        }

        Self {
            file_index: file.index,
            start_piece,
            end_piece,
            piece_priorities: priorities,
            head_offset: 0,
            tail_offset: file.size.saturating_sub(TAIL_BYTES),
        }
    }
}

/// Pick the playback file: the largest file carrying a known video
/// extension. `None` means the torrent has nothing playable.
pub fn choose_video_file(meta: &EngineMetadata) -> Option<EngineFile> {
    meta.files
        .iter()
        .filter(|file| {
            file.relative_path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    let lower = ext.to_ascii_lowercase();
                    VIDEO_EXTENSIONS.iter().any(|known| *known == lower)
                })
                .unwrap_or(false)
        })
        .max_by_key(|file| file.size)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(piece_length: u64, files: Vec<EngineFile>) -> EngineMetadata {
        let total: u64 = files.iter().map(|f| f.size).sum();
        EngineMetadata {
            piece_length,
            total_pieces: total.div_ceil(piece_length) as u32,
            files,
        }
    }

    fn file(index: usize, name: &str, size: u64, offset: u64) -> EngineFile {
        EngineFile {
            index,
            relative_path: PathBuf::from(name),
            size,
            offset,
        }
    }

    #[test]
    fn chooses_largest_video_file() {
        let m = meta(
            1024 * 1024,
            vec![
                file(0, "sample.mp4", 10_000_000, 0),
                file(1, "movie.mkv", 900_000_000, 10_000_000),
                file(2, "readme.txt", 1_000, 910_000_000),
            ],
        );
        assert_eq!(choose_video_file(&m).unwrap().index, 1);
    }

    #[test]
    fn no_video_file_is_none() {
        let m = meta(
            1024 * 1024,
            vec![file(0, "readme.nfo", 1_000, 0), file(1, "cover.jpg", 2_000, 1_000)],
        );
        assert!(choose_video_file(&m).is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let m = meta(1024 * 1024, vec![file(0, "Movie.MKV", 1_000_000, 0)]);
        assert_eq!(choose_video_file(&m).unwrap().index, 0);
    }

    #[test]
    fn plan_bands_are_programmed() {
        // 1 MB pieces, one 100 MB video file starting at piece 10
        let video = file(1, "movie.mp4", 100 * 1024 * 1024, 10 * 1024 * 1024);
        let m = EngineMetadata {
            piece_length: 1024 * 1024,
            total_pieces: 110,
            files: vec![file(0, "extras.txt", 10 * 1024 * 1024, 0), video.clone()],
        };
        let plan = PiecePlan::for_file(&m, &video);

        assert_eq!(plan.start_piece, 10);
        assert_eq!(plan.end_piece, 109);
        // non-video prefix is skipped
        assert!(plan.piece_priorities[..10].iter().all(|p| *p == PRIORITY_SKIP));
        // first 5 pieces (~5 MB) critical
        assert!(plan.piece_priorities[10..15].iter().all(|p| *p == PRIORITY_CRITICAL));
        // next 10 pieces high
        assert!(plan.piece_priorities[15..25].iter().all(|p| *p == PRIORITY_HIGH));
        // middle baseline
        assert_eq!(plan.piece_priorities[60], PRIORITY_BASELINE);
        // last 2 pieces (~2 MB) tail priority
        assert!(plan.piece_priorities[108..110].iter().all(|p| *p == PRIORITY_TAIL));
        assert_eq!(plan.tail_offset, 98 * 1024 * 1024);
    }

    #[test]
    fn head_band_wins_overlap_on_tiny_files() {
        let video = file(0, "clip.mp4", 3 * 1024 * 1024, 0);
        let m = EngineMetadata {
            piece_length: 1024 * 1024,
            total_pieces: 3,
            files: vec![video.clone()],
        };
        let plan = PiecePlan::for_file(&m, &video);
        assert!(plan
            .piece_priorities
            .iter()
            .all(|p| *p == PRIORITY_CRITICAL));
    }
}
