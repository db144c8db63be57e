//! Media proxy: browser-playable byte streams from partial downloads
//!
//! Turns the partially-downloaded file of a torrent session into a
//! fragmented-MP4 stream a browser will play: codec-copy when the
//! container is already MP4, a low-latency transcode otherwise. The pipe
//! is backpressured end to end and tears the external tool down the moment
//! the client goes away.
//!
//! An alternate deployment proxies an external torrent-streaming helper
//! instead of spawning anything locally; see [`helper::HelperClient`].

pub mod ffmpeg;
pub mod helper;
pub mod pipe;

pub use ffmpeg::{ffmpeg_args, is_remuxable, locate_ffmpeg};
pub use helper::HelperClient;
pub use pipe::{open_media_stream, MediaStream, TranscodePipe, CHUNK_SIZE};
