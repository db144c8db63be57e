//! Source connectors and stream aggregation
//!
//! Each connector turns one upstream (an installed add-on or a built-in
//! torrent index) into the common [`streamgate_core::Stream`] shape. The
//! aggregator fans out over all of them per request, applies per-source
//! deadlines, and merges the results with dedup and ranking.

pub mod addon;
pub mod aggregator;
pub mod connector;
pub mod direct;
pub mod free_text;
pub mod movie_index;
pub mod series_index;
pub mod tv;

pub use addon::AddonStreamConnector;
pub use aggregator::{builtin_descriptors, BuiltinEndpoints, StreamAggregator};
pub use connector::SourceConnector;
pub use direct::DirectUrlConnector;
pub use free_text::FreeTextConnector;
pub use movie_index::MovieIndexConnector;
pub use series_index::SeriesIndexConnector;
pub use tv::TvChannelConnector;
