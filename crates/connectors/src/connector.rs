//! The connector contract every source implements

use async_trait::async_trait;
use std::time::Duration;
use streamgate_core::{ContentType, Fingerprint, Result, Stream, TitleHint};

/// One aggregator input: fetch and normalize streams for a fingerprint.
///
/// Connectors never raise outward across the aggregation boundary; the
/// aggregator maps `Err` (and deadline overruns) to an empty contribution
/// plus a WARN log. Returning `Err` from `fetch` is still the right way to
/// signal a genuine fault - "no data" is `Ok(vec![])`.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Human-facing name; stamped onto every produced stream as `source_tag`.
    fn display_name(&self) -> &str;

    fn supports(&self, content_type: ContentType) -> bool;

    /// Per-source deadline. The aggregator's global deadline is the longest
    /// budget across the task set.
    fn budget(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn fetch(&self, fingerprint: &Fingerprint, hint: &TitleHint) -> Result<Vec<Stream>>;
}

/// First `n` whitespace-separated words of a title, joined by spaces.
pub(crate) fn first_words(title: &str, n: usize) -> String {
    title.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Digits of an IMDB id (`tt0944947` -> `0944947`).
pub(crate) fn imdb_digits(id: &str) -> &str {
    id.trim_start_matches("tt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_words_truncates() {
        assert_eq!(first_words("The Lord of the Rings", 3), "The Lord of");
        assert_eq!(first_words("Up", 3), "Up");
    }

    #[test]
    fn imdb_digits_strips_prefix() {
        assert_eq!(imdb_digits("tt0944947"), "0944947");
        assert_eq!(imdb_digits("0944947"), "0944947");
    }
}
