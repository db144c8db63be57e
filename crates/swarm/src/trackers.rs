//! Static tracker tiers and magnet construction

use streamgate_core::InfoHash;

/// Tracker set joined into every magnet we build. Tiered for reliability:
/// the UDP opentrackers first, HTTP fallbacks last. Swarm entry speed in
/// the first minute depends heavily on this list.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.demonii.com:1337/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.theoks.net:6969/announce",
    "udp://explodie.org:6969/announce",
    "udp://tracker1.bt.moack.co.kr:80/announce",
    "udp://tracker.tiny-vps.com:6969/announce",
    "udp://tracker.dump.cl:6969/announce",
    "udp://opentracker.io:6969/announce",
    "udp://tracker.dler.org:6969/announce",
    "udp://open.free-tracker.ga:6969/announce",
    "udp://isk.richardsw.club:6969/announce",
    "udp://bt1.archive.org:6969/announce",
    "udp://bt2.archive.org:6969/announce",
    "udp://tracker.bittor.pw:1337/announce",
    "udp://public.popcorn-tracker.org:6969/announce",
    "http://tracker.opentrackr.org:1337/announce",
    "http://tracker.dler.org:6969/announce",
    "http://open.acgnxtracker.com:80/announce",
    "http://bt.endpot.com:80/announce",
];

/// Build a magnet URI for an info-hash over the default tracker tiers plus
/// any upstream-provided tracker hints.
pub fn magnet_uri(info_hash: &InfoHash, extra_trackers: &[String]) -> String {
    let mut magnet = format!("magnet:?xt=urn:btih:{}", info_hash);
    for tracker in DEFAULT_TRACKERS {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    for tracker in extra_trackers {
        if DEFAULT_TRACKERS.iter().any(|t| *t == tracker.as_str()) {
            continue;
        }
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_carries_hash_and_all_tiers() {
        let hash = InfoHash::parse(&"ab".repeat(20)).unwrap();
        let magnet = magnet_uri(&hash, &[]);
        assert!(magnet.starts_with(&format!("magnet:?xt=urn:btih:{}", "ab".repeat(20))));
        assert_eq!(magnet.matches("&tr=").count(), DEFAULT_TRACKERS.len());
    }

    #[test]
    fn extra_trackers_are_appended_without_duplicates() {
        let hash = InfoHash::parse(&"cd".repeat(20)).unwrap();
        let extras = vec![
            "udp://tracker.opentrackr.org:1337/announce".to_string(),
            "udp://custom.example:1337/announce".to_string(),
        ];
        let magnet = magnet_uri(&hash, &extras);
        assert_eq!(magnet.matches("&tr=").count(), DEFAULT_TRACKERS.len() + 1);
        assert!(magnet.contains(&urlencoding::encode("udp://custom.example:1337/announce").to_string()));
    }
}
