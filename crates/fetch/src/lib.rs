//! Protection-aware outbound HTTP for Streamgate
//!
//! Every outbound request the gateway makes goes through [`FetchClient`].
//! Hosts are classified as open or challenge-protected; protected hosts get
//! a browser-impersonation header profile and, when that still fails, a
//! lazily-started headless-browser fallback that waits out the challenge
//! interstitial.

pub mod bypass;
pub mod client;

pub use bypass::BrowserBypass;
pub use client::{FetchClient, FetchConfig};
