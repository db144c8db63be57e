//! Shared application state

use crate::auth::AuthService;
use std::sync::Arc;
use streamgate_connectors::StreamAggregator;
use streamgate_fetch::FetchClient;
use streamgate_infrastructure::{
    AddonRepository, LibraryRepository, MetadataClient, SubtitlesClient, UserRepository,
};
use streamgate_media::HelperClient;
use streamgate_swarm::SessionManager;

/// Which torrent backend serves playback.
#[derive(Clone)]
pub enum SwarmBackend {
    /// Embedded swarm engine plus the local media proxy.
    Embedded(Arc<SessionManager>),
    /// External torrent-streaming helper; ranges are forwarded verbatim.
    Helper(Arc<HelperClient>),
}

/// Constructor-injected collaborators shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub fetch: Arc<FetchClient>,
    pub aggregator: Arc<StreamAggregator>,
    pub backend: SwarmBackend,
    pub metadata: Arc<MetadataClient>,
    pub subtitles: Arc<SubtitlesClient>,
    pub users: Arc<UserRepository>,
    pub addons: Arc<AddonRepository>,
    pub library: Arc<LibraryRepository>,
    /// Base URL of the TV-channel add-on for `ustv*` routing.
    pub tv_addon_base: String,
}
