//! Router assembly

use crate::handlers::{addons, auth, content, library, playback, streams};
use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full `/api` surface.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // add-ons
        .route("/addons", get(addons::list))
        .route("/addons/install", post(addons::install))
        .route("/addons/install-multiple", post(addons::install_multiple))
        .route("/addons/:id", delete(addons::uninstall))
        .route(
            "/addons/:id/stream/:content_type/:content_id",
            get(addons::addon_streams),
        )
        // aggregated streams; content ids may be URLs or carry :s:e
        .route("/streams/:content_type/*content_id", get(streams::aggregated))
        .route(
            "/subtitles/:content_type/:content_id",
            get(streams::subtitles),
        )
        // catalog surfaces
        .route("/content/discover-organized", get(content::discover_organized))
        .route(
            "/content/category/:section_name/:content_type",
            get(content::category),
        )
        .route("/content/search", get(content::search))
        .route("/content/meta/:content_type/:content_id", get(content::meta))
        // library
        .route("/library", get(library::list).post(library::add))
        .route("/library/:content_type/:id", delete(library::remove))
        // playback
        .route("/stream/start/:info_hash", post(playback::start))
        .route("/stream/status/:info_hash", get(playback::status))
        .route("/stream/video/:info_hash", get(playback::video))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
