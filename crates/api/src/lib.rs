//! Streamgate REST API
//!
//! Thin HTTP adapter over the core: every endpoint translates the external
//! surface into aggregator, session-manager, media-proxy or repository
//! calls and maps domain errors onto status codes. The aggregator and the
//! session manager never call back into this layer.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use auth::{AuthService, AuthUser};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, SwarmBackend};
