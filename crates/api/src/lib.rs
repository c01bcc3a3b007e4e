#![forbid(unsafe_code)]

mod error;
mod guards;
mod rate_limit;
mod songs;
mod tokens;
mod users;


pub use error::ApiError;
pub use rate_limit::{RateLimitConfig, RateLimiter};

use std::sync::Arc;

use axum::extract::State;
use axum::handler::Handler as _;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tunevault_auth::{SONGS_READ, SONGS_WRITE};
use tunevault_storage::Storage;

use crate::guards::PermissionGuard;

#[derive(Clone)]
pub struct ApiState {
    storage: Arc<dyn Storage>,
    limiter: Arc<RateLimiter>,
    environment: String,
}

impl ApiState {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            storage,
            limiter,
            environment: "development".to_owned(),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub(crate) fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub(crate) fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub(crate) fn environment(&self) -> &str {
        &self.environment
    }
}

/// Builds the full route table. Each `/v1/songs` handler is wrapped by a
/// named permission guard; read and write guards differ per method on the
/// same path, and guarding one handler never affects its siblings.
pub fn router(state: ApiState) -> Router {
    let songs_read = from_fn_with_state(
        PermissionGuard::new(&state, SONGS_READ),
        guards::require_permission,
    );
    let songs_write = from_fn_with_state(
        PermissionGuard::new(&state, SONGS_WRITE),
        guards::require_permission,
    );

    Router::new()
        .route("/v1/healthcheck", get(healthcheck))
        .route(
            "/v1/songs",
            get(songs::list_songs.layer(songs_read.clone()))
                .post(songs::create_song.layer(songs_write.clone())),
        )
        .route(
            "/v1/songs/{id}",
            get(songs::show_song.layer(songs_read))
                .patch(songs::update_song.layer(songs_write.clone()))
                .delete(songs::delete_song.layer(songs_write)),
        )
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/activated", put(users::activate_user))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .fallback(error::not_found)
        .layer(from_fn_with_state(state.clone(), guards::authenticate))
        .layer(from_fn_with_state(state.clone(), guards::rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(error::panic_response))
        .with_state(state)
}

async fn healthcheck(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.environment(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}
