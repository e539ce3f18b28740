pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::auth::require_token;
use crate::memories::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/memories", get(handlers::handle_list))
        .route("/memories/groups", get(handlers::handle_groups))
        .route("/memories/:id", patch(handlers::handle_patch))
        .route("/upload", post(handlers::handle_upload).layer(upload_limit))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}
