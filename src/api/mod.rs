use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{inference::InferenceService, prompts::PromptLibrary};

pub mod handlers;
pub mod types;

pub const ENDPOINTS: [&str; 5] = [
    "/",
    "/health",
    "/generate_post",
    "/regenerate_post",
    "/modify_post",
];

#[derive(Clone)]
pub struct AppState {
    pub infer: Arc<InferenceService>,
    pub prompts: Arc<PromptLibrary>,
    pub model: Arc<str>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::status))
        .route("/health", get(handlers::health))
        .route("/generate_post", post(handlers::generate_post))
        .route("/regenerate_post", post(handlers::regenerate_post))
        .route("/modify_post", post(handlers::modify_post))
}

/// Full application: routes, CORS for any origin, shared state.
/// Posts and context have no length cap, so the body limit is off.
pub fn app(state: AppState) -> Router {
    router()
        .layer(DefaultBodyLimit::disable())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
