use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the chat frontend and data catalogue
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Service banner and health
        .route("/", get(handlers::api::root))
        .route("/health", get(handlers::api::health))
        .nest(
            "/api",
            Router::new()
                // Conversational pipeline
                .route("/chat", post(handlers::api::chat))
                .route("/chat/history/{session_id}", get(handlers::api::chat_history))

                // Data catalogue
                .route("/data/summary", get(handlers::api::data_summary))
                .route("/data/floats", get(handlers::api::list_floats))
                .route("/data/profiles/{float_id}", get(handlers::api::float_profiles))

                // Timeline view
                .route("/timeline/data", get(handlers::api::timeline_data))
                .route("/timeline/regions", get(handlers::api::timeline_regions))
                .route("/timeline/parameters", get(handlers::api::timeline_parameters)),
        )
}
