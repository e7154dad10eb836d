//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the conversation endpoint and OpenAPI documentation.

use crate::{
    handlers,
    models::{ConversationView, ErrorResponse, Modality, ProcessResponse, TurnForm, TurnView},
    state::AppState,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Largest accepted request body; matches the upload limit of hosted Whisper.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::process_conversation,
        handlers::list_templates,
        handlers::get_conversation,
    ),
    components(
        schemas(TurnForm, ProcessResponse, ConversationView, TurnView, ErrorResponse, Modality)
    ),
    tags(
        (name = "Colloquy API", description = "Text and voice conversations with persona-driven language models")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/process/", post(handlers::process_conversation))
        .route("/process", post(handlers::process_conversation))
        .route("/templates", get(handlers::list_templates))
        .route("/conversations/{id}", get(handlers::get_conversation))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
}
