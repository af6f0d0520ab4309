//! REST API for checkout substeps.
//!
//! Serves section schemas, session-backed substep updates, and order commits
//! so a storefront can drive the checkout page without full reloads.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

use error::ApiError;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed)
    }
}

async fn openapi_json() -> Result<impl IntoResponse, ApiError> {
    let body = ApiDoc::json()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.config.rest_api.cors_origins);

    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        // Schema endpoints
        .route(
            "/api/v1/sections/:section/schema",
            get(routes::sections::schema),
        )
        // Session endpoints
        .route("/api/v1/sessions", post(routes::sessions::create))
        .route(
            "/api/v1/sessions/:id/sections/:section",
            get(routes::sessions::get_section).put(routes::sessions::update_section),
        )
        .route(
            "/api/v1/sessions/:id/sections/:section/edit",
            post(routes::sessions::edit),
        )
        .route(
            "/api/v1/sessions/:id/fragments",
            get(routes::sessions::fragments),
        )
        // Order endpoints
        .route(
            "/api/v1/orders/:order_id/commit",
            post(routes::orders::commit),
        )
        .route(
            "/api/v1/orders/:order_id/sections/:section/summary",
            get(routes::orders::section_summary),
        )
        .route(
            "/api/v1/orders/:order_id/details",
            get(routes::orders::details),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Checkout API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
