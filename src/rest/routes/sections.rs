//! Schema inspection endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::rest::dto::SchemaResponse;
use crate::rest::state::ApiState;

/// Resolved schema of a section under the current settings
#[utoipa::path(
    get,
    path = "/api/v1/sections/{section}/schema",
    tag = "Sections",
    params(
        ("section" = String, Path, description = "Section key (e.g., gift_options, shipping)")
    ),
    responses(
        (status = 200, description = "Resolved schema; no fields when disabled or unknown", body = SchemaResponse)
    )
)]
pub async fn schema(
    State(state): State<ApiState>,
    Path(section): Path<String>,
) -> Json<SchemaResponse> {
    let schema = state.provider.resolve(&section, state.settings());
    Json(SchemaResponse::from(&schema))
}
