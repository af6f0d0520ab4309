//! Checkout session endpoints.
//!
//! Every request builds a fresh [`SubstepController`]; the session store is
//! the only state carried between requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::validate_id;
use crate::error::CheckoutError;
use crate::render::{fragments as render_fragments, HtmlRenderSink};
use crate::rest::dto::{
    summary_lines, CartQuery, CreateSessionResponse, FieldErrorResponse, FragmentsResponse,
    SectionResponse, UpdateSectionRequest,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::schema::{sections, CartContext};
use crate::substeps::{SubstepController, SubstepState};

impl CartQuery {
    fn context(&self) -> CartContext {
        CartContext {
            needs_shipping: self.needs_shipping.unwrap_or(true),
        }
    }
}

fn section_response(
    state: &ApiState,
    ctl: &SubstepController,
    section: &str,
) -> Result<SectionResponse, ApiError> {
    let substep_state = ctl
        .state(section)
        .ok_or_else(|| ApiError::NotFound(format!("Section '{}' is not open", section)))?;

    let mut sink = HtmlRenderSink::with_renderer(state.renderer.clone());
    ctl.render(section, &mut sink)?;

    Ok(SectionResponse {
        section: section.to_string(),
        state: substep_state.to_string(),
        values: ctl.values(section).cloned().unwrap_or_default(),
        summary: ctl
            .summary(section)
            .map(|s| summary_lines(&s))
            .unwrap_or_default(),
        errors: ctl
            .errors(section)
            .iter()
            .map(FieldErrorResponse::from)
            .collect(),
        html: sink.section(section).unwrap_or_default().to_string(),
    })
}

/// Start a new checkout session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    responses(
        (status = 200, description = "New session id", body = CreateSessionResponse)
    )
)]
pub async fn create() -> Json<CreateSessionResponse> {
    Json(CreateSessionResponse {
        session_id: uuid::Uuid::new_v4().to_string(),
    })
}

/// Current state and values of a section
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/sections/{section}",
    tag = "Sessions",
    params(
        ("id" = String, Path, description = "Session id"),
        ("section" = String, Path, description = "Section key"),
        ("needs_shipping" = Option<bool>, Query, description = "False for virtual-only carts")
    ),
    responses(
        (status = 200, description = "Section as currently shown", body = SectionResponse),
        (status = 400, description = "Invalid session id", body = ErrorResponse)
    )
)]
pub async fn get_section(
    State(state): State<ApiState>,
    Path((session_id, section)): Path<(String, String)>,
    Query(cart): Query<CartQuery>,
) -> Result<Json<SectionResponse>, ApiError> {
    validate_id("session", &session_id)?;
    let mut ctl = state.controller(&session_id, cart.context());
    ctl.open(&section).await?;
    Ok(Json(section_response(&state, &ctl, &section)?))
}

/// Stage submitted values, then advance or autosave.
///
/// Validation failures are returned inline with status 422 and the section
/// left in editing.
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{id}/sections/{section}",
    tag = "Sessions",
    params(
        ("id" = String, Path, description = "Session id"),
        ("section" = String, Path, description = "Section key"),
        ("needs_shipping" = Option<bool>, Query, description = "False for virtual-only carts")
    ),
    request_body = UpdateSectionRequest,
    responses(
        (status = 200, description = "Section saved", body = SectionResponse),
        (status = 409, description = "Section is hidden", body = ErrorResponse),
        (status = 422, description = "Invalid fields, shown inline", body = SectionResponse),
        (status = 503, description = "Session store unavailable, try again", body = ErrorResponse)
    )
)]
pub async fn update_section(
    State(state): State<ApiState>,
    Path((session_id, section)): Path<(String, String)>,
    Query(cart): Query<CartQuery>,
    Json(request): Json<UpdateSectionRequest>,
) -> Result<(StatusCode, Json<SectionResponse>), ApiError> {
    validate_id("session", &session_id)?;
    let mut ctl = state.controller(&session_id, cart.context());

    match ctl.open(&section).await? {
        SubstepState::Hidden => {
            return Err(ApiError::Conflict(format!(
                "Section '{}' is not available",
                section
            )));
        }
        SubstepState::Review => ctl.edit(&section).await?,
        SubstepState::Editing => {}
    }

    ctl.stage_all(&section, request.values)?;

    let outcome = if request.advance {
        ctl.advance(&section).await.map(|_| ())
    } else {
        ctl.autosave(&section).await
    };

    match outcome {
        Ok(()) => Ok((StatusCode::OK, Json(section_response(&state, &ctl, &section)?))),
        Err(CheckoutError::Validation { .. }) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(section_response(&state, &ctl, &section)?),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Reopen a collapsed section for editing
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/sections/{section}/edit",
    tag = "Sessions",
    params(
        ("id" = String, Path, description = "Session id"),
        ("section" = String, Path, description = "Section key"),
        ("needs_shipping" = Option<bool>, Query, description = "False for virtual-only carts")
    ),
    responses(
        (status = 200, description = "Section form with last saved values", body = SectionResponse),
        (status = 409, description = "Section is hidden", body = ErrorResponse)
    )
)]
pub async fn edit(
    State(state): State<ApiState>,
    Path((session_id, section)): Path<(String, String)>,
    Query(cart): Query<CartQuery>,
) -> Result<Json<SectionResponse>, ApiError> {
    validate_id("session", &session_id)?;
    let mut ctl = state.controller(&session_id, cart.context());
    ctl.open(&section).await?;
    ctl.edit(&section).await?;
    Ok(Json(section_response(&state, &ctl, &section)?))
}

/// Summary markup of every visible section, keyed by CSS selector
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/fragments",
    tag = "Sessions",
    params(
        ("id" = String, Path, description = "Session id"),
        ("needs_shipping" = Option<bool>, Query, description = "False for virtual-only carts")
    ),
    responses(
        (status = 200, description = "Summary fragments", body = FragmentsResponse)
    )
)]
pub async fn fragments(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Query(cart): Query<CartQuery>,
) -> Result<Json<FragmentsResponse>, ApiError> {
    validate_id("session", &session_id)?;
    let record = state.session(&session_id).record().await?;
    let fragments = render_fragments(
        &state.renderer,
        state.provider.as_ref(),
        state.settings(),
        &cart.context(),
        &record,
        sections::ALL,
    )?;
    Ok(Json(FragmentsResponse { fragments }))
}
