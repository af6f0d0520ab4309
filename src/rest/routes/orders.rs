//! Order endpoints: commit a session at order placement and read back what
//! was stored.

use axum::{
    extract::{Path, State},
    Json,
};

use super::validate_id;
use crate::render::{render_order_section, HtmlRenderSink};
use crate::rest::dto::{
    summary_lines, CommitRequest, CommitResponse, DetailRowResponse, OrderDetailsResponse,
    OrderSummaryResponse,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::schema::sections;
use crate::summary::{order_detail_rows, SummaryRenderer};

/// Commit a session's sections onto an order
///
/// Any failure aborts order placement; the session is left intact so the
/// customer can retry.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_id}/commit",
    tag = "Orders",
    params(
        ("order_id" = String, Path, description = "Order id")
    ),
    request_body = CommitRequest,
    responses(
        (status = 200, description = "Sections written to the order", body = CommitResponse),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 500, description = "Commit aborted", body = ErrorResponse),
        (status = 504, description = "Commit timed out", body = ErrorResponse)
    )
)]
pub async fn commit(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    validate_id("order", &order_id)?;
    validate_id("session", &request.session_id)?;

    let requested: Vec<&str> = match &request.sections {
        Some(list) => list.iter().map(String::as_str).collect(),
        None => sections::ALL.to_vec(),
    };

    let session = state.session(&request.session_id);
    let report = state
        .committer()
        .commit(&order_id, &session, state.settings(), &requested)
        .await?;

    Ok(Json(CommitResponse::from(&report)))
}

/// Summary of one section as stored on the order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/sections/{section}/summary",
    tag = "Orders",
    params(
        ("order_id" = String, Path, description = "Order id"),
        ("section" = String, Path, description = "Section key")
    ),
    responses(
        (status = 200, description = "Section summary", body = OrderSummaryResponse),
        (status = 404, description = "Section disabled or unknown", body = ErrorResponse)
    )
)]
pub async fn section_summary(
    State(state): State<ApiState>,
    Path((order_id, section)): Path<(String, String)>,
) -> Result<Json<OrderSummaryResponse>, ApiError> {
    validate_id("order", &order_id)?;

    let schema = state.provider.resolve(&section, state.settings());
    if schema.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Section '{}' is not enabled",
            section
        )));
    }

    let order = state.committer().load(&order_id).await?;
    let summary = SummaryRenderer::from_settings(state.settings()).render(&schema, &order);

    let mut sink = HtmlRenderSink::with_renderer(state.renderer.clone());
    render_order_section(
        state.provider.as_ref(),
        state.settings(),
        &order,
        &section,
        &mut sink,
    )?;

    Ok(Json(OrderSummaryResponse::new(
        &order_id,
        &summary,
        sink.section(&section).unwrap_or_default().to_string(),
    )))
}

/// Gift details for the order confirmation and order emails
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/details",
    tag = "Orders",
    params(
        ("order_id" = String, Path, description = "Order id")
    ),
    responses(
        (status = 200, description = "Order detail rows", body = OrderDetailsResponse)
    )
)]
pub async fn details(
    State(state): State<ApiState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetailsResponse>, ApiError> {
    validate_id("order", &order_id)?;

    let order = state.committer().load(&order_id).await?;
    let details = order_detail_rows(&order, state.provider.as_ref(), state.settings());

    Ok(Json(OrderDetailsResponse {
        order_id,
        rows: details.rows.iter().map(DetailRowResponse::from).collect(),
        gift_section: details.gift_section.as_ref().map(summary_lines),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::order::MemoryOrderStore;
    use crate::schema::{FieldValue, SectionValues};
    use crate::session::MemorySessionBackend;
    use std::sync::Arc;

    struct Fixture {
        state: ApiState,
        orders: Arc<MemoryOrderStore>,
    }

    fn fixture(display_in_order_details: bool) -> Fixture {
        let mut config = Config::default();
        config.checkout.gift_options.enabled = true;
        config.checkout.gift_options.display_in_order_details = display_in_order_details;
        config.commit.retry = crate::retry::RetryPolicy::immediate(2);

        let orders = Arc::new(MemoryOrderStore::new());
        let state = ApiState::with_backends(
            config,
            Arc::new(MemorySessionBackend::new()),
            orders.clone(),
        )
        .unwrap();
        Fixture { state, orders }
    }

    async fn stage_gift(state: &ApiState, message: &str, from: &str) {
        let schema = state.provider.resolve(sections::GIFT_OPTIONS, state.settings());
        let mut values = SectionValues::new();
        values.insert("gift_message".to_string(), FieldValue::text(message));
        values.insert("gift_from".to_string(), FieldValue::text(from));
        state.session("sess-1").set(&schema, values).await.unwrap();
    }

    fn gift_commit() -> CommitRequest {
        CommitRequest {
            session_id: "sess-1".to_string(),
            sections: Some(vec![sections::GIFT_OPTIONS.to_string()]),
        }
    }

    #[tokio::test]
    async fn test_commit_then_summary() {
        let fx = fixture(true);
        stage_gift(&fx.state, "Enjoy", "Bo").await;

        let resp = commit(
            State(fx.state.clone()),
            Path("1001".to_string()),
            Json(gift_commit()),
        )
        .await
        .unwrap();
        assert_eq!(resp.sections.len(), 1);
        assert_eq!(resp.sections[0].attempts, 1);
        assert!(!fx.state.session("sess-1").has_section("gift_options").await.unwrap());

        let resp = section_summary(
            State(fx.state),
            Path(("1001".to_string(), "gift_options".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(resp.lines, vec!["Enjoy", "From: Bo"]);
        assert!(resp.html.contains("Enjoy"));
        assert!(!resp.html.contains("substep__edit"));
    }

    #[tokio::test]
    async fn test_commit_failure_keeps_session() {
        let fx = fixture(true);
        stage_gift(&fx.state, "Enjoy", "").await;
        fx.orders.set_read_only(true);

        let result = commit(
            State(fx.state.clone()),
            Path("1001".to_string()),
            Json(gift_commit()),
        )
        .await;

        assert!(matches!(result, Err(ApiError::CommitAborted(_))));
        assert!(fx.state.session("sess-1").has_section("gift_options").await.unwrap());
    }

    #[tokio::test]
    async fn test_summary_of_disabled_section_is_not_found() {
        let mut fx = fixture(true);
        let mut config = (*fx.state.config).clone();
        config.checkout.gift_options.enabled = false;
        fx.state.config = Arc::new(config);

        let result = section_summary(
            State(fx.state),
            Path(("1001".to_string(), "gift_options".to_string())),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_details_rows() {
        let fx = fixture(true);
        stage_gift(&fx.state, "Enjoy", "Bo").await;
        commit(
            State(fx.state.clone()),
            Path("1001".to_string()),
            Json(gift_commit()),
        )
        .await
        .unwrap();

        let resp = details(State(fx.state), Path("1001".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.rows.len(), 2);
        assert_eq!(resp.rows[0].label, "Gift message:");
        assert_eq!(resp.rows[1].value, "Bo");
        assert!(resp.gift_section.is_none());
    }

    #[tokio::test]
    async fn test_details_as_separate_section() {
        let fx = fixture(false);
        stage_gift(&fx.state, "Enjoy", "").await;
        commit(
            State(fx.state.clone()),
            Path("1002".to_string()),
            Json(gift_commit()),
        )
        .await
        .unwrap();

        let resp = details(State(fx.state), Path("1002".to_string()))
            .await
            .unwrap();
        assert!(resp.rows.is_empty());
        assert_eq!(resp.gift_section, Some(vec!["Enjoy".to_string()]));
    }
}
