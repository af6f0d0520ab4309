//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    CommitRequest, CommitResponse, CreateSessionResponse, DetailRowResponse, FieldErrorResponse,
    FieldResponse, FragmentsResponse, HealthResponse, OptionResponse, OrderDetailsResponse,
    OrderSummaryResponse, SchemaResponse, SectionCommitResponse, SectionResponse,
    UpdateSectionRequest,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the checkout API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout Substeps API",
        description = "Collapsible checkout sections backed by a customer session and committed onto orders.",
        license(name = "MIT")
    ),
    paths(
        crate::rest::routes::health::health,
        crate::rest::routes::sections::schema,
        crate::rest::routes::sessions::create,
        crate::rest::routes::sessions::get_section,
        crate::rest::routes::sessions::update_section,
        crate::rest::routes::sessions::edit,
        crate::rest::routes::sessions::fragments,
        crate::rest::routes::orders::commit,
        crate::rest::routes::orders::section_summary,
        crate::rest::routes::orders::details,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            SchemaResponse,
            FieldResponse,
            OptionResponse,
            CreateSessionResponse,
            SectionResponse,
            FieldErrorResponse,
            FragmentsResponse,
            CommitResponse,
            SectionCommitResponse,
            OrderSummaryResponse,
            OrderDetailsResponse,
            DetailRowResponse,
            ErrorResponse,
            // Request types
            UpdateSectionRequest,
            CommitRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Sections", description = "Resolved section schemas"),
        (name = "Sessions", description = "Checkout substeps backed by the customer session"),
        (name = "Orders", description = "Committing sections to orders and reading them back"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
