//! Swagger UI exposure.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::documentation::ApiDoc;

/// Swagger UI router serving the OpenAPI document.
pub fn router() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi())
}
