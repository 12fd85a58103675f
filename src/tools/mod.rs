pub mod compose_overlay;
pub mod inspect_image;
pub mod url_validation;

use rmcp::ErrorData as McpError;
use serde::Serialize;
use serde_json::Value;

use crate::error::OverlayError;

#[derive(Serialize)]
pub struct ToolResponse {
    pub url: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub text: String,
}

pub(crate) fn overlay_error_to_mcp(err: OverlayError) -> McpError {
    let detail = Some(Value::String(err.to_string()));
    if err.is_client_error() {
        McpError::invalid_params("invalid image url", detail)
    } else {
        McpError::internal_error("fetch image failed", detail)
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String, McpError> {
    serde_json::to_string(value)
        .map_err(|err| McpError::internal_error(what, Some(Value::String(err.to_string()))))
}

pub use compose_overlay::{ComposeOverlayRequest, compose_overlay};
pub use inspect_image::{InspectImageRequest, inspect_image};
pub use url_validation::validate_image_url;
