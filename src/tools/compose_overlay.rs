use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    pipeline::{CacheStatus, OverlayRequest, OverlayService},
    render::SVG_CONTENT_TYPE,
    tools::{ToolResponse, overlay_error_to_mcp, to_json},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComposeOverlayRequest {
    #[schemars(description = "Background image URL on an allowed host")]
    pub img: String,
    #[schemars(description = "Caption text; use \\n for hard line breaks")]
    pub text: String,
    #[schemars(description = "Optional badge label shown above the caption")]
    pub name: Option<String>,
    #[schemars(description = "Caption band color, e.g. rgba(0,0,0,0.6)")]
    pub bg_color: Option<String>,
    #[schemars(description = "Caption text color, e.g. #FFFFFF")]
    pub text_color: Option<String>,
    #[schemars(description = "Initial font size in pixels; shrinks to fit")]
    pub font_size: Option<f64>,
}

impl From<ComposeOverlayRequest> for OverlayRequest {
    fn from(request: ComposeOverlayRequest) -> Self {
        Self {
            image_url: Some(request.img),
            text: Some(request.text),
            name: request.name.filter(|value| !value.trim().is_empty()),
            bg_color: request.bg_color,
            text_color: request.text_color,
            font_size: request.font_size.filter(|value| value.is_finite() && *value > 0.0),
        }
    }
}

/// Warms the background cache, lays out the caption and hands back the
/// public overlay URL.
pub async fn compose_overlay(
    service: &OverlayService,
    Parameters(request): Parameters<ComposeOverlayRequest>,
) -> Result<CallToolResult, McpError> {
    let request = OverlayRequest::from(request);
    let raw_url = request.image_url.as_deref().unwrap_or_default();
    let url = service.validate(raw_url).map_err(overlay_error_to_mcp)?;
    let composed = service
        .compose(&url, &request)
        .await
        .map_err(overlay_error_to_mcp)?;

    let dims = composed.background.record.dimensions();
    let cache_note = match composed.background.cache_status {
        CacheStatus::Hit => "cached",
        CacheStatus::Miss => "fetched",
    };
    let response = ToolResponse {
        url: service.overlay_link(&request),
        name: request.name.clone().unwrap_or_else(|| "overlay".to_string()),
        mime_type: SVG_CONTENT_TYPE.to_string(),
        text: format!(
            "Overlay {}x{}, {} caption line(s) at {}px, background {}.",
            dims.width,
            dims.height,
            composed.layout.line_count(),
            composed.layout.font_size,
            cache_note
        ),
    };
    Ok(CallToolResult::success(vec![Content::text(to_json(
        &response,
        "serialize tool response failed",
    )?)]))
}
