use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};

use crate::{
    image_processing::detect_mime_type,
    pipeline::OverlayService,
    tools::{overlay_error_to_mcp, to_json},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InspectImageRequest {
    #[schemars(description = "Image URL on an allowed host")]
    pub url: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub mime_type: String,
    pub size: usize,
    pub aspect_ratio: f64,
}

/// Header-sniffed size and format of a background, loaded through the cache.
/// The format comes from magic bytes, falling back to the declared type.
pub async fn inspect_image(
    service: &OverlayService,
    Parameters(request): Parameters<InspectImageRequest>,
) -> Result<CallToolResult, McpError> {
    let url = service.validate(&request.url).map_err(overlay_error_to_mcp)?;
    let background = service
        .load_background(&url)
        .await
        .map_err(overlay_error_to_mcp)?;
    let record = &background.record;
    let dims = record.dimensions();
    let bytes = record.decode_payload().unwrap_or_default();
    let mime_type = detect_mime_type(&bytes).unwrap_or(record.mime_type());
    let info = ImageInfo {
        width: dims.width,
        height: dims.height,
        total_pixels: u64::from(dims.width).saturating_mul(u64::from(dims.height)),
        mime_type: mime_type.to_string(),
        size: bytes.len(),
        aspect_ratio: dims.aspect_ratio(),
    };
    Ok(CallToolResult::success(vec![Content::text(to_json(
        &info,
        "serialize image info failed",
    )?)]))
}
