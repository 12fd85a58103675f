use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::pipeline::OverlayService;
use crate::tools::{ComposeOverlayRequest, InspectImageRequest};

#[derive(Clone)]
pub struct OverlayMcpServer {
    tool_router: ToolRouter<Self>,
    service: Arc<OverlayService>,
}

impl OverlayMcpServer {
    pub fn new(service: Arc<OverlayService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }
}

#[tool_router]
impl OverlayMcpServer {
    #[tool(
        description = "Compose a captioned overlay image from an allow-listed background URL. Returns the overlay URL; show it with ![](url)"
    )]
    async fn compose_overlay(
        &self,
        Parameters(request): Parameters<ComposeOverlayRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::compose_overlay(&self.service, Parameters(request)).await
    }

    #[tool(description = "Read the pixel size and media type of an allow-listed image without decoding it")]
    async fn inspect_image(
        &self,
        Parameters(request): Parameters<InspectImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::inspect_image(&self.service, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for OverlayMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
