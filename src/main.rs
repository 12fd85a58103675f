use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use caption_overlay::{Config, OverlayService, http, mcp_server::OverlayMcpServer, warmup};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env().context("load configuration")?);
    let bind_address = config.bind_address();
    let mcp_path = config.mcp_path();
    let service = Arc::new(OverlayService::new(config.clone()).context("build overlay service")?);

    let service_for_mcp = service.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(OverlayMcpServer::new(service_for_mcp.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = http::router(service.clone())
        .nest_service(&mcp_path, mcp_service)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().include_headers(false)));

    warmup::spawn_warmup(service.clone());

    let tcp_listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("bind {bind_address}"))?;
    info!(
        address = %bind_address,
        mcp_path = %mcp_path,
        allowed_hosts = ?config.allowed_hosts,
        cache_dir = %config.cache_dir.display(),
        "caption overlay server started"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
