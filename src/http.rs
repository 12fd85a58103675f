use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use crate::error::OverlayError;
use crate::pipeline::{OverlayRequest, OverlayService};
use crate::render::{NO_STORE, RenderedOutput};

pub type AppState = Arc<OverlayService>;

#[derive(Debug, Default, Deserialize)]
pub struct OverlayQuery {
    #[serde(alias = "bgImg")]
    pub img: Option<String>,
    pub text: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "bgColor")]
    pub bg_color: Option<String>,
    #[serde(rename = "textColor")]
    pub text_color: Option<String>,
    #[serde(rename = "fontSize")]
    pub font_size: Option<String>,
}

impl From<OverlayQuery> for OverlayRequest {
    fn from(query: OverlayQuery) -> Self {
        let font_size = query
            .font_size
            .as_deref()
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value > 0.0);
        Self {
            image_url: query.img,
            text: query.text,
            name: query.name.filter(|value| !value.trim().is_empty()),
            bg_color: query.bg_color,
            text_color: query.text_color,
            font_size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackgroundQuery {
    #[serde(alias = "bgImg")]
    pub img: Option<String>,
}

/// Overlay and background routes. The MCP service is nested by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(overlay_image))
        .route("/overlay", get(overlay_image))
        .route("/bg", get(background_image))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn overlay_image(
    State(service): State<AppState>,
    Query(query): Query<OverlayQuery>,
) -> Response {
    let request = OverlayRequest::from(query);
    match service.render(&request).await {
        Ok(output) => svg_response(StatusCode::OK, output),
        Err(err) => error_response(&service, err),
    }
}

/// Serves the cached background bytes so `ByReference` overlays can link to them.
pub async fn background_image(
    State(service): State<AppState>,
    Query(query): Query<BackgroundQuery>,
) -> Response {
    let raw = query.img.unwrap_or_default();
    let url = match service.validate(&raw) {
        Ok(url) => url,
        Err(err) => return error_response(&service, err),
    };
    let background = match service.load_background(&url).await {
        Ok(background) => background,
        Err(err) => return error_response(&service, err),
    };
    let bytes = match background.record.decode_payload() {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(url = %url, error = %err, "cached background payload is not valid base64");
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Cached background is corrupt.");
        }
    };
    let mut response = (StatusCode::OK, bytes).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(background.record.mime_type()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&service.config().immutable_cache_control()) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub async fn health() -> &'static str {
    "ok"
}

fn svg_response(status: StatusCode, output: RenderedOutput) -> Response {
    let cache_control = HeaderValue::from_str(&output.cache_control)
        .unwrap_or_else(|_| HeaderValue::from_static(NO_STORE));
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(output.content_type)),
            (header::CACHE_CONTROL, cache_control),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        ],
        output.body,
    )
        .into_response()
}

fn plain_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE)),
        ],
        message.to_string(),
    )
        .into_response()
}

/// The one place an `OverlayError` becomes a response: client errors as
/// short plain text, upstream failures as an uncached error image.
pub fn error_response(service: &OverlayService, err: OverlayError) -> Response {
    let status = err.status();
    if err.is_client_error() {
        warn!(error = ?err, "rejected overlay request");
        return plain_response(status, &err.to_string());
    }
    warn!(error = %err, upstream_status = err.upstream_status(), "overlay request failed");
    svg_response(status, service.render_failure(&err))
}
