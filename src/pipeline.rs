use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};
use url::Url;

use crate::cache::{CacheGateway, CacheRecord, LocalFileStorage};
use crate::config::{BackgroundEmbedStrategy, Config};
use crate::error::OverlayError;
use crate::fetcher::ImageFetcher;
use crate::image_processing::{Dimensions, sniff_dimensions};
use crate::layout::{LayoutBounds, LineLayout, initial_font_size, layout_text};
use crate::render::{
    BackgroundRef, NO_STORE, OverlayDocument, OverlayStyle, RenderedOutput, render_error,
    render_overlay,
};
use crate::tools::validate_image_url;

const USAGE_IMAGE_URL: &str = "https://images.unsplash.com/photo-1484417894907-623942c8ee29?w=1200";
const USAGE_TEXT: &str = "Usage: ?img=<ALLOWED_URL>&text=<TEXT>&name=<NAME>";
const USAGE_BADGE: &str = "Example";

/// Caller-facing inputs for one overlay, as received.
#[derive(Debug, Clone, Default)]
pub struct OverlayRequest {
    pub image_url: Option<String>,
    pub text: Option<String>,
    pub name: Option<String>,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub font_size: Option<f64>,
}

/// Where a background came from on this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct LoadedBackground {
    pub url: Url,
    pub record: CacheRecord,
    pub cache_status: CacheStatus,
}

/// A caption laid out against a background, ready to render.
#[derive(Debug, Clone)]
pub struct ComposedOverlay {
    pub background: LoadedBackground,
    pub layout: LineLayout,
}

/// Validate → cache → fetch+sniff → layout → render.
#[derive(Clone, Debug)]
pub struct OverlayService {
    config: Arc<Config>,
    fetcher: ImageFetcher,
    cache: CacheGateway,
}

impl OverlayService {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let fetcher = ImageFetcher::new(&config)?;
        let storage = LocalFileStorage::new(config.cache_dir.clone());
        let cache = CacheGateway::new(storage, config.cache_version.clone(), config.cache_ttl);
        Ok(Self {
            config,
            fetcher,
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    pub fn validate(&self, raw: &str) -> Result<Url, OverlayError> {
        validate_image_url(raw, &self.config.allowed_hosts)
    }

    /// Returns the cached record for `url`, or fetches, sniffs and schedules
    /// a detached cache write before returning.
    pub async fn load_background(&self, url: &Url) -> Result<LoadedBackground, OverlayError> {
        let key = self.cache.key_for(url);
        if let Some(record) = self.cache.get(&key).await {
            debug!(url = %url, cache_key = key.as_str(), "background cache hit");
            return Ok(LoadedBackground {
                url: url.clone(),
                record,
                cache_status: CacheStatus::Hit,
            });
        }

        debug!(url = %url, cache_key = key.as_str(), "background cache miss");
        let fetched = self.fetcher.fetch(url).await?;
        let fallback = Dimensions {
            width: self.config.layout.default_width,
            height: self.config.layout.default_height,
        };
        let dims = sniff_dimensions(&fetched.bytes, fallback);
        let record = CacheRecord::new(
            url.as_str(),
            &fetched.content_type,
            &fetched.bytes,
            dims,
            self.cache.ttl(),
        );
        info!(
            url = %url,
            width = dims.width,
            height = dims.height,
            size = fetched.bytes.len(),
            "fetched background"
        );
        self.cache.put_detached(key, record.clone());
        Ok(LoadedBackground {
            url: url.clone(),
            record,
            cache_status: CacheStatus::Miss,
        })
    }

    pub fn layout_caption(&self, text: &str, dims: Dimensions, requested_font: Option<f64>) -> LineLayout {
        let layout_config = &self.config.layout;
        let bounds = LayoutBounds::for_canvas(layout_config, dims.width, dims.height);
        let initial = initial_font_size(layout_config, dims.height, requested_font);
        layout_text(text, initial, &bounds)
    }

    /// Loads the background and lays out the caption without rendering.
    pub async fn compose(&self, url: &Url, request: &OverlayRequest) -> Result<ComposedOverlay, OverlayError> {
        let background = self.load_background(url).await?;
        let text = request.text.as_deref().unwrap_or_default();
        let layout = self.layout_caption(text, background.record.dimensions(), request.font_size);
        Ok(ComposedOverlay { background, layout })
    }

    /// Produces the response document for `request`: the usage card when
    /// inputs are missing, otherwise the composited overlay.
    pub async fn render(&self, request: &OverlayRequest) -> Result<RenderedOutput, OverlayError> {
        let image_url = request
            .image_url
            .as_deref()
            .filter(|value| !value.trim().is_empty());
        let Some(image_url) = image_url else {
            return Ok(self.render_usage());
        };
        let url = self.validate(image_url)?;

        let has_text = request
            .text
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty());
        if self.config.require_text && !has_text {
            return Ok(self.render_usage());
        }

        let composed = self.compose(&url, request).await?;
        let style = OverlayStyle::with_overrides(request.bg_color.as_deref(), request.text_color.as_deref());
        let document = OverlayDocument {
            dims: composed.background.record.dimensions(),
            background: self.background_ref(&composed.background),
            layout: &composed.layout,
            badge: request.name.as_deref(),
            style: &style,
        };
        let svg = render_overlay(&document, &self.config.layout);
        Ok(RenderedOutput::svg(svg, self.config.immutable_cache_control()))
    }

    fn background_ref(&self, background: &LoadedBackground) -> BackgroundRef {
        match self.config.embed_strategy {
            BackgroundEmbedStrategy::Inline => BackgroundRef::Inline(background.record.data_uri()),
            BackgroundEmbedStrategy::ByReference => {
                BackgroundRef::Href(self.background_link(&background.url))
            }
        }
    }

    /// Public URL of the `/bg` passthrough for `url`.
    pub fn background_link(&self, url: &Url) -> String {
        let base = format!("{}/bg", self.config.public_base_url);
        match Url::parse_with_params(&base, &[("img", url.as_str())]) {
            Ok(link) => link.to_string(),
            Err(_) => base,
        }
    }

    /// Public URL of the overlay endpoint for `request`.
    pub fn overlay_link(&self, request: &OverlayRequest) -> String {
        let base = format!("{}/overlay", self.config.public_base_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(value) = request.image_url.as_deref() {
            params.push(("img", value.to_string()));
        }
        if let Some(value) = request.text.as_deref() {
            params.push(("text", value.to_string()));
        }
        if let Some(value) = request.name.as_deref() {
            params.push(("name", value.to_string()));
        }
        if let Some(value) = request.bg_color.as_deref() {
            params.push(("bgColor", value.to_string()));
        }
        if let Some(value) = request.text_color.as_deref() {
            params.push(("textColor", value.to_string()));
        }
        if let Some(value) = request.font_size {
            params.push(("fontSize", value.to_string()));
        }
        match Url::parse_with_params(&base, &params) {
            Ok(link) => link.to_string(),
            Err(_) => base,
        }
    }

    pub fn render_usage(&self) -> RenderedOutput {
        let layout_config = &self.config.layout;
        let dims = Dimensions {
            width: layout_config.default_width,
            height: layout_config.default_height,
        };
        let font_size = dims.height as f64 * layout_config.font_ratio;
        let bounds = LayoutBounds::for_canvas(layout_config, dims.width, dims.height);
        let layout = LineLayout {
            lines: crate::layout::wrap_text(USAGE_TEXT, bounds.max_width, font_size),
            font_size,
        };
        let style = OverlayStyle::default();
        let document = OverlayDocument {
            dims,
            background: BackgroundRef::Href(USAGE_IMAGE_URL.to_string()),
            layout: &layout,
            badge: Some(USAGE_BADGE),
            style: &style,
        };
        RenderedOutput::svg(render_overlay(&document, layout_config), NO_STORE)
    }

    pub fn render_failure(&self, error: &OverlayError) -> RenderedOutput {
        RenderedOutput::svg(render_error(&error.to_string(), &self.config.layout), NO_STORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SVG_CONTENT_TYPE;

    fn service(embed_strategy: BackgroundEmbedStrategy) -> (OverlayService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            public_base_url: "https://overlay.example".to_string(),
            embed_strategy,
            ..Config::default()
        };
        (OverlayService::new(Arc::new(config)).unwrap(), dir)
    }

    #[tokio::test]
    async fn missing_image_renders_the_usage_card() {
        let (service, _dir) = service(BackgroundEmbedStrategy::Inline);
        let output = service.render(&OverlayRequest::default()).await.unwrap();
        assert_eq!(output.cache_control, NO_STORE);
        assert_eq!(output.content_type, SVG_CONTENT_TYPE);
        assert!(output.body.contains("Usage: ?img=&lt;ALLOWED_URL&gt;&amp;text=&lt;TEXT&gt;&amp;name=&lt;NAME&gt;"));
        assert!(output.body.contains(">Example</text>"));
    }

    #[tokio::test]
    async fn missing_text_renders_usage_when_strict() {
        let (service, _dir) = service(BackgroundEmbedStrategy::Inline);
        let request = OverlayRequest {
            image_url: Some("https://images.unsplash.com/photo-X".to_string()),
            ..OverlayRequest::default()
        };
        let output = service.render(&request).await.unwrap();
        assert_eq!(output.cache_control, NO_STORE);
        assert!(output.body.contains("Usage:"));
    }

    #[tokio::test]
    async fn disallowed_host_is_rejected_before_any_fetch() {
        let (service, _dir) = service(BackgroundEmbedStrategy::Inline);
        let request = OverlayRequest {
            image_url: Some("https://evil.example.com/a.png".to_string()),
            text: Some("hi".to_string()),
            ..OverlayRequest::default()
        };
        let err = service.render(&request).await.unwrap_err();
        assert!(matches!(err, OverlayError::HostNotAllowed(host) if host == "evil.example.com"));
    }

    #[test]
    fn links_point_at_the_public_base() {
        let (service, _dir) = service(BackgroundEmbedStrategy::ByReference);
        let url = Url::parse("https://i.imgur.com/a.png?x=1&y=2").unwrap();
        assert_eq!(
            service.background_link(&url),
            "https://overlay.example/bg?img=https%3A%2F%2Fi.imgur.com%2Fa.png%3Fx%3D1%26y%3D2"
        );
        let request = OverlayRequest {
            image_url: Some("https://i.imgur.com/a.png".to_string()),
            text: Some("Hello World".to_string()),
            name: Some("Alice".to_string()),
            ..OverlayRequest::default()
        };
        assert_eq!(
            service.overlay_link(&request),
            "https://overlay.example/overlay?img=https%3A%2F%2Fi.imgur.com%2Fa.png&text=Hello+World&name=Alice"
        );
    }

    #[test]
    fn caption_layout_uses_canvas_bounds() {
        let (service, _dir) = service(BackgroundEmbedStrategy::Inline);
        let layout = service.layout_caption("Hello World", Dimensions::FALLBACK, None);
        assert_eq!(layout.lines, vec!["Hello World".to_string()]);
        assert_eq!(layout.font_size, 25.2);
    }

    #[test]
    fn failures_render_as_uncached_svg() {
        let (service, _dir) = service(BackgroundEmbedStrategy::Inline);
        let output = service.render_failure(&OverlayError::fetch_failed(
            "https://i.imgur.com/a.png",
            Some(404),
            "HTTP 404 Not Found",
        ));
        assert_eq!(output.cache_control, NO_STORE);
        assert!(output.body.contains("HTTP 404 Not Found"));
    }
}
