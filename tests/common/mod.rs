#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use caption_overlay::{BackgroundEmbedStrategy, Config, OverlayService, http};
use image::{DynamicImage, ImageFormat, RgbImage};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SMALL_LIMIT: u64 = 64 * 1024;

/// Local stand-in for an image origin, counting hits per route.
#[derive(Clone, Default)]
pub struct Upstream {
    pub photo_hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn photo_hits(&self) -> usize {
        self.photo_hits.load(Ordering::SeqCst)
    }
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut output = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut output), format)
        .expect("encode fixture");
    output
}

async fn photo_png(State(upstream): State<Upstream>) -> impl IntoResponse {
    upstream.photo_hits.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "image/png")],
        encode(1200, 630, ImageFormat::Png),
    )
}

async fn photo_jpeg() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/jpeg")],
        encode(800, 450, ImageFormat::Jpeg),
    )
}

async fn unknown_format() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/avif")], vec![0u8; 64])
}

async fn hostile_content_type() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, r#"image/png"/><script>alert(1)</script><x a=""#)],
        encode(40, 30, ImageFormat::Png),
    )
}

async fn huge() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/png")],
        vec![0u8; (SMALL_LIMIT * 2) as usize],
    )
}

async fn html_page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        "<html><body>not an image</body></html>",
    )
}

async fn missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "no such photo")
}

async fn echo_user_agent(headers: axum::http::HeaderMap) -> impl IntoResponse {
    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if agent.starts_with("Mozilla/5.0") {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            encode(16, 9, ImageFormat::Png),
        )
            .into_response()
    } else {
        (StatusCode::FORBIDDEN, "bots not welcome").into_response()
    }
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ([(header::CONTENT_TYPE, "image/png")], encode(4, 4, ImageFormat::Png))
}

pub async fn spawn_upstream() -> (SocketAddr, Upstream) {
    let upstream = Upstream::default();
    let router = Router::new()
        .route("/photo.png", get(photo_png))
        .route("/photo.jpg", get(photo_jpeg))
        .route("/photo.avif", get(unknown_format))
        .route("/huge.png", get(huge))
        .route("/hostile.png", get(hostile_content_type))
        .route("/page.html", get(html_page))
        .route("/missing.png", get(missing))
        .route("/browser-only.png", get(echo_user_agent))
        .route("/slow.png", get(slow))
        .with_state(upstream.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("upstream server");
    });
    (addr, upstream)
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub service: Arc<OverlayService>,
    pub client: reqwest::Client,
    _cache_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .expect("request overlay")
    }
}

pub fn test_config(cache_dir: &TempDir, embed_strategy: BackgroundEmbedStrategy) -> Config {
    Config {
        allowed_hosts: vec!["127.0.0.1".to_string()],
        cache_dir: cache_dir.path().to_path_buf(),
        max_image_bytes: SMALL_LIMIT,
        fetch_timeout: Duration::from_secs(2),
        embed_strategy,
        ..Config::default()
    }
}

pub async fn spawn_app(embed_strategy: BackgroundEmbedStrategy) -> TestApp {
    let cache_dir = tempfile::tempdir().expect("cache dir");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind app");
    let addr = listener.local_addr().expect("app addr");
    let config = Config {
        public_base_url: format!("http://{addr}"),
        ..test_config(&cache_dir, embed_strategy)
    };
    let service = Arc::new(OverlayService::new(Arc::new(config)).expect("overlay service"));
    let router = http::router(service.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("app server");
    });
    TestApp {
        addr,
        service,
        client: reqwest::Client::new(),
        _cache_dir: cache_dir,
    }
}

/// Polls until the detached cache write for `raw_url` has landed.
pub async fn wait_for_cached(service: &OverlayService, raw_url: &str) -> bool {
    let url = service.validate(raw_url).expect("valid url");
    let key = service.cache().key_for(&url);
    for _ in 0..100 {
        if service.cache().get(&key).await.is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
