use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "images.unsplash.com",
    "i.imgur.com",
    "raw.githubusercontent.com",
    "itimg.kr",
];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 25;
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_CACHE_VERSION: &str = "v1";

/// How the background raster is referenced from the composed SVG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundEmbedStrategy {
    /// `data:` URI carrying the cached bytes.
    Inline,
    /// Link to this service's `/bg` endpoint, which serves the cached bytes.
    ByReference,
}

impl BackgroundEmbedStrategy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inline" | "base64" => Ok(Self::Inline),
            "reference" | "by_reference" | "url" => Ok(Self::ByReference),
            other => Err(anyhow!("unknown background embed strategy: {other}")),
        }
    }
}

/// Geometry and typography constants for the caption band.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub default_width: u32,
    pub default_height: u32,
    pub padding: f64,
    /// Initial font size as a fraction of the image height.
    pub font_ratio: f64,
    /// Lower bound applied to the ratio-derived initial font size.
    pub initial_font_floor: f64,
    pub min_font_size: f64,
    /// Upper bound for any initial font size, requested or derived.
    pub max_font_size: f64,
    pub font_step: f64,
    pub line_height: f64,
    /// Text block budget as a fraction of the image height.
    pub max_text_ratio: f64,
    pub font_family: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_width: 1200,
            default_height: 630,
            padding: 40.0,
            font_ratio: 0.04,
            initial_font_floor: 20.0,
            min_font_size: 16.0,
            max_font_size: 512.0,
            font_step: 2.0,
            line_height: 1.4,
            max_text_ratio: 0.45,
            font_family: "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_hosts: Vec<String>,
    pub max_image_bytes: u64,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_version: String,
    pub embed_strategy: BackgroundEmbedStrategy,
    pub public_base_url: String,
    pub require_text: bool,
    pub warmup_urls: Vec<String>,
    pub secret_key: Option<String>,
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        let bind_address = format!("0.0.0.0:{DEFAULT_PORT}");
        Self {
            port: DEFAULT_PORT,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|host| host.to_string()).collect(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_dir: default_cache_dir(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            embed_strategy: BackgroundEmbedStrategy::Inline,
            public_base_url: normalize_base_url(&bind_address),
            require_text: true,
            warmup_urls: Vec::new(),
            secret_key: None,
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let port = parse_env("OVERLAY_PORT")?.unwrap_or(defaults.port);
        let bind_address = format!("0.0.0.0:{port}");

        let allowed_hosts = env_string("ALLOWED_HOSTS")
            .map(|value| split_list(&value))
            .unwrap_or(defaults.allowed_hosts);
        let max_image_bytes = parse_env("MAX_IMAGE_BYTES")?.unwrap_or(defaults.max_image_bytes);
        let fetch_timeout = parse_env("FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let user_agent = env_string("FETCH_USER_AGENT").unwrap_or(defaults.user_agent);
        let cache_dir = env_string("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);
        let cache_ttl = parse_env("CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);
        let cache_version = env_string("CACHE_VERSION").unwrap_or(defaults.cache_version);
        let embed_strategy = match env_string("BACKGROUND_EMBED") {
            Some(value) => BackgroundEmbedStrategy::parse(&value)?,
            None => defaults.embed_strategy,
        };
        let public_base_url = normalize_base_url(
            &env_string("PUBLIC_BASE_URL").unwrap_or_else(|| bind_address.clone()),
        );
        let require_text = parse_env("REQUIRE_TEXT")?.unwrap_or(defaults.require_text);
        let warmup_urls = env_string("WARMUP_URLS")
            .map(|value| split_list(&value))
            .unwrap_or_default();
        let secret_key = env_string("SECRET_KEY");

        Ok(Self {
            port,
            allowed_hosts,
            max_image_bytes,
            fetch_timeout,
            user_agent,
            cache_dir,
            cache_ttl,
            cache_version,
            embed_strategy,
            public_base_url,
            require_text,
            warmup_urls,
            secret_key,
            layout: defaults.layout,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn mcp_path(&self) -> String {
        match self.secret_key.as_deref() {
            Some(value) => format!("/{value}/mcp"),
            None => "/mcp".to_string(),
        }
    }

    /// `Cache-Control` value for successfully composited output.
    pub fn immutable_cache_control(&self) -> String {
        format!("public, max-age={}, immutable", self.cache_ttl.as_secs())
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_string(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("invalid value for {name}: {value}"))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_cache_dir() -> PathBuf {
    let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("caption-overlay");
    base
}

/// Adds a scheme when missing and collapses doubled scheme prefixes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    for (doubled, single) in [
        ("http://http://", "http://"),
        ("https://https://", "https://"),
        ("http://https://", "https://"),
        ("https://http://", "http://"),
    ] {
        while base.starts_with(doubled) {
            base = base.replacen(doubled, single, 1);
        }
    }
    base
}
