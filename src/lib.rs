pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod image_processing;
pub mod layout;
pub mod mcp_server;
pub mod pipeline;
pub mod render;
pub mod tools;
pub mod warmup;

pub use config::{BackgroundEmbedStrategy, Config, LayoutConfig};
pub use error::OverlayError;
pub use pipeline::{OverlayRequest, OverlayService};
