//! SVG composition of background, caption band, caption text and badge.

use std::fmt::Write;

use crate::config::LayoutConfig;
use crate::image_processing::Dimensions;
use crate::layout::{LineLayout, wrap_text};

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml; charset=utf-8";
pub const NO_STORE: &str = "no-store";

const DEFAULT_BAND_COLOR: &str = "rgba(0,0,0,0.6)";
const DEFAULT_TEXT_COLOR: &str = "white";
const BADGE_FILL: &str = "rgba(255,255,255,0.25)";
const BADGE_FONT_RATIO: f64 = 0.75;
const BADGE_HEIGHT_RATIO: f64 = 1.8;
const BADGE_CHAR_WIDTH: f64 = 0.6;
const BADGE_PADDING_RATIO: f64 = 0.8;
const MAX_COLOR_LEN: usize = 64;

/// How the `<image>` element points at the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundRef {
    /// A complete `data:` URI.
    Inline(String),
    /// An absolute URL, escaped on output.
    Href(String),
}

impl BackgroundRef {
    fn href(&self) -> String {
        match self {
            Self::Inline(data_uri) => escape_xml(data_uri),
            Self::Href(url) => escape_xml(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    pub band_color: String,
    pub text_color: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            band_color: DEFAULT_BAND_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
        }
    }
}

impl OverlayStyle {
    /// Applies caller color overrides, ignoring values that are not plain
    /// CSS color syntax.
    pub fn with_overrides(band_color: Option<&str>, text_color: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            band_color: band_color.and_then(sanitize_color).unwrap_or(defaults.band_color),
            text_color: text_color.and_then(sanitize_color).unwrap_or(defaults.text_color),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayDocument<'a> {
    pub dims: Dimensions,
    pub background: BackgroundRef,
    pub layout: &'a LineLayout,
    pub badge: Option<&'a str>,
    pub style: &'a OverlayStyle,
}

/// Markup plus the response metadata it should be served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub body: String,
    pub content_type: &'static str,
    pub cache_control: String,
}

impl RenderedOutput {
    pub fn svg(body: String, cache_control: impl Into<String>) -> Self {
        Self {
            body,
            content_type: SVG_CONTENT_TYPE,
            cache_control: cache_control.into(),
        }
    }
}

/// Escapes the five XML special characters.
pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn sanitize_color(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_COLOR_LEN
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '(' | ')' | ',' | '.' | '%' | ' '));
    valid.then(|| trimmed.to_string())
}

/// Two decimals at most, trailing zeros trimmed.
fn num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Height of the caption band for `layout`, badge row included.
pub fn band_height(layout: &LineLayout, has_badge: bool, config: &LayoutConfig) -> f64 {
    layout.block_height(config.line_height)
        + config.padding * 1.5
        + if has_badge { layout.font_size } else { 0.0 }
}

pub fn render_overlay(doc: &OverlayDocument<'_>, config: &LayoutConfig) -> String {
    let width = doc.dims.width;
    let height = doc.dims.height;
    let font_size = doc.layout.font_size;
    let badge = doc.badge.filter(|name| !name.trim().is_empty());
    let band = band_height(doc.layout, badge.is_some(), config);
    let band_y = height as f64 - band;

    let mut svg = String::with_capacity(1024);
    let _ = write!(
        svg,
        r#"<svg width="{width}" height="{height}" viewBox="0 0 {width} {height}" xmlns="http://www.w3.org/2000/svg">"#
    );
    let _ = write!(
        svg,
        "<style>.txt{{font-family:{family};font-size:{size}px;fill:{fill};font-weight:600;}}\
         .name{{font-family:{family};font-size:{badge_size}px;fill:{fill};font-weight:700;}}</style>",
        family = config.font_family,
        size = num(font_size),
        badge_size = num(font_size * BADGE_FONT_RATIO),
        fill = doc.style.text_color,
    );
    let _ = write!(
        svg,
        r#"<image href="{}" width="100%" height="100%" preserveAspectRatio="xMidYMid slice"/>"#,
        doc.background.href()
    );
    let _ = write!(
        svg,
        r#"<rect y="{}" width="100%" height="{}" fill="{}"/>"#,
        num(band_y),
        num(band),
        doc.style.band_color
    );

    if let Some(name) = badge {
        svg.push_str(&badge_markup(name, font_size, band_y));
    }

    let text_offset = if badge.is_some() {
        font_size * 1.5
    } else {
        config.padding * 0.5
    };
    let padding = num(config.padding);
    let _ = write!(
        svg,
        r#"<text x="{padding}" y="{}" class="txt">"#,
        num(band_y + text_offset + font_size)
    );
    for (index, line) in doc.layout.lines.iter().enumerate() {
        let dy = if index == 0 {
            "0".to_string()
        } else {
            format!("{}em", num(config.line_height))
        };
        let _ = write!(
            svg,
            r#"<tspan x="{padding}" dy="{dy}">{}</tspan>"#,
            escape_xml(line)
        );
    }
    svg.push_str("</text></svg>");
    svg
}

/// Parallelogram label at the band's top-left corner, slanted on the right.
fn badge_markup(name: &str, font_size: f64, band_y: f64) -> String {
    let badge_font = font_size * BADGE_FONT_RATIO;
    let badge_height = badge_font * BADGE_HEIGHT_RATIO;
    let text_width = name.chars().count() as f64 * badge_font * BADGE_CHAR_WIDTH;
    let pad = badge_font * BADGE_PADDING_RATIO;
    let top_right = text_width + pad * 2.0;
    let bottom_right = top_right + badge_height * 0.5;
    let bottom = band_y + badge_height;
    format!(
        r#"<polygon points="0,{top} {tr},{top} {br},{bottom} 0,{bottom}" fill="{BADGE_FILL}"/><text x="{x}" y="{y}" class="name" dominant-baseline="central">{label}</text>"#,
        top = num(band_y),
        tr = num(top_right),
        br = num(bottom_right),
        bottom = num(bottom),
        x = num(pad),
        y = num(band_y + badge_height / 2.0),
        label = escape_xml(name),
    )
}

/// Standalone error card so `<img>` consumers still receive an image.
pub fn render_error(message: &str, config: &LayoutConfig) -> String {
    let width = config.default_width;
    let height = config.default_height;
    let font_size = 28.0;
    let padding = config.padding;
    let lines = wrap_text(message, width as f64 - padding * 2.0, font_size);

    let mut svg = String::with_capacity(512);
    let _ = write!(
        svg,
        r##"<svg width="{width}" height="{height}" viewBox="0 0 {width} {height}" xmlns="http://www.w3.org/2000/svg"><rect width="100%" height="100%" fill="#f8d7da"/>"##
    );
    let _ = write!(
        svg,
        r##"<text x="{p}" y="{y}" font-family="{family}" font-size="{size}" font-weight="700" fill="#721c24">Image could not be generated</text>"##,
        p = num(padding),
        y = num(padding + font_size),
        family = escape_xml(&config.font_family),
        size = num(font_size),
    );
    let _ = write!(
        svg,
        r##"<text x="{p}" y="{y}" font-family="{family}" font-size="{size}" fill="#721c24">"##,
        p = num(padding),
        y = num(padding + font_size * 3.0),
        family = escape_xml(&config.font_family),
        size = num(font_size * 0.8),
    );
    for (index, line) in lines.iter().enumerate() {
        let dy = if index == 0 { "0" } else { "1.4em" };
        let _ = write!(
            svg,
            r#"<tspan x="{}" dy="{dy}">{}</tspan>"#,
            num(padding),
            escape_xml(line)
        );
    }
    svg.push_str("</text></svg>");
    svg
}
