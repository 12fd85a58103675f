//! Header-only inspection of raster formats.
//!
//! Nothing here decodes pixels. Dimensions are read from fixed header
//! locations; anything unexpected falls back to the configured default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const FALLBACK: Dimensions = Dimensions {
        width: 1200,
        height: 630,
    };

    /// Width over height, or 0 for a degenerate size.
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    None
}

/// Recovers width and height from JPEG, PNG or WebP headers, or returns
/// `fallback` when the format is unknown or the header is malformed.
pub fn sniff_dimensions(bytes: &[u8], fallback: Dimensions) -> Dimensions {
    match try_sniff(bytes) {
        Some(dims) if !dims.is_empty() => dims,
        _ => {
            tracing::debug!(len = bytes.len(), "dimension sniffing fell back to default");
            fallback
        }
    }
}

fn try_sniff(bytes: &[u8]) -> Option<Dimensions> {
    if read_u16_be(bytes, 0)? == 0xFFD8 {
        return sniff_jpeg(bytes);
    }
    if read_u32_be(bytes, 0)? == 0x8950_4E47 {
        return sniff_png(bytes);
    }
    if bytes.get(8..12)? == b"WEBP" {
        return sniff_webp(bytes);
    }
    None
}

fn sniff_jpeg(bytes: &[u8]) -> Option<Dimensions> {
    let mut offset = 2usize;
    while offset < bytes.len() {
        let marker = read_u16_be(bytes, offset)?;
        if marker >> 8 != 0xFF {
            return None;
        }
        if is_start_of_frame(marker) {
            let height = read_u16_be(bytes, offset + 5)?;
            let width = read_u16_be(bytes, offset + 7)?;
            return Some(Dimensions {
                width: u32::from(width),
                height: u32::from(height),
            });
        }
        // Start of scan: entropy-coded data follows and no frame header was seen.
        if marker == 0xFFDA {
            return None;
        }
        let length = usize::from(read_u16_be(bytes, offset + 2)?);
        if length < 2 {
            return None;
        }
        offset = offset.checked_add(2 + length)?;
    }
    None
}

/// SOF0..SOF15, minus DHT (C4), JPG (C8) and DAC (CC) which share the range.
fn is_start_of_frame(marker: u16) -> bool {
    matches!(marker, 0xFFC0..=0xFFCF) && !matches!(marker, 0xFFC4 | 0xFFC8 | 0xFFCC)
}

fn sniff_png(bytes: &[u8]) -> Option<Dimensions> {
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some(Dimensions {
        width: read_u32_be(bytes, 16)?,
        height: read_u32_be(bytes, 20)?,
    })
}

fn sniff_webp(bytes: &[u8]) -> Option<Dimensions> {
    if bytes.get(0..4)? != b"RIFF" {
        return None;
    }
    match bytes.get(12..16)? {
        b"VP8 " => {
            // Keyframes only; bit 0 of the frame tag is the inverse keyframe flag.
            if bytes.get(20)? & 0x01 != 0 || bytes.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            Some(Dimensions {
                width: u32::from(read_u16_le(bytes, 26)? & 0x3FFF),
                height: u32::from(read_u16_le(bytes, 28)? & 0x3FFF),
            })
        }
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let bits = read_u32_le(bytes, 21)?;
            Some(Dimensions {
                width: (bits & 0x3FFF) + 1,
                height: ((bits >> 14) & 0x3FFF) + 1,
            })
        }
        b"VP8X" => Some(Dimensions {
            width: read_u24_le(bytes, 24)? + 1,
            height: read_u24_le(bytes, 27)? + 1,
        }),
        _ => None,
    }
}

fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([raw[0], raw[1]]))
}

fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u24_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(3)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], 0]))
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
