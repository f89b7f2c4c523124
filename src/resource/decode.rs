//! Image bytes to straight-alpha RGBA8.

use std::io::Cursor;

use base64::engine::Engine;
use image::ImageFormat;
use percent_encoding::percent_decode_str;
use tiny_skia::Pixmap;

use super::ResourceError;

const SVG_DATA_URI: &str = "data:image/svg+xml,";
const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Loads `uri`, which is a file path, a `file://` URL, an inline SVG data
/// URI (`data:image/svg+xml,<markup>`) or a base64 data URI.
pub fn load_image(uri: &str) -> Result<DecodedImage, ResourceError> {
    if let Some(markup) = uri.strip_prefix(SVG_DATA_URI) {
        let markup = percent_decode_str(markup).decode_utf8_lossy();
        return decode_svg(markup.as_bytes());
    }

    if uri.starts_with("data:") {
        return decode_bytes(&parse_data_url(uri)?);
    }

    let path = file_path(uri)?;
    let data = std::fs::read(&path).map_err(|e| ResourceError::from_io(&path, &e))?;

    decode_bytes(&data)
}

/// Decodes raster or SVG bytes, sniffing the format from content.
pub fn decode_bytes(data: &[u8]) -> Result<DecodedImage, ResourceError> {
    if looks_like_svg(data) {
        return decode_svg(data);
    }

    let format = image::guess_format(data).map_err(|e| ResourceError::UnsupportedImageFormat(e.to_string()))?;

    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(ResourceError::UnsupportedImageFormat(format!("{:?}", format)));
    }

    let rgba = image::load(Cursor::new(data), format)
        .map_err(|e| ResourceError::UnsupportedImageFormat(e.to_string()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

fn parse_data_url(uri: &str) -> Result<Vec<u8>, ResourceError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| ResourceError::UnsupportedImageFormat("invalid data uri".to_string()))?;

    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ResourceError::UnsupportedImageFormat(e.to_string()))
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

fn file_path(uri: &str) -> Result<String, ResourceError> {
    if !uri.starts_with("file:") {
        return Ok(uri.to_string());
    }

    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .map(|p| p.display().to_string())
        .ok_or_else(|| ResourceError::FileNotFound(uri.to_string()))
}

fn looks_like_svg(data: &[u8]) -> bool {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let head = &data[start..];

    head.starts_with(b"<svg") || head.starts_with(b"<?xml") || head.starts_with(b"<!")
}

fn decode_svg(data: &[u8]) -> Result<DecodedImage, ResourceError> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| ResourceError::SvgParse(e.to_string()))?;
    let size = tree.size().to_int_size();

    if size.width() < 1 || size.height() < 1 {
        return Err(ResourceError::SvgParse("empty canvas".to_string()));
    }

    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| ResourceError::SvgParse("canvas too large".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    Ok(DecodedImage {
        width: size.width(),
        height: size.height(),
        pixels,
    })
}
