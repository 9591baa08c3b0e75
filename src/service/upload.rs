//! Image upload checks: format sniffed from content, byte size, pixel dimensions.

use crate::catalog::{Dimensions, ImageRule};
use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

impl ImageInfo {
    pub fn extension(&self) -> &'static str {
        match self.format {
            "jpeg" => "jpg",
            other => other,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        }
    }
}

fn format_name(f: ImageFormat) -> Option<&'static str> {
    match f {
        ImageFormat::Jpeg => Some("jpeg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Gif => Some("gif"),
        _ => None,
    }
}

/// Inspect `bytes` against `rule`. The error is the message shown under the file input.
pub fn inspect_image(bytes: &[u8], rule: &ImageRule) -> Result<ImageInfo, String> {
    let size = bytes.len() as u64;
    if size > rule.max_bytes {
        return Err(format!(
            "file may not be greater than {} kilobytes",
            rule.max_bytes / 1024
        ));
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| "file must be an image".to_string())?;
    let format = reader.format().and_then(format_name).ok_or_else(|| "file must be an image".to_string())?;
    if !rule.formats.iter().any(|f| f == format) {
        return Err(format!("file must be a file of type: {}", rule.formats.join(", ")));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|_| "file could not be read as an image".to_string())?;
    if let Some(dims) = &rule.dimensions {
        check_dimensions(width, height, dims)?;
    }
    Ok(ImageInfo {
        format,
        width,
        height,
        size,
    })
}

fn check_dimensions(width: u32, height: u32, dims: &Dimensions) -> Result<(), String> {
    match *dims {
        Dimensions::Exact { width: w, height: h } if width != w || height != h => Err(format!(
            "file must be exactly {}x{} pixels (got {}x{})",
            w, h, width, height
        )),
        Dimensions::AtLeast { min_width, min_height } if width < min_width || height < min_height => Err(format!(
            "file must be at least {}x{} pixels (got {}x{})",
            min_width, min_height, width, height
        )),
        Dimensions::Square { min_side } if width != height || width < min_side => Err(format!(
            "file must be a square image of at least {}x{} pixels (got {}x{})",
            min_side, min_side, width, height
        )),
        _ => Ok(()),
    }
}
