//! Capture region selection and raster encoding for OCR / explanation requests.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use serde::{Deserialize, Serialize};

use crate::algorithm::projector::SurfaceSize;
use crate::error::{ReaderError, Result};
use crate::models::geometry::{RectPx, ScreenPoint};
use crate::models::words::CaptureFrame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Size of the box cut around a resting fingertip.
    pub region_width_px: f64,
    pub region_height_px: f64,
    /// Margin added around a stylus drawing.
    pub drawn_padding_px: f64,
    /// Rasters wider than this are downscaled before encoding.
    pub max_encoded_width: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            region_width_px: 360.0,
            region_height_px: 120.0,
            drawn_padding_px: 16.0,
            max_encoded_width: 1280,
        }
    }
}

/// Picks the screen rectangle to capture for a pointer session.
///
/// A stylus drawing with real extent wins; otherwise a fixed box around the
/// pointer. `None` if nothing of the region lies on the surface.
pub fn capture_rect(
    position: ScreenPoint,
    drawn_bounds: Option<RectPx>,
    surface: SurfaceSize,
    config: &CaptureConfig,
) -> Option<RectPx> {
    let rect = match drawn_bounds {
        Some(bounds) if bounds.width >= 1.0 || bounds.height >= 1.0 => {
            bounds.expand(config.drawn_padding_px.max(0.0))
        }
        _ => RectPx::around(
            position,
            config.region_width_px.max(1.0),
            config.region_height_px.max(1.0),
        ),
    };
    rect.clamp_to_surface(surface.width, surface.height)
}

/// Frame that maps raster coordinates of a capture of `rect` back to the screen.
pub fn frame_for(rect: RectPx, device_pixel_ratio: f64, scale: f64) -> CaptureFrame {
    CaptureFrame {
        origin_x: rect.x,
        origin_y: rect.y,
        scale,
        device_pixel_ratio,
    }
}

/// RGBA8 pixels read back from the render surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRegion {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterRegion {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(ReaderError::Raster(format!(
                "expected {width}x{height} RGBA ({expected} bytes), got {} bytes",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }
}

/// PNG bytes of `region`, shrunk to at most `max_width` pixels wide.
pub fn encode_png(region: &RasterRegion, max_width: u32) -> Result<Vec<u8>> {
    let buffer =
        ImageBuffer::<Rgba<u8>, _>::from_raw(region.width, region.height, region.rgba.clone())
            .ok_or_else(|| {
                ReaderError::Raster(format!(
                    "buffer does not fit {}x{}",
                    region.width, region.height
                ))
            })?;

    let buffer = match encoded_size(region.width, region.height, max_width) {
        Some((width, height)) => imageops::resize(&buffer, width, height, FilterType::Nearest),
        None => buffer,
    };

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ReaderError::Raster(e.to_string()))?;
    Ok(png)
}

/// Target size when the raster is wider than `max_width`; 0 disables the cap.
fn encoded_size(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if max_width == 0 || width <= max_width {
        return None;
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round();
    Some((max_width, scaled.max(1.0) as u32))
}

/// `data:image/png;base64,...` for the image part of an explanation request.
pub fn to_data_url(region: &RasterRegion, max_width: u32) -> Result<String> {
    let png = encode_png(region, max_width)?;
    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    ))
}
