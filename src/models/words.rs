//! Распознанные слова и кадр захвата, из которого они получены.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::geometry::ScreenPoint;

/// Одно распознанное слово в координатах растра OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl WordBox {
    pub fn new(text: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            w,
            h,
        }
    }

    pub fn raster_center(&self) -> (f64, f64) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }
}

/// Область экрана и масштаб, с которыми снят растр OCR.
///
/// `raster = (screen - origin) * device_pixel_ratio * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFrame {
    pub origin_x: f64,
    pub origin_y: f64,
    pub scale: f64,
    pub device_pixel_ratio: f64,
}

impl Default for CaptureFrame {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            scale: 1.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl CaptureFrame {
    fn raster_per_screen_px(self) -> f64 {
        let factor = self.scale * self.device_pixel_ratio;
        if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        }
    }

    pub fn raster_to_screen(self, raster_x: f64, raster_y: f64) -> ScreenPoint {
        let factor = self.raster_per_screen_px();
        ScreenPoint::new(
            self.origin_x + raster_x / factor,
            self.origin_y + raster_y / factor,
        )
    }

    pub fn screen_to_raster(self, point: ScreenPoint) -> (f64, f64) {
        let factor = self.raster_per_screen_px();
        (
            (point.x - self.origin_x) * factor,
            (point.y - self.origin_y) * factor,
        )
    }
}

/// Набор слов вместе с кадром, к которому он относится.
///
/// Передаётся через `Arc` и заменяется целиком: слова одного захвата
/// не смешиваются с кадром другого.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrSnapshot {
    pub words: Vec<WordBox>,
    pub frame: CaptureFrame,
    pub captured_at_ms: u64,
}

impl OcrSnapshot {
    pub fn new(words: Vec<WordBox>, frame: CaptureFrame, captured_at_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            words,
            frame,
            captured_at_ms,
        })
    }

    /// Слова в порядке чтения растра (сверху вниз, затем слева направо).
    pub fn joined_text(&self) -> String {
        let mut ordered: Vec<&WordBox> = self
            .words
            .iter()
            .filter(|word| !word.text.trim().is_empty())
            .collect();
        ordered.sort_by(|a, b| {
            let line_a = (a.y / a.h.max(1.0)).floor();
            let line_b = (b.y / b.h.max(1.0)).floor();
            line_a
                .total_cmp(&line_b)
                .then_with(|| a.x.total_cmp(&b.x))
        });
        ordered
            .iter()
            .map(|word| word.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_text(&self) -> bool {
        self.words.iter().any(|word| !word.text.trim().is_empty())
    }
}
