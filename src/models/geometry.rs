use serde::{Deserialize, Serialize};

/// Координаты в пикселях оверлея.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: ScreenPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Координаты кадра видео в `[0, 1] x [0, 1]`, `v = 0` у верхнего края.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVideoPoint {
    pub u: f64,
    pub v: f64,
}

impl NormalizedVideoPoint {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

/// Прямоугольник в пикселях экрана (без поворота).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectPx {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectPx {
    pub fn around(center: ScreenPoint, width: f64, height: f64) -> Self {
        Self {
            x: center.x - width * 0.5,
            y: center.y - height * 0.5,
            width,
            height,
        }
    }

    pub fn from_point(point: ScreenPoint) -> Self {
        Self {
            x: point.x,
            y: point.y,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn right(self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(self) -> f64 {
        self.y + self.height
    }

    pub fn center(self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn include(self, point: ScreenPoint) -> RectPx {
        let left = self.x.min(point.x);
        let top = self.y.min(point.y);
        let right = self.right().max(point.x);
        let bottom = self.bottom().max(point.y);
        RectPx {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn expand(self, padding: f64) -> RectPx {
        RectPx {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }

    /// Пересечение с `[0, width] x [0, height]`; `None`, если ничего не осталось.
    pub fn clamp_to_surface(self, surface_width: f64, surface_height: f64) -> Option<RectPx> {
        let left = self.x.clamp(0.0, surface_width.max(0.0));
        let top = self.y.clamp(0.0, surface_height.max(0.0));
        let right = self.right().clamp(0.0, surface_width.max(0.0));
        let bottom = self.bottom().clamp(0.0, surface_height.max(0.0));
        if right - left < 1.0 || bottom - top < 1.0 {
            return None;
        }
        Some(RectPx {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}
