//! Hand-tracking input: fingertip extraction and submission rate limiting.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::models::geometry::NormalizedVideoPoint;

/// Index of the index-finger tip in the 21-point hand model.
pub const INDEX_FINGER_TIP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Landmarks of one detected hand, normalized to the video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub points: Vec<Landmark>,
}

impl HandLandmarks {
    pub fn index_tip(&self) -> Option<NormalizedVideoPoint> {
        let tip = self.points.get(INDEX_FINGER_TIP)?;
        if !(tip.x.is_finite() && tip.y.is_finite()) {
            return None;
        }
        Some(NormalizedVideoPoint::new(tip.x, tip.y))
    }
}

/// Turns one provider result into a fingertip. Failures count as "no hand".
pub fn fingertip_from<E: Display>(
    result: std::result::Result<Option<HandLandmarks>, E>,
) -> Option<NormalizedVideoPoint> {
    match result {
        Ok(hand) => hand.as_ref().and_then(HandLandmarks::index_tip),
        Err(e) => {
            log::warn!("hand tracking failed: {e}");
            None
        }
    }
}

/// Camera stream as seen by the core: readiness and current pixel size.
pub trait FrameSource {
    fn is_ready(&self) -> bool;
    fn dimensions(&self) -> Option<(u32, u32)>;
}

/// Limits hand-tracking submissions to a target rate, one request at a time.
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval_ms: u64,
    last_submit_ms: Option<u64>,
    in_flight: bool,
}

impl FrameGate {
    pub fn new(target_fps: f64) -> Self {
        let min_interval_ms = if target_fps.is_finite() && target_fps > 0.0 {
            (1000.0 / target_fps).round() as u64
        } else {
            0
        };
        Self {
            min_interval_ms,
            last_submit_ms: None,
            in_flight: false,
        }
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Claims a submission slot for `now` if the source has a frame and the
    /// previous request finished and the rate allows it.
    pub fn try_submit(&mut self, now_ms: u64, source: &dyn FrameSource) -> bool {
        if self.in_flight || !source.is_ready() {
            return false;
        }
        if !source
            .dimensions()
            .is_some_and(|(width, height)| width > 0 && height > 0)
        {
            return false;
        }
        if self
            .last_submit_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.min_interval_ms)
        {
            return false;
        }
        self.in_flight = true;
        self.last_submit_ms = Some(now_ms);
        true
    }

    pub fn complete(&mut self) {
        self.in_flight = false;
    }
}
