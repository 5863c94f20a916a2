//! Vertical line-spacing warp applied to the rendered video plane and its inverse.
//!
//! The renderer samples the video at `apply_forward(v_plane, comp)` for a plane
//! row `v_plane`; the projector needs the opposite direction to put feedback on
//! the row that actually shows a given video coordinate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const MAX_WARP_COMPENSATION: f64 = 0.5;
const BISECTION_STEPS: usize = 48;

/// Forward warp in top-based coordinates (0 = top, 1 = bottom).
pub fn apply_forward(v_top: f64, comp: f64) -> f64 {
    if comp.is_nan() || comp <= 0.0 || !v_top.is_finite() {
        return v_top;
    }
    let warped = 0.5 - (0.5 - v_top) / (1.0 + comp * v_top);
    warped.clamp(0.0, 1.0)
}

/// Inverse of [`apply_forward`] by bisection; for `comp > 0` the result is in `[0, 1]`.
///
/// Samples past `apply_forward(1.0, comp)` cannot be produced by the forward
/// warp and resolve to the bottom edge.
pub fn invert(v_sample: f64, comp: f64) -> f64 {
    if comp.is_nan() || comp <= 0.0 {
        return v_sample;
    }
    if !v_sample.is_finite() {
        return 0.5;
    }

    let mut low = 0.0_f64;
    let mut high = 1.0_f64;
    for _ in 0..BISECTION_STEPS {
        let mid = (low + high) * 0.5;
        if apply_forward(mid, comp) < v_sample {
            low = mid;
        } else {
            high = mid;
        }
    }
    (low + high) * 0.5
}

/// Process-wide warp compensation value shared by renderer and projector.
///
/// Clones share one cell, so every reader sees the latest value set through
/// [`SharedWarp::set`].
#[derive(Debug, Clone)]
pub struct SharedWarp(Arc<AtomicU64>);

impl SharedWarp {
    pub fn new(comp: f64) -> Self {
        Self(Arc::new(AtomicU64::new(sanitize(comp).to_bits())))
    }

    pub fn set(&self, comp: f64) {
        let value = sanitize(comp);
        log::debug!("warp compensation set to {value:.3}");
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Default for SharedWarp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn sanitize(comp: f64) -> f64 {
    if comp.is_finite() {
        comp.clamp(0.0, MAX_WARP_COMPENSATION)
    } else {
        0.0
    }
}
