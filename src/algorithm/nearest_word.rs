//! Picks the recognized word the pointer is most likely indicating.
//!
//! A reading fingertip usually rests just below or beside the line being read,
//! so a word that sits on or below the pointer within a horizontal window wins
//! over a strictly closer word on the line above.

use serde::{Deserialize, Serialize};

use crate::models::geometry::ScreenPoint;
use crate::models::words::{OcrSnapshot, WordBox};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocatorConfig {
    /// How far above the pointer (px) a word may sit and still count as aligned.
    pub vertical_tolerance_px: f64,
    pub horizontal_tolerance_px: f64,
    /// Fallback words farther than this are ignored. `None` disables the cutoff.
    pub max_distance_px: Option<f64>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            vertical_tolerance_px: 10.0,
            horizontal_tolerance_px: 80.0,
            max_distance_px: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Aligned,
    Nearest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordHit<'a> {
    pub word: &'a WordBox,
    pub index: usize,
    pub center: ScreenPoint,
    pub distance: f64,
    pub kind: MatchKind,
}

pub fn locate_nearest_word<'a>(
    pointer: ScreenPoint,
    snapshot: &'a OcrSnapshot,
    config: &LocatorConfig,
) -> Option<WordHit<'a>> {
    let vertical_tolerance = config.vertical_tolerance_px.max(0.0);
    let horizontal_tolerance = config.horizontal_tolerance_px.max(0.0);

    let mut aligned: Option<(f64, f64, WordHit<'a>)> = None;
    let mut nearest: Option<WordHit<'a>> = None;

    for (index, word) in snapshot.words.iter().enumerate() {
        let (raster_x, raster_y) = word.raster_center();
        let center = snapshot.frame.raster_to_screen(raster_x, raster_y);
        let dx = center.x - pointer.x;
        let dy = center.y - pointer.y;
        let distance = dx.hypot(dy);
        let hit = WordHit {
            word,
            index,
            center,
            distance,
            kind: MatchKind::Nearest,
        };

        if dy >= -vertical_tolerance && dx.abs() <= horizontal_tolerance {
            let below = dy.max(0.0);
            let across = dx.abs();
            let better = aligned.as_ref().is_none_or(|(best_below, best_across, _)| {
                below < *best_below || (below == *best_below && across < *best_across)
            });
            if better {
                aligned = Some((
                    below,
                    across,
                    WordHit {
                        kind: MatchKind::Aligned,
                        ..hit.clone()
                    },
                ));
            }
        }

        let within_cutoff = config
            .max_distance_px
            .is_none_or(|limit| distance <= limit);
        if within_cutoff && nearest.as_ref().is_none_or(|best| distance < best.distance) {
            nearest = Some(hit);
        }
    }

    aligned.map(|(_, _, hit)| hit).or(nearest)
}
