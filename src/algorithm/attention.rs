//! Interest scoring from pointer movement and its spatial heat-map.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::geometry::ScreenPoint;
use crate::models::words::OcrSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttentionConfig {
    pub trail_capacity: usize,
    pub score_window: usize,
    pub speed_window: usize,
    pub slow_speed_px_per_ms: f64,
    pub stay_gap_ms: u64,
    /// Trail length at which the density term saturates.
    pub density_full_points: usize,
    pub activation_score: f64,
    pub grid_size_px: f64,
    pub min_cell_score: f64,
    pub decay_factor: f64,
    pub decay_period_ms: u64,
    pub focus_score: f64,
    pub focus_radius_px: f64,
    pub analysis_interval_ms: u64,
    pub max_keywords: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            trail_capacity: 100,
            score_window: 10,
            speed_window: 8,
            slow_speed_px_per_ms: 0.05,
            stay_gap_ms: 100,
            density_full_points: 50,
            activation_score: 10.0,
            grid_size_px: 50.0,
            min_cell_score: 1.0,
            decay_factor: 0.95,
            decay_period_ms: 1_000,
            focus_score: 50.0,
            focus_radius_px: 50.0,
            analysis_interval_ms: 5_000,
            max_keywords: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    pub ts: u64,
    /// px/ms relative to the previous trail point; 0 for the first one.
    pub speed: f64,
}

/// Bounded, time-ordered pointer trail. Oldest points are evicted first.
#[derive(Debug, Clone)]
pub struct AttentionTrail {
    points: VecDeque<TrailPoint>,
    capacity: usize,
}

impl AttentionTrail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, position: ScreenPoint, ts: u64) -> TrailPoint {
        let speed = self
            .points
            .back()
            .map(|prev| speed_between(prev.x, prev.y, prev.ts, position.x, position.y, ts))
            .unwrap_or(0.0);
        let point = TrailPoint {
            x: position.x,
            y: position.y,
            ts,
            speed,
        };
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        point
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &TrailPoint> {
        self.points.iter()
    }

    /// 0..100 interest score over the most recent `score_window` points.
    pub fn interest_score(&self, config: &AttentionConfig) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }

        let window = config.score_window.max(2).min(self.points.len());
        let recent: Vec<&TrailPoint> = self.points.iter().skip(self.points.len() - window).collect();
        let pairs = recent.len() - 1;

        let mut slow = 0usize;
        let mut stay = 0usize;
        for pair in recent.windows(2) {
            if pair[1].speed < config.slow_speed_px_per_ms {
                slow += 1;
            }
            if pair[1].ts.saturating_sub(pair[0].ts) > config.stay_gap_ms {
                stay += 1;
            }
        }

        let slow_fraction = slow as f64 / pairs as f64;
        let stay_fraction = stay as f64 / pairs as f64;
        let density =
            (self.points.len() as f64 / config.density_full_points.max(1) as f64).min(1.0);
        (100.0 * (0.4 * slow_fraction + 0.4 * stay_fraction + 0.2 * density)).clamp(0.0, 100.0)
    }

    /// Mean speed over every consecutive pair in the trail.
    pub fn average_speed(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let total: f64 = self.points.iter().skip(1).map(|point| point.speed).sum();
        total / (self.points.len() - 1) as f64
    }
}

/// Rolling path-length / elapsed-time speed for live readouts.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    window: VecDeque<(ScreenPoint, u64)>,
    capacity: usize,
}

impl SpeedMeter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, position: ScreenPoint, ts: u64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back((position, ts));
    }

    /// px/ms; 0 when the window spans no time.
    pub fn smoothed_speed(&self) -> f64 {
        let (Some(first), Some(last)) = (self.window.front(), self.window.back()) else {
            return 0.0;
        };
        let elapsed = last.1.saturating_sub(first.1);
        if elapsed == 0 {
            return 0.0;
        }
        let path: f64 = self
            .window
            .iter()
            .zip(self.window.iter().skip(1))
            .map(|(a, b)| a.0.distance_to(b.0))
            .sum();
        path / elapsed as f64
    }
}

pub type CellKey = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub center: ScreenPoint,
    pub radius: f64,
    pub score: f64,
}

/// Sparse grid of accumulated interest, keyed by quantized pixel position.
#[derive(Debug, Clone)]
pub struct HeatMap {
    cells: HashMap<CellKey, f64>,
    grid_size: f64,
}

impl HeatMap {
    pub const MAX_CELL_SCORE: f64 = 100.0;

    pub fn new(grid_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            grid_size: if grid_size.is_finite() && grid_size > 0.0 {
                grid_size
            } else {
                1.0
            },
        }
    }

    pub fn key_for(&self, point: ScreenPoint) -> CellKey {
        (
            (point.x / self.grid_size).floor() as i64,
            (point.y / self.grid_size).floor() as i64,
        )
    }

    pub fn add(&mut self, point: ScreenPoint, score: f64) {
        if !(score.is_finite() && score > 0.0) {
            return;
        }
        let key = self.key_for(point);
        let cell = self.cells.entry(key).or_insert(0.0);
        *cell = (*cell + score).min(Self::MAX_CELL_SCORE);
    }

    pub fn cell(&self, key: CellKey) -> Option<f64> {
        self.cells.get(&key).copied()
    }

    pub fn score_at(&self, point: ScreenPoint) -> f64 {
        self.cell(self.key_for(point)).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Multiplies every cell by `factor` and drops cells at or below `min_score`.
    pub fn decay(&mut self, factor: f64, min_score: f64) {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.cells.retain(|_, value| {
            *value *= factor;
            *value > min_score
        });
    }

    pub fn focus_areas(&self, threshold: f64, radius: f64) -> Vec<FocusArea> {
        let mut areas: Vec<FocusArea> = self
            .cells
            .iter()
            .filter(|(_, score)| **score > threshold)
            .map(|((cx, cy), score)| FocusArea {
                center: ScreenPoint::new(
                    (*cx as f64 + 0.5) * self.grid_size,
                    (*cy as f64 + 0.5) * self.grid_size,
                ),
                radius,
                score: *score,
            })
            .collect();
        areas.sort_by(|a, b| b.score.total_cmp(&a.score));
        areas
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub score: f64,
}

/// Supplies (keyword, score) pairs for the periodic attention report.
pub trait KeywordSource {
    fn keywords(&self, heat: &HeatMap) -> Vec<Keyword>;
}

/// No keyword provider configured.
pub struct NoKeywords;

impl KeywordSource for NoKeywords {
    fn keywords(&self, _heat: &HeatMap) -> Vec<Keyword> {
        Vec::new()
    }
}

/// Scores the words of an OCR snapshot by the heat under their centers.
pub struct SnapshotKeywords<'a> {
    pub snapshot: &'a OcrSnapshot,
    pub min_len: usize,
}

impl KeywordSource for SnapshotKeywords<'_> {
    fn keywords(&self, heat: &HeatMap) -> Vec<Keyword> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        for word in &self.snapshot.words {
            let text: String = word
                .text
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if text.chars().count() < self.min_len {
                continue;
            }
            let (rx, ry) = word.raster_center();
            let score = heat.score_at(self.snapshot.frame.raster_to_screen(rx, ry));
            if score > 0.0 {
                *totals.entry(text).or_insert(0.0) += score;
            }
        }
        totals
            .into_iter()
            .map(|(text, score)| Keyword { text, score })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionReport {
    pub ts: u64,
    pub interest_score: f64,
    pub average_speed: f64,
    pub focus_areas: Vec<FocusArea>,
    pub keywords: Vec<Keyword>,
}

/// Per-frame attention state: trail, live speed, heat-map and report timers.
#[derive(Debug, Clone)]
pub struct AttentionScorer {
    config: AttentionConfig,
    trail: AttentionTrail,
    speed: SpeedMeter,
    heat: HeatMap,
    last_score: f64,
    last_decay_ts: Option<u64>,
    last_analysis_ts: Option<u64>,
}

impl AttentionScorer {
    pub fn new(config: AttentionConfig) -> Self {
        Self {
            trail: AttentionTrail::new(config.trail_capacity),
            speed: SpeedMeter::new(config.speed_window),
            heat: HeatMap::new(config.grid_size_px),
            last_score: 0.0,
            last_decay_ts: None,
            last_analysis_ts: None,
            config,
        }
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub fn trail(&self) -> &AttentionTrail {
        &self.trail
    }

    pub fn heat(&self) -> &HeatMap {
        &self.heat
    }

    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    pub fn smoothed_speed(&self) -> f64 {
        self.speed.smoothed_speed()
    }

    /// Feeds one animation-frame sample and returns the current interest score.
    pub fn sample(&mut self, ts: u64, position: Option<ScreenPoint>) -> f64 {
        let Some(position) = position else {
            return self.last_score;
        };

        self.trail.push(position, ts);
        self.speed.push(position, ts);
        let score = self.trail.interest_score(&self.config);
        if score > self.config.activation_score {
            self.heat.add(position, score);
        }
        self.last_score = score;
        score
    }

    pub fn decay_tick(&mut self) {
        self.heat
            .decay(self.config.decay_factor, self.config.min_cell_score);
    }

    /// Runs decay and analysis when their periods have elapsed.
    pub fn tick(&mut self, now: u64, keywords: &dyn KeywordSource) -> Option<AttentionReport> {
        let decay_due = self
            .last_decay_ts
            .is_none_or(|last| now.saturating_sub(last) >= self.config.decay_period_ms.max(1));
        if decay_due {
            if self.last_decay_ts.is_some() {
                self.decay_tick();
            }
            self.last_decay_ts = Some(now);
        }

        let analysis_due = self.last_analysis_ts.is_none_or(|last| {
            now.saturating_sub(last) >= self.config.analysis_interval_ms.max(1)
        });
        if !analysis_due {
            return None;
        }
        let first_tick = self.last_analysis_ts.is_none();
        self.last_analysis_ts = Some(now);
        if first_tick {
            return None;
        }
        Some(self.analyze(now, keywords))
    }

    pub fn analyze(&self, now: u64, keywords: &dyn KeywordSource) -> AttentionReport {
        let mut ranked = keywords.keywords(&self.heat);
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.text.cmp(&b.text)));
        ranked.truncate(self.config.max_keywords);

        AttentionReport {
            ts: now,
            interest_score: self.last_score,
            average_speed: self.trail.average_speed(),
            focus_areas: self
                .heat
                .focus_areas(self.config.focus_score, self.config.focus_radius_px),
            keywords: ranked,
        }
    }
}

impl Default for AttentionScorer {
    fn default() -> Self {
        Self::new(AttentionConfig::default())
    }
}

fn speed_between(x0: f64, y0: f64, ts0: u64, x1: f64, y1: f64, ts1: u64) -> f64 {
    let elapsed = ts1.saturating_sub(ts0);
    if elapsed == 0 {
        return 0.0;
    }
    (x1 - x0).hypot(y1 - y0) / elapsed as f64
}
