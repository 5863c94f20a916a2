//! Per-frame reading engine.
//!
//! Owns the classifier, the current word snapshot and the attention scorer,
//! and turns raw hand / pointer input into screen positions, session log
//! entries and capture requests for the host.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::attention::{AttentionReport, AttentionScorer, SnapshotKeywords};
use crate::algorithm::intent::{InputSignal, IntentClassifier, IntentEvent, IntentSample};
use crate::algorithm::nearest_word::locate_nearest_word;
use crate::algorithm::projector::{project_to_screen, RenderScene, SurfaceSize};
use crate::algorithm::warp::SharedWarp;
use crate::capture::pipeline::{CaptureJob, CaptureOutcome};
use crate::capture::region::{capture_rect, frame_for, RasterRegion};
use crate::models::events::{InputMode, SessionEvent};
use crate::models::geometry::{NormalizedVideoPoint, RectPx, ScreenPoint};
use crate::models::level::DetailLevel;
use crate::models::settings::ReaderSettings;
use crate::models::words::{CaptureFrame, OcrSnapshot};
use crate::reader::sampler::{spawn_sampler, SamplerHandle};
use crate::telemetry::logger::{self, SessionLogger};

const KEYWORD_MIN_LEN: usize = 3;
const TEXT_PREVIEW_CHARS: usize = 120;

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerDevice {
    Pen,
    Touch,
    Mouse,
}

/// Pointer / stylus event in overlay pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub device: PointerDevice,
    #[serde(default)]
    pub pressure: f64,
    pub client_x: f64,
    pub client_y: f64,
}

/// Region the host should read back from the render surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub position: ScreenPoint,
    /// `None` refreshes words only.
    pub explain_level: Option<DetailLevel>,
    pub rect: RectPx,
    pub frame: CaptureFrame,
}

impl CaptureRequest {
    pub fn into_job(self, raster: RasterRegion) -> CaptureJob {
        CaptureJob {
            position: self.position,
            explain_level: self.explain_level,
            raster,
            frame: self.frame,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutput {
    pub position: Option<ScreenPoint>,
    pub intents: Vec<IntentEvent>,
    pub captures: Vec<CaptureRequest>,
}

pub struct ReaderEngine {
    settings: ReaderSettings,
    warp: SharedWarp,
    scene: Option<RenderScene>,
    surface: Option<SurfaceSize>,
    device_pixel_ratio: f64,
    classifier: IntentClassifier,
    snapshot: Arc<OcrSnapshot>,
    attention: AttentionScorer,
    logger: Arc<SessionLogger>,
    pointer: Option<ScreenPoint>,
    input_mode: InputMode,
    pressure: Option<f64>,
    pen_down: bool,
}

impl ReaderEngine {
    pub fn new(settings: ReaderSettings, warp: SharedWarp, logger: Arc<SessionLogger>) -> Self {
        Self {
            classifier: IntentClassifier::new(settings.intent.clone()),
            attention: AttentionScorer::new(settings.attention.clone()),
            settings,
            warp,
            scene: None,
            surface: None,
            device_pixel_ratio: 1.0,
            snapshot: Arc::new(OcrSnapshot::default()),
            logger,
            pointer: None,
            input_mode: InputMode::Fingertip,
            pressure: None,
            pen_down: false,
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn warp(&self) -> &SharedWarp {
        &self.warp
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn attention(&self) -> &AttentionScorer {
        &self.attention
    }

    pub fn pointer(&self) -> Option<ScreenPoint> {
        self.pointer
    }

    pub fn snapshot(&self) -> Arc<OcrSnapshot> {
        self.snapshot.clone()
    }

    /// Latest renderer state; `None` until camera and plane exist.
    pub fn set_scene(&mut self, scene: Option<RenderScene>) {
        self.scene = scene;
    }

    /// Surface used for capture regions when no 3D scene is active.
    pub fn set_surface(&mut self, surface: SurfaceSize) {
        self.surface = Some(surface);
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        self.device_pixel_ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
    }

    /// Swaps in a new word set together with its frame.
    pub fn set_snapshot(&mut self, snapshot: Arc<OcrSnapshot>, now: u64) {
        let text = snapshot.joined_text();
        let text_preview: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        log::info!("word snapshot replaced: {} words", snapshot.words.len());
        self.log(
            now,
            SessionEvent::PageOcrSummary {
                ts: now,
                word_count: snapshot.words.len(),
                text_preview,
            },
        );
        self.snapshot = snapshot;
    }

    /// Applies the word set carried by a finished capture, if any.
    pub fn apply_outcome(&mut self, outcome: &CaptureOutcome, now: u64) {
        match outcome {
            CaptureOutcome::Recognized { snapshot }
            | CaptureOutcome::Explained { snapshot, .. }
            | CaptureOutcome::NoText { snapshot } => self.set_snapshot(snapshot.clone(), now),
            CaptureOutcome::Busy | CaptureOutcome::Superseded => {}
        }
    }

    /// One hand-tracking result: the index fingertip in video coordinates.
    pub fn on_hand_frame(
        &mut self,
        now: u64,
        fingertip: Option<NormalizedVideoPoint>,
    ) -> FrameOutput {
        let position = fingertip
            .and_then(|tip| project_to_screen(tip, self.warp.get(), self.scene.as_ref()));
        self.input_mode = InputMode::Fingertip;
        self.pressure = None;
        self.observe(now, position, InputSignal::Dwell)
    }

    pub fn on_pointer_event(&mut self, now: u64, event: PointerEvent) -> FrameOutput {
        let position = ScreenPoint::new(event.client_x, event.client_y);
        match (event.device, event.kind) {
            (PointerDevice::Pen, PointerKind::Up) => {
                self.input_mode = InputMode::Stylus;
                self.pen_down = false;
                self.pressure = None;
                self.observe(now, None, InputSignal::Pressure(0.0))
            }
            (PointerDevice::Pen, kind) => {
                self.input_mode = InputMode::Stylus;
                if kind == PointerKind::Down {
                    self.pen_down = true;
                }
                if !self.pen_down {
                    // Hovering pen: track position only.
                    self.pointer = Some(position);
                    return FrameOutput {
                        position: Some(position),
                        ..FrameOutput::default()
                    };
                }
                let pressure = event.pressure.clamp(0.0, 1.0);
                self.pressure = Some(pressure);
                self.observe(now, Some(position), InputSignal::Pressure(pressure))
            }
            (_, PointerKind::Up) => {
                self.input_mode = InputMode::Mouse;
                self.observe(now, None, InputSignal::Dwell)
            }
            _ => {
                self.input_mode = InputMode::Mouse;
                self.pressure = None;
                self.observe(now, Some(position), InputSignal::Dwell)
            }
        }
    }

    /// ~10 Hz sample: nearest word and a pointer log entry.
    pub fn sample_tick(&mut self, now: u64) -> Option<SessionEvent> {
        let position = self.pointer?;
        let nearest_word = locate_nearest_word(position, &self.snapshot, &self.settings.locator)
            .map(|hit| hit.word.text.clone());
        let event = SessionEvent::PointerSample {
            ts: now,
            x: position.x,
            y: position.y,
            input_mode: self.input_mode,
            nearest_word,
            pressure: self.pressure,
            level: self.classifier.active_level(),
            interest_score: self.attention.last_score(),
        };
        self.log(now, event.clone());
        Some(event)
    }

    /// Animation-frame tick; returns a report when periodic analysis ran.
    pub fn animation_tick(&mut self, now: u64) -> Option<AttentionReport> {
        if !self.settings.attention_enabled {
            return None;
        }
        self.attention.sample(now, self.pointer);
        let keywords = SnapshotKeywords {
            snapshot: &self.snapshot,
            min_len: KEYWORD_MIN_LEN,
        };
        let report = self.attention.tick(now, &keywords)?;
        log::debug!(
            "attention report: score={:.1} focus_areas={} keywords={}",
            report.interest_score,
            report.focus_areas.len(),
            report.keywords.len()
        );
        Some(report)
    }

    pub fn attention_report(&self, now: u64) -> AttentionReport {
        let keywords = SnapshotKeywords {
            snapshot: &self.snapshot,
            min_len: KEYWORD_MIN_LEN,
        };
        self.attention.analyze(now, &keywords)
    }

    pub fn record_voice_annotation(&self, now: u64, text: impl Into<String>) {
        self.log(
            now,
            SessionEvent::VoiceAnnotation {
                ts: now,
                text: text.into(),
            },
        );
    }

    pub fn record_topic(&self, now: u64, topic: impl Into<String>) {
        self.log(
            now,
            SessionEvent::TopicSelected {
                ts: now,
                topic: topic.into(),
            },
        );
    }

    /// Marks the running pointer session as answered by a manual request.
    pub fn mark_triggered(&mut self) {
        self.classifier.mark_triggered();
    }

    fn observe(
        &mut self,
        now: u64,
        position: Option<ScreenPoint>,
        signal: InputSignal,
    ) -> FrameOutput {
        self.pointer = position;
        let intents = self.classifier.observe(IntentSample {
            ts: now,
            position,
            signal,
        });

        let mut captures = Vec::new();
        for intent in &intents {
            match *intent {
                IntentEvent::SessionStarted { .. } => {}
                IntentEvent::CaptureRequested { position, .. } => {
                    self.log(
                        now,
                        SessionEvent::Capture {
                            ts: now,
                            x: position.x,
                            y: position.y,
                        },
                    );
                    captures.extend(self.capture_request(position, None, None));
                }
                IntentEvent::LevelChanged { from, to, .. } => {
                    log::debug!("level {from:?} -> {to}");
                    self.log(now, SessionEvent::LevelChange { ts: now, from, to });
                }
                IntentEvent::ExplainRequested {
                    level,
                    position,
                    drawn_bounds,
                    ..
                } => {
                    log::info!(
                        "explanation requested: level={level} at ({:.0}, {:.0})",
                        position.x,
                        position.y
                    );
                    self.log(now, SessionEvent::ExplainTriggered { ts: now, level });
                    captures.extend(self.capture_request(position, drawn_bounds, Some(level)));
                }
                IntentEvent::SessionEnded { reason, .. } => {
                    self.log(now, SessionEvent::PointerSessionEnded { ts: now, reason });
                }
            }
        }

        FrameOutput {
            position,
            intents,
            captures,
        }
    }

    fn capture_request(
        &self,
        position: ScreenPoint,
        drawn_bounds: Option<RectPx>,
        explain_level: Option<DetailLevel>,
    ) -> Option<CaptureRequest> {
        let surface = self.scene.map(|scene| scene.surface).or(self.surface)?;
        let Some(rect) = capture_rect(position, drawn_bounds, surface, &self.settings.capture)
        else {
            log::debug!("capture region off surface, skipped");
            return None;
        };
        Some(CaptureRequest {
            position,
            explain_level,
            rect,
            frame: frame_for(rect, self.device_pixel_ratio, 1.0),
        })
    }

    fn log(&self, now: u64, event: SessionEvent) {
        logger::record(&self.logger, now, event);
    }
}

pub type SharedEngine = Arc<Mutex<ReaderEngine>>;

pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, ReaderEngine> {
    engine
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Starts the ~10 Hz position sampler over a shared engine.
pub fn spawn_engine_sampler(engine: SharedEngine) -> SamplerHandle {
    let interval = Duration::from_millis(lock_engine(&engine).settings.sampler.interval_ms.max(1));
    spawn_sampler(interval, move || {
        lock_engine(&engine).sample_tick(now_ms());
    })
}
