//! Offline replay of a recorded input trace through the engine.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algorithm::attention::AttentionReport;
use crate::algorithm::intent::IntentEvent;
use crate::algorithm::projector::{RenderScene, SurfaceSize};
use crate::algorithm::warp::SharedWarp;
use crate::error::{ReaderError, Result};
use crate::models::events::SessionFile;
use crate::models::settings::ReaderSettings;
use crate::models::words::OcrSnapshot;
use crate::reader::engine::{CaptureRequest, PointerEvent, ReaderEngine};
use crate::reader::hand::{fingertip_from, FrameGate, FrameSource, HandLandmarks};
use crate::reader::store::new_session_file;
use crate::telemetry::logger::{self, SessionLogger};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceInput {
    /// Hand-tracking result; `error` simulates a provider failure.
    Hand {
        #[serde(default)]
        landmarks: Option<HandLandmarks>,
        #[serde(default)]
        error: Option<String>,
    },
    Pointer {
        event: PointerEvent,
    },
    #[default]
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceFrame {
    pub ts: u64,
    #[serde(default)]
    pub input: TraceInput,
    /// Renderer state from this frame on.
    #[serde(default)]
    pub scene: Option<RenderScene>,
    /// Word set delivered by OCR at this frame.
    #[serde(default)]
    pub snapshot: Option<OcrSnapshot>,
    #[serde(default)]
    pub warp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub surface: SurfaceSize,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f64,
    pub frames: Vec<TraceFrame>,
}

fn default_device_pixel_ratio() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub intents: Vec<IntentEvent>,
    pub captures: Vec<CaptureRequest>,
    /// Hand frames dropped by the rate limiter.
    pub skipped_hand_frames: usize,
    pub reports: Vec<AttentionReport>,
    pub final_report: AttentionReport,
    pub session: SessionFile,
}

pub fn load_trace(path: &Path) -> Result<Trace> {
    let raw = std::fs::read_to_string(path).map_err(|e| ReaderError::io(path, e))?;
    let trace: Trace = serde_json::from_str(&raw).map_err(|e| ReaderError::json(path, e))?;
    validate(&trace)?;
    log::info!(
        "load_trace: path={} frames={}",
        path.display(),
        trace.frames.len()
    );
    Ok(trace)
}

fn validate(trace: &Trace) -> Result<()> {
    if !(trace.surface.width >= 1.0 && trace.surface.height >= 1.0) {
        return Err(ReaderError::InvalidInput(format!(
            "trace surface must be at least 1x1, got {}x{}",
            trace.surface.width, trace.surface.height
        )));
    }
    if let Some(pair) = trace.frames.windows(2).find(|pair| pair[1].ts < pair[0].ts) {
        return Err(ReaderError::InvalidInput(format!(
            "trace frames out of order: {} after {}",
            pair[1].ts, pair[0].ts
        )));
    }
    Ok(())
}

/// Camera stand-in: ready once the trace supplied a scene.
struct TraceCamera {
    size: Option<(u32, u32)>,
}

impl FrameSource for TraceCamera {
    fn is_ready(&self) -> bool {
        self.size.is_some()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.size
    }
}

/// Feeds every frame through a fresh engine, simulating the sampler and the
/// animation loop on trace time.
pub fn replay_trace(trace: &Trace, settings: ReaderSettings) -> Result<ReplaySummary> {
    validate(trace)?;

    let warp = SharedWarp::new(settings.warp_compensation);
    let session_logger = SessionLogger::new();
    let sample_interval = settings.sampler.interval_ms.max(1);
    let mut gate = FrameGate::new(settings.sampler.hand_tracking_fps);
    let mut engine = ReaderEngine::new(settings, warp.clone(), session_logger.clone());
    engine.set_surface(trace.surface);
    engine.set_device_pixel_ratio(trace.device_pixel_ratio);

    let start_ms = trace.frames.first().map(|frame| frame.ts).unwrap_or(0);
    let mut session = new_session_file(
        trace.surface.width.round() as u32,
        trace.surface.height.round() as u32,
    );
    let log_thread = logger::start_session(&session_logger, start_ms);

    let mut camera = TraceCamera { size: None };
    let mut intents = Vec::new();
    let mut captures = Vec::new();
    let mut reports = Vec::new();
    let mut skipped_hand_frames = 0usize;
    let mut next_sample_ts = start_ms;

    for frame in &trace.frames {
        if let Some(comp) = frame.warp {
            warp.set(comp);
        }
        if let Some(scene) = frame.scene {
            camera.size = Some((
                scene.surface.width.round() as u32,
                scene.surface.height.round() as u32,
            ));
            engine.set_scene(Some(scene));
        }
        if let Some(snapshot) = &frame.snapshot {
            engine.set_snapshot(Arc::new(snapshot.clone()), frame.ts);
        }

        let output = match &frame.input {
            TraceInput::Hand { landmarks, error } => {
                if !gate.try_submit(frame.ts, &camera) {
                    skipped_hand_frames += 1;
                    None
                } else {
                    let result = match error {
                        Some(message) => Err(ReaderError::HandTracking(message.clone())),
                        None => Ok(landmarks.clone()),
                    };
                    let output = engine.on_hand_frame(frame.ts, fingertip_from(result));
                    gate.complete();
                    Some(output)
                }
            }
            TraceInput::Pointer { event } => Some(engine.on_pointer_event(frame.ts, *event)),
            TraceInput::Idle => None,
        };
        if let Some(output) = output {
            intents.extend(output.intents);
            captures.extend(output.captures);
        }

        if frame.ts >= next_sample_ts {
            engine.sample_tick(frame.ts);
            next_sample_ts = frame.ts + sample_interval;
        }
        reports.extend(engine.animation_tick(frame.ts));
    }

    let end_ms = trace.frames.last().map(|frame| frame.ts).unwrap_or(start_ms);
    let final_report = engine.attention_report(end_ms);

    logger::stop_session(&session_logger);
    session.events = logger::join_session(log_thread)?;

    log::info!(
        "replay finished: {} intents, {} captures, {} logged events",
        intents.len(),
        captures.len(),
        session.events.len()
    );

    Ok(ReplaySummary {
        intents,
        captures,
        skipped_hand_frames,
        reports,
        final_report,
        session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::projector::{CameraParams, PlaneGeometry, PlaneTransform};
    use crate::models::events::SessionEvent;
    use crate::models::level::DetailLevel;
    use crate::models::words::{CaptureFrame, WordBox};
    use crate::reader::engine::{PointerDevice, PointerKind};
    use crate::reader::hand::{Landmark, INDEX_FINGER_TIP};

    const SURFACE: SurfaceSize = SurfaceSize {
        width: 1280.0,
        height: 720.0,
    };

    fn scene() -> RenderScene {
        RenderScene {
            camera: CameraParams::fitted(1000.0, 720.0),
            plane: PlaneTransform::default(),
            geometry: PlaneGeometry {
                width: 1280.0,
                height: 720.0,
                mirrored: false,
                pivot_y: 0.0,
            },
            surface: SURFACE,
        }
    }

    fn hand(u: f64, v: f64) -> TraceInput {
        let mut points = vec![
            Landmark {
                x: 0.0,
                y: 0.0,
                z: 0.0
            };
            21
        ];
        points[INDEX_FINGER_TIP] = Landmark { x: u, y: v, z: 0.0 };
        TraceInput::Hand {
            landmarks: Some(HandLandmarks { points }),
            error: None,
        }
    }

    fn frame(ts: u64, input: TraceInput) -> TraceFrame {
        TraceFrame {
            ts,
            input,
            scene: None,
            snapshot: None,
            warp: None,
        }
    }

    #[test]
    fn fingertip_dwell_trace_fires_one_hard_explanation() {
        let mut frames = vec![TraceFrame {
            scene: Some(scene()),
            snapshot: Some(OcrSnapshot {
                words: vec![WordBox::new("enzyme", 620.0, 362.0, 40.0, 16.0)],
                frame: CaptureFrame::default(),
                captured_at_ms: 0,
            }),
            ..frame(0, hand(0.5, 0.5))
        }];
        for step in 1..=200u64 {
            frames.push(frame(step * 33, hand(0.5, 0.5)));
        }
        let trace = Trace {
            surface: SURFACE,
            device_pixel_ratio: 1.0,
            frames,
        };

        let summary = replay_trace(&trace, ReaderSettings::default()).unwrap();
        let explains: Vec<DetailLevel> = summary
            .intents
            .iter()
            .filter_map(|intent| match intent {
                IntentEvent::ExplainRequested { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(explains, vec![DetailLevel::Hard]);
        assert_eq!(summary.captures.len(), 2);
        assert_eq!(summary.skipped_hand_frames, 0);

        let sampled_word = summary.session.events.iter().find_map(|event| match event {
            SessionEvent::PointerSample { nearest_word, .. } => nearest_word.clone(),
            _ => None,
        });
        assert_eq!(sampled_word.as_deref(), Some("enzyme"));
        assert!(!summary.reports.is_empty());
    }

    #[test]
    fn hand_errors_and_rate_limit_are_tolerated() {
        let trace = Trace {
            surface: SURFACE,
            device_pixel_ratio: 1.0,
            frames: vec![
                TraceFrame {
                    scene: Some(scene()),
                    ..frame(0, hand(0.5, 0.5))
                },
                frame(5, hand(0.5, 0.5)),
                frame(
                    40,
                    TraceInput::Hand {
                        landmarks: None,
                        error: Some("tracker crashed".to_string()),
                    },
                ),
            ],
        };
        let summary = replay_trace(&trace, ReaderSettings::default()).unwrap();
        assert_eq!(summary.skipped_hand_frames, 1);
        assert!(matches!(
            summary.intents.last(),
            Some(IntentEvent::SessionEnded { .. })
        ));
    }

    #[test]
    fn pointer_trace_without_scene_still_classifies() {
        let press = |ts, kind, pressure| {
            frame(
                ts,
                TraceInput::Pointer {
                    event: PointerEvent {
                        kind,
                        device: PointerDevice::Pen,
                        pressure,
                        client_x: 300.0,
                        client_y: 300.0,
                    },
                },
            )
        };
        let trace = Trace {
            surface: SURFACE,
            device_pixel_ratio: 1.0,
            frames: vec![
                press(0, PointerKind::Down, 0.1),
                press(100, PointerKind::Move, 0.5),
                press(200, PointerKind::Move, 0.1),
                press(300, PointerKind::Up, 0.0),
            ],
        };
        let summary = replay_trace(&trace, ReaderSettings::default()).unwrap();
        assert!(summary.intents.iter().any(|intent| matches!(
            intent,
            IntentEvent::ExplainRequested {
                level: DetailLevel::Medium,
                ..
            }
        )));
    }

    #[test]
    fn rejects_out_of_order_frames() {
        let trace = Trace {
            surface: SURFACE,
            device_pixel_ratio: 1.0,
            frames: vec![frame(100, TraceInput::Idle), frame(50, TraceInput::Idle)],
        };
        assert!(matches!(
            replay_trace(&trace, ReaderSettings::default()),
            Err(ReaderError::InvalidInput(_))
        ));
    }

    #[test]
    fn trace_json_uses_tagged_inputs() {
        let raw = r#"{
            "surface": {"width": 800, "height": 600},
            "frames": [
                {"ts": 0, "input": {"kind": "pointer", "event": {
                    "kind": "move", "device": "mouse", "clientX": 10, "clientY": 20}}},
                {"ts": 16}
            ]
        }"#;
        let trace: Trace = serde_json::from_str(raw).unwrap();
        assert_eq!(trace.device_pixel_ratio, 1.0);
        assert!(matches!(trace.frames[0].input, TraceInput::Pointer { .. }));
        assert_eq!(trace.frames[1].input, TraceInput::Idle);
    }
}
