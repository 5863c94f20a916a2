//! Single in-flight capture guard with client-side cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::geometry::ScreenPoint;
use crate::models::level::DetailLevel;

/// Data for the capture / explanation cycle currently outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCapture {
    pub capture_id: String,
    pub generation: u64,
    /// `None` for a words-only refresh.
    pub level: Option<DetailLevel>,
    pub position: ScreenPoint,
    /// Unix timestamp in ms when the capture started.
    pub started_at_ms: i64,
}

/// Proof of holding the guard; handed back to [`CaptureState::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTicket {
    pub capture_id: String,
    pub generation: u64,
}

/// At most one capture cycle runs at a time. A second `try_begin` while one is
/// outstanding is refused, not queued.
///
/// `supersede` abandons the outstanding cycle: the guard is released at once
/// and the old cycle notices its stale generation when its call returns.
#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    active: Arc<Mutex<Option<ActiveCapture>>>,
    generation: Arc<AtomicU64>,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn try_begin(
        &self,
        level: Option<DetailLevel>,
        position: ScreenPoint,
    ) -> Option<CaptureTicket> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            log::debug!(
                "capture {} still in flight, dropping new trigger",
                current.capture_id
            );
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let capture_id = uuid::Uuid::new_v4().to_string();
        *active = Some(ActiveCapture {
            capture_id: capture_id.clone(),
            generation,
            level,
            position,
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        });
        log::info!("capture {capture_id} started: level={level:?} generation={generation}");

        Some(CaptureTicket {
            capture_id,
            generation,
        })
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: &CaptureTicket) -> bool {
        self.current_generation() == ticket.generation
    }

    /// Releases the guard if `ticket` still owns it.
    pub async fn finish(&self, ticket: &CaptureTicket) {
        let mut active = self.active.lock().await;
        if active
            .as_ref()
            .is_some_and(|current| current.capture_id == ticket.capture_id)
        {
            *active = None;
        }
    }

    /// Abandons whatever is in flight. Returns the new generation.
    pub async fn supersede(&self) -> u64 {
        let mut active = self.active.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = active.take() {
            log::info!(
                "capture {} superseded (generation {generation})",
                previous.capture_id
            );
        }
        generation
    }

    pub async fn active(&self) -> Option<ActiveCapture> {
        self.active.lock().await.clone()
    }

    pub async fn is_busy(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
