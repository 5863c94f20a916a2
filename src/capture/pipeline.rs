//! Capture -> OCR -> explanation cycle over external collaborators.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::algorithm::nearest_word::{locate_nearest_word, LocatorConfig};
use crate::capture::region::{to_data_url, RasterRegion};
use crate::capture::state::{CaptureState, CaptureTicket};
use crate::error::Result;
use crate::models::geometry::ScreenPoint;
use crate::models::level::DetailLevel;
use crate::models::words::{CaptureFrame, OcrSnapshot, WordBox};

pub trait OcrEngine: Send + Sync {
    /// Words in raster coordinates of `raster`.
    fn recognize(
        &self,
        raster: &RasterRegion,
        language: &str,
    ) -> impl Future<Output = Result<Vec<WordBox>>> + Send;
}

pub trait ExplanationService: Send + Sync {
    /// Non-success responses surface as `ReaderError::Service`.
    fn explain(
        &self,
        request: ExplanationRequest,
    ) -> impl Future<Output = Result<ExplanationReply>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationRequest {
    pub text: String,
    pub image_data_url: Option<String>,
    /// Short "what the user is pointing at" hint, usually the nearest word.
    pub pointing_hint: Option<String>,
    pub level: DetailLevel,
    pub stream: bool,
}

#[derive(Debug)]
pub enum ExplanationReply {
    Text(String),
    Stream(mpsc::Receiver<String>),
}

impl ExplanationReply {
    /// Drains a streamed reply into one string.
    pub async fn collect(self) -> String {
        match self {
            ExplanationReply::Text(text) => text,
            ExplanationReply::Stream(mut rx) => {
                let mut text = String::new();
                while let Some(chunk) = rx.recv().await {
                    text.push_str(&chunk);
                }
                text
            }
        }
    }
}

/// One capture handed over by the host after it read back the region pixels.
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub position: ScreenPoint,
    /// `None` refreshes the word set only; `Some` also asks for an explanation.
    pub explain_level: Option<DetailLevel>,
    pub raster: RasterRegion,
    pub frame: CaptureFrame,
}

#[derive(Debug)]
pub enum CaptureOutcome {
    /// Words-only refresh finished.
    Recognized { snapshot: Arc<OcrSnapshot> },
    Explained {
        snapshot: Arc<OcrSnapshot>,
        reply: ExplanationReply,
    },
    /// OCR found nothing readable; the explanation service was not called.
    NoText { snapshot: Arc<OcrSnapshot> },
    /// Another cycle is outstanding; this trigger was dropped.
    Busy,
    /// A newer capture started while this one was waiting.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    pub language: String,
    pub stream: bool,
    pub include_image: bool,
    pub max_encoded_width: u32,
    pub locator: LocatorConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            stream: true,
            include_image: true,
            max_encoded_width: 1280,
            locator: LocatorConfig::default(),
        }
    }
}

pub struct CapturePipeline<O, E> {
    ocr: O,
    explainer: E,
    state: CaptureState,
    options: PipelineOptions,
}

impl<O: OcrEngine, E: ExplanationService> CapturePipeline<O, E> {
    pub fn new(ocr: O, explainer: E, options: PipelineOptions) -> Self {
        Self {
            ocr,
            explainer,
            state: CaptureState::new(),
            options,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub async fn run(&self, job: CaptureJob) -> Result<CaptureOutcome> {
        let Some(ticket) = self.state.try_begin(job.explain_level, job.position).await else {
            return Ok(CaptureOutcome::Busy);
        };

        let outcome = self.run_with_ticket(&ticket, job).await;
        self.state.finish(&ticket).await;

        match &outcome {
            Ok(CaptureOutcome::NoText { .. }) => {
                log::info!("capture {}: no text recognized", ticket.capture_id)
            }
            Ok(CaptureOutcome::Superseded) => {
                log::info!("capture {}: reply abandoned", ticket.capture_id)
            }
            Err(e) => log::warn!("capture {} failed: {e}", ticket.capture_id),
            _ => {}
        }
        outcome
    }

    /// Abandons any outstanding cycle and runs `job` in its place.
    ///
    /// For explicit user re-triggers; automatic triggers go through [`Self::run`].
    pub async fn run_superseding(&self, job: CaptureJob) -> Result<CaptureOutcome> {
        self.state.supersede().await;
        self.run(job).await
    }

    async fn run_with_ticket(
        &self,
        ticket: &CaptureTicket,
        job: CaptureJob,
    ) -> Result<CaptureOutcome> {
        let words = self
            .ocr
            .recognize(&job.raster, &self.options.language)
            .await?;
        let snapshot = OcrSnapshot::new(
            words,
            job.frame,
            chrono::Utc::now().timestamp_millis().max(0) as u64,
        );

        if !self.state.is_current(ticket) {
            return Ok(CaptureOutcome::Superseded);
        }
        if !snapshot.has_text() {
            return Ok(CaptureOutcome::NoText { snapshot });
        }
        let Some(level) = job.explain_level else {
            return Ok(CaptureOutcome::Recognized { snapshot });
        };

        let pointing_hint = locate_nearest_word(job.position, &snapshot, &self.options.locator)
            .map(|hit| hit.word.text.trim().to_string())
            .filter(|text| !text.is_empty());
        let image_data_url = if self.options.include_image {
            Some(to_data_url(&job.raster, self.options.max_encoded_width)?)
        } else {
            None
        };
        let request = ExplanationRequest {
            text: snapshot.joined_text(),
            image_data_url,
            pointing_hint,
            level,
            stream: self.options.stream,
        };
        log::info!(
            "capture {}: requesting {} explanation for {} words",
            ticket.capture_id,
            level,
            snapshot.words.len()
        );

        let reply = self.explainer.explain(request).await?;
        if !self.state.is_current(ticket) {
            return Ok(CaptureOutcome::Superseded);
        }
        Ok(CaptureOutcome::Explained { snapshot, reply })
    }
}
