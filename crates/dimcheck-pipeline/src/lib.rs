//! Top-level orchestration: runs the Loader, OCR Engine, Ingestor,
//! Comparator, and (optionally) the Adversarial Reviewer over one
//! master/check drawing pair (§5, §6).

pub mod config;

use config::PipelineConfig;
use dimcheck_compare::Comparator;
use dimcheck_core::error::PipelineError;
use dimcheck_core::log::{AgentLog, LoggingEventSink};
use dimcheck_core::model::{
    Balloon, ComparisonItem, ComparisonStatus, LogEntry, MachineState, PipelineStatus, ReviewResult, Summary,
};
use dimcheck_core::provider::{ImagePart, JsonProvider};
use dimcheck_ingest::Ingestor;
use dimcheck_loader::Loader;
use dimcheck_ocr::OcrEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    pub use_cnn_ocr: bool,
    pub ocr_consensus_threshold: i32,
    pub cnn_min_confidence: f64,
    pub review_mode: ReviewMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Structured,
    Adversarial,
    Both,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            use_cnn_ocr: true,
            ocr_consensus_threshold: 2,
            cnn_min_confidence: 0.7,
            review_mode: ReviewMode::Structured,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub master_path: PathBuf,
    pub check_path: PathBuf,
    pub options: ComparisonOptions,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ComparisonResult {
    pub master_machine_state: MachineState,
    pub check_machine_state: MachineState,
    pub comparisons: Vec<ComparisonItem>,
    pub master_balloon_data: Vec<Balloon>,
    pub check_balloon_data: Vec<Balloon>,
    pub summary: Summary,
    pub review_result: Option<ReviewResult>,
    pub agent_log: Vec<LogEntry>,
}

/// The providers the pipeline needs, grouped so `Pipeline::run` takes one
/// argument instead of four (§9 "Provider SDK coupling").
pub struct Providers<'a> {
    pub vision: &'a dyn JsonProvider,
    pub reasoning: &'a dyn JsonProvider,
    pub adversarial_a: &'a dyn JsonProvider,
    pub adversarial_b: &'a dyn JsonProvider,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline for one master/check pair under the
    /// configured overall timeout (§5 "Cancellation").
    #[instrument(skip(self, providers, request))]
    pub async fn run(&self, providers: &Providers<'_>, request: &ComparisonRequest) -> Result<ComparisonResult, PipelineError> {
        let timeout = Duration::from_secs(self.config.pipeline_timeout_secs);
        match tokio::time::timeout(timeout, self.run_inner(providers, request)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout),
        }
    }

    async fn run_inner(&self, providers: &Providers<'_>, request: &ComparisonRequest) -> Result<ComparisonResult, PipelineError> {
        let log = AgentLog::new();
        let sink = LoggingEventSink::new(log.clone());

        let loader = Loader::new()?;
        let cnn_model_path: Option<&Path> = None;
        // Shared as an `Arc` (§9 "OCR heaviness": process-local singleton)
        // so Phase E and the adversarial-review OCR pass can each move a
        // handle into `tokio::task::spawn_blocking` without borrowing.
        let ocr_engine = Arc::new(OcrEngine::new(cnn_model_path));

        let (master_image, check_image) = (
            loader.load(&request.master_path).map_err(|e| PipelineError::MasterFailed(e.into()))?,
            loader.load(&request.check_path).map_err(|e| PipelineError::CheckFailed(e.into()))?,
        );

        let master_small_text = small_text_detected(&master_image.bytes);
        let check_small_text = small_text_detected(&check_image.bytes);

        let ingestor = Ingestor::new(providers.vision, Arc::clone(&ocr_engine));
        let (master_state, check_state) = tokio::join!(
            ingestor.ingest(&master_image, master_small_text, &sink),
            ingestor.ingest(&check_image, check_small_text, &sink),
        );
        let master_state = master_state.map_err(|e| PipelineError::MasterFailed(e.into()))?;
        let check_state = check_state.map_err(|e| PipelineError::CheckFailed(e.into()))?;

        let comparator = Comparator::new(providers.reasoning);
        let comparator_output = comparator.compare(&master_state, &check_state, &sink).await;

        let master_balloon_data = build_balloons(&comparator_output.comparisons, BalloonSide::Master);
        let check_balloon_data = build_balloons(&comparator_output.comparisons, BalloonSide::Check);

        let review_result = if matches!(request.options.review_mode, ReviewMode::Adversarial | ReviewMode::Both) {
            let master_image_part = ImagePart {
                png_bytes: master_image.bytes.clone(),
            };
            let check_image_part = ImagePart {
                png_bytes: check_image.bytes.clone(),
            };
            let (master_traditional, master_cnn) = ocr_regions(Arc::clone(&ocr_engine), master_image.bytes.clone()).await;
            let (check_traditional, check_cnn) = ocr_regions(Arc::clone(&ocr_engine), check_image.bytes.clone()).await;

            Some(
                dimcheck_review::review(
                    providers.adversarial_a,
                    providers.adversarial_b,
                    &master_image_part,
                    &check_image_part,
                    &master_traditional,
                    &master_cnn,
                    &check_traditional,
                    &check_cnn,
                    (master_image.width_px, master_image.height_px),
                    (check_image.width_px, check_image.height_px),
                    &sink,
                )
                .await,
            )
        } else {
            None
        };

        let mut summary = comparator_output.summary;
        if summary.status == PipelineStatus::Ok && comparator_output.comparisons.iter().any(|c| c.status == ComparisonStatus::NotFound) {
            summary.status = PipelineStatus::Error;
        }

        Ok(ComparisonResult {
            master_machine_state: master_state,
            check_machine_state: check_state,
            comparisons: comparator_output.comparisons,
            master_balloon_data,
            check_balloon_data,
            summary,
            review_result,
            agent_log: log.entries(),
        })
    }
}

fn small_text_detected(bytes: &[u8]) -> bool {
    let Ok(dynamic) = image::load_from_memory(bytes) else {
        return false;
    };
    dimcheck_loader::small_text::detect(&dynamic).severity != dimcheck_loader::small_text::Severity::Normal
}

/// Detector-separated OCR for the adversarial review path; runs on
/// `tokio::task::spawn_blocking` since `detect_separated` is CPU-bound
/// Tesseract + ONNX inference (§9).
async fn ocr_regions(engine: Arc<OcrEngine>, bytes: Vec<u8>) -> (Vec<dimcheck_core::model::TextRegion>, Vec<dimcheck_core::model::TextRegion>) {
    let result = tokio::task::spawn_blocking(move || {
        let Ok(dynamic) = image::load_from_memory(&bytes) else {
            return (Vec::new(), Vec::new());
        };
        engine.detect_separated(&dynamic)
    })
    .await;

    result.unwrap_or_else(|join_err| {
        warn!(error = %join_err, "adversarial-review OCR task panicked");
        (Vec::new(), Vec::new())
    })
}

enum BalloonSide {
    Master,
    Check,
}

fn build_balloons(comparisons: &[ComparisonItem], side: BalloonSide) -> Vec<Balloon> {
    comparisons
        .iter()
        .filter_map(|item| {
            let coordinates = match side {
                BalloonSide::Master => item.master_coordinates,
                BalloonSide::Check => item.check_coordinates,
            }?;
            Some(Balloon {
                balloon_number: item.balloon_number,
                value: item.check_actual.or(item.master_nominal),
                unit: None,
                coordinates,
                tolerance_class: item.master_tolerance_class.clone(),
                nominal: item.master_nominal,
                upper_tol: item.master_upper_tol,
                lower_tol: item.master_lower_tol,
                status: item.status,
            })
        })
        .collect()
}
