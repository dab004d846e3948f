//! Error taxonomy shared across every pipeline stage (spec §7).
//!
//! Each component boundary gets its own `thiserror` enum rather than one
//! grab-bag error type, so callers can match on the kind that actually
//! crossed their boundary. `PipelineError` is the union type returned by the
//! top-level orchestration in `dimcheck-pipeline`.

use thiserror::Error;

/// Errors raised by the Image Loader (C1). Always fatal for the drawing.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to decode PDF: {0}")]
    PdfDecode(String),

    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error reading drawing: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the OCR Engine (C2). Never fatal — callers degrade to
/// an empty region list and continue (§7 "Never-fatal paths").
#[derive(Error, Debug)]
pub enum OcrEngineError {
    #[error("OCR model failed to load: {0}")]
    ModelLoad(String),

    #[error("OCR inference failed: {0}")]
    Inference(String),

    #[error("OCR preprocessing failed: {0}")]
    Preprocessing(String),
}

/// Errors raised by the Ingestor (C3).
#[derive(Error, Debug)]
pub enum IngestorError {
    #[error("vision LLM call exhausted retries: {0}")]
    VisionRpcExhausted(String),

    #[error("vision LLM response could not be parsed even after repair: {0}")]
    ResponseUnparseable(String),
}

/// Errors raised by the Comparator (C4).
#[derive(Error, Debug)]
pub enum ComparatorError {
    #[error("matching LLM fallback failed: {0}")]
    MatchRpcFailed(String),
}

/// Errors raised by the Adversarial Reviewer (C5). Per the spec, provider
/// failures are trapped per round and never escape this boundary — this
/// type exists for internal round bookkeeping, not for propagation out of
/// `dimcheck-review::review`.
#[derive(Error, Debug)]
pub enum ReviewerError {
    #[error("reviewer round {round} failed: {reason}")]
    RoundFailed { round: u8, reason: String },
}

/// A provider RPC error, shared by every `generate_json` implementation.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider request timed out")]
    Timeout,

    #[error("provider returned an error: {0}")]
    Rpc(String),

    #[error("provider response was truncated and no partial text was recoverable")]
    TruncatedEmpty,
}

/// Top-level error returned by `dimcheck-pipeline`'s orchestration.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("master drawing failed to load or ingest: {0}")]
    MasterFailed(#[source] anyhow::Error),

    #[error("check drawing failed to load or ingest: {0}")]
    CheckFailed(#[source] anyhow::Error),

    #[error("pipeline exceeded its overall timeout")]
    Timeout,

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Ingestor(#[from] IngestorError),

    #[error(transparent)]
    Comparator(#[from] ComparatorError),
}
