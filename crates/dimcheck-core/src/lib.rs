//! Shared data model, error taxonomy, provider trait, and text/geometry
//! helpers for the `dimcheck` drawing-comparison pipeline.
//!
//! This crate has no knowledge of any concrete LLM SDK, OCR engine, or PDF
//! renderer — those live in the downstream `dimcheck-loader`,
//! `dimcheck-ocr`, and `dimcheck-ingest` crates, each implementing the
//! traits and data types defined here.

pub mod error;
pub mod geometry;
pub mod log;
pub mod model;
pub mod provider;
pub mod text;

pub use error::{
    ComparatorError, IngestorError, LoaderError, OcrEngineError, PipelineError, ProviderError,
    ReviewerError,
};
pub use geometry::{grid_ref, pct_to_px, px_to_pct, PctRect, Rect};
pub use log::{AgentLog, EventSink, LoggingEventSink, NullEventSink};
pub use model::*;
pub use provider::{GenerateOptions, ImagePart, JsonProvider};
