//! OCR Engine (C2): runs the traditional and CNN detectors, classifies and
//! groups their output (§4.2).
//!
//! Both detectors are best-effort; a detector's own internal failure is
//! swallowed into an empty contribution rather than aborting the other.

pub mod classify;
pub mod cnn;
pub mod grouping;
pub mod traditional;

use cnn::CnnOcr;
use dimcheck_core::model::TextRegion;
use image::DynamicImage;
use std::path::Path;
use tracing::instrument;

pub struct OcrEngine {
    traditional: traditional::TraditionalOcr,
    cnn: CnnOcr,
}

/// Everything §4.2 produces for one image: the raw concatenated detections
/// plus the derived, greedily-merged groups.
pub struct OcrOutput {
    pub regions: Vec<TextRegion>,
    pub grouped_regions: Vec<TextRegion>,
}

impl OcrEngine {
    /// Build the engine. `cnn_model_path` is optional — when absent the
    /// CNN detector degrades to its connected-component fallback rather
    /// than failing construction (§4.2 best-effort contract).
    pub fn new(cnn_model_path: Option<&Path>) -> Self {
        let cnn = match cnn_model_path {
            Some(path) => CnnOcr::new(path).unwrap_or_else(|_| CnnOcr::unbound()),
            None => CnnOcr::unbound(),
        };
        Self {
            traditional: traditional::TraditionalOcr,
            cnn,
        }
    }

    /// Run both detectors and post-process per §4.2: concatenate
    /// (duplicates kept), sort into reading order, then greedily group.
    ///
    /// OCR is CPU-bound; callers running inside an async runtime should
    /// invoke this through `tokio::task::spawn_blocking` rather than
    /// awaiting it directly (§9).
    #[instrument(skip(self, image))]
    pub fn detect(&self, image: &DynamicImage) -> OcrOutput {
        let mut regions = self.traditional.detect(image);
        regions.extend(self.cnn.detect(image));

        grouping::sort_reading_order(&mut regions);
        let grouped = grouping::grouped_regions(&regions);

        OcrOutput {
            regions,
            grouped_regions: grouped,
        }
    }

    /// Run both detectors but keep their contributions apart, for callers
    /// that need to know which detector family produced a given region
    /// (§4.5 region refinement's `detection_method` bookkeeping).
    #[instrument(skip(self, image))]
    pub fn detect_separated(&self, image: &DynamicImage) -> (Vec<TextRegion>, Vec<TextRegion>) {
        (self.traditional.detect(image), self.cnn.detect(image))
    }
}
