//! Adversarial Reviewer (C5): an independent alternative comparison path
//! that works directly from the two raw drawing images (§4.5).

pub mod dedup;
pub mod protocol;
pub mod region;

use dimcheck_core::log::EventSink;
use dimcheck_core::model::{LogKind, ReviewResult, TextRegion};
use dimcheck_core::provider::{ImagePart, JsonProvider};
use protocol::ReviewRound2;
use tracing::instrument;

/// Run the full three-round protocol, then dedup and region-refine the
/// result. Never propagates an error past this boundary (§4.5 Errors):
/// every failure degrades to the best result still available, and total
/// failure yields an empty `ReviewResult` with a diagnostic summary.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all)]
pub async fn review(
    provider_a: &dyn JsonProvider,
    provider_b: &dyn JsonProvider,
    master_image: &ImagePart,
    check_image: &ImagePart,
    master_traditional: &[TextRegion],
    master_cnn: &[TextRegion],
    check_traditional: &[TextRegion],
    check_cnn: &[TextRegion],
    master_size: (u32, u32),
    check_size: (u32, u32),
    sink: &dyn EventSink,
) -> ReviewResult {
    let round1_raw = match protocol::run_initial(provider_a, master_image, check_image).await {
        Ok(text) => text,
        Err(e) => {
            sink.publish("reviewer", LogKind::Error, serde_json::json!({"round": 1, "error": e.to_string()}));
            return empty_result(&format!("round 1 failed: {e}"));
        }
    };

    let round2 = protocol::run_audit(provider_b, master_image, check_image, &round1_raw).await;
    if let ReviewRound2::Failed(reason) = &round2 {
        sink.publish("reviewer", LogKind::Error, serde_json::json!({"round": 2, "error": reason}));
    }

    let final_raw = match protocol::run_merge(provider_a, master_image, check_image, &round1_raw, &round2).await {
        Ok(text) => text,
        Err(e) => {
            sink.publish("reviewer", LogKind::Error, serde_json::json!({"round": 3, "error": e.to_string()}));
            round1_raw.clone()
        }
    };

    let parsed = protocol::parse_review_result(&final_raw).or_else(|_| protocol::parse_review_result(&round1_raw));

    let Ok(result) = parsed else {
        sink.publish("reviewer", LogKind::Error, serde_json::json!({"error": "no round yielded parseable JSON"}));
        return empty_result("no round produced a parseable result");
    };

    let mut result = dedup::deduplicate(result);
    for finding in &mut result.findings {
        region::refine_finding(
            finding,
            master_traditional,
            master_cnn,
            check_traditional,
            check_cnn,
            master_size,
            check_size,
        );
    }

    sink.publish("reviewer", LogKind::Complete, serde_json::json!({"finding_count": result.findings.len()}));
    result
}

fn empty_result(summary: &str) -> ReviewResult {
    ReviewResult {
        findings: Vec::new(),
        summary: summary.to_string(),
    }
}
