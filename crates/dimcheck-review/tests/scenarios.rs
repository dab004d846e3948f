//! Concrete end-to-end adversarial-review scenario (S6).

use async_trait::async_trait;
use dimcheck_core::error::ProviderError;
use dimcheck_core::log::NullEventSink;
use dimcheck_core::model::ReviewCategory;
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};
use dimcheck_review::review;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reviewer-A: round 1 (the initial pass) reports "25.0" at "Section A-A"
/// as missing from the check drawing. Round 3 (the merge) is its second
/// call and, having incorporated Reviewer-B's audit, emits both its own
/// original claim and the audit's correction side by side — dedup pass 2
/// is what's actually responsible for resolving the contradiction.
struct ReviewerA {
    calls: AtomicUsize,
}

#[async_trait]
impl JsonProvider for ReviewerA {
    fn name(&self) -> &str {
        "reviewer-a"
    }
    async fn generate_json(&self, _: &[ImagePart], _: &str, _: &GenerateOptions) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            Ok(r#"{"findings": [{"category": "missing_dimension", "master_value": "25.0", "check_value": null,
                "type": "diameter", "location": "Section A-A", "description": "absent from check"}],
                "summary": "1 missing"}"#
                .to_string())
        } else {
            Ok(r#"{"findings": [
                {"category": "missing_dimension", "master_value": "25.0", "check_value": null,
                 "type": "diameter", "location": "Section A-A", "description": "absent from check"},
                {"category": "modified_value", "master_value": "25.0", "check_value": "25.0",
                 "type": "diameter", "location": "Section A-A", "description": "present on check, relocated"}
                ], "summary": "reconciled"}"#
                .to_string())
        }
    }
}

/// Reviewer-B: the independent audit. It re-examined the check image and
/// found the value present after all, contradicting Reviewer-A's initial
/// claim.
struct ReviewerB;

#[async_trait]
impl JsonProvider for ReviewerB {
    fn name(&self) -> &str {
        "reviewer-b"
    }
    async fn generate_json(&self, _: &[ImagePart], _: &str, _: &GenerateOptions) -> Result<String, ProviderError> {
        Ok(r#"{"findings": [{"category": "modified_value", "master_value": "25.0", "check_value": "25.0",
            "type": "diameter", "location": "Section A-A", "description": "found on check, not missing"}],
            "summary": "1 modified"}"#
            .to_string())
    }
}

fn image() -> ImagePart {
    ImagePart { png_bytes: vec![] }
}

#[tokio::test]
async fn s6_adversarial_false_positive_suppressed_by_merge_and_dedup() {
    let a = ReviewerA { calls: AtomicUsize::new(0) };
    let b = ReviewerB;

    let result = review(&a, &b, &image(), &image(), &[], &[], &[], &[], (1000, 1000), (1000, 1000), &NullEventSink).await;

    assert_eq!(result.missing_dimensions().count(), 0, "shadowed missing claim must not survive dedup");
    assert_eq!(result.modified_values().count(), 1);
    assert_eq!(result.findings[0].category, ReviewCategory::ModifiedValue);
}
