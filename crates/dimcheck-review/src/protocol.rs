//! The three-round adversarial protocol (§4.5). Round 1 (Reviewer-A) and
//! round 3 (merge, also Reviewer-A) run through `provider_a`; round 2
//! (audit) runs through a *different* model family, `provider_b`.

use dimcheck_core::error::ReviewerError;
use dimcheck_core::model::ReviewResult;
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};
use std::time::Duration;

const ROUND_MAX_TOKENS: usize = 4096;
const ROUND_TIMEOUT_SECS: u64 = 600;

/// Round 2's outcome, fed explicitly into round 3's prompt builder rather
/// than collapsed into `Option::None` — merge must be able to tell "audit
/// ran and found nothing" apart from "audit never produced usable output"
/// (§9 open question).
pub enum ReviewRound2 {
    Ok(String),
    Failed(String),
}

fn review_options() -> GenerateOptions {
    GenerateOptions {
        temperature: 0.1,
        max_tokens: ROUND_MAX_TOKENS,
        response_mime_json: true,
        safety_off: true,
        timeout: Duration::from_secs(ROUND_TIMEOUT_SECS),
    }
}

/// Round 1 — Reviewer-A's initial pass over both raw images.
pub async fn run_initial(
    provider_a: &dyn JsonProvider,
    master_image: &ImagePart,
    check_image: &ImagePart,
) -> Result<String, ReviewerError> {
    let prompt = build_initial_prompt();
    provider_a
        .generate_json(&[master_image.clone(), check_image.clone()], &prompt, &review_options())
        .await
        .map_err(|e| ReviewerError::RoundFailed {
            round: 1,
            reason: e.to_string(),
        })
}

/// Round 2 — Reviewer-B's independent audit. Never propagates an error:
/// failure becomes `ReviewRound2::Failed` so round 3 can still run.
pub async fn run_audit(provider_b: &dyn JsonProvider, master_image: &ImagePart, check_image: &ImagePart, initial_raw: &str) -> ReviewRound2 {
    let prompt = build_audit_prompt(initial_raw);
    match provider_b
        .generate_json(&[master_image.clone(), check_image.clone()], &prompt, &review_options())
        .await
    {
        Ok(text) if !text.trim().is_empty() => ReviewRound2::Ok(text),
        Ok(_) => ReviewRound2::Failed("audit model returned an empty response".to_string()),
        Err(e) => ReviewRound2::Failed(e.to_string()),
    }
}

/// Round 3 — Reviewer-A merges its own initial pass with whatever round 2
/// produced, re-checking both images.
pub async fn run_merge(
    provider_a: &dyn JsonProvider,
    master_image: &ImagePart,
    check_image: &ImagePart,
    initial_raw: &str,
    round2: &ReviewRound2,
) -> Result<String, ReviewerError> {
    let prompt = build_merge_prompt(initial_raw, round2);
    provider_a
        .generate_json(&[master_image.clone(), check_image.clone()], &prompt, &review_options())
        .await
        .map_err(|e| ReviewerError::RoundFailed {
            round: 3,
            reason: e.to_string(),
        })
}

/// Parse a round's raw text into a `ReviewResult`, tolerating trailing
/// prose around the JSON object the way the rest of the pipeline does.
pub fn parse_review_result(raw: &str) -> Result<ReviewResult, serde_json::Error> {
    let trimmed = raw.trim();
    let start = trimmed.find('{').unwrap_or(0);
    let end = trimmed.rfind('}').map_or(trimmed.len(), |i| i + 1);
    serde_json::from_str(&trimmed[start..end])
}

fn build_initial_prompt() -> String {
    "You are comparing two engineering drawings (master and check) for a dimensional \
     inspection. Find every dimension, tolerance, or GD&T callout that was added, removed, \
     or changed between the master and the check drawing.\n\n\
     Rules:\n\
     - Reference section/view names exactly as printed (e.g. \"SECTION A-A\", \"DETAIL B\"), \
       never invented labels.\n\
     - Disambiguate digits from letters using context (a dimension reading '0' is never 'O'; \
       '1' is never 'I' or 'l').\n\
     - Preserve the full digit count of every value; never truncate or round a value you report.\n\
     - Do not report the same change twice under different wording (deduplicate within this pass).\n\
     - Forbidden confusions: do not mistake a nearby but distinct feature's value for the one \
       you are reporting (e.g. a '22' on one hole for a '23' on an adjacent hole).\n\n\
     Return JSON: {\"findings\": [{\"category\": \"missing_dimension\"|\"missing_tolerance\"|\"modified_value\", \
     \"master_value\": string, \"check_value\": string|null, \"type\": string, \"location\": string, \
     \"description\": string, \"master_region\": {\"x_pct\",\"y_pct\",\"w_pct\",\"h_pct\"}|null, \
     \"check_region\": {...}|null}], \"summary\": string}"
        .to_string()
}

fn build_audit_prompt(initial_raw: &str) -> String {
    format!(
        "Independently audit these two engineering drawings for dimensional differences. A \
         prior reviewer produced the following findings; you have access to their raw output \
         for context only — form your own findings from scratch by re-examining both images, \
         correcting any false positive you find in their report and adding anything they \
         missed.\n\nPrior reviewer's raw output:\n{initial_raw}\n\n\
         Return JSON in the same shape: {{\"findings\": [...], \"summary\": string}}"
    )
}

fn build_merge_prompt(initial_raw: &str, round2: &ReviewRound2) -> String {
    let round2_section = match round2 {
        ReviewRound2::Ok(text) => format!("Independent audit findings:\n{text}"),
        ReviewRound2::Failed(reason) => {
            format!("Independent audit did not produce usable findings (reason: {reason}). Rely on your own initial pass and a fresh re-check of both images.")
        }
    };

    format!(
        "You previously reviewed these two drawings and produced the findings below. A second, \
         independent reviewer then audited your work. Merge both into one final result:\n\n\
         1. Re-check the check image for every proposed finding and eliminate any false positive.\n\
         2. Catch subtle digit-level modifications the first pass may have missed.\n\
         3. Never confuse nearby-but-distinct values for different features (e.g. 22 vs 23 on \
            different holes).\n\
         4. Deduplicate items describing the same change.\n\
         5. Every location must reference a printed section/view name.\n\
         6. Emit every bounding box in percentage space.\n\n\
         Your initial findings:\n{initial_raw}\n\n{round2_section}\n\n\
         Return the final JSON in the same shape: {{\"findings\": [...], \"summary\": string}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_review_result_trims_surrounding_prose() {
        let raw = "Here you go:\n{\"findings\": [], \"summary\": \"ok\"}\nthanks";
        let result = parse_review_result(raw).unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.summary, "ok");
    }

    #[test]
    fn merge_prompt_includes_failure_reason_on_round2_failure() {
        let prompt = build_merge_prompt("{}", &ReviewRound2::Failed("timeout".to_string()));
        assert!(prompt.contains("timeout"));
    }
}
