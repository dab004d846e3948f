//! Purely regex/heuristic text-region classification (§4.2). No ML: a raw
//! OCR string is matched top-to-bottom against an ordered rule table and
//! the first match wins.

use dimcheck_core::model::TextRegionType;
use once_cell::sync::Lazy;
use regex::Regex;

static DIMENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[+-]?\d+\.?\d*\s*(mm|in|cm|m)?$").unwrap());
static TOLERANCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+\.?\d*$").unwrap());
static DIAMETER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[Dd]ia").unwrap());
static RADIUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^R\d+\.?\d*$").unwrap());
static THREAD_M_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^M\d+").unwrap());
static THREAD_UN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"UN[CF]").unwrap());
static TOLERANCE_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{1,2}\d{1,2}$").unwrap());
static SECTION_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]-[A-Z]$").unwrap());

/// Classify a raw OCR text string into a `TextRegionType` (§4.2 table).
/// Order matters: the narrower patterns (diameter, radius, thread) are
/// checked before the broader `dimension`/`tolerance_class` catch-alls.
#[must_use]
pub fn classify(raw: &str) -> TextRegionType {
    let text = raw.trim();

    if text.starts_with('\u{00D8}') || text.starts_with('\u{2300}') || text.starts_with('\u{03C6}')
        || DIAMETER_PREFIX_RE.is_match(text)
    {
        return TextRegionType::Diameter;
    }
    if RADIUS_RE.is_match(text) {
        return TextRegionType::Radius;
    }
    if text.contains('\u{00B0}') || text.ends_with('\u{00B0}') {
        return TextRegionType::Angular;
    }
    if THREAD_M_RE.is_match(text) || THREAD_UN_RE.is_match(text) {
        return TextRegionType::Thread;
    }
    if SECTION_LABEL_RE.is_match(text) {
        return TextRegionType::SectionLabel;
    }
    if DIMENSION_RE.is_match(text) {
        return TextRegionType::Dimension;
    }
    if TOLERANCE_RE.is_match(text) {
        return TextRegionType::Tolerance;
    }
    if TOLERANCE_CLASS_RE.is_match(text) {
        return TextRegionType::ToleranceClass;
    }
    TextRegionType::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_plain_dimension() {
        assert_eq!(classify("12.5 mm"), TextRegionType::Dimension);
        assert_eq!(classify("-3.0"), TextRegionType::Tolerance);
    }

    #[test]
    fn classifies_diameter_variants() {
        assert_eq!(classify("\u{00D8}12"), TextRegionType::Diameter);
        assert_eq!(classify("Dia 20"), TextRegionType::Diameter);
    }

    #[test]
    fn classifies_radius_and_thread() {
        assert_eq!(classify("R5.5"), TextRegionType::Radius);
        assert_eq!(classify("M6"), TextRegionType::Thread);
        assert_eq!(classify("UNC"), TextRegionType::Thread);
    }

    #[test]
    fn classifies_angular_section_and_tolerance_class() {
        assert_eq!(classify("45\u{00B0}"), TextRegionType::Angular);
        assert_eq!(classify("A-A"), TextRegionType::SectionLabel);
        assert_eq!(classify("H7"), TextRegionType::ToleranceClass);
    }

    #[test]
    fn falls_back_to_text() {
        assert_eq!(classify("SECTION VIEW NOTES"), TextRegionType::Text);
    }

    #[test]
    fn radius_checked_before_tolerance_class() {
        // "R5" would also match the tolerance_class pattern; radius must win.
        assert_eq!(classify("R5"), TextRegionType::Radius);
    }
}
