//! Context-aware character disambiguation for LLM-extracted text (§4.3
//! Phase B/C). These are pure functions over strings so the Ingestor's
//! phases stay pure-functional over their input (§4.3 preamble).

use regex::Regex;
use std::sync::OnceLock;

/// Which kind of string field `normalize_text` is correcting — each kind
/// gets a different digit/letter confusion map (§4.3 Phase B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    ToleranceClass,
    Datum,
    DescriptionMaterial,
    Revision,
}

fn datum_map(c: char) -> Option<char> {
    match c {
        '4' => Some('A'),
        '8' => Some('B'),
        '0' => Some('D'),
        '6' => Some('G'),
        '1' => Some('I'),
        '5' => Some('S'),
        '2' => Some('Z'),
        '9' => Some('g'),
        _ => None,
    }
}

/// Apply the field-specific letter/digit corrector (§4.3 Phase B). Only
/// ever touches string fields — numeric parsing is a separate concern
/// (see [`normalize_dimension`]).
#[must_use]
pub fn normalize_text(input: &str, kind: FieldKind) -> String {
    match kind {
        FieldKind::ToleranceClass => normalize_tolerance_class(input),
        FieldKind::Datum | FieldKind::Revision => {
            if input.chars().count() == 1 {
                let c = input.chars().next().unwrap();
                datum_map(c).map(String::from).unwrap_or_else(|| input.to_string())
            } else {
                input.to_string()
            }
        }
        FieldKind::DescriptionMaterial => normalize_description_material(input),
    }
}

fn normalize_tolerance_class(input: &str) -> String {
    // "1T" -> "IT" is a whole-token misread, applied before per-char fixes.
    if input.eq_ignore_ascii_case("1t") {
        return "IT".to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut leading = true;
    while let Some(c) = chars.next() {
        if leading && c.is_ascii_digit() {
            let replaced = match c {
                '6' => 'G',
                '5' => 'S',
                _ => c,
            };
            out.push(replaced);
            // only the leading run of digits is a candidate misread
            if !chars.peek().is_some_and(char::is_ascii_digit) {
                leading = false;
            }
        } else {
            leading = leading && c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

fn normalize_description_material(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let len = chars.len();
    for (i, &c) in chars.iter().enumerate() {
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = if i + 1 < len { Some(chars[i + 1]) } else { None };

        // preserve well-known alloy-style trailing digit+letter codes, e.g. 316L
        if is_alloy_code(&chars, i) {
            out.push(c);
            continue;
        }

        let replaced = match c {
            '0' if is_letter(prev) && is_letter(next) => 'O',
            '1' if is_upper(prev) && (is_upper(next) || next.is_none()) => 'I',
            '8' if prev.is_none() && is_letter(next) => 'B',
            '6' if is_letter(prev) && is_letter(next) => 'G',
            other => other,
        };
        out.push(replaced);
    }
    out
}

fn is_letter(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_upper(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_uppercase())
}

/// True when the character at `idx` participates in a trailing
/// digits-then-letter code such as `316L` that must survive untouched.
fn is_alloy_code(chars: &[char], idx: usize) -> bool {
    static ALLOY_RE: OnceLock<Regex> = OnceLock::new();
    let re = ALLOY_RE.get_or_init(|| Regex::new(r"\d{2,4}[A-Z]\b").unwrap());
    let s: String = chars.iter().collect();
    re.find_iter(&s).any(|m| m.start() <= idx && idx < m.end())
}

/// Parse a dimension value from its raw LLM-reported form (§4.3 Phase C,
/// §8 round-trip tests). Accepts plain numbers, fractions (`n/m`, `a n/m`),
/// space-as-decimal typos, and digit/letter-confusion typos that only occur
/// inside a numeric context.
#[must_use]
pub fn normalize_dimension(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_mixed_fraction(trimmed) {
        return Some(value);
    }

    let fixed = fix_numeric_context(trimmed);
    let fixed = fix_space_as_decimal(&fixed);

    fixed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_mixed_fraction(input: &str) -> Option<f64> {
    static FRACTION_RE: OnceLock<Regex> = OnceLock::new();
    let re = FRACTION_RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<whole>\d+)\s+)?(?P<num>\d+)\s*/\s*(?P<den>\d+)$").unwrap()
    });
    let caps = re.captures(input)?;
    let whole: f64 = caps
        .name("whole")
        .map(|m| m.as_str().parse().unwrap_or(0.0))
        .unwrap_or(0.0);
    let num: f64 = caps.name("num")?.as_str().parse().ok()?;
    let den: f64 = caps.name("den")?.as_str().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(whole + num / den)
}

/// Letter->digit fixes applied only in clearly-numeric contexts
/// (regex-anchored, §4.3 Phase C.1): `O`->`0`, `l`/`I`->`1`, `b`->`6`,
/// `B`->`8`, `S`->`5`, `Z`->`2`.
fn fix_numeric_context(input: &str) -> String {
    static NUMERIC_LIKE_RE: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC_LIKE_RE
        .get_or_init(|| Regex::new(r"^[+-]?[0-9OlIbBSZ]+(?:[. ][0-9OlIbBSZ]+)?$").unwrap());
    if !re.is_match(input) {
        return input.to_string();
    }
    input
        .chars()
        .map(|c| match c {
            'O' => '0',
            'l' | 'I' => '1',
            'b' => '6',
            'B' => '8',
            'S' => '5',
            'Z' => '2',
            other => other,
        })
        .collect()
}

/// `"4 79"` -> `"4.79"`: a single interior space between two digit runs is
/// a misread decimal point (§4.3 Phase C.1).
fn fix_space_as_decimal(input: &str) -> String {
    static SPACE_DECIMAL_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPACE_DECIMAL_RE
        .get_or_init(|| Regex::new(r"^([+-]?\d+) (\d+)$").unwrap());
    re.replace(input, "$1.$2").into_owned()
}

/// §4.3 Phase C.2 pattern validation: does the raw text look like it
/// contains unexpected letters, more than 3 decimal places, or alternating
/// letter/digit runs? `true` means the caller should flag
/// `validation_failed` and multiply confidence by 0.3.
#[must_use]
pub fn fails_pattern_validation(raw: &str) -> bool {
    static DECIMALS_RE: OnceLock<Regex> = OnceLock::new();
    static ALTERNATING_RE: OnceLock<Regex> = OnceLock::new();
    static ALLOWED_LETTERS_RE: OnceLock<Regex> = OnceLock::new();

    let decimals_re = DECIMALS_RE.get_or_init(|| Regex::new(r"\.\d{4,}").unwrap());
    let alternating_re =
        ALTERNATING_RE.get_or_init(|| Regex::new(r"(?:[A-Za-z]\d){2,}|(?:\d[A-Za-z]){2,}").unwrap());
    let allowed_letters_re =
        ALLOWED_LETTERS_RE.get_or_init(|| Regex::new(r"^[+-]?[0-9OlIbBSZ.]+$").unwrap());

    let has_unexpected_letters =
        raw.chars().any(char::is_alphabetic) && !allowed_letters_re.is_match(raw);

    decimals_re.is_match(raw) || alternating_re.is_match(raw) || has_unexpected_letters
}
