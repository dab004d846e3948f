//! Vision-response JSON repair cascade (§4.3 Phase A "Response parsing").
//! Strict parse first; on failure, a sequence of increasingly aggressive
//! repairs, falling back to balanced-brace object recovery.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[\]}])").unwrap());
// The `regex` crate has no lookaround, so an exact "not already quoted"
// match isn't expressible; `\bNone\b` covers the documented case (a bare
// token value) and is the closest practical approximation.
static UNQUOTED_NONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bNone\b").unwrap());

/// Parse a vision-LLM response into a JSON object, applying the repair
/// cascade only when strict parsing fails.
pub fn parse_vision_response(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(normalize_top_level(value));
    }

    let trimmed = trim_to_braces(raw)?;
    let no_trailing_commas = TRAILING_COMMA_RE.replace_all(trimmed, "$1");
    let no_none = UNQUOTED_NONE_RE.replace_all(&no_trailing_commas, "null");

    if let Ok(value) = serde_json::from_str::<Value>(&no_none) {
        return Some(normalize_top_level(value));
    }

    recover_dimensions_object(&no_none)
}

/// Step 1: trim to the substring between the first `{` and the last `}`.
fn trim_to_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then(|| &raw[start..=end])
}

/// If the top-level parse produced a list of size >= 2, shallow-merge into
/// one object with list fields concatenated.
fn normalize_top_level(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };
    if items.len() < 2 {
        return items.into_iter().next().unwrap_or(Value::Null);
    }

    let mut merged = serde_json::Map::new();
    for item in items {
        let Value::Object(map) = item else { continue };
        for (key, val) in map {
            match merged.get_mut(&key) {
                Some(Value::Array(existing)) => {
                    if let Value::Array(new_items) = val {
                        existing.extend(new_items);
                    } else {
                        existing.push(val);
                    }
                }
                Some(_) | None => {
                    merged.insert(key, val);
                }
            }
        }
    }
    Value::Object(merged)
}

/// Last-resort recovery: scan for `"dimensions"` and recover individual
/// objects by balanced-brace matching, accepting any object that has
/// either a `value` or `coordinates` field.
fn recover_dimensions_object(text: &str) -> Option<Value> {
    let anchor = text.find("\"dimensions\"")?;
    let array_start = text[anchor..].find('[')? + anchor;

    let mut recovered = Vec::new();
    let mut depth = 0i32;
    let mut object_start = None;

    for (idx, ch) in text[array_start..].char_indices() {
        let pos = array_start + idx;
        match ch {
            '{' => {
                if depth == 0 {
                    object_start = Some(pos);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = object_start.take() {
                        if let Ok(candidate) = serde_json::from_str::<Value>(&text[start..=pos]) {
                            if candidate.get("value").is_some() || candidate.get("coordinates").is_some() {
                                recovered.push(candidate);
                            }
                        }
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    if recovered.is_empty() {
        return None;
    }

    let mut object = serde_json::Map::new();
    object.insert("dimensions".to_string(), Value::Array(recovered));
    Some(Value::Object(object))
}
