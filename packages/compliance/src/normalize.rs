//! Turns raw model text into a validated [`PartialReport`].
//!
//! Models wrap JSON in prose and Markdown fences, leave stray control
//! characters in strings and sometimes emit trailing commas. The steps here
//! undo those artifacts before handing the value to the schema layer.

use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{ComplianceError, Result};
use crate::schema::SchemaValidator;
use crate::section::Section;
use crate::types::{whole_floors, PartialReport};

const NUMERIC_BUILDING_FIELDS: [&str; 3] = ["floors", "height", "floorArea"];

/// Normalize and validate the raw reply for `section`.
pub fn normalize(raw: &str, section: Section, validator: &SchemaValidator) -> Result<PartialReport> {
    let mut value = parse_model_json(raw)?;
    coerce_building_info(&mut value);
    validator
        .validate_section(&value, section)
        .map_err(|errors| ComplianceError::SchemaViolation { section, errors })
}

/// Extract and parse the JSON object in a model reply.
pub fn parse_model_json(raw: &str) -> Result<Value> {
    let candidate = strip_control_chars(extract_json_candidate(raw));

    match serde_json::from_str(&candidate) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!(error = %first, "model output did not parse, retrying with repairs");
            serde_json::from_str(&remove_trailing_commas(&candidate)).map_err(|e| {
                ComplianceError::MalformedModelOutput {
                    reason: e.to_string(),
                    raw: raw.to_string(),
                }
            })
        }
    }
}

/// Fenced block first, then the greedy span from the first `{` to the last `}`.
pub fn extract_json_candidate(raw: &str) -> &str {
    let trimmed = raw.trim();

    let blocks = extract_fenced_blocks(trimmed);
    let text = blocks
        .iter()
        .find(|b| b.contains('{'))
        .or_else(|| blocks.last())
        .copied()
        .unwrap_or(trimmed);

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

/// Extract all fenced code blocks from text.
fn extract_fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut remaining = text;

    while let Some(start) = remaining.find("```") {
        let after_fence = &remaining[start + 3..];
        // Skip optional language identifier on the same line
        let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            blocks.push(&content[..end]);
            remaining = &content[end + 3..];
        } else {
            break;
        }
    }

    blocks
}

/// Drop C0/C1 control characters. Line breaks and tabs become spaces so
/// that they stay valid whether they sit inside a string or between tokens.
fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Remove commas directly followed (modulo whitespace) by `}` or `]`,
/// leaving string contents untouched.
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Coerce numeric `buildingInfo` fields the model returned as text.
///
/// `"85m"` becomes `85`, `"25 tầng"` becomes `25`, anything without a
/// leading number becomes `null`. `floors` must end up a whole count:
/// `25.0` becomes `25`, while `25.5` or `-1` become `null`.
fn coerce_building_info(value: &mut Value) {
    let Some(info) = value.get_mut("buildingInfo").and_then(Value::as_object_mut) else {
        return;
    };

    for key in NUMERIC_BUILDING_FIELDS {
        let Some(field) = info.get_mut(key) else {
            continue;
        };
        if let Some(text) = field.as_str() {
            let coerced = leading_number(text)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            *field = coerced;
        }
    }

    if let Some(floors) = info.get_mut("floors") {
        if let Some(n) = floors.as_f64() {
            *floors = whole_floors(n).map(Value::from).unwrap_or(Value::Null);
        }
    }
}

/// Leading decimal number of `text`; a comma is read as the decimal mark.
fn leading_number(text: &str) -> Option<f64> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    digits.trim_end_matches('.').parse().ok()
}
