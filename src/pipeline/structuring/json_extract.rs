//! Locate the JSON object inside a noisy model reply.
//!
//! Models wrap their output in code fences or add a sentence before and
//! after it. This module strips fence lines, takes the span from the first
//! `{` to the last `}`, and accepts it only when that span is exactly one
//! balanced object. Anything else fails closed.

use super::StructuringError;

const FENCE: &str = "```";

/// Remove markdown fence markers (```` ``` ```` and ```` ```json ````) while
/// keeping anything written on the same line as the marker.
pub fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter_map(strip_fence_markers)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line without its opening fence (and language tag) or closing fence.
/// `None` when nothing but markers was on the line.
fn strip_fence_markers(line: &str) -> Option<&str> {
    let mut rest = line;
    if let Some(after) = rest.trim_start().strip_prefix(FENCE) {
        let tag_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        rest = &after[tag_len..];
    }
    while let Some(before) = rest.trim_end().strip_suffix(FENCE) {
        rest = before;
    }

    if rest.trim().is_empty() && line.contains(FENCE) {
        None
    } else {
        Some(rest)
    }
}

/// Extract the single top-level JSON object from `raw`.
pub fn extract_json_object(raw: &str) -> Result<String, StructuringError> {
    let cleaned = strip_code_fences(raw);

    let start = cleaned
        .find('{')
        .ok_or_else(|| StructuringError::MalformedResponse("No opening brace".into()))?;
    let end = cleaned
        .rfind('}')
        .ok_or_else(|| StructuringError::MalformedResponse("No closing brace".into()))?;
    if end < start {
        return Err(StructuringError::MalformedResponse(
            "Closing brace precedes opening brace".into(),
        ));
    }

    let candidate = &cleaned[start..=end];
    if !is_single_balanced_object(candidate) {
        return Err(StructuringError::MalformedResponse(
            "Braces do not form a single balanced object".into(),
        ));
    }
    Ok(candidate.to_string())
}

/// True when `s` opens with `{`, and its depth first returns to zero on the
/// final character. Braces inside string literals are ignored.
fn is_single_balanced_object(s: &str) -> bool {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let last = s.len().saturating_sub(1);

    for (pos, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
                if depth == 0 && pos != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_string
}
