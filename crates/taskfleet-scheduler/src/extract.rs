//! Extract structured payloads from noisy command output.
//!
//! Remote scripts emit debug banners, counts and warnings around the actual
//! JSON or CSV payload. The extractors here scan for the payload, decode
//! it, and give up quietly: a parse failure yields nothing, never an error.

use serde_json::Value;
use std::collections::HashMap;

/// Locate and decode a JSON array or object embedded in `raw`. Two passes:
/// a loose one that accepts any line opening with a bracket, then a
/// stricter one requiring the line to look like the payload itself rather
/// than, say, a log line mentioning braces.
pub fn extract_json_value(raw: &str) -> Option<Value> {
    if let Some(value) = try_pass(raw, |line| line.starts_with('[') || line.starts_with('{')) {
        return Some(value);
    }
    try_pass(raw, |line| {
        line == "["
            || line == "[]"
            || line.starts_with("[{")
            || line.starts_with("{\"")
    })
}

fn try_pass(raw: &str, start_condition: impl Fn(&str) -> bool) -> Option<Value> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let trimmed = line.trim();
        if start_condition(trimmed) {
            let bracket = offset + line.find(['[', '{'])?;
            let candidate = balanced_slice(raw, bracket)?;
            match serde_json::from_str(candidate) {
                Ok(value) => return Some(value),
                Err(e) => {
                    tracing::debug!("Candidate payload failed to decode: {}", e);
                    return None;
                }
            }
        }
        offset += line.len();
    }
    None
}

/// Slice from the opening bracket at `start` to its matching close,
/// honoring JSON string and escape state.
fn balanced_slice(raw: &str, start: usize) -> Option<&str> {
    let bytes = raw.as_bytes();
    let open = *bytes.get(start)?;
    let close = match open {
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b'[' | b'{' if b == open => depth += 1,
            b']' | b'}' if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Header-indexed CSV rows. The first non-blank line is the header; rows
/// are split positionally, rows shorter than the header are skipped as
/// malformed, and repeated header lines (schtasks /v emits one per task
/// folder) are dropped.
pub fn csv_rows(raw: &str) -> Vec<HashMap<String, String>> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
    let header: Vec<String> = match lines.next() {
        Some(line) => split_csv_line(line),
        None => return Vec::new(),
    };
    if header.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::new();
    for line in lines {
        let values = split_csv_line(line);
        if values.len() < header.len() {
            tracing::debug!("Skipping short CSV row ({} of {} fields)", values.len(), header.len());
            continue;
        }
        if values[0] == header[0] {
            continue;
        }
        let row = header
            .iter()
            .cloned()
            .zip(values.into_iter())
            .collect::<HashMap<_, _>>();
        rows.push(row);
    }
    rows
}

fn split_csv_line(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_string())
        .collect()
}
