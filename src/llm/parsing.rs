//! Shared JSON parsing utilities for LLM response handling.
//!
//! Even under a structured-output constraint, responses routed through
//! proxies or compatible gateways may arrive wrapped in markdown fences or
//! with stray prose. This module extracts and parses the JSON object from
//! raw completion text.

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse a raw completion into a JSON object value.
///
/// Handles clean objects, objects inside markdown fences, and objects
/// surrounded by prose. Anything that does not contain a parseable object
/// is an error — block generation requires schema-shaped output.
pub fn parse_json_object(response: &str) -> Result<Value> {
    let json_str = extract_json_object(response);

    let value: Value = serde_json::from_str(&json_str)
        .with_context(|| format!("LLM returned unparseable JSON: {}", truncate(response, 200)))?;

    if !value.is_object() {
        anyhow::bail!("LLM returned non-object JSON: {}", truncate(response, 200));
    }

    Ok(value)
}

/// Extract a JSON object from a response that may contain extra text.
///
/// Tries the following strategies in order:
/// 1. Strip markdown code fences (` ```json ... ``` `)
/// 2. If the (cleaned) text starts with `{`, find the matching `}`
/// 3. Search for the first `{` in the text and find its matching `}`
/// 4. Fall back to returning the original text as-is
pub fn extract_json_object(response: &str) -> String {
    let response = response.trim();

    let stripped = strip_code_fences(response);

    if stripped.starts_with('{')
        && let Some(end) = find_matching_brace(stripped)
    {
        return stripped[..=end].to_string();
    }

    if let Some(start) = stripped.find('{')
        && let Some(end) = find_matching_brace(&stripped[start..])
    {
        return stripped[start..=start + end].to_string();
    }

    stripped.to_string()
}

/// Strip markdown code fences (``` or ```json) from around content.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();

    if s.starts_with("```") {
        if let Some(first_newline) = s.find('\n') {
            let inner = &s[first_newline + 1..];
            if let Some(closing) = inner.rfind("```") {
                return inner[..closing].trim();
            }
        }
    }

    s
}

/// Find the byte index of the `}` that matches the first `{` in the string.
///
/// Returns `None` if braces are unbalanced. String literals are skipped so
/// braces inside values do not confuse the balance.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
