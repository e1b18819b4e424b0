//! Defensive JSON extraction from raw model text.
//!
//! Models wrap JSON in markdown fences, prose, or both. These helpers pull
//! the best candidate out of messy text without an additional model call.
//! They recover *location* problems (fences, surrounding prose); *content*
//! problems are left to the schema sanitizers downstream.

use serde_json::Value;

/// Strip markdown code fences from around (or at the head of) a chunk.
///
/// Handles complete fenced blocks (```` ```json ... ``` ````), a dangling
/// opening fence with no close yet (mid-stream), and stray trailing fences.
pub fn strip_code_fences(text: &str) -> &str {
    let mut t = text.trim();

    if let Some(rest) = t.strip_prefix("```") {
        // Drop the language hint line if present, else just the fence.
        t = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = t.trim_end().strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Find the first balanced `{...}` or `[...]` region in the text.
///
/// Tracks string literals and escapes so braces inside JSON strings don't
/// confuse the depth count.
pub fn find_balanced_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = text.as_bytes()[start] as char;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract a JSON value from raw model text, or `None`.
///
/// Strategies in order: direct parse, fence-stripped parse, first balanced
/// bracket region. Never errors; callers treat `None` as a model failure.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Some(v);
    }

    find_balanced_json(unfenced)
        .and_then(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
        assert_eq!(extract_json("[1, 2]"), Some(json!([1, 2])));
    }

    #[test]
    fn test_fenced_json() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(text), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_json_in_prose() {
        let text = r#"Here you go: {"sentiment": "positive"} — hope that helps!"#;
        assert_eq!(
            extract_json(text),
            Some(json!({"sentiment": "positive"}))
        );
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"prefix {"code": "if (x) { return; }"} suffix"#;
        let v = extract_json(text).unwrap();
        assert_eq!(v["code"], "if (x) { return; }");
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"{"quote": "she said \"hi\" {loudly}"}"#;
        let v = extract_json(text).unwrap();
        assert_eq!(v["quote"], r#"she said "hi" {loudly}"#);
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("{broken"), None);
    }

    #[test]
    fn test_strip_dangling_open_fence() {
        // Mid-stream: opening fence arrived, close hasn't
        assert_eq!(strip_code_fences("```json\n{\"a\":"), "{\"a\":");
        assert_eq!(strip_code_fences("```json"), "");
    }

    #[test]
    fn test_strip_fences_noop_on_plain() {
        assert_eq!(strip_code_fences(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_find_balanced_array() {
        let text = "list: [1, [2, 3], 4] end";
        assert_eq!(find_balanced_json(text), Some("[1, [2, 3], 4]"));
    }
}
