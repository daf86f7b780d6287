//! Best-effort recovery of JSON objects from free-text model replies.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```json\s*([\s\S]*?)\s*```").expect("valid regex"))
}

fn leading_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\A\s*```(?:json)?\s*").expect("valid regex"))
}

fn trailing_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*```\s*\z").expect("valid regex"))
}

/// Drop a surrounding ```` ```json ```` fence when the text starts with one.
pub fn strip_code_fences(text: &str) -> String {
    if !text.trim_start().starts_with("```") {
        return text.trim().to_string();
    }
    let without_head = leading_fence_re().replace(text, "");
    trailing_fence_re()
        .replace(&without_head, "")
        .trim()
        .to_string()
}

/// Every balanced `{...}` region of `text`, longest first.
pub fn balanced_candidates(text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut candidates = Vec::new();

    for (i, b) in text.bytes().enumerate() {
        match b {
            b'{' => starts.push(i),
            b'}' => {
                if let Some(start) = starts.pop() {
                    candidates.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    // stable sort keeps earlier regions first among equal lengths
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));
    candidates
}

/// Try, in order: fenced json blocks, the whole text, balanced brace regions
/// (longest first), then the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    for cap in json_fence_re().captures_iter(text) {
        if let Some(block) = cap.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(block.as_str()) {
                return Some(value);
            }
        }
    }

    let stripped = strip_code_fences(text);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&stripped) {
        return Some(value);
    }

    for candidate in balanced_candidates(text) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last > first {
        match serde_json::from_str::<Value>(&text[first..=last]) {
            Ok(value) => return Some(value),
            Err(e) => tracing::debug!("First/last brace fallback failed: {}", e),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json() {
        let value = extract_json_object(r#"{"files": {"index.html": "<h1>Hi</h1>"}}"#).unwrap();
        assert_eq!(value["files"]["index.html"], "<h1>Hi</h1>");
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let text = r#"Sure! Here is the output:

```json
{"topics": ["LLMs", "Agents"]}
```

Let me know if you need anything else."#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["topics"][1], "Agents");
    }

    #[test]
    fn test_prefers_largest_balanced_region() {
        let text = r#"Output: {"files": {"a.css": "body { color: red; }"}} done"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["files"]["a.css"], "body { color: red; }");
    }

    #[test]
    fn test_skips_unparseable_regions() {
        let text = r#"{not json} and then {"ok": true}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_nothing_to_extract() {
        assert!(extract_json_object("").is_none());
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("{broken").is_none());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  plain text "), "plain text");
    }

    #[test]
    fn test_balanced_candidates_order() {
        let candidates = balanced_candidates("{a{b}c}{d}");
        assert_eq!(candidates, vec!["{a{b}c}", "{b}", "{d}"]);
    }
}
