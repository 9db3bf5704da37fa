//! Agent output sanitization, applied before any parsing.
//!
//! Strips model artifacts (thinking tags, unused tokens) and locates the
//! JSON payload inside a possibly chatty response.

use std::sync::LazyLock;

use regex::Regex;

/// Strip model-specific artifacts from raw agent output.
///
/// Handles:
/// 1. Thinking tags (`<unusedN>thought\n...`)
/// 2. Stray `<unusedN>` tokens from the tokenizer
/// 3. Leading/trailing whitespace from stripping
pub fn sanitize_agent_output(raw: &str) -> String {
    let mut text = raw.to_string();

    // 1. Strip thinking prefix: <unusedN>thought\n...
    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + 8..].to_string();
        }
    }

    // 2. Strip any remaining <unusedN> tokens
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));
    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();

    text.trim().to_string()
}

/// Extract the JSON object from an agent response.
///
/// Prefers a ```json fenced block; falls back to the outermost braces when
/// the model skipped the fence.
pub fn extract_json_block(text: &str) -> Option<String> {
    if let Some(fence_start) = text.find("```json") {
        let rest = &text[fence_start + 7..];
        if let Some(fence_end) = rest.find("```") {
            let block = rest[..fence_end].trim();
            if !block.is_empty() {
                return Some(block.to_string());
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(text[start..=end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thinking_tags() {
        let raw = "<unused94>thought\nLet me check the note...\n{\"resection_extent\": \"GTR\"}";
        let result = sanitize_agent_output(raw);
        assert!(result.starts_with("Let me check"));
        assert!(!result.contains("<unused"));
    }

    #[test]
    fn strips_unused_tokens() {
        let raw = "Some text <unused12> and more <unused0> end.";
        assert_eq!(sanitize_agent_output(raw), "Some text  and more  end.");
    }

    #[test]
    fn clean_text_unchanged() {
        let text = "{\"conclusion\": \"Stable disease.\"}";
        assert_eq!(sanitize_agent_output(text), text);
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize_agent_output(""), "");
        assert_eq!(sanitize_agent_output("   "), "");
    }

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n{\"resection_extent\": \"GTR\"}\n```\nDone.";
        assert_eq!(
            extract_json_block(text).as_deref(),
            Some("{\"resection_extent\": \"GTR\"}")
        );
    }

    #[test]
    fn falls_back_to_bare_braces() {
        let text = "The answer is {\"stop_date\": \"2024-04-19\"} as requested.";
        assert_eq!(
            extract_json_block(text).as_deref(),
            Some("{\"stop_date\": \"2024-04-19\"}")
        );
    }

    #[test]
    fn no_json_returns_none() {
        assert_eq!(extract_json_block("no structured content here"), None);
        assert_eq!(extract_json_block(""), None);
    }

    #[test]
    fn empty_fence_falls_back() {
        let text = "```json\n\n``` {\"a\": 1}";
        assert_eq!(extract_json_block(text).as_deref(), Some("{\"a\": 1}"));
    }
}
