//! Lenient extraction of a JSON value from model text.
//!
//! The engine never trusts the model to emit clean JSON. The parser seam
//! lets an external extraction service stand in; the default implementation
//! tries the whole text, then any fenced code block, then the window
//! between the first `{` and the last `}`.

use tracing::debug;

/// Extracts a JSON value from free-form text. Returning `None` is normal;
/// the engine wraps unparseable text rather than failing the step.
pub trait AnswerParser: Send + Sync {
    fn parse(&self, text: &str) -> Option<serde_json::Value>;
}

/// Default best-effort parser.
pub struct LenientJsonParser;

impl AnswerParser for LenientJsonParser {
    fn parse(&self, text: &str) -> Option<serde_json::Value> {
        let trimmed = text.trim();

        if let Ok(value) = serde_json::from_str(trimmed) {
            return Some(value);
        }

        if let Some(inner) = fenced_body(trimmed)
            && let Ok(value) = serde_json::from_str(inner)
        {
            debug!("answer recovered from fenced block");
            return Some(value);
        }

        let window = brace_window(trimmed)?;
        match serde_json::from_str(window) {
            Ok(value) => {
                debug!("answer recovered from brace window");
                Some(value)
            }
            Err(_) => None,
        }
    }
}

/// The body of the first fenced code block, tag line stripped.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_tag = text[open + 3..].find('\n')? + open + 4;
    let close = text[after_tag..].find("```")? + after_tag;
    Some(text[after_tag..close].trim())
}

/// The substring between the first `{` and the last `}`.
fn brace_window(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<serde_json::Value> {
        LenientJsonParser.parse(text)
    }

    #[test]
    fn clean_object_parses_directly() {
        let value = parse(r#"{"success": true, "result": "done"}"#).unwrap();
        assert_eq!(value["success"], serde_json::json!(true));
    }

    #[test]
    fn non_object_json_still_parses() {
        assert_eq!(parse("42").unwrap(), serde_json::json!(42));
        assert_eq!(parse(r#""just text""#).unwrap(), serde_json::json!("just text"));
    }

    #[test]
    fn fenced_json_block_is_recovered() {
        let text = "Here is the answer:\n```json\n{\"success\": true, \"result\": \"ok\"}\n```";
        let value = parse(text).unwrap();
        assert_eq!(value["result"], serde_json::json!("ok"));
    }

    #[test]
    fn brace_window_is_recovered() {
        let text = "I finished. {\"success\": true, \"result\": \"built\"} Hope that helps.";
        let value = parse(text).unwrap();
        assert_eq!(value["result"], serde_json::json!("built"));
    }

    #[test]
    fn prose_returns_none() {
        assert!(parse("I could not find anything relevant.").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn unbalanced_braces_return_none() {
        assert!(parse("set {x} to {y").is_none());
    }
}
