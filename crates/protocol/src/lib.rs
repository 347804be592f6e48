//! Tool-call text protocol.
//!
//! Turns an unstructured text-completion interface into a reliable
//! single-call-per-turn tool-calling channel:
//!
//! - [`encode`] folds tool availability into the message history: an
//!   instruction block describing the fenced `tool_call` syntax, the
//!   one-call-per-turn rule, and a rendered list of the available tools.
//! - [`decode`] extracts at most one tool call back out of free-form model
//!   text, trying a fixed priority chain of strategies and stripping the
//!   matched block from the visible text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use stride_core::{ChatMessage, Role, ToolDescriptor};

/// The reserved fenced-block tag for tool calls.
pub const TOOL_CALL_TAG: &str = "tool_call";

/// Accepted name prefixes for the unfenced last-resort extraction strategy.
/// Ordinary prose containing braces must not be mistaken for a call, so a
/// bare JSON object is only accepted when its `name` looks like one of ours.
const NAME_PREFIX_ALLOWLIST: &[&str] = &["shell_", "file_", "browser_", "info_search", "message_"];

static FENCED_TAGGED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```tool_call\s*\n?(.*?)\n?```").expect("static regex")
});

static FENCED_JSON_TAGGED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*tool_call\s*\n?(.*?)\n?```").expect("static regex")
});

static FENCED_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_]*\s*\n?(\{.*?\})\s*\n?```").expect("static regex")
});

/// A tool call decoded out of model text.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub name: String,
    pub arguments: serde_json::Value,

    /// The visible text with the matched block stripped; `None` when nothing
    /// remains.
    pub remaining: Option<String>,
}

/// Render the instruction block and tool list, and rewrite the history so a
/// plain text-completion service can carry tool traffic.
///
/// The instruction block is appended to the first system message, or
/// inserted as a new leading system message when there is none. Tool-result
/// messages are rewritten into plain user messages labeled with the
/// originating tool, and prior assistant tool calls are re-rendered as
/// fenced blocks so the model sees its own history in the same syntax.
pub fn encode(tools: &[ToolDescriptor], messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let instructions = instruction_block(tools);

    let mut rewritten = Vec::with_capacity(messages.len() + 1);
    let mut system_augmented = false;

    for message in messages {
        match message.role {
            Role::System if !system_augmented => {
                rewritten.push(ChatMessage::system(format!(
                    "{}\n\n{}",
                    message.content, instructions
                )));
                system_augmented = true;
            }
            Role::Tool => {
                let tool_name = message.tool_name.as_deref().unwrap_or("unknown");
                rewritten.push(ChatMessage::user(format!(
                    "[Tool result for {tool_name}]:\n{}\n\nBased on this result, continue with \
                     the next step. If you need another tool, use the tool_call format. If the \
                     task is complete, provide your final answer.",
                    message.content
                )));
            }
            _ => {
                let mut content = message.content.clone();
                if let Some(call) = message.tool_calls.first() {
                    content.push_str(&format!(
                        "\n```{TOOL_CALL_TAG}\n{{\"name\": {}, \"arguments\": {}}}\n```",
                        serde_json::Value::String(call.name.clone()),
                        call.arguments
                    ));
                }
                let mut copy = message.clone();
                copy.content = content;
                copy.tool_calls = Vec::new();
                copy.tool_name = None;
                rewritten.push(copy);
            }
        }
    }

    if !system_augmented {
        rewritten.insert(0, ChatMessage::system(instructions));
    }

    rewritten
}

/// Extract a single tool call from model text, if any.
///
/// Strategies are tried in fixed priority order; the first structurally
/// valid match wins:
///
/// 1. a fenced block tagged `tool_call`
/// 2. a fenced block tagged `json tool_call`
/// 3. any fenced block whose body parses as JSON with `name`/`arguments`
/// 4. the substring between the first `{` and last `}` of the whole text,
///    accepted only when the parsed `name` begins with an allow-listed
///    prefix
pub fn decode(text: &str) -> Option<DecodedCall> {
    for pattern in [&*FENCED_TAGGED, &*FENCED_JSON_TAGGED, &*FENCED_ANY] {
        for captures in pattern.captures_iter(text) {
            let whole = captures.get(0)?;
            let body = captures.get(1)?.as_str().trim();
            if let Some((name, arguments)) = parse_call_object(body) {
                debug!(tool = %name, "decoded fenced tool call");
                return Some(DecodedCall {
                    name,
                    arguments,
                    remaining: strip_span(text, whole.start(), whole.end()),
                });
            }
        }
    }

    // Last resort: a bare JSON object somewhere in the prose.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    let candidate = &text[start..=end];
    let (name, arguments) = parse_call_object(candidate)?;
    if !NAME_PREFIX_ALLOWLIST.iter().any(|p| name.starts_with(p)) {
        return None;
    }
    debug!(tool = %name, "decoded unfenced tool call");
    Some(DecodedCall {
        name,
        arguments,
        remaining: strip_span(text, start, end + 1),
    })
}

/// Parse a candidate JSON object carrying `name` and `arguments`.
fn parse_call_object(candidate: &str) -> Option<(String, serde_json::Value)> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    let arguments = object.get("arguments")?.clone();
    Some((name, arguments))
}

/// Remove `[start, end)` from `text`; `None` when nothing visible remains.
fn strip_span(text: &str, start: usize, end: usize) -> Option<String> {
    let remaining = format!("{}{}", &text[..start], &text[end..]);
    let trimmed = remaining.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The fixed instruction block appended to the system prompt.
fn instruction_block(tools: &[ToolDescriptor]) -> String {
    format!(
        "You have access to the following tools. To use a tool, respond with EXACTLY this \
         format:\n\n```{TOOL_CALL_TAG}\n{{\"name\": \"<tool_name>\", \"arguments\": \
         {{<arguments_object>}}}}\n```\n\nIMPORTANT RULES:\n- Call exactly ONE tool per turn, \
         then wait for its result before issuing another.\n- Use tools to actually perform \
         actions; do not merely describe what you would do.\n- After receiving a tool result, \
         you may call another tool or provide your final answer.\n- To respond to the user \
         without calling a tool, just write your response normally without the \
         {TOOL_CALL_TAG} block.\n\nAvailable tools:\n{}",
        render_tools(tools)
    )
}

/// Render the tool list: name, description, and each parameter with its
/// type and required flag.
fn render_tools(tools: &[ToolDescriptor]) -> String {
    let mut out = String::new();
    for tool in tools {
        out.push_str(&format!("### {}\n", tool.name));
        out.push_str(&format!("Description: {}\n", tool.description));

        let properties = tool.parameters["properties"].as_object();
        let required: Vec<&str> = tool.parameters["required"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        if let Some(properties) = properties
            && !properties.is_empty()
        {
            out.push_str("Parameters:\n");
            for (name, info) in properties {
                let kind = info["type"].as_str().unwrap_or("string");
                let description = info["description"].as_str().unwrap_or("");
                let marker = if required.contains(&name.as_str()) {
                    "(required)"
                } else {
                    "(optional)"
                };
                out.push_str(&format!("    - {name}: {kind} - {description} {marker}\n"));
            }
        }
        out.push('\n');
    }
    out
}
