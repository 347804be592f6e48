//! User-messaging tools.
//!
//! Both are ordinary registry entries; the engine watches the dispatch
//! stream for `message_ask_user` and pauses the step at that point. The
//! tools themselves only acknowledge, so the turn loop can fold a result
//! back into history like any other call.

use async_trait::async_trait;

use stride_core::{Tool, ToolError, ToolResult};

use crate::required_str;

/// The tool name the engine treats as a suspension point.
pub const ASK_USER_TOOL: &str = "message_ask_user";

/// Ask the user a question and pause execution until they answer.
pub struct MessageAskUserTool;

#[async_trait]
impl Tool for MessageAskUserTool {
    fn name(&self) -> &str {
        ASK_USER_TOOL
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their reply. Use this when \
         input is required to continue."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Question to present to the user"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let text = required_str(&arguments, "text")?;
        Ok(ToolResult::ok("Waiting for user response")
            .with_data("text", serde_json::json!(text)))
    }
}

/// Send the user a progress note without pausing.
pub struct MessageNotifyUserTool;

#[async_trait]
impl Tool for MessageNotifyUserTool {
    fn name(&self) -> &str {
        "message_notify_user"
    }

    fn description(&self) -> &str {
        "Send the user a progress update. Does not wait for a reply."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Message to show the user"
                },
                "attachments": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "File paths to attach"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let text = required_str(&arguments, "text")?;
        Ok(ToolResult::ok("Message sent").with_data("text", serde_json::json!(text)))
    }
}
