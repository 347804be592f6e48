//! File tools over the sandbox's path-resolved filesystem surface.

use std::sync::Arc;

use async_trait::async_trait;

use stride_core::{Tool, ToolError, ToolResult};
use stride_sandbox::Sandbox;

use crate::required_str;

/// Write or append text to a file inside the sandbox.
pub struct FileWriteTool {
    sandbox: Arc<Sandbox>,
}

impl FileWriteTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories as needed. Can \
         append instead of overwrite."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Target file path"
                },
                "content": {
                    "type": "string",
                    "description": "Text to write"
                },
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwrite"
                },
                "leading_newline": {
                    "type": "boolean",
                    "description": "Prefix the content with a newline"
                },
                "trailing_newline": {
                    "type": "boolean",
                    "description": "Suffix the content with a newline"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = arguments["content"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments("missing required argument: content".into())
        })?;
        let append = arguments["append"].as_bool().unwrap_or(false);
        let leading = arguments["leading_newline"].as_bool().unwrap_or(false);
        let trailing = arguments["trailing_newline"].as_bool().unwrap_or(false);
        Ok(self
            .sandbox
            .file_write(path, content, append, leading, trailing)
            .await)
    }
}

/// Read a file from the sandbox, optionally sliced to a line range.
pub struct FileReadTool {
    sandbox: Arc<Sandbox>,
}

impl FileReadTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a text file, optionally restricted to a line range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path to read"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to include (0-based)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Line to stop before (exclusive)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let start = arguments["start_line"].as_u64().map(|n| n as usize);
        let end = arguments["end_line"].as_u64().map(|n| n as usize);
        Ok(self.sandbox.file_read(path, start, end).await)
    }
}
