//! Shell tools: run commands in named sandbox sessions and view their
//! output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use stride_core::{Tool, ToolError, ToolResult};
use stride_sandbox::Sandbox;

use crate::required_str;

/// Execute a shell command in a named session.
pub struct ShellExecTool {
    sandbox: Arc<Sandbox>,
}

impl ShellExecTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command in a named session. Sessions keep their \
         working directory and output history between calls."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Session id; a new session is created on first use"
                },
                "exec_dir": {
                    "type": "string",
                    "description": "Working directory for this command"
                },
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                }
            },
            "required": ["id", "command"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let id = required_str(&arguments, "id")?;
        let command = required_str(&arguments, "command")?;
        let exec_dir = arguments["exec_dir"].as_str().unwrap_or("");
        debug!(session = id, %command, "shell_exec invoked");
        Ok(self.sandbox.exec_command(id, exec_dir, command).await)
    }
}

/// View a session's console transcript or latest output.
pub struct ShellViewTool {
    sandbox: Arc<Sandbox>,
}

impl ShellViewTool {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ShellViewTool {
    fn name(&self) -> &str {
        "shell_view"
    }

    fn description(&self) -> &str {
        "View the output of a shell session: the rolling console transcript \
         or the latest command's output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Session id to inspect"
                },
                "console": {
                    "type": "boolean",
                    "description": "True for the full transcript, false for the latest output"
                }
            },
            "required": ["id"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let id = required_str(&arguments, "id")?;
        let console = arguments["console"].as_bool().unwrap_or(false);
        Ok(self.sandbox.view_shell(id, console).await)
    }
}
