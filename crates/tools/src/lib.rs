//! Built-in tools: the bridge between the tool registry and the sandbox.
//!
//! Each tool validates its JSON arguments, delegates to the sandbox (or, for
//! the messaging tools, just echoes), and returns the sandbox's uniform
//! `ToolResult` unchanged.

mod file;
mod message;
mod shell;

pub use file::{FileReadTool, FileWriteTool};
pub use message::{MessageAskUserTool, MessageNotifyUserTool, ASK_USER_TOOL};
pub use shell::{ShellExecTool, ShellViewTool};

use std::sync::Arc;

use stride_core::ToolRegistry;
use stride_sandbox::Sandbox;

/// Build a registry holding the full built-in tool set over one sandbox.
pub fn builtin_registry(sandbox: Arc<Sandbox>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ShellExecTool::new(sandbox.clone())));
    registry.register(Box::new(ShellViewTool::new(sandbox.clone())));
    registry.register(Box::new(FileWriteTool::new(sandbox.clone())));
    registry.register(Box::new(FileReadTool::new(sandbox)));
    registry.register(Box::new(MessageAskUserTool));
    registry.register(Box::new(MessageNotifyUserTool));
    registry
}

pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, stride_core::ToolError> {
    arguments[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            stride_core::ToolError::InvalidArguments(format!("missing required argument: {key}"))
        })
}
