//! Agent events: the closed tagged union produced by step execution.
//!
//! Callers of the engine consume these over a channel; every variant and its
//! fields are part of the external contract. The union is closed on purpose:
//! consumers pattern-match exhaustively instead of inspecting runtime types.

use serde::{Deserialize, Serialize};

use crate::step::Step;

/// A reference to a file produced during a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Lifecycle sub-state carried by a step event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEventStatus {
    Started,
    Completed,
    Failed,
}

/// Whether a tool call is about to run or has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Calling,
    Called,
}

/// Events emitted while a step executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Step lifecycle transition, carrying the step's current state.
    Step { status: StepEventStatus, step: Step },

    /// Text for the user, with any file references attached.
    Message {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<FileRef>,
    },

    /// A tool invocation, before and after it runs.
    Tool {
        name: String,
        status: ToolPhase,
        arguments: serde_json::Value,
    },

    /// Something went wrong mid-stream.
    Error { error: String },

    /// Execution is suspended pending external human input.
    Wait,

    /// The underlying turn loop finished.
    Done,
}

impl AgentEvent {
    /// Shorthand for a plain text message event.
    pub fn message(text: impl Into<String>) -> Self {
        AgentEvent::Message {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_event_serialization() {
        let event = AgentEvent::Step {
            status: StepEventStatus::Started,
            step: Step::new("demo"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"step""#));
        assert!(json.contains(r#""status":"started""#));
    }

    #[test]
    fn tool_event_serialization() {
        let event = AgentEvent::Tool {
            name: "shell_exec".into(),
            status: ToolPhase::Calling,
            arguments: serde_json::json!({"command": "ls"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool""#));
        assert!(json.contains(r#""status":"calling""#));
    }

    #[test]
    fn wait_and_done_are_bare() {
        assert_eq!(
            serde_json::to_string(&AgentEvent::Wait).unwrap(),
            r#"{"type":"wait"}"#
        );
        assert_eq!(
            serde_json::to_string(&AgentEvent::Done).unwrap(),
            r#"{"type":"done"}"#
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"message","text":"hi"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Message { text, attachments } => {
                assert_eq!(text, "hi");
                assert!(attachments.is_empty());
            }
            _ => panic!("wrong variant"),
        }
    }
}
