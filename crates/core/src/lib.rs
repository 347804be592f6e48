//! # Stride Core
//!
//! Domain types, traits, and error definitions for the Stride agent runtime.
//! This crate defines the domain model that all other crates implement
//! against: steps, events, tool calls, chat messages, and the seams to the
//! completion service and the tool dispatcher.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait here. Implementations live in their
//! respective crates, which keeps the dependency graph pointing inward and
//! makes every boundary mockable in tests.

pub mod completion;
pub mod error;
pub mod event;
pub mod message;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use completion::{AssistantReply, Choice, CompletionBackend, CompletionRequest, CompletionResponse};
pub use error::{ClientError, Error, Result, ToolError};
pub use event::{AgentEvent, FileRef, StepEventStatus, ToolPhase};
pub use message::{ChatMessage, Role};
pub use step::{Step, StepOutcome, StepStatus};
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolRegistry, ToolResult};
