//! Model client for Stride.
//!
//! [`ModelClient`] wraps an opaque [`CompletionBackend`] with the retry
//! policy and the tool-call text protocol: outgoing messages are rewritten
//! so the model sees its tools, and incoming text is decoded back into at
//! most one synthesized tool call per turn.

pub mod client;
pub mod openai;

pub use client::{ModelClient, ModelReply, ToolMode};
pub use openai::OpenAiCompatBackend;
