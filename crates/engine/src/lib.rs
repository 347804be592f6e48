//! Step execution for Stride: the turn loop, the step state machine, and
//! auto-execution of operations declared in terminal answers.
//!
//! The engine sits on top of the model client and the tool registry. A
//! caller hands it a [`stride_core::Step`] and gets back a channel of
//! [`stride_core::AgentEvent`]s; the step's final state rides in the last
//! step event on that channel.

mod auto_exec;
mod engine;
mod parser;
pub mod prompt;
mod runner;

pub use engine::{DEFAULT_MAX_TURNS, StepEngine, TaskContext};
pub use parser::{AnswerParser, LenientJsonParser};
