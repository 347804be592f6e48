//! Error types for the Stride domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The taxonomy mirrors
//! how failures actually propagate: transport problems are retried and only
//! surface after the retry budget is spent; tool and parse failures degrade
//! to best-effort results and never abort a step.

use thiserror::Error;

/// The top-level error type for all Stride operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model client errors ---
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the completion-service channel.
///
/// `Transport` and `EmptyResponse` are retried with exponential backoff;
/// `RetriesExhausted` is the single fatal path out of the core.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("completion response carried no choices")]
    EmptyResponse,

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ClientError {
    /// Whether another attempt may succeed. Everything the backend can
    /// return is retryable; only exhaustion itself is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ClientError::RetriesExhausted { .. })
    }
}

/// Failures of tool dispatch. Individual tool operations report failure
/// through `ToolResult { success: false, .. }` instead.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_displays_status() {
        let err = Error::Client(ClientError::Api {
            status_code: 503,
            message: "Service Unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn retries_exhausted_is_fatal() {
        let err = ClientError::RetriesExhausted {
            attempts: 4,
            last: "transport failure: connection reset".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("4 attempts"));
    }

    #[test]
    fn empty_response_is_retryable() {
        assert!(ClientError::EmptyResponse.is_retryable());
        assert!(ClientError::Transport("timeout".into()).is_retryable());
    }

    #[test]
    fn tool_error_displays_name() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "shell_exec".into(),
            reason: "spawn failed".into(),
        });
        assert!(err.to_string().contains("shell_exec"));
    }
}
