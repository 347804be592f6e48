//! The turn loop: model client in, tool dispatch out, events on a channel.
//!
//! One invocation drives turns until the model produces a plain (terminal)
//! reply, a client error surfaces, or the turn cap is hit. The loop always
//! closes with a `Done` event unless its consumer has gone away.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use stride_client::{ModelClient, ModelReply, ToolMode};
use stride_core::{AgentEvent, ChatMessage, ToolPhase, ToolRegistry, ToolResult};

/// Drive turns over the shared history until a terminal condition.
pub(crate) async fn run_turns(
    client: Arc<ModelClient>,
    registry: Arc<ToolRegistry>,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    tx: mpsc::Sender<AgentEvent>,
    max_turns: u32,
) {
    let descriptors = registry.descriptors();

    for turn in 0..max_turns {
        let messages = history.lock().await.clone();

        let reply = match client.ask(&messages, &descriptors, None, ToolMode::Auto).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(turn, %error, "model turn failed");
                let _ = tx.send(AgentEvent::Error {
                    error: error.to_string(),
                }).await;
                let _ = tx.send(AgentEvent::Done).await;
                return;
            }
        };

        let ModelReply { content, tool_call } = reply;

        let Some(call) = tool_call else {
            // A plain reply is the terminal answer.
            let text = content.unwrap_or_default();
            history.lock().await.push(ChatMessage::assistant(text.clone()));
            let _ = tx.send(AgentEvent::message(text)).await;
            let _ = tx.send(AgentEvent::Done).await;
            return;
        };

        debug!(turn, tool = %call.name, "dispatching tool call");

        let mut assistant = ChatMessage::assistant(content.unwrap_or_default());
        assistant.tool_calls = vec![call.clone()];
        history.lock().await.push(assistant);

        if tx
            .send(AgentEvent::Tool {
                name: call.name.clone(),
                status: ToolPhase::Calling,
                arguments: call.arguments.clone(),
            })
            .await
            .is_err()
        {
            return;
        }

        let result = match registry.dispatch(&call).await {
            Ok(result) => result,
            Err(error) => {
                warn!(tool = %call.name, %error, "tool dispatch failed");
                ToolResult::fail(error.to_string())
            }
        };

        let folded = serde_json::to_string(&result).unwrap_or_else(|_| result.message.clone());
        history
            .lock()
            .await
            .push(ChatMessage::tool_result(call.name.clone(), folded));

        if tx
            .send(AgentEvent::Tool {
                name: call.name,
                status: ToolPhase::Called,
                arguments: call.arguments,
            })
            .await
            .is_err()
        {
            return;
        }
    }

    warn!(max_turns, "turn limit reached without a terminal answer");
    let _ = tx.send(AgentEvent::Error {
        error: format!("turn limit of {max_turns} reached without a terminal answer"),
    }).await;
    let _ = tx.send(AgentEvent::Done).await;
}
