//! The step execution engine.
//!
//! `execute_step` runs one step of task work to a terminal status and
//! publishes progress as a stream of [`AgentEvent`]s. The engine consumes
//! the raw turn-loop events and applies the step state machine on top:
//! `Pending → Running → {Completed | Failed}`, with `Completed` forced if
//! the underlying stream runs out without a terminal event.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use stride_client::ModelClient;
use stride_core::{
    AgentEvent, ChatMessage, FileRef, Step, StepEventStatus, StepOutcome, StepStatus, ToolPhase,
    ToolRegistry,
};
use stride_sandbox::Sandbox;
use stride_tools::ASK_USER_TOOL;

use crate::auto_exec::auto_execute_operations;
use crate::parser::{AnswerParser, LenientJsonParser};
use crate::prompt;

/// Turn cap guarding against a loop that never produces a terminal answer.
pub const DEFAULT_MAX_TURNS: u32 = 30;

const EVENT_BUFFER: usize = 32;

/// Shared conversation state for one task across steps.
///
/// Cloning is shallow: clones share the same history, so a later
/// `summarize` sees everything earlier steps said.
#[derive(Clone)]
pub struct TaskContext {
    history: Arc<Mutex<Vec<ChatMessage>>>,
    working_language: String,
}

impl TaskContext {
    pub fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(vec![ChatMessage::system(
                prompt::EXECUTION_SYSTEM,
            )])),
            working_language: "English".to_string(),
        }
    }

    /// Language hint rendered into every step prompt.
    pub fn with_working_language(mut self, language: impl Into<String>) -> Self {
        self.working_language = language.into();
        self
    }

    pub fn working_language(&self) -> &str {
        &self.working_language
    }

    /// Snapshot of the accumulated history.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives steps to completion over a model client and a tool registry,
/// optionally backed by a sandbox for auto-execution.
pub struct StepEngine {
    client: Arc<ModelClient>,
    registry: Arc<ToolRegistry>,
    sandbox: Option<Arc<Sandbox>>,
    parser: Arc<dyn AnswerParser>,
    max_turns: u32,
}

impl StepEngine {
    pub fn new(client: ModelClient, registry: ToolRegistry) -> Self {
        Self {
            client: Arc::new(client),
            registry: Arc::new(registry),
            sandbox: None,
            parser: Arc::new(LenientJsonParser),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Attach the sandbox capability. Without it, declared file and shell
    /// operations in terminal answers are ignored.
    pub fn with_sandbox(mut self, sandbox: Arc<Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Swap the lenient answer parser.
    pub fn with_parser(mut self, parser: Arc<dyn AnswerParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Execute one step. Returns the event stream; the step's final state
    /// travels in the terminal step event.
    ///
    /// The stream is restartable only by re-invocation. If the model calls
    /// the ask-user tool, the stream ends with a single `Wait` event and
    /// the caller is expected to come back with a fresh step.
    pub fn execute_step(
        &self,
        ctx: &TaskContext,
        mut step: Step,
        user_message: &str,
    ) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (loop_tx, mut loop_rx) = mpsc::channel(EVENT_BUFFER);

        let step_prompt = prompt::step_prompt(
            &step.description,
            user_message,
            &step.attachments,
            &ctx.working_language,
        );
        let history = ctx.history.clone();
        let client = self.client.clone();
        let registry = self.registry.clone();
        let sandbox = self.sandbox.clone();
        let parser = self.parser.clone();
        let max_turns = self.max_turns;

        tokio::spawn(async move {
            history.lock().await.push(ChatMessage::user(step_prompt));

            step.status = StepStatus::Running;
            info!(description = %step.description, "step started");
            if tx
                .send(AgentEvent::Step {
                    status: StepEventStatus::Started,
                    step: step.clone(),
                })
                .await
                .is_err()
            {
                return;
            }

            let runner = tokio::spawn(crate::runner::run_turns(
                client, registry, history, loop_tx, max_turns,
            ));

            while let Some(event) = loop_rx.recv().await {
                match event {
                    AgentEvent::Error { error } => {
                        if !step.status.is_terminal() {
                            step.status = StepStatus::Failed;
                            step.error = Some(error);
                            if tx
                                .send(AgentEvent::Step {
                                    status: StepEventStatus::Failed,
                                    step: step.clone(),
                                })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        } else if tx.send(AgentEvent::Error { error }).await.is_err() {
                            break;
                        }
                    }

                    AgentEvent::Message { text, .. } => {
                        let answer = wrap_answer(parser.as_ref(), &text);

                        if let Some(sandbox) = &sandbox {
                            let outcomes = auto_execute_operations(sandbox, &answer).await;
                            if !outcomes.is_empty() {
                                debug!(outcomes = ?outcomes, "applied declared operations");
                            }
                        }

                        step.apply_outcome(materialize(&answer, &text));
                        if !step.status.is_terminal() {
                            step.status = StepStatus::Completed;
                        }
                        info!(success = step.success, "step reached terminal answer");

                        if tx
                            .send(AgentEvent::Step {
                                status: terminal_event_status(step.status),
                                step: step.clone(),
                            })
                            .await
                            .is_err()
                        {
                            break;
                        }
                        if !step.result.is_empty()
                            && tx
                                .send(AgentEvent::message(step.result.clone()))
                                .await
                                .is_err()
                        {
                            break;
                        }
                    }

                    AgentEvent::Tool {
                        name,
                        status,
                        arguments,
                    } if name == ASK_USER_TOOL => match status {
                        ToolPhase::Calling => {
                            let text = arguments["text"].as_str().unwrap_or_default();
                            if tx.send(AgentEvent::message(text)).await.is_err() {
                                break;
                            }
                        }
                        ToolPhase::Called => {
                            // The engine's only suspension point: stop the
                            // loop and end the stream after a single Wait.
                            runner.abort();
                            let _ = tx.send(AgentEvent::Wait).await;
                            return;
                        }
                    },

                    other => {
                        if tx.send(other).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Stream exhausted: force a terminal status.
            if !step.status.is_terminal() {
                step.status = StepStatus::Completed;
                let _ = tx
                    .send(AgentEvent::Step {
                        status: StepEventStatus::Completed,
                        step: step.clone(),
                    })
                    .await;
            }
        });

        rx
    }

    /// Close out the task: one fixed prompt over the accumulated history,
    /// answered as `{message, attachments}` and emitted as a single
    /// message event.
    pub fn summarize(&self, ctx: &TaskContext) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let history = ctx.history.clone();
        let client = self.client.clone();
        let parser = self.parser.clone();

        tokio::spawn(async move {
            let messages = {
                let mut history = history.lock().await;
                history.push(ChatMessage::user(prompt::SUMMARIZE));
                history.clone()
            };

            let reply = match client
                .ask(&messages, &[], None, stride_client::ToolMode::None)
                .await
            {
                Ok(reply) => reply,
                Err(error) => {
                    let _ = tx.send(AgentEvent::Error {
                        error: error.to_string(),
                    }).await;
                    return;
                }
            };

            let text = reply.content.unwrap_or_default();
            history.lock().await.push(ChatMessage::assistant(text.clone()));

            let (message, attachments) = match parser.parse(&text) {
                Some(value) if value.is_object() => {
                    let message = value["message"].as_str().unwrap_or(&text).to_string();
                    let attachments = value["attachments"]
                        .as_array()
                        .map(|paths| {
                            paths
                                .iter()
                                .filter_map(|p| p.as_str().map(FileRef::new))
                                .collect()
                        })
                        .unwrap_or_default();
                    (message, attachments)
                }
                _ => (text, Vec::new()),
            };

            let _ = tx.send(AgentEvent::Message {
                text: message,
                attachments,
            }).await;
        });

        rx
    }
}

/// Event tag for a step that has just folded in a terminal answer. A step
/// that already failed keeps reporting as failed; the answer only fills in
/// its result fields.
fn terminal_event_status(status: StepStatus) -> StepEventStatus {
    if status == StepStatus::Failed {
        StepEventStatus::Failed
    } else {
        StepEventStatus::Completed
    }
}

/// Three-tier fallback from raw model text to a JSON answer object.
fn wrap_answer(parser: &dyn AnswerParser, text: &str) -> serde_json::Value {
    match parser.parse(text) {
        Some(serde_json::Value::Object(object)) => serde_json::Value::Object(object),
        Some(serde_json::Value::String(s)) => serde_json::json!({
            "success": true, "result": s, "attachments": []
        }),
        Some(other) => serde_json::json!({
            "success": true, "result": other.to_string(), "attachments": []
        }),
        None => serde_json::json!({
            "success": true, "result": text, "attachments": []
        }),
    }
}

/// Materialize the answer object into the step schema, degrading to direct
/// key extraction when it does not fit.
fn materialize(answer: &serde_json::Value, raw: &str) -> StepOutcome {
    match serde_json::from_value::<StepOutcome>(answer.clone()) {
        Ok(outcome) => outcome,
        Err(_) => StepOutcome {
            success: true,
            result: answer["result"].as_str().unwrap_or(raw).to_string(),
            attachments: answer["attachments"]
                .as_array()
                .map(|paths| {
                    paths
                        .iter()
                        .filter_map(|p| p.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        },
    }
}
