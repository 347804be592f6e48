//! A named shell session: one working directory, at most one tracked
//! process, and bounded output history.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use stride_core::ToolResult;

/// Rolling console transcript cap, in lines.
const CONSOLE_LIMIT: usize = 500;

/// Lines returned by a console view.
const CONSOLE_VIEW: usize = 100;

/// Lines returned by a latest-output view.
const OUTPUT_VIEW: usize = 50;

/// Interval between exit-status checks on a tracked process.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// A stateful command-execution context.
///
/// Two locks with distinct jobs: `exec_lock` serializes whole commands, so
/// a session runs one at a time, while `state` guards the process handle
/// and output buffers and is only ever held briefly. View, wait, write and
/// kill go through `state` alone, so they reach a process mid-command
/// instead of queueing behind it.
pub struct ShellSession {
    id: String,
    exec_dir: PathBuf,
    exec_lock: Mutex<()>,
    state: Mutex<SessionState>,
}

/// Mutable session state shared between a running command and the
/// control operations.
///
/// Starting a new command implicitly supersedes any previously tracked
/// process handle; there is never more than one.
struct SessionState {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output_lines: Vec<String>,
    console_lines: Vec<String>,
    running: bool,
}

impl SessionState {
    /// Replace the latest-invocation buffer and grow the bounded transcript.
    fn record_output(&mut self, output: &str) {
        self.output_lines = output.lines().map(String::from).collect();
        self.console_lines.extend(self.output_lines.iter().cloned());
        if self.console_lines.len() > CONSOLE_LIMIT {
            let excess = self.console_lines.len() - CONSOLE_LIMIT;
            self.console_lines.drain(..excess);
        }
    }
}

impl ShellSession {
    pub fn new(id: impl Into<String>, exec_dir: PathBuf) -> Self {
        Self {
            id: id.into(),
            exec_dir,
            exec_lock: Mutex::new(()),
            state: Mutex::new(SessionState {
                child: None,
                stdin: None,
                output_lines: Vec::new(),
                console_lines: Vec::new(),
                running: false,
            }),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Run `command` through a shell and wait for it, up to `timeout`.
    ///
    /// Output (stdout and stderr combined) replaces the latest-invocation
    /// buffer wholesale and is appended to the rolling console transcript,
    /// trimmed to its cap. On timeout the process is force-killed and a
    /// failed result with exit code -1 is returned.
    pub async fn exec_command(
        &self,
        command: &str,
        exec_dir: Option<PathBuf>,
        home: &Path,
        timeout: Duration,
    ) -> ToolResult {
        let _turn = self.exec_lock.lock().await;

        let workdir = exec_dir.unwrap_or_else(|| self.exec_dir.clone());
        if let Err(e) = tokio::fs::create_dir_all(&workdir).await {
            return self.failure(format!("failed to create working directory: {e}"));
        }

        debug!(session = %self.id, %command, workdir = %workdir.display(), "executing command");

        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&workdir)
            .env("HOME", home)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return self.failure(format!("failed to spawn command: {e}")),
        };

        let stdin = child.stdin.take();
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        // Register the handle before blocking on the pipes so the control
        // operations can see and signal the process while it runs.
        {
            let mut state = self.state.lock().await;
            state.stdin = stdin;
            state.child = Some(child);
            state.running = true;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        // Drain both pipes concurrently; reading them one after the other
        // can deadlock when the process fills the other pipe's buffer.
        let drain = async {
            let drain_out = async {
                if let Some(stdout) = stdout.as_mut() {
                    stdout.read_to_end(&mut out_buf).await?;
                }
                std::io::Result::Ok(())
            };
            let drain_err = async {
                if let Some(stderr) = stderr.as_mut() {
                    stderr.read_to_end(&mut err_buf).await?;
                }
                std::io::Result::Ok(())
            };
            tokio::try_join!(drain_out, drain_err)?;
            std::io::Result::Ok(())
        };

        match tokio::time::timeout_at(deadline, drain).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.state.lock().await.running = false;
                return self.failure(format!("command I/O failed: {e}"));
            }
            Err(_) => return self.timed_out(timeout).await,
        }

        // Pipes closed; poll for the exit status until the deadline. The
        // state lock is dropped between checks so control operations keep
        // getting through.
        let status = loop {
            {
                let mut state = self.state.lock().await;
                let Some(child) = state.child.as_mut() else {
                    state.running = false;
                    drop(state);
                    return self.failure("process handle lost".to_string());
                };
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {}
                    Err(e) => {
                        state.running = false;
                        drop(state);
                        return self.failure(format!("command I/O failed: {e}"));
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return self.timed_out(timeout).await;
            }
            tokio::time::sleep(WAIT_POLL).await;
        };

        let mut output = String::from_utf8_lossy(&out_buf).into_owned();
        output.push_str(&String::from_utf8_lossy(&err_buf));

        {
            let mut state = self.state.lock().await;
            state.record_output(&output);
            state.running = false;
        }

        let exit_code = status.code().unwrap_or(-1);
        ToolResult {
            success: status.success(),
            message: format!("Exit code: {exit_code}"),
            data: serde_json::Map::new(),
        }
        .with_data("output", serde_json::json!(output))
        .with_data("exit_code", serde_json::json!(exit_code))
        .with_data("id", serde_json::json!(self.id))
    }

    /// The console transcript tail or the latest-output tail. Works while
    /// a command is running; `running` reflects the live process.
    pub async fn view(&self, console: bool) -> ToolResult {
        let state = self.state.lock().await;
        let lines = if console {
            tail(&state.console_lines, CONSOLE_VIEW)
        } else {
            tail(&state.output_lines, OUTPUT_VIEW)
        };
        ToolResult::ok("")
            .with_data("console", serde_json::json!(lines))
            .with_data("running", serde_json::json!(state.running))
    }

    /// Wait up to `timeout` for the tracked process; elapsing is not an
    /// error, the result just reports it still running.
    pub async fn wait(&self, timeout: Duration) -> ToolResult {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock().await;
                let Some(child) = state.child.as_mut() else {
                    return ToolResult::ok("No process running");
                };
                match child.try_wait() {
                    Ok(Some(_)) | Err(_) => {
                        state.running = false;
                        return ToolResult::ok("")
                            .with_data("running", serde_json::json!(false));
                    }
                    Ok(None) => {}
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return ToolResult::ok("").with_data("running", serde_json::json!(true));
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Write to the tracked process's input channel; fails gracefully when
    /// there is no open channel.
    pub async fn write_stdin(&self, input_text: &str, press_enter: bool) -> ToolResult {
        let mut state = self.state.lock().await;
        let Some(stdin) = state.stdin.as_mut() else {
            return ToolResult::fail("No running process to write to");
        };
        let mut text = input_text.to_string();
        if press_enter {
            text.push('\n');
        }
        match stdin.write_all(text.as_bytes()).await {
            Ok(()) => match stdin.flush().await {
                Ok(()) => ToolResult::ok(""),
                Err(e) => ToolResult::fail(format!("failed to flush process input: {e}")),
            },
            Err(e) => ToolResult::fail(format!("failed to write to process: {e}")),
        }
    }

    /// Kill the tracked process. A process that already exited is fine.
    pub async fn kill(&self) -> ToolResult {
        self.kill_quietly().await;
        ToolResult::ok("Process killed")
    }

    /// Best-effort kill; returns whether a process was still tracked.
    pub async fn kill_quietly(&self) -> bool {
        let mut state = self.state.lock().await;
        state.running = false;
        match state.child.as_mut() {
            Some(child) => {
                // start_kill errors when the process already exited.
                let _ = child.start_kill();
                true
            }
            None => false,
        }
    }

    async fn timed_out(&self, timeout: Duration) -> ToolResult {
        warn!(session = %self.id, timeout_secs = timeout.as_secs(), "command timed out");
        let mut state = self.state.lock().await;
        if let Some(child) = state.child.as_mut()
            && let Err(e) = child.start_kill()
        {
            warn!(session = %self.id, error = %e, "failed to kill timed-out process");
        }
        state.running = false;
        ToolResult::fail(format!(
            "Command timed out after {} seconds",
            timeout.as_secs()
        ))
        .with_data("output", serde_json::json!("Command timed out"))
        .with_data("exit_code", serde_json::json!(-1))
        .with_data("id", serde_json::json!(self.id))
    }

    fn failure(&self, message: String) -> ToolResult {
        ToolResult::fail(message.clone())
            .with_data("output", serde_json::json!(message))
            .with_data("exit_code", serde_json::json!(-1))
            .with_data("id", serde_json::json!(self.id))
    }
}

fn tail(lines: &[String], count: usize) -> &[String] {
    let start = lines.len().saturating_sub(count);
    &lines[start..]
}
