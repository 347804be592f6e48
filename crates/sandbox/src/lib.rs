//! Sandboxed command and file execution for Stride.
//!
//! A [`Sandbox`] owns named shell sessions and a workspace root on the local
//! filesystem. Sessions are created lazily on first use and live until the
//! sandbox is torn down. Every operation returns a uniform
//! [`stride_core::ToolResult`]; failures are values, never panics or errors.
//!
//! Concurrency: each session serializes whole commands behind its own
//! lock, so two `exec_command` calls against the same session id run one
//! at a time. Process state lives behind a separate, briefly-held lock, so
//! `view_shell`, `wait_for_process`, `write_to_process` and `kill_process`
//! reach a live process mid-command instead of queueing behind it.
//! Different sessions run freely in parallel.

mod files;
mod session;

pub use session::ShellSession;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use stride_core::ToolResult;

/// The home-directory prefix the model is told to use. Paths under it are
/// remapped onto the sandbox root.
pub const VIRTUAL_HOME: &str = "/home/ubuntu";

/// Default hard wall-clock limit for one shell command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// An attached browser-automation resource. Automation itself lives
/// elsewhere; the sandbox only releases it on teardown.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    async fn close(&self);
}

/// Session-scoped command execution and file operations under one
/// workspace root.
pub struct Sandbox {
    id: String,
    root: PathBuf,
    created_at: chrono::DateTime<chrono::Utc>,
    command_timeout: Duration,
    sessions: Mutex<HashMap<String, Arc<ShellSession>>>,
    browser: Mutex<Option<Arc<dyn BrowserSurface>>>,
}

impl Sandbox {
    /// Create a sandbox over `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let hex = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("local-sandbox-{}", &hex[..8]);
        info!(%id, root = %root.display(), "sandbox created");
        Ok(Self {
            id,
            root,
            created_at: chrono::Utc::now(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
            browser: Mutex::new(None),
        })
    }

    /// Override the command timeout. Tests shrink this.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    /// Attach a browser-automation resource to release on teardown.
    pub async fn attach_browser(&self, browser: Arc<dyn BrowserSurface>) {
        *self.browser.lock().await = Some(browser);
    }

    async fn session(&self, session_id: &str) -> Arc<ShellSession> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(ShellSession::new(session_id, self.root.clone())))
            .clone()
    }

    async fn existing_session(&self, session_id: &str) -> Option<Arc<ShellSession>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Run a shell command on the named session, creating it if needed.
    ///
    /// Commands against one session id execute one at a time; the control
    /// operations below are not queued behind a running command.
    pub async fn exec_command(&self, session_id: &str, exec_dir: &str, command: &str) -> ToolResult {
        let session = self.session(session_id).await;
        let exec_dir = if exec_dir.is_empty() {
            None
        } else {
            Some(self.resolve_path(exec_dir))
        };
        session
            .exec_command(command, exec_dir, &self.root, self.command_timeout)
            .await
    }

    /// View a session's output: the rolling console transcript (last 100
    /// lines) or the latest single-invocation output (last 50 lines).
    ///
    /// An unknown session id yields an empty, not-running result.
    pub async fn view_shell(&self, session_id: &str, console: bool) -> ToolResult {
        let Some(session) = self.existing_session(session_id).await else {
            return ToolResult::ok("")
                .with_data("console", serde_json::json!([]))
                .with_data("running", serde_json::json!(false));
        };
        session.view(console).await
    }

    /// Wait up to `seconds` (default 30) for the session's tracked process.
    pub async fn wait_for_process(&self, session_id: &str, seconds: Option<u64>) -> ToolResult {
        let Some(session) = self.existing_session(session_id).await else {
            return ToolResult::ok("No process running");
        };
        session.wait(Duration::from_secs(seconds.unwrap_or(30))).await
    }

    /// Write to the session's tracked process over its input channel.
    pub async fn write_to_process(
        &self,
        session_id: &str,
        input_text: &str,
        press_enter: bool,
    ) -> ToolResult {
        let Some(session) = self.existing_session(session_id).await else {
            return ToolResult::fail("No running process to write to");
        };
        session.write_stdin(input_text, press_enter).await
    }

    /// Kill the session's tracked process, including one still mid-command.
    /// Tolerates a process that already exited.
    pub async fn kill_process(&self, session_id: &str) -> ToolResult {
        let Some(session) = self.existing_session(session_id).await else {
            return ToolResult::ok("Process killed");
        };
        session.kill().await
    }

    /// Tear down the sandbox: kill every tracked process best-effort, clear
    /// the session registry, and release any attached browser resource.
    pub async fn destroy(&self) -> bool {
        let mut sessions = self.sessions.lock().await;
        for (id, session) in sessions.drain() {
            if session.kill_quietly().await {
                warn!(session = %id, "killed process during teardown");
            }
        }
        drop(sessions);

        if let Some(browser) = self.browser.lock().await.take() {
            browser.close().await;
        }

        let uptime = (chrono::Utc::now() - self.created_at).num_seconds();
        info!(id = %self.id, uptime_secs = uptime, "sandbox destroyed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("ws")).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn sandbox_id_shape() {
        let (_dir, sandbox) = sandbox();
        assert!(sandbox.id().starts_with("local-sandbox-"));
        assert_eq!(sandbox.id().len(), "local-sandbox-".len() + 8);
        assert!(sandbox.root().exists());
    }

    #[tokio::test]
    async fn exec_creates_session_lazily() {
        let (_dir, sandbox) = sandbox();
        let result = sandbox.exec_command("build", "", "echo hello").await;
        assert!(result.success);
        assert_eq!(result.data["id"], serde_json::json!("build"));
        assert!(sandbox.existing_session("build").await.is_some());
        assert!(sandbox.existing_session("other").await.is_none());
    }

    #[tokio::test]
    async fn view_shell_unknown_session_is_benign() {
        let (_dir, sandbox) = sandbox();
        let result = sandbox.view_shell("ghost", true).await;
        assert!(result.success);
        assert_eq!(result.data["console"], serde_json::json!([]));
        assert_eq!(result.data["running"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn wait_without_session_is_benign() {
        let (_dir, sandbox) = sandbox();
        let result = sandbox.wait_for_process("ghost", Some(1)).await;
        assert!(result.success);
        assert_eq!(result.message, "No process running");
    }

    #[tokio::test]
    async fn write_without_process_fails_gracefully() {
        let (_dir, sandbox) = sandbox();
        let result = sandbox.write_to_process("ghost", "y", true).await;
        assert!(!result.success);
        assert!(result.message.contains("No running process"));
    }

    #[tokio::test]
    async fn kill_tolerates_exited_process() {
        let (_dir, sandbox) = sandbox();
        sandbox.exec_command("s", "", "true").await;
        let result = sandbox.kill_process("s").await;
        assert!(result.success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_execs_on_one_session_are_serialized() {
        let (_dir, sandbox) = sandbox();
        let sandbox = Arc::new(sandbox);

        let a = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec_command("s", "", "echo first").await })
        };
        let b = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec_command("s", "", "echo second").await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.success);
        assert!(b.success);
        // Whichever ran last owns the latest-invocation buffer in full.
        let view = sandbox.view_shell("s", false).await;
        let lines = view.data["console"].as_array().unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn view_observes_a_running_command() {
        let (_dir, sandbox) = sandbox();
        let sandbox = Arc::new(sandbox);

        let exec = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec_command("s", "", "sleep 30").await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        let view = sandbox.view_shell("s", true).await;
        assert_eq!(view.data["running"], serde_json::json!(true));

        sandbox.kill_process("s").await;
        let _ = tokio::time::timeout(Duration::from_secs(5), exec).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn kill_interrupts_a_running_command() {
        let (_dir, sandbox) = sandbox();
        let sandbox = Arc::new(sandbox);

        let exec = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.exec_command("s", "", "sleep 30").await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(sandbox.kill_process("s").await.success);

        let result = tokio::time::timeout(Duration::from_secs(5), exec)
            .await
            .expect("exec did not return after kill")
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.data["exit_code"], serde_json::json!(-1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_reaches_an_interactive_command() {
        let (_dir, sandbox) = sandbox();
        let sandbox = Arc::new(sandbox);

        let exec = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move {
                sandbox
                    .exec_command("s", "", "read line; echo got:$line")
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(sandbox.write_to_process("s", "ping", true).await.success);

        let result = tokio::time::timeout(Duration::from_secs(10), exec)
            .await
            .expect("exec did not return after input")
            .unwrap();
        assert!(result.success);
        assert!(result.data["output"].as_str().unwrap().contains("got:ping"));
    }

    #[tokio::test]
    async fn destroy_clears_sessions_and_browser() {
        struct FakeBrowser(std::sync::atomic::AtomicBool);

        #[async_trait]
        impl BrowserSurface for FakeBrowser {
            async fn close(&self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let (_dir, sandbox) = sandbox();
        let browser = Arc::new(FakeBrowser(std::sync::atomic::AtomicBool::new(false)));
        sandbox.attach_browser(browser.clone()).await;
        sandbox.exec_command("s", "", "true").await;

        assert!(sandbox.destroy().await);
        assert!(sandbox.existing_session("s").await.is_none());
        assert!(browser.0.load(std::sync::atomic::Ordering::SeqCst));
    }
}
