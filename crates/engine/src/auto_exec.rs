//! Auto-execution of file and shell operations declared in a terminal
//! answer.
//!
//! Runs only when a sandbox capability is attached. Operations are applied
//! in list order; each entry succeeds or fails on its own and the batch
//! never aborts. The returned strings are diagnostics, not part of the
//! step result.

use tracing::{debug, warn};

use stride_sandbox::Sandbox;

/// Apply any `file_operations` / `shell_commands` arrays in `answer`.
pub(crate) async fn auto_execute_operations(
    sandbox: &Sandbox,
    answer: &serde_json::Value,
) -> Vec<String> {
    let mut outcomes = Vec::new();

    if let Some(operations) = answer["file_operations"].as_array() {
        for entry in operations {
            let path = entry["path"].as_str().unwrap_or("");
            let content = entry["content"].as_str().unwrap_or("");
            if path.is_empty() || content.is_empty() {
                continue;
            }
            let append = entry["action"].as_str() == Some("append");

            let result = sandbox.file_write(path, content, append, false, true).await;
            let action = if append { "append" } else { "write" };
            if result.success {
                outcomes.push(format!("{action} {path}: ok"));
            } else {
                warn!(%path, message = %result.message, "declared file operation failed");
                outcomes.push(format!("{action} {path}: {}", result.message));
            }
        }
    }

    if let Some(commands) = answer["shell_commands"].as_array() {
        for entry in commands {
            let command = entry["command"].as_str().unwrap_or("");
            if command.is_empty() {
                continue;
            }
            let exec_dir = entry["exec_dir"].as_str().unwrap_or("");

            let hex = uuid::Uuid::new_v4().simple().to_string();
            let session_id = format!("auto-{}", &hex[..8]);

            let result = sandbox.exec_command(&session_id, exec_dir, command).await;
            if result.success {
                outcomes.push(format!("{command}: {}", result.message));
            } else {
                warn!(%command, message = %result.message, "declared shell command failed");
                outcomes.push(format!("{command}: {}", result.message));
            }
        }
    }

    debug!(count = outcomes.len(), "auto-execution finished");
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("ws")).unwrap();
        (dir, sandbox)
    }

    #[tokio::test]
    async fn empty_entries_are_skipped_silently() {
        let (_dir, sandbox) = sandbox();
        let answer = serde_json::json!({
            "file_operations": [
                {"action": "write", "path": "a.txt", "content": ""},
                {"action": "write", "path": "b.txt", "content": "kept"},
            ]
        });

        let outcomes = auto_execute_operations(&sandbox, &answer).await;

        // Only the valid entry is reported; the empty one is not a failure.
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].contains("b.txt"));
        let read = sandbox.file_read("b.txt", None, None).await;
        assert_eq!(read.data["content"], serde_json::json!("kept\n"));
        let exists = sandbox.file_exists("a.txt").await;
        assert_eq!(exists.data["exists"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn append_action_appends() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("log.txt", "one\n", false, false, false).await;

        let answer = serde_json::json!({
            "file_operations": [
                {"action": "append", "path": "log.txt", "content": "two"},
            ]
        });
        auto_execute_operations(&sandbox, &answer).await;

        let read = sandbox.file_read("log.txt", None, None).await;
        assert_eq!(read.data["content"], serde_json::json!("one\ntwo\n"));
    }

    #[tokio::test]
    async fn shell_commands_run_under_home_remap() {
        let (_dir, sandbox) = sandbox();
        let answer = serde_json::json!({
            "shell_commands": [
                {"command": "echo hi > marker.txt", "exec_dir": "/home/ubuntu"},
            ]
        });

        let outcomes = auto_execute_operations(&sandbox, &answer).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].contains("Exit code: 0"));
        let exists = sandbox.file_exists("marker.txt").await;
        assert_eq!(exists.data["exists"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn failing_command_is_recorded_not_raised() {
        let (_dir, sandbox) = sandbox();
        let answer = serde_json::json!({
            "shell_commands": [
                {"command": "exit 7", "exec_dir": ""},
                {"command": "echo after", "exec_dir": ""},
            ]
        });

        let outcomes = auto_execute_operations(&sandbox, &answer).await;

        // Both ran; the failure did not abort the batch.
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].contains("Exit code: 7"));
        assert!(outcomes[1].contains("Exit code: 0"));
    }

    #[tokio::test]
    async fn absent_keys_are_a_no_op() {
        let (_dir, sandbox) = sandbox();
        let answer = serde_json::json!({"success": true, "result": "done"});
        assert!(auto_execute_operations(&sandbox, &answer).await.is_empty());
    }
}
