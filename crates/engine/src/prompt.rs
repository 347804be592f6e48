//! Prompt templates for step execution and summarization.

/// Ground rules for the execution loop, installed as the system message of
/// every step conversation.
pub const EXECUTION_SYSTEM: &str = "\
You are an autonomous agent executing one step of a larger task inside a \
sandboxed workspace. Your home directory is /home/ubuntu.

Work incrementally with the available tools. Issue at most one tool call \
per turn and wait for its result before the next one. Prefer shell commands \
and file operations over describing what you would do.

When the step is finished, reply with a single JSON object and nothing else:
{\"success\": true or false, \"result\": \"what was accomplished\", \
\"attachments\": [\"paths of files produced\"]}
You may include \"file_operations\": [{\"action\": \"write\" or \"append\", \
\"path\": ..., \"content\": ...}] and \"shell_commands\": [{\"command\": ..., \
\"exec_dir\": ...}] to be applied alongside the answer.

If you need information only the user can provide, call message_ask_user \
and stop.";

/// Fixed closing prompt issued over the accumulated history.
pub const SUMMARIZE: &str = "\
The task is now complete. Summarize for the user what was accomplished, as \
a single JSON object and nothing else:
{\"message\": \"summary for the user\", \"attachments\": [\"paths of files \
worth showing\"]}";

/// Render the per-step prompt.
pub fn step_prompt(
    description: &str,
    user_message: &str,
    attachments: &[String],
    working_language: &str,
) -> String {
    let mut prompt = format!("Current step: {description}\n");
    if !user_message.is_empty() {
        prompt.push_str(&format!("\nUser message: {user_message}\n"));
    }
    if !attachments.is_empty() {
        prompt.push_str("\nFiles from earlier steps:\n");
        for path in attachments {
            prompt.push_str(&format!("- {path}\n"));
        }
    }
    prompt.push_str(&format!("\nWork in {working_language}.\n"));
    prompt.push_str("\nExecute this step now.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_prompt_includes_all_parts() {
        let prompt = step_prompt(
            "collect benchmarks",
            "focus on the parser",
            &["/home/ubuntu/notes.md".into()],
            "English",
        );
        assert!(prompt.contains("collect benchmarks"));
        assert!(prompt.contains("focus on the parser"));
        assert!(prompt.contains("- /home/ubuntu/notes.md"));
        assert!(prompt.contains("Work in English."));
    }

    #[test]
    fn step_prompt_omits_empty_sections() {
        let prompt = step_prompt("build", "", &[], "English");
        assert!(!prompt.contains("User message"));
        assert!(!prompt.contains("Files from earlier steps"));
    }

    #[test]
    fn system_prompt_states_single_call_rule() {
        assert!(EXECUTION_SYSTEM.contains("one tool call per turn"));
        assert!(EXECUTION_SYSTEM.contains("message_ask_user"));
    }
}
