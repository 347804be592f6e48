//! File operations scoped to the sandbox root.
//!
//! Paths arrive in three shapes: under the advertised virtual home
//! (remapped onto the root), absolute (passed through), or relative
//! (joined under the root). Every operation reports failure as a
//! [`ToolResult`] value.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use stride_core::ToolResult;

use crate::{Sandbox, VIRTUAL_HOME};

/// Result cap for recursive filename searches.
const FIND_LIMIT: usize = 100;

impl Sandbox {
    /// Map a model-facing path onto the local filesystem.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix(VIRTUAL_HOME) {
            return self.root().join(rest.trim_start_matches('/'));
        }
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    /// Write or append text, optionally padding with a newline on either
    /// side. Parent directories are created as needed.
    pub async fn file_write(
        &self,
        path: &str,
        content: &str,
        append: bool,
        leading_newline: bool,
        trailing_newline: bool,
    ) -> ToolResult {
        let resolved = self.resolve_path(path);
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::fail(format!("failed to create parent directory: {e}"));
            }
        }

        let mut text = String::new();
        if leading_newline {
            text.push('\n');
        }
        text.push_str(content);
        if trailing_newline {
            text.push('\n');
        }

        let outcome = if append {
            let existing = tokio::fs::read_to_string(&resolved).await.unwrap_or_default();
            tokio::fs::write(&resolved, existing + &text).await
        } else {
            tokio::fs::write(&resolved, &text).await
        };

        match outcome {
            Ok(()) => {
                debug!(path = %resolved.display(), append, bytes = text.len(), "wrote file");
                ToolResult::ok(format!("File written: {path}"))
                    .with_data("path", serde_json::json!(path))
            }
            Err(e) => ToolResult::fail(format!("failed to write {path}: {e}")),
        }
    }

    /// Read a file, optionally sliced to a 0-based line range. `end_line`
    /// is exclusive; an out-of-range slice clamps instead of failing.
    pub async fn file_read(
        &self,
        path: &str,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> ToolResult {
        let resolved = self.resolve_path(path);
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return ToolResult::fail(format!("failed to read {path}: {e}")),
        };

        let lines: Vec<&str> = content.lines().collect();
        let line_count = lines.len();

        let content = if start_line.is_some() || end_line.is_some() {
            let start = start_line.unwrap_or(0).min(line_count);
            let end = end_line.unwrap_or(line_count).min(line_count).max(start);
            lines[start..end].join("\n")
        } else {
            content
        };

        ToolResult::ok("")
            .with_data("content", serde_json::json!(content))
            .with_data("line_count", serde_json::json!(line_count))
    }

    pub async fn file_exists(&self, path: &str) -> ToolResult {
        let exists = tokio::fs::try_exists(self.resolve_path(path))
            .await
            .unwrap_or(false);
        ToolResult::ok("").with_data("exists", serde_json::json!(exists))
    }

    /// Delete a file or a directory tree.
    pub async fn file_delete(&self, path: &str) -> ToolResult {
        let resolved = self.resolve_path(path);
        let meta = match tokio::fs::metadata(&resolved).await {
            Ok(meta) => meta,
            Err(e) => return ToolResult::fail(format!("failed to delete {path}: {e}")),
        };
        let outcome = if meta.is_dir() {
            tokio::fs::remove_dir_all(&resolved).await
        } else {
            tokio::fs::remove_file(&resolved).await
        };
        match outcome {
            Ok(()) => ToolResult::ok(format!("Deleted: {path}")),
            Err(e) => ToolResult::fail(format!("failed to delete {path}: {e}")),
        }
    }

    /// List a directory's immediate entries with their kind and size.
    pub async fn file_list(&self, path: &str) -> ToolResult {
        let resolved = self.resolve_path(path);
        let mut read_dir = match tokio::fs::read_dir(&resolved).await {
            Ok(read_dir) => read_dir,
            Err(e) => return ToolResult::fail(format!("failed to list {path}: {e}")),
        };

        let mut entries = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let meta = entry.metadata().await.ok();
                    let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
                    entries.push(serde_json::json!({
                        "name": name,
                        "type": if is_dir { "directory" } else { "file" },
                        "size": meta.map(|m| m.len()).unwrap_or(0),
                    }));
                }
                Ok(None) => break,
                Err(e) => return ToolResult::fail(format!("failed to list {path}: {e}")),
            }
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        ToolResult::ok("").with_data("entries", serde_json::Value::Array(entries))
    }

    /// Replace the first occurrence of `old_str` with `new_str`.
    pub async fn file_replace(&self, path: &str, old_str: &str, new_str: &str) -> ToolResult {
        let resolved = self.resolve_path(path);
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return ToolResult::fail(format!("failed to read {path}: {e}")),
        };

        if !content.contains(old_str) {
            return ToolResult::fail("String not found in file");
        }
        let updated = content.replacen(old_str, new_str, 1);
        match tokio::fs::write(&resolved, updated).await {
            Ok(()) => ToolResult::ok(format!("Replaced in {path}")),
            Err(e) => ToolResult::fail(format!("failed to write {path}: {e}")),
        }
    }

    /// Search one file's lines against a regex pattern.
    pub async fn file_search(&self, path: &str, pattern: &str) -> ToolResult {
        let regex = match regex::Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => return ToolResult::fail(format!("invalid pattern: {e}")),
        };
        let resolved = self.resolve_path(path);
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return ToolResult::fail(format!("failed to read {path}: {e}")),
        };

        let matches: Vec<serde_json::Value> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| regex.is_match(line))
            .map(|(i, line)| {
                serde_json::json!({ "line": i + 1, "content": line })
            })
            .collect();

        let count = matches.len();
        ToolResult::ok("")
            .with_data("matches", serde_json::Value::Array(matches))
            .with_data("count", serde_json::json!(count))
    }

    /// Find files under a directory whose names match a glob pattern. The
    /// returned list is capped at 100 entries; `count` reports every match.
    pub async fn file_find(&self, path: &str, pattern: &str) -> ToolResult {
        let base = self.resolve_path(path).display().to_string();
        let glob_pattern = format!("{}/**/{}", base.trim_end_matches('/'), pattern);
        let paths = match glob::glob(&glob_pattern) {
            Ok(paths) => paths,
            Err(e) => return ToolResult::fail(format!("invalid pattern: {e}")),
        };

        let matches: Vec<String> = paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| p.display().to_string())
            .collect();

        let count = matches.len();
        let files: Vec<String> = matches.into_iter().take(FIND_LIMIT).collect();
        ToolResult::ok("")
            .with_data("files", serde_json::json!(files))
            .with_data("count", serde_json::json!(count))
    }

    /// Place raw bytes at a path inside the sandbox.
    pub async fn file_upload(&self, bytes: &[u8], path: &str) -> ToolResult {
        let resolved = self.resolve_path(path);
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::fail(format!("failed to create parent directory: {e}"));
            }
        }
        match tokio::fs::write(&resolved, bytes).await {
            Ok(()) => ToolResult::ok(format!("Uploaded: {path}"))
                .with_data("path", serde_json::json!(path)),
            Err(e) => ToolResult::fail(format!("failed to upload {path}: {e}")),
        }
    }

    /// Fetch a file's bytes as base64.
    pub async fn file_download(&self, path: &str) -> ToolResult {
        let resolved = self.resolve_path(path);
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => ToolResult::ok("")
                .with_data("data", serde_json::json!(BASE64.encode(&bytes)))
                .with_data("size", serde_json::json!(bytes.len())),
            Err(e) => ToolResult::fail(format!("failed to read {path}: {e}")),
        }
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
    fn virtual_home_paths_remap_onto_root() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            sandbox.resolve_path("/home/ubuntu/project/main.py"),
            sandbox.root().join("project/main.py")
        );
        assert_eq!(sandbox.resolve_path("/home/ubuntu"), sandbox.root().join(""));
    }

    #[test]
    fn absolute_paths_pass_through() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            sandbox.resolve_path("/tmp/data.txt"),
            PathBuf::from("/tmp/data.txt")
        );
    }

    #[test]
    fn relative_paths_join_under_root() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            sandbox.resolve_path("notes.md"),
            sandbox.root().join("notes.md")
        );
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (_dir, sandbox) = sandbox();
        let write = sandbox
            .file_write("docs/a.txt", "hello", false, false, true)
            .await;
        assert!(write.success);

        let read = sandbox.file_read("docs/a.txt", None, None).await;
        assert!(read.success);
        assert_eq!(read.data["content"], serde_json::json!("hello\n"));
        assert_eq!(read.data["line_count"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn append_with_leading_newline() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.txt", "one", false, false, false).await;
        sandbox.file_write("a.txt", "two", true, true, false).await;

        let read = sandbox.file_read("a.txt", None, None).await;
        assert_eq!(read.data["content"], serde_json::json!("one\ntwo"));
    }

    #[tokio::test]
    async fn read_line_range_is_exclusive_and_clamped() {
        let (_dir, sandbox) = sandbox();
        sandbox
            .file_write("a.txt", "l0\nl1\nl2\nl3", false, false, false)
            .await;

        let slice = sandbox.file_read("a.txt", Some(1), Some(3)).await;
        assert_eq!(slice.data["content"], serde_json::json!("l1\nl2"));
        assert_eq!(slice.data["line_count"], serde_json::json!(4));

        let clamped = sandbox.file_read("a.txt", Some(2), Some(99)).await;
        assert_eq!(clamped.data["content"], serde_json::json!("l2\nl3"));
    }

    #[tokio::test]
    async fn read_missing_file_fails_gracefully() {
        let (_dir, sandbox) = sandbox();
        let read = sandbox.file_read("missing.txt", None, None).await;
        assert!(!read.success);
        assert!(read.message.contains("missing.txt"));
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.txt", "x", false, false, false).await;

        let exists = sandbox.file_exists("a.txt").await;
        assert_eq!(exists.data["exists"], serde_json::json!(true));

        assert!(sandbox.file_delete("a.txt").await.success);
        let exists = sandbox.file_exists("a.txt").await;
        assert_eq!(exists.data["exists"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn delete_removes_directory_tree() {
        let (_dir, sandbox) = sandbox();
        sandbox
            .file_write("tree/deep/a.txt", "x", false, false, false)
            .await;
        assert!(sandbox.file_delete("tree").await.success);
        let exists = sandbox.file_exists("tree/deep/a.txt").await;
        assert_eq!(exists.data["exists"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn list_reports_kinds_sorted() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("d/b.txt", "x", false, false, false).await;
        sandbox
            .file_write("d/sub/c.txt", "x", false, false, false)
            .await;

        let list = sandbox.file_list("d").await;
        let entries = list.data["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], serde_json::json!("b.txt"));
        assert_eq!(entries[0]["type"], serde_json::json!("file"));
        assert_eq!(entries[1]["name"], serde_json::json!("sub"));
        assert_eq!(entries[1]["type"], serde_json::json!("directory"));
    }

    #[tokio::test]
    async fn replace_first_occurrence_only() {
        let (_dir, sandbox) = sandbox();
        sandbox
            .file_write("a.txt", "foo bar foo", false, false, false)
            .await;

        assert!(sandbox.file_replace("a.txt", "foo", "baz").await.success);
        let read = sandbox.file_read("a.txt", None, None).await;
        assert_eq!(read.data["content"], serde_json::json!("baz bar foo"));
    }

    #[tokio::test]
    async fn replace_missing_string_fails() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.txt", "abc", false, false, false).await;
        let result = sandbox.file_replace("a.txt", "zzz", "x").await;
        assert!(!result.success);
        assert_eq!(result.message, "String not found in file");
    }

    #[tokio::test]
    async fn search_matches_lines_with_numbers() {
        let (_dir, sandbox) = sandbox();
        sandbox
            .file_write("a.txt", "alpha\nbeta\nalphabet", false, false, false)
            .await;

        let result = sandbox.file_search("a.txt", "^alpha").await;
        assert_eq!(result.data["count"], serde_json::json!(2));
        let matches = result.data["matches"].as_array().unwrap();
        assert_eq!(matches[0]["line"], serde_json::json!(1));
        assert_eq!(matches[1]["content"], serde_json::json!("alphabet"));
    }

    #[tokio::test]
    async fn search_rejects_bad_pattern() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.txt", "x", false, false, false).await;
        let result = sandbox.file_search("a.txt", "(unclosed").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn find_matches_recursively() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.rs", "x", false, false, false).await;
        sandbox
            .file_write("nested/b.rs", "x", false, false, false)
            .await;
        sandbox.file_write("c.txt", "x", false, false, false).await;

        let result = sandbox.file_find("/home/ubuntu", "*.rs").await;
        assert_eq!(result.data["count"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn find_scopes_to_the_given_path() {
        let (_dir, sandbox) = sandbox();
        sandbox.file_write("a.rs", "x", false, false, false).await;
        sandbox
            .file_write("nested/b.rs", "x", false, false, false)
            .await;

        let result = sandbox.file_find("nested", "*.rs").await;
        assert_eq!(result.data["count"], serde_json::json!(1));
        let files = result.data["files"].as_array().unwrap();
        assert!(files[0].as_str().unwrap().ends_with("b.rs"));
    }

    #[tokio::test]
    async fn find_count_is_not_capped_by_the_listing_limit() {
        let (_dir, sandbox) = sandbox();
        for i in 0..110 {
            sandbox
                .file_write(&format!("many/f{i:03}.log"), "x", false, false, false)
                .await;
        }

        let result = sandbox.file_find("many", "*.log").await;
        assert_eq!(result.data["count"], serde_json::json!(110));
        assert_eq!(
            result.data["files"].as_array().unwrap().len(),
            FIND_LIMIT
        );
    }

    #[tokio::test]
    async fn upload_then_download_round_trip() {
        let (_dir, sandbox) = sandbox();
        let bytes = vec![0u8, 159, 146, 150];
        assert!(sandbox.file_upload(&bytes, "blob.bin").await.success);

        let result = sandbox.file_download("blob.bin").await;
        assert!(result.success);
        let encoded = result.data["data"].as_str().unwrap();
        assert_eq!(BASE64.decode(encoded).unwrap(), bytes);
        assert_eq!(result.data["size"], serde_json::json!(4));
    }
}
