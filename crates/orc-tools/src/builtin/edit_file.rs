// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Replaces an exact substring in a file with a new one. Unlike a
/// unified-diff/patch tool, the match is literal: `old_string` must appear
/// verbatim in the file (exactly once, unless `replace_all` is set).
pub struct EditFileTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace `old_string` with `new_string` in the file at `path`. By default \
         `old_string` must occur exactly once in the file; pass `replace_all: true` \
         to replace every occurrence. Include enough surrounding context in \
         `old_string` to make the match unambiguous."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "old_string": {"type": "string"},
                "new_string": {"type": "string"},
                "replace_all": {"type": "boolean", "default": false},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the edit is aborted"}
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match require_str(&call.args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return ToolOutput::err(call.id.clone(), e),
        };
        let old_string = match call.args.get("old_string").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return ToolOutput::err(call.id.clone(), "missing required argument: old_string"),
        };
        let new_string = call.args.get("new_string").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let replace_all = call.args.get("replace_all").and_then(|v| v.as_bool()).unwrap_or(false);
        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let task = tokio::task::spawn_blocking(move || apply_edit(&path, &old_string, &new_string, replace_all));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("edit_file timed out after {timeout_secs}s")),
            Ok(Err(join_err)) => ToolOutput::err(call.id.clone(), format!("internal error: {join_err}")),
            Ok(Ok(Err(e))) => ToolOutput::err(call.id.clone(), e),
            Ok(Ok(Ok(msg))) => ToolOutput::ok(call.id.clone(), msg),
        }
    }
}

fn apply_edit(path: &str, old_string: &str, new_string: &str, replace_all: bool) -> Result<String, String> {
    let original = std::fs::read_to_string(path).map_err(|e| format!("file absent: {path} ({e})"))?;

    let occurrences = original.matches(old_string).count();
    if occurrences == 0 {
        return Err(format!("string not found in {path}"));
    }
    if occurrences > 1 && !replace_all {
        return Err(format!(
            "string found {occurrences} times in {path}; pass replace_all: true \
             or narrow old_string to a unique occurrence"
        ));
    }

    let updated = if replace_all {
        original.replace(old_string, new_string)
    } else {
        original.replacen(old_string, new_string, 1)
    };

    std::fs::write(path, &updated).map_err(|e| format!("failed to write {path}: {e}"))?;

    Ok(format!("edited {path}:\n{}", diff_preview(&original, &updated)))
}

/// A short unified-diff-style preview of the change, for the agent's own
/// confirmation. Not parsed back in by anything; purely informational.
fn diff_preview(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        out.push(sign);
        out.push_str(change.as_str().unwrap_or(""));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> EditFileTool {
        EditFileTool { default_timeout_secs: 30 }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "edit_file".into(), args }
    }

    #[tokio::test]
    async fn replaces_unique_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.rs");
        std::fs::write(&path, "fn main() { println!(\"hi\"); }").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_string": "\"hi\"",
                "new_string": "\"bye\""
            })))
            .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fn main() { println!(\"bye\"); }");
    }

    #[tokio::test]
    async fn not_found_string_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "abc").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap(), "old_string": "zzz", "new_string": "y"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("string not found"));
    }

    #[tokio::test]
    async fn ambiguous_match_requires_replace_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "x x x").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap(), "old_string": "x", "new_string": "y"})))
            .await;
        assert!(out.is_error);

        let out = tool()
            .execute(&call(serde_json::json!({
                "path": path.to_str().unwrap(), "old_string": "x", "new_string": "y", "replace_all": true
            })))
            .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "y y y");
    }
}
