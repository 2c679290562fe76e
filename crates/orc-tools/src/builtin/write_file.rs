// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Writes a file's entire contents, creating parent directories and
/// overwriting any existing file at `path`.
pub struct WriteFileTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write `content` to `path`, overwriting any existing file. Creates parent \
         directories as needed. Use `edit_file` instead when only part of an \
         existing file needs to change."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the write is aborted"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match require_str(&call.args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return ToolOutput::err(call.id.clone(), e),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(call.id.clone(), "missing required argument: content"),
        };
        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let task = tokio::task::spawn_blocking(move || write_file(&path, &content));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("write_file timed out after {timeout_secs}s")),
            Ok(Err(join_err)) => ToolOutput::err(call.id.clone(), format!("internal error: {join_err}")),
            Ok(Ok(Err(e))) => ToolOutput::err(call.id.clone(), e),
            Ok(Ok(Ok(msg))) => ToolOutput::ok(call.id.clone(), msg),
        }
    }
}

fn write_file(path: &str, content: &str) -> Result<String, String> {
    let path_ref = std::path::Path::new(path);
    if let Some(parent) = path_ref.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| format!("failed to create parent directories: {e}"))?;
        }
    }
    std::fs::write(path_ref, content).map_err(|e| format!("failed to write {path}: {e}"))?;
    Ok(format!("wrote {} bytes to {path}", content.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> WriteFileTool {
        WriteFileTool { default_timeout_secs: 30 }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "write_file".into(), args }
    }

    #[tokio::test]
    async fn writes_content_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap(), "content": "hello world"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let out = tool().execute(&call(serde_json::json!({"path": "x"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.txt");
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap(), "content": "x"})))
            .await;
        assert!(!out.is_error);
        assert!(path.exists());
    }
}
