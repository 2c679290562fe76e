// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const MAX_BYTES: usize = 20_000;

/// Reads a text file, or a 1-based line range of it, from the working
/// directory. Prefer this over `shell_exec cat` — it produces
/// line-numbered output the model can cite precisely in a later
/// `edit_file` call.
pub struct ReadFileTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file's contents. With no offset/limit, returns the whole \
         file with 1-based line-number prefixes (`L{n}:{line}`). With offset \
         and/or limit, returns only that line range. Output is capped at 20KB; \
         use offset/limit to page through larger files."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the working directory"},
                "offset": {"type": "integer", "description": "1-based first line to include"},
                "limit": {"type": "integer", "description": "Maximum number of lines to return"},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the read is aborted"}
            },
            "required": ["path"]
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match require_str(&call.args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return ToolOutput::err(call.id.clone(), e),
        };
        let offset = call.args.get("offset").and_then(|v| v.as_u64()).map(|n| n as usize);
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let task = tokio::task::spawn_blocking(move || read_and_format(&path, offset, limit));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("read_file timed out after {timeout_secs}s")),
            Ok(Err(join_err)) => ToolOutput::err(call.id.clone(), format!("internal error: {join_err}")),
            Ok(Ok(Err(e))) => ToolOutput::err(call.id.clone(), e),
            Ok(Ok(Ok(content))) => ToolOutput::ok(call.id.clone(), content),
        }
    }
}

fn read_and_format(path: &str, offset: Option<usize>, limit: Option<usize>) -> Result<String, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("file absent: {path} ({e})"))?;

    let lines: Vec<&str> = content.lines().collect();
    let numbered = if offset.is_some() || limit.is_some() {
        let start = offset.unwrap_or(1).max(1) - 1;
        let end = match limit {
            Some(n) => (start + n).min(lines.len()),
            None => lines.len(),
        };
        render_numbered(&lines, start, end)
    } else {
        render_numbered(&lines, 0, lines.len())
    };

    Ok(if numbered.len() > MAX_BYTES {
        format!(
            "{}\n... [byte limit reached, {} bytes omitted]",
            &numbered[..MAX_BYTES],
            numbered.len() - MAX_BYTES
        )
    } else {
        numbered
    })
}

fn render_numbered(lines: &[&str], start: usize, end: usize) -> String {
    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("L{}:{}", start + i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ReadFileTool {
        ReadFileTool { default_timeout_secs: 30 }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "read_file".into(), args }
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let out = tool().execute(&call(serde_json::json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required argument"));
    }

    #[tokio::test]
    async fn absent_file_is_an_error() {
        let out = tool()
            .execute(&call(serde_json::json!({"path": "/nonexistent/orc-test-file.txt"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("file absent"));
    }

    #[tokio::test]
    async fn whole_file_is_line_numbered_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "first\nsecond\nthird\n").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap()})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "L1:first\nL2:second\nL3:third");
    }

    #[tokio::test]
    async fn offset_and_limit_select_a_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour\nfive\n").unwrap();
        let out = tool()
            .execute(&call(serde_json::json!({"path": path.to_str().unwrap(), "offset": 2, "limit": 2})))
            .await;
        assert_eq!(out.content, "L2:two\nL3:three");
    }
}
