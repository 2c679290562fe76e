// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::builtin::{require_str, timeout_secs_for};
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Runs any `git` subcommand, including ones that mutate repository state
/// (commit, push, reset, branch -d, etc). Permanently forbidden to the
/// Worker; the Instructor is the only agent that may ever hold this tool.
///
/// Commit only when explicitly asked. Never force-push or `reset --hard`
/// without an explicit request. Never skip hooks (`--no-verify`) without
/// explicit permission. Prefer staging specific files over `-A`.
pub struct GitWriteTool {
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for GitWriteTool {
    fn name(&self) -> &str {
        "git_write"
    }

    fn description(&self) -> &str {
        "Run any git command, including ones that mutate repository state \
         (commit, push, reset, branch management). Commit only when explicitly \
         asked to. Never force-push or reset --hard without an explicit request. \
         Never bypass commit hooks without explicit permission. Stage specific \
         files rather than `git add -A` unless told otherwise."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "git subcommand and args, without the leading 'git'"},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the command is aborted"}
            },
            "required": ["command"]
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match require_str(&call.args, "command") {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(call.id.clone(), e),
        };

        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);
        let args: Vec<&str> = command.split_whitespace().collect();
        let run = Command::new("git").args(&args).output();
        match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
            Err(_) => ToolOutput::err(call.id.clone(), format!("git {command} timed out after {timeout_secs}s")),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                if output.status.success() {
                    ToolOutput::ok(call.id.clone(), stdout)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    ToolOutput::err(call.id.clone(), format!("git {command} failed: {stderr}"))
                }
            }
            Ok(Err(e)) => ToolOutput::err(call.id.clone(), format!("exec failure: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> GitWriteTool {
        GitWriteTool { default_timeout_secs: 30 }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "git_write".into(), args }
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let out = tool().execute(&call(serde_json::json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn exec_failure_is_reported() {
        let out = tool().execute(&call(serde_json::json!({"command": "this-is-not-a-git-subcommand"}))).await;
        assert!(out.is_error);
    }
}
