// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::builtin::{require_str, timeout_secs_for};
use crate::policy::git_read_allowed;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Runs a read-only `git` subcommand. The leading token of `command` must
/// be on a fixed whitelist (status, log, diff, show, branch, remote,
/// ls-files, ls-tree, describe, rev-parse, rev-list, blame, shortlog,
/// reflog, tag, config); anything else is rejected with guidance to use
/// `git_write` instead.
pub struct GitReadTool {
    pub whitelist: Vec<String>,
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for GitReadTool {
    fn name(&self) -> &str {
        "git_read"
    }

    fn description(&self) -> &str {
        "Run a read-only git command (status, log, diff, show, branch, remote, \
         ls-files, ls-tree, describe, rev-parse, rev-list, blame, shortlog, \
         reflog, tag, config --get/--list). Anything that mutates repository \
         state must go through git_write instead."
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

        if !git_read_allowed(command, &self.whitelist) {
            return ToolOutput::err(
                call.id.clone(),
                format!(
                    "'{command}' is not in the git_read whitelist; use git_write for \
                     mutating or unrecognized git commands"
                ),
            );
        }

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
            Ok(Err(e)) => ToolOutput::err(call.id.clone(), format!("failed to exec git: {e}")),
        }
    }
}
