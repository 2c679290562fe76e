// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::time::Duration;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::builtin::{require_str, timeout_secs_for};
use crate::policy::blocked_substring;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const OUTPUT_LIMIT_BYTES: usize = 20_000;
const HEAD_LINES: usize = 100;
const TAIL_LINES: usize = 100;

/// Runs an arbitrary shell command. Prefer `read_file`/`write_file`/
/// `edit_file`/`glob_files`/`grep_search` for file operations and search —
/// those tools produce structured, line-numbered output the model can act
/// on directly; `shell_exec` output is truncated to a head/tail window.
pub struct ShellExecTool {
    pub blocklist: Vec<String>,
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Run a shell command via `bash -c`. Output beyond 20KB is truncated to \
         the first and last 100 lines. Do not use this for reading, writing, \
         searching, or editing files — use the dedicated tools instead. \
         Commands matching a destructive-operation blocklist (recursive \
         deletion, privilege escalation, raw block-device writes, and similar) \
         are refused before execution."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "timeout_seconds": {"type": "integer", "description": "Seconds before the command is killed"}
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

        if let Some(pat) = blocked_substring(command, &self.blocklist) {
            return ToolOutput::err(
                call.id.clone(),
                format!("command matches blocklist pattern '{pat}' and was refused"),
            );
        }

        let timeout_secs = timeout_secs_for(&call.args, self.default_timeout_secs);

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command).stdin(Stdio::null()).kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let result = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

        match result {
            Err(_) => ToolOutput::err(
                call.id.clone(),
                format!("command timed out after {timeout_secs}s: {command}"),
            ),
            Ok(Err(e)) => ToolOutput::err(call.id.clone(), format!("failed to spawn command: {e}")),
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                if !output.stdout.is_empty() && !output.stderr.is_empty() {
                    text.push('\n');
                }
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                let text = head_tail_truncate(&text);

                match output.status.code() {
                    Some(0) => ToolOutput::ok(call.id.clone(), text),
                    Some(1) => ToolOutput::ok(call.id.clone(), format!("[exit 1]\n{text}")),
                    Some(code) => ToolOutput::err(call.id.clone(), format!("[exit {code}]\n{text}")),
                    None => ToolOutput::err(call.id.clone(), format!("command terminated by signal\n{text}")),
                }
            }
        }
    }
}

/// Keeps the first `HEAD_LINES` and last `TAIL_LINES` lines (or, for
/// pathologically long single lines, a byte window), noting how much was
/// omitted.
fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() > HEAD_LINES + TAIL_LINES {
        let head = &lines[..HEAD_LINES];
        let tail = &lines[lines.len() - TAIL_LINES..];
        let omitted = lines.len() - HEAD_LINES - TAIL_LINES;
        format!(
            "{}\n... [{omitted} lines omitted] ...\n{}",
            head.join("\n"),
            tail.join("\n")
        )
    } else {
        let omitted = s.len() - OUTPUT_LIMIT_BYTES;
        format!("{}\n... [{omitted} bytes omitted]", &s[..OUTPUT_LIMIT_BYTES])
    }
}
