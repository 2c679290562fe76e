// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod edit_file;
mod git_read;
mod git_write;
mod glob_files;
mod grep_search;
mod read_file;
mod shell_exec;
mod write_file;

pub use edit_file::EditFileTool;
pub use git_read::GitReadTool;
pub use git_write::GitWriteTool;
pub use glob_files::GlobFilesTool;
pub use grep_search::GrepSearchTool;
pub use read_file::ReadFileTool;
pub use shell_exec::ShellExecTool;
pub use write_file::WriteFileTool;

/// Extract a required string argument, returning a descriptive error
/// message (not a panic) when it is missing or the wrong type.
pub(crate) fn require_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required argument: {key}"))
}

/// The per-call timeout in effect for this invocation: the caller-supplied
/// `timeout_seconds` argument if present, else the tool's configured
/// default (§C2: every tool invocation accepts this, not just shell_exec).
pub(crate) fn timeout_secs_for(args: &serde_json::Value, default_timeout_secs: u64) -> u64 {
    args.get("timeout_seconds").and_then(|v| v.as_u64()).unwrap_or(default_timeout_secs)
}
