// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod policy;
mod registry;
mod tool;

pub use registry::{AgentRole, ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

use std::collections::HashSet;
use std::sync::Arc;

use orc_config::ToolsConfig;

/// Names of the tools reachable at all, for partitioning purposes.
const INSTRUCTOR_ONLY: &[&str] = &["git_write", "grant", "revoke", "compact_worker_context"];
const WORKER_DEFAULT: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "glob_files",
    "grep_search",
    "git_read",
    "shell_exec",
];

/// Build the standard registry wired with all eight built-in tools,
/// partitioned by role: the Instructor gets everything including
/// `git_write`/`grant`/`revoke`; the Worker's default allow-set excludes
/// `git_write` (permanently forbidden) and starts without `grant`/`revoke`
/// (those are Instructor-only meta-tools, never grantable).
pub fn build_default_registry(tools_config: &ToolsConfig) -> ToolRegistry {
    let builtins: Vec<Arc<dyn Tool>> = vec![
        Arc::new(builtin::ReadFileTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::WriteFileTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::EditFileTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::GlobFilesTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::GrepSearchTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::GitReadTool {
            whitelist: tools_config.git_read_whitelist.clone(),
            default_timeout_secs: tools_config.default_timeout_secs,
        }),
        Arc::new(builtin::GitWriteTool { default_timeout_secs: tools_config.default_timeout_secs }),
        Arc::new(builtin::ShellExecTool {
            blocklist: tools_config.shell_blocklist.clone(),
            default_timeout_secs: tools_config.default_timeout_secs,
        }),
    ];

    let worker_default: HashSet<String> = WORKER_DEFAULT.iter().map(|s| s.to_string()).collect();
    let mut instructor_available: HashSet<String> = worker_default.clone();
    instructor_available.extend(INSTRUCTOR_ONLY.iter().map(|s| s.to_string()));
    let permanently_forbidden: HashSet<String> = ["git_write"].iter().map(|s| s.to_string()).collect();

    ToolRegistry::new(builtins, instructor_available, worker_default, permanently_forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_partitions_git_write_away_from_worker() {
        let reg = build_default_registry(&ToolsConfig::default());
        assert!(!reg.allow_set(AgentRole::Worker).contains("git_write"));
        assert!(reg.allow_set(AgentRole::Instructor).contains("git_write"));
    }

    #[test]
    fn grant_cannot_add_git_write_to_worker() {
        let reg = build_default_registry(&ToolsConfig::default());
        let out = reg.grant("git_write", "trust me");
        assert!(out.is_error);
        assert!(!reg.allow_set(AgentRole::Worker).contains("git_write"));
    }
}
