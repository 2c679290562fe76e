// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;

use serde::{Deserialize, Serialize};

/// Strategy used when an Instructor history crosses the compaction threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStrategy {
    /// Summarize via one tool-free call to the model, replace history with
    /// the summary plus a session-log marker entry.
    Summarize,
    /// Drop the oldest messages without a model call. Used when even the
    /// summarization prompt itself would overflow the context.
    Emergency,
}

impl Default for CompactionStrategy {
    fn default() -> Self {
        CompactionStrategy::Summarize
    }
}

impl fmt::Display for CompactionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompactionStrategy::Summarize => write!(f, "summarize"),
            CompactionStrategy::Emergency => write!(f, "emergency"),
        }
    }
}

/// Tunables for the Agent Driver's inner loop and the Orchestrator's
/// round/compaction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard bound on inner-loop iterations per call (spec: fixed at 50).
    pub max_tool_iterations: u32,
    /// Fraction of `context_window_tokens` at which Instructor-history
    /// compaction is triggered.
    pub compaction_threshold: f32,
    /// Number of most-recent messages kept verbatim when compacting.
    pub compaction_keep_recent: usize,
    pub compaction_strategy: CompactionStrategy,
    /// Approximate context window used for the `ceil(chars/4)` budget check.
    pub context_window_tokens: usize,
    /// `thinking` token budget requested from providers that support it.
    /// Previously hard-coded in the source this spec was distilled from;
    /// exposed here as a configurable knob per the resolved Open Question.
    pub thinking_budget_tokens: u32,
    /// Worker inactivity timeout, in seconds, before the watchdog aborts.
    pub worker_inactivity_timeout_secs: u64,
    /// Maximum consecutive malformed-directive correction attempts.
    pub max_correction_attempts: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 50,
            compaction_threshold: 0.8,
            compaction_keep_recent: 4,
            compaction_strategy: CompactionStrategy::default(),
            context_window_tokens: 200_000,
            thinking_budget_tokens: 10_000,
            worker_inactivity_timeout_secs: 60,
            max_correction_attempts: 3,
        }
    }
}

/// Tool-executor policy: per-call timeout default and the shell_exec
/// blocklist / git_read whitelist pattern lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub default_timeout_secs: u64,
    /// Substrings that cause `shell_exec` to refuse a command outright.
    pub shell_blocklist: Vec<String>,
    /// Command-head tokens `git_read` is permitted to run.
    pub git_read_whitelist: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            shell_blocklist: vec![
                "rm -rf /".into(),
                "rm -rf /*".into(),
                "rm -rf ~".into(),
                "dd if=".into(),
                "dd of=/dev/".into(),
                "mkfs".into(),
                ":(){ :|:& };:".into(),
                "chmod -R 777 /".into(),
                "sudo ".into(),
                "> /dev/sd".into(),
            ],
            git_read_whitelist: vec![
                "status".into(),
                "log".into(),
                "diff".into(),
                "show".into(),
                "branch".into(),
                "remote".into(),
                "ls-files".into(),
                "ls-tree".into(),
                "describe".into(),
                "rev-parse".into(),
                "rev-list".into(),
                "blame".into(),
                "shortlog".into(),
                "reflog".into(),
                "tag".into(),
                "config".into(), // git_read_allowed further restricts this to --get/--get-all/--list/-l
            ],
        }
    }
}

/// Top-level configuration, merged from a TOML file (if present) and then
/// overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub instructor_model: String,
    pub worker_model: String,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instructor_model: "sonnet".into(),
            worker_model: "sonnet".into(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}
