// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for the root binary's Display Sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormatArg {
    /// `[instructor]`/`[worker]` prefixed streamed text on stdout.
    #[default]
    Conversation,
    /// Line-delimited JSON: one `{"type":"text"|"status", ...}` object per event.
    Json,
    /// One line per turn: only the final text each speaker produced.
    Compact,
}

#[derive(Parser, Debug)]
#[command(
    name = "orc",
    about = "Dual-agent LLM orchestrator: an Instructor plans and reviews, a Worker executes",
    version,
    long_about = None,
)]
pub struct Cli {
    /// Optional initial instruction; if present, the first turn runs as if
    /// this had been typed at the prompt.
    #[arg(value_name = "INSTRUCTION")]
    pub instruction: Option<String>,

    /// Working directory; all tool invocations resolve paths relative to it.
    /// Defaults to the current directory. Must exist.
    #[arg(long, value_name = "PATH")]
    pub work_dir: Option<PathBuf>,

    /// Initial round budget (number of Worker turns). Default: unbounded.
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u64>,

    /// Model for the Instructor.
    #[arg(long, value_name = "ID")]
    pub instructor_model: Option<String>,

    /// Default model for the Worker (may be overridden per turn by the
    /// Instructor's `Tell worker (use <model>):` directive).
    #[arg(long, value_name = "ID")]
    pub worker_model: Option<String>,

    /// Disable the provider's "thinking" capability for the Instructor.
    #[arg(long)]
    pub no_thinking: bool,

    /// Resume the most recent session whose work_dir matches.
    #[arg(long)]
    pub r#continue: bool,

    /// Resume a specific session (or the latest overall if no id is given).
    #[arg(long, value_name = "SESSION_ID", num_args = 0..=1, default_missing_value = "")]
    pub resume: Option<String>,

    /// Replace the provider with a deterministic mock; no network calls are made.
    #[arg(long)]
    pub debug: bool,

    /// Path to config file (overrides auto-discovery at ~/.config/orc/config.toml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format for streamed text and status lines.
    #[arg(long, value_enum, default_value = "conversation")]
    pub output_format: OutputFormatArg,
}
