// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// A tool_use request as it arrives from an Agent Driver: the content block
/// that opened it, flattened to the fields the executor needs.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone)]
pub enum ToolOutputPart {
    Text(String),
    Image(String),
}

/// The result of one tool invocation. Always produced — a tool never
/// panics or propagates an error to the agent loop; failures are encoded
/// via `is_error`.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub parts: Vec<ToolOutputPart>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            call_id: call_id.into(),
            parts: vec![ToolOutputPart::Text(content.clone())],
            content,
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            call_id: call_id.into(),
            parts: vec![ToolOutputPart::Text(content.clone())],
            content,
            is_error: true,
        }
    }
}

/// Hints the Display/history-truncation layer how to shrink a large tool
/// output without destroying the part a reader would look for first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Long running-command output: keep the head and tail, note what was
    /// dropped in between (e.g. `shell_exec`).
    HeadTail,
    /// A list of matches where the count itself matters more than any one
    /// entry (e.g. `glob_files`, `grep_search`).
    MatchList,
    /// File contents, where line-numbered windows matter (e.g. `read_file`).
    FileContent,
    /// No special shape assumed.
    #[default]
    Generic,
}

/// One executable tool. Implementors provide a JSON schema describing their
/// input and an async `execute`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}
