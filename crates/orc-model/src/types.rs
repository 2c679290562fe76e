// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message role. Only `user` and `assistant` exist: tool results ride
/// inside a user-role message's content blocks rather than a dedicated
/// `tool` role, matching the two-role data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block within a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, ContentBlock::Text { text } if text.trim().is_empty())
    }

    /// `ceil(chars/4)` token approximation over this block's textual payload.
    pub fn approx_tokens(&self) -> usize {
        let chars = match self {
            ContentBlock::Text { text } => text.chars().count(),
            ContentBlock::Thinking { thinking } => thinking.chars().count(),
            ContentBlock::ToolUse { input, .. } => input.to_string().chars().count(),
            ContentBlock::ToolResult { content, .. } => content.chars().count(),
        };
        (chars + 3) / 4
    }
}

/// Either a single opaque string or an ordered list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Build the user-role message carrying tool_results for one assistant
    /// turn, in the same order the corresponding tool_use blocks appeared.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        debug_assert!(results
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. })));
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results),
        }
    }

    /// Concatenation of all `text` blocks (or the whole string, if content
    /// is the plain-string form).
    pub fn as_text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| matches!(b, ContentBlock::ToolUse { .. }))
                .collect(),
            MessageContent::Text(_) => Vec::new(),
        }
    }

    pub fn approx_tokens(&self) -> usize {
        match &self.content {
            MessageContent::Text(s) => (s.chars().count() + 3) / 4,
            MessageContent::Blocks(blocks) => blocks.iter().map(ContentBlock::approx_tokens).sum(),
        }
    }

    /// Sanitize an assistant message before it enters history (spec
    /// invariant 2): drop whitespace-only text blocks, default a missing
    /// tool_use `input` to `{}` (structurally impossible here since
    /// `ToolUse::input` is always a `Value`, but an explicit `Value::Null`
    /// is normalized to an empty object), and reject the message outright
    /// (return `None`) if zero content blocks remain.
    pub fn sanitize(mut self) -> Option<Self> {
        match &mut self.content {
            MessageContent::Text(s) => {
                if s.trim().is_empty() {
                    None
                } else {
                    Some(self)
                }
            }
            MessageContent::Blocks(blocks) => {
                let mut kept = Vec::with_capacity(blocks.len());
                for mut b in std::mem::take(blocks) {
                    if b.is_blank_text() {
                        continue;
                    }
                    if let ContentBlock::ToolUse { input, .. } = &mut b {
                        if input.is_null() {
                            *input = Value::Object(Default::default());
                        }
                    }
                    kept.push(b);
                }
                if kept.is_empty() {
                    None
                } else {
                    *blocks = kept;
                    Some(self)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub thinking_budget_tokens: u32,
}

/// One event in a provider's streamed response. `ToolCall` carries the
/// content-block `index` it belongs to, so a caller can key a per-index
/// accumulator while the input JSON streams in as `arguments` fragments
/// (see [`crate::provider`]).
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    TextDelta(String),
    ThinkingDelta(String),
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done,
    Error(String),
}
