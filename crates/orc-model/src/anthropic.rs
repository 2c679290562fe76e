// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::provider::{classify_http_error, ResponseStream};
use crate::types::{CompletionRequest, ContentBlock, Message, MessageContent, ResponseEvent, Role};
use crate::ModelProvider;

/// Live Anthropic Messages API provider. Streams `text/event-stream` chunks
/// and reassembles them into [`ResponseEvent`]s; tool-call arguments arrive
/// as `input_json_delta` fragments keyed by block index, which is exactly
/// the shape the Agent Driver's `PendingToolCall` accumulator expects.
pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            max_tokens: 8192,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let key = self.api_key.as_deref().context("ANTHROPIC_API_KEY not set")?;
        let messages = build_anthropic_messages(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.parameters}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "stream": req.stream,
        });
        if let Some(system) = &req.system_prompt {
            if !system.is_empty() {
                body["system"] = json!(system);
            }
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if req.enable_thinking {
            body["thinking"] = json!({"type": "enabled", "budget_tokens": req.thinking_budget_tokens});
        }

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text).into());
        }

        let event_stream = resp
            .bytes_stream()
            .scan(String::new(), |buf, chunk| {
                let text = match chunk {
                    Ok(b) => String::from_utf8_lossy(&b).to_string(),
                    Err(e) => return futures::future::ready(Some(vec![Err(anyhow::anyhow!(e))])),
                };
                buf.push_str(&text);
                let mut events = Vec::new();
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim_end_matches('\r').to_string();
                    buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        if let Ok(v) = serde_json::from_str::<Value>(data.trim()) {
                            events.push(parse_anthropic_event(&v));
                        }
                    }
                }
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn parse_anthropic_event(v: &Value) -> anyhow::Result<ResponseEvent> {
    match v["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or("") {
                "text_delta" => Ok(ResponseEvent::TextDelta(delta["text"].as_str().unwrap_or("").to_string())),
                "input_json_delta" => Ok(ResponseEvent::ToolCall {
                    index,
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                "thinking_delta" => {
                    let thinking = delta["thinking"].as_str().unwrap_or("").to_string();
                    if thinking.is_empty() {
                        Ok(ResponseEvent::TextDelta(String::new()))
                    } else {
                        Ok(ResponseEvent::ThinkingDelta(thinking))
                    }
                }
                _ => Ok(ResponseEvent::TextDelta(String::new())),
            }
        }
        "content_block_start" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                Ok(ResponseEvent::ToolCall {
                    index,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                })
            } else {
                Ok(ResponseEvent::TextDelta(String::new()))
            }
        }
        "message_delta" => {
            if let Some(usage) = v.get("usage") {
                return Ok(ResponseEvent::Usage {
                    input_tokens: 0,
                    output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
                });
            }
            Ok(ResponseEvent::TextDelta(String::new()))
        }
        "message_start" => {
            if let Some(usage) = v["message"].get("usage") {
                return Ok(ResponseEvent::Usage {
                    input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: 0,
                });
            }
            Ok(ResponseEvent::TextDelta(String::new()))
        }
        "message_stop" => Ok(ResponseEvent::Done),
        _ => Ok(ResponseEvent::TextDelta(String::new())),
    }
}

/// Convert our two-role history into Anthropic's wire format. The system
/// prompt travels separately via `CompletionRequest::system_prompt`, so
/// every message here is `user` or `assistant`.
fn build_anthropic_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            match &m.content {
                MessageContent::Text(t) => json!({"role": role, "content": t}),
                MessageContent::Blocks(blocks) => {
                    let content: Vec<Value> = blocks.iter().map(content_block_to_wire).collect();
                    json!({"role": role, "content": content})
                }
            }
        })
        .collect()
}

fn content_block_to_wire(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::Thinking { thinking } => json!({"type": "thinking", "thinking": thinking}),
        ContentBlock::ToolUse { id, name, input } => {
            json!({"type": "tool_use", "id": id, "name": name, "input": input})
        }
        ContentBlock::ToolResult { tool_use_id, content, is_error } => {
            json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": content, "is_error": is_error})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_and_model() {
        let p = AnthropicProvider::new("claude-sonnet-4-5", None, None);
        assert_eq!(p.name(), "anthropic");
        assert_eq!(p.model_name(), "claude-sonnet-4-5");
    }

    #[test]
    fn message_stop_yields_done() {
        let v = json!({"type": "message_stop"});
        assert!(matches!(parse_anthropic_event(&v).unwrap(), ResponseEvent::Done));
    }

    #[test]
    fn content_block_delta_text_delta() {
        let v = json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "hi"}});
        assert!(matches!(parse_anthropic_event(&v).unwrap(), ResponseEvent::TextDelta(t) if t == "hi"));
    }

    #[test]
    fn content_block_start_tool_use_emits_tool_call() {
        let v = json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": {"type": "tool_use", "id": "toolu_1", "name": "read_file"}
        });
        let ev = parse_anthropic_event(&v).unwrap();
        assert!(matches!(&ev, ResponseEvent::ToolCall { index: 1, id, name, .. } if id == "toolu_1" && name == "read_file"));
    }

    #[test]
    fn plain_text_message_serializes_to_string_content() {
        let wire = build_anthropic_messages(&[Message::user("hello")]);
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[0]["content"], "hello");
    }

    #[test]
    fn tool_result_block_serializes_with_is_error_flag() {
        let msg = Message::tool_results(vec![ContentBlock::tool_result("call-1", "boom", true)]);
        let wire = build_anthropic_messages(&[msg]);
        let block = &wire[0]["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["is_error"], true);
    }
}
