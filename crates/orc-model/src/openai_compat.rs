// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! OpenAI-compatible chat completion provider. Qwen and most third-party
//! gateways (OpenRouter, Groq, vLLM/Ollama local servers) speak the same
//! `/chat/completions` SSE wire format, so one driver covers all of them;
//! only the base URL and auth style differ per deployment.

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::provider::{classify_http_error, ResponseStream};
use crate::types::{CompletionRequest, ContentBlock, Message, MessageContent, ResponseEvent, Role};
use crate::ModelProvider;

/// How the API key is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — Qwen, OpenRouter, Groq, most gateways.
    Bearer,
    /// No authentication header — local servers (Ollama, vLLM, LM Studio).
    None,
}

pub struct OpenAICompatProvider {
    driver_name: &'static str,
    model: String,
    api_key: Option<String>,
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            driver_name,
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            max_tokens: 4096,
            temperature: 0.2,
            auth_style,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let mut messages = build_openai_messages(&req.messages);
        if let Some(system) = &req.system_prompt {
            if !system.is_empty() {
                messages.insert(0, json!({"role": "system", "content": system}));
            }
        }

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {"name": t.name, "description": t.description, "parameters": t.parameters},
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": req.stream,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream_options": {"include_usage": true},
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        http_req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref().context("API key not set")?;
                http_req.bearer_auth(key)
            }
            AuthStyle::None => http_req,
        };

        let resp = http_req
            .send()
            .await
            .with_context(|| format!("{} request failed", self.driver_name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text).into());
        }

        let event_stream = resp
            .bytes_stream()
            .scan(String::new(), |buf, chunk| {
                let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<ResponseEvent>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(parse_sse_chunk(&v))
}

/// Drain complete `\n`-terminated SSE lines from `buf`, leaving any trailing
/// incomplete line for the next TCP chunk to extend.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        buf.drain(..=pos);
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

fn parse_sse_chunk(v: &Value) -> anyhow::Result<ResponseEvent> {
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return Ok(ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        });
    }

    let delta = &v["choices"][0]["delta"];

    if let Some(tool_calls) = delta.get("tool_calls") {
        if let Some(tc) = tool_calls.get(0) {
            let index = tc["index"].as_u64().unwrap_or(0) as u32;
            let id = tc["id"].as_str().unwrap_or("").to_string();
            let name = tc["function"]["name"].as_str().unwrap_or("").to_string();
            let args = tc["function"]["arguments"].as_str().unwrap_or("").to_string();
            return Ok(ResponseEvent::ToolCall { index, id, name, arguments: args });
        }
    }

    // Qwen/llama.cpp-family reasoning models surface chain-of-thought via
    // `reasoning_content` ahead of the final answer.
    if let Some(thinking) = delta.get("reasoning_content").and_then(|c| c.as_str()) {
        if !thinking.is_empty() {
            return Ok(ResponseEvent::ThinkingDelta(thinking.to_string()));
        }
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return Ok(ResponseEvent::TextDelta(text.to_string()));
    }

    Ok(ResponseEvent::TextDelta(String::new()))
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Convert our two-role history into the OpenAI wire format. Tool results
/// ride as `user`-role `ToolResult` blocks in our model rather than a
/// dedicated `tool` role, so each is serialized as its own `tool` message.
fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    let mut result = Vec::with_capacity(messages.len());
    for m in messages {
        match &m.content {
            MessageContent::Text(t) => {
                result.push(json!({"role": role_str(m.role), "content": t}));
            }
            MessageContent::Blocks(blocks) => {
                let tool_uses: Vec<&ContentBlock> =
                    blocks.iter().filter(|b| matches!(b, ContentBlock::ToolUse { .. })).collect();
                if !tool_uses.is_empty() {
                    let calls: Vec<Value> = tool_uses
                        .iter()
                        .map(|b| match b {
                            ContentBlock::ToolUse { id, name, input } => json!({
                                "id": id,
                                "type": "function",
                                "function": {"name": name, "arguments": input.to_string()},
                            }),
                            _ => unreachable!(),
                        })
                        .collect();
                    result.push(json!({"role": "assistant", "tool_calls": calls}));
                    continue;
                }

                let tool_results: Vec<&ContentBlock> =
                    blocks.iter().filter(|b| matches!(b, ContentBlock::ToolResult { .. })).collect();
                if !tool_results.is_empty() {
                    for b in tool_results {
                        if let ContentBlock::ToolResult { tool_use_id, content, .. } = b {
                            result.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content}));
                        }
                    }
                    continue;
                }

                let text = m.as_text();
                result.push(json!({"role": role_str(m.role), "content": text}));
            }
        }
    }
    result
}
