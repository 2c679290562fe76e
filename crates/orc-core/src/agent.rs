// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use orc_config::AgentConfig;
use orc_model::{CompletionRequest, ContentBlock, Message, ModelProvider, ProviderError, ProviderTag, ResponseEvent};
use orc_tools::{AgentRole, Tool as _, ToolCall as ExecToolCall, ToolRegistry};

use crate::display::{DisplaySink, Speaker};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("instruction must not be empty")]
    EmptyInput,
    #[error("turn cancelled")]
    Cancelled,
}

/// Resolves a model id + provider tag to a live [`ModelProvider`]. Kept as a
/// trait so `orc-core` never depends on a concrete HTTP client crate; the
/// root binary supplies the real implementation (or the mock one, under
/// `--debug`).
pub trait ProviderFactory: Send + Sync {
    fn build(&self, model_id: &str, tag: ProviderTag) -> Arc<dyn ModelProvider>;
}

pub struct TurnOutcome {
    pub text: String,
    pub tool_round_count: u32,
    pub hit_iteration_cap: bool,
}

/// One side of the Instructor/Worker pair: a bound model (with an
/// overridable, per-provider-cached client), a system prompt, and the tool
/// registry it is scoped against by `role`.
pub struct AgentDriver {
    role: AgentRole,
    factory: Arc<dyn ProviderFactory>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    system_prompt: Mutex<String>,
    default_model: Mutex<String>,
    clients: Mutex<HashMap<ProviderTag, Arc<dyn ModelProvider>>>,
}

impl AgentDriver {
    pub fn new(
        role: AgentRole,
        factory: Arc<dyn ProviderFactory>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
        system_prompt: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            role,
            factory,
            tools,
            config,
            system_prompt: Mutex::new(system_prompt.into()),
            default_model: Mutex::new(default_model.into()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the system prompt in place. Used by the Worker's "start with a
    /// fresh context" tool call: the Instructor rewrites what the Worker sees
    /// as its mandate without touching the Worker's message history directly.
    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        *self.system_prompt.lock().unwrap() = prompt.into();
    }

    fn system_prompt(&self) -> String {
        self.system_prompt.lock().unwrap().clone()
    }

    /// Exposed so the Orchestrator can poll the Instructor's registry for a
    /// `compact_worker_context` request after each of its turns; the
    /// registry has no access to `Message`/worker history itself (§ keeps
    /// `orc-tools` free of an `orc-model` dependency).
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    fn client_for(&self, model_override: Option<&str>) -> Arc<dyn ModelProvider> {
        let model_id = model_override
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model.lock().unwrap().clone());
        let (resolved_id, tag) = orc_model::resolve(&model_id);
        let mut cache = self.clients.lock().unwrap();
        cache
            .entry(tag)
            .or_insert_with(|| self.factory.build(&resolved_id, tag))
            .clone()
    }

    /// One-shot, tool-free completion over `messages`, used by history
    /// compaction to turn a compaction-prompt message list into the summary
    /// text that will replace it. Does not touch `history` itself and is not
    /// part of the inner agentic loop: no tool schemas are offered, so the
    /// model has nothing to call and always returns a tool-free response.
    /// Errors (including an empty response) are the caller's signal to fall
    /// back to the deterministic emergency-compaction path instead.
    pub async fn summarize(&self, messages: &[Message]) -> anyhow::Result<String> {
        let client = self.client_for(None);
        let req = CompletionRequest {
            messages: messages.to_vec(),
            tools: Vec::new(),
            system_prompt: Some(self.system_prompt()),
            stream: true,
            enable_thinking: false,
            thinking_budget_tokens: 0,
        };
        let mut stream = client.complete(req).await?;
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => text.push_str(&delta),
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => anyhow::bail!("model error during compaction summary: {e}"),
                _ => {}
            }
        }
        if text.trim().is_empty() {
            anyhow::bail!("compaction summary call returned no text");
        }
        Ok(text)
    }

    /// Run one full turn: append `input` to `history`, drive the inner
    /// agentic loop (stream → sequential tool execution → append results →
    /// repeat) until the model produces a tool-free response or the
    /// iteration cap is hit, and return the final text.
    ///
    /// Tool calls within a single model response are executed one at a time,
    /// in the order the model emitted them — not concurrently — per the
    /// ordering guarantee this system makes about within-turn tool effects.
    pub async fn run_turn(
        &self,
        history: &mut Vec<Message>,
        input: &str,
        model_override: Option<&str>,
        cancel: &mut oneshot::Receiver<()>,
        sink: &mut dyn DisplaySink,
    ) -> anyhow::Result<TurnOutcome> {
        if input.trim().is_empty() {
            return Err(AgentError::EmptyInput.into());
        }
        history.push(Message::user(input));

        let mut tool_round_count = 0u32;
        for _ in 0..self.config.max_tool_iterations {
            match self.run_inner_iteration(history, true, model_override, cancel, sink).await? {
                IterationOutcome::FinalText(text) => {
                    return Ok(TurnOutcome { text, tool_round_count, hit_iteration_cap: false });
                }
                IterationOutcome::ToolRound => tool_round_count += 1,
            }
        }

        let wrap_msg = format!(
            "You have reached the maximum tool-call budget ({} iterations) for this turn. \
             Do not call any more tools. Summarize: (1) what has been completed, \
             (2) what still remains, and (3) how to continue.",
            self.config.max_tool_iterations
        );
        history.push(Message::user(wrap_msg));
        let text = match self.run_inner_iteration(history, false, model_override, cancel, sink).await? {
            IterationOutcome::FinalText(t) => t,
            IterationOutcome::ToolRound => String::new(),
        };
        let annotated = format!(
            "{text}\n\n[WARNING: reached the {}-iteration tool-call limit for this turn.]",
            self.config.max_tool_iterations
        );
        Ok(TurnOutcome { text: annotated, tool_round_count, hit_iteration_cap: true })
    }

    async fn run_inner_iteration(
        &self,
        history: &mut Vec<Message>,
        with_tools: bool,
        model_override: Option<&str>,
        cancel: &mut oneshot::Receiver<()>,
        sink: &mut dyn DisplaySink,
    ) -> anyhow::Result<IterationOutcome> {
        let client = self.client_for(model_override);
        let tool_schemas: Vec<orc_model::ToolSchema> = if with_tools {
            self.tools
                .schemas_for(self.role)
                .into_iter()
                .map(|s| orc_model::ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
                .collect()
        } else {
            Vec::new()
        };

        let req = CompletionRequest {
            messages: history.clone(),
            tools: tool_schemas,
            system_prompt: Some(self.system_prompt()),
            stream: true,
            enable_thinking: self.config.thinking_budget_tokens > 0,
            thinking_budget_tokens: self.config.thinking_budget_tokens,
        };

        let mut stream = match client.complete(req).await {
            Ok(s) => s,
            Err(e) => {
                let message = describe_provider_error(&e);
                sink.on_status(&format!("provider error: {message}"));
                return Ok(IterationOutcome::FinalText(format!("[ERROR: {message}]")));
            }
        };

        let speaker = speaker_for(self.role);
        let mut full_text = String::new();
        let mut thinking_buf = String::new();
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

        loop {
            tokio::select! {
                biased;
                _ = &mut *cancel => return Err(AgentError::Cancelled.into()),
                next = stream.next() => {
                    let event = match next {
                        None => break,
                        Some(Ok(ev)) => ev,
                        Some(Err(e)) => {
                            let message = describe_provider_error(&e);
                            sink.on_status(&format!("stream error: {message}"));
                            return Ok(IterationOutcome::FinalText(format!("[ERROR: {message}]")));
                        }
                    };
                    match event {
                        ResponseEvent::TextDelta(delta) => {
                            full_text.push_str(&delta);
                            sink.on_text(speaker, &delta);
                        }
                        ResponseEvent::ThinkingDelta(delta) => {
                            thinking_buf.push_str(&delta);
                        }
                        ResponseEvent::ToolCall { index, id, name, arguments } => {
                            let ptc = pending.entry(index).or_default();
                            if !id.is_empty() {
                                ptc.id = id;
                            }
                            if !name.is_empty() {
                                ptc.name = name;
                            }
                            ptc.args_buf.push_str(&arguments);
                        }
                        ResponseEvent::Usage { .. } => {}
                        ResponseEvent::Done => break,
                        ResponseEvent::Error(e) => {
                            sink.on_status(&format!("model stream error: {e}"));
                        }
                    }
                }
            }
        }

        let mut blocks = Vec::new();
        if !thinking_buf.is_empty() {
            blocks.push(ContentBlock::Thinking { thinking: thinking_buf });
        }
        if !full_text.is_empty() {
            blocks.push(ContentBlock::text(full_text.clone()));
        }

        let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let mut finished_calls = Vec::new();
        for (i, (_, ptc)) in sorted.into_iter().enumerate() {
            if ptc.name.is_empty() {
                tracing::warn!(tool_call_id = %ptc.id, "dropping tool call with empty name from model");
                continue;
            }
            let mut call = ptc.finish();
            if call.id.is_empty() {
                call.id = format!("call_synthetic_{i}");
            }
            finished_calls.push(call);
        }
        for call in &finished_calls {
            blocks.push(ContentBlock::tool_use(call.id.clone(), call.name.clone(), call.args.clone()));
        }

        let assistant_message = Message::assistant_blocks(blocks);
        let sanitized = match assistant_message.sanitize() {
            Some(m) => m,
            None => {
                history.push(Message::user(
                    "You produced no usable output (empty text and no tool call). Continue with your next action.",
                ));
                return Ok(IterationOutcome::ToolRound);
            }
        };
        history.push(sanitized);

        if finished_calls.is_empty() {
            return Ok(IterationOutcome::FinalText(full_text));
        }

        let mut results = Vec::with_capacity(finished_calls.len());
        for call in finished_calls {
            sink.on_status(&format!("{} calling {}", speaker.label(), call.name));
            let exec_call = ExecToolCall { id: call.id.clone(), name: call.name.clone(), args: call.args.clone() };
            let tool = self.tools.get(&call.name);
            let category = tool.as_deref().map(|t| t.output_category()).unwrap_or_default();
            let output = self.tools.execute(self.role, exec_call).await;
            let content = crate::compact::smart_truncate(&output.content, category, TOOL_RESULT_TOKEN_CAP);
            results.push(ContentBlock::tool_result(call.id, content, output.is_error));
        }
        history.push(Message::tool_results(results));

        Ok(IterationOutcome::ToolRound)
    }
}

/// Per-tool-result token cap applied before the result re-enters history.
/// Keeps a single noisy `shell_exec`/`grep_search` call from dominating the
/// token budget the way an un-truncated one could.
const TOOL_RESULT_TOKEN_CAP: usize = 2_000;

enum IterationOutcome {
    FinalText(String),
    ToolRound,
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

struct FinishedToolCall {
    id: String,
    name: String,
    args: Value,
}

impl PendingToolCall {
    /// Resolve the accumulated argument fragments to a JSON object. Anthropic
    /// (and most providers) require tool_use input to be an object; `null`
    /// would surface as a 400 on the *next* completion request, so an empty
    /// or unparseable buffer degrades to `{}` rather than being dropped.
    fn finish(self) -> FinishedToolCall {
        let args = if self.args_buf.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(parse_err) => match attempt_json_repair(&self.args_buf) {
                    Ok(v) => {
                        tracing::warn!(tool_name = %self.name, "repaired invalid JSON arguments from model");
                        v
                    }
                    Err(_) => {
                        tracing::warn!(
                            tool_name = %self.name,
                            error = %parse_err,
                            "model sent tool call with invalid JSON arguments; substituting {{}}"
                        );
                        Value::Object(Default::default())
                    }
                },
            }
        };
        FinishedToolCall { id: self.id, name: self.name, args }
    }
}

/// Cheap, syntactic JSON repairs attempted before the empty-object fallback:
/// invalid backslash escapes, a missing comma between adjacent key-value
/// pairs, and an abruptly truncated string/object.
fn attempt_json_repair(json_str: &str) -> anyhow::Result<Value> {
    let fixed = fix_invalid_json_escapes(json_str);
    if let Ok(v) = serde_json::from_str::<Value>(&fixed) {
        return Ok(v);
    }

    let repaired = regex::Regex::new(r#""([^"]+)"([a-zA-Z_][a-zA-Z0-9_]*)":\s*"#)
        .unwrap()
        .replace_all(&fixed, r#""$1", "$2": "#)
        .into_owned();
    if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
        return Ok(v);
    }

    if !fixed.trim().ends_with('}') {
        let mut completed = fixed.clone();
        let quote_count = fixed.chars().filter(|&c| c == '"').count();
        if quote_count % 2 == 1 {
            completed.push('"');
        }
        if !completed.trim().ends_with('}') {
            completed.push('}');
        }
        if let Ok(v) = serde_json::from_str::<Value>(&completed) {
            return Ok(v);
        }
    }

    anyhow::bail!("JSON repair failed: all repair strategies exhausted")
}

/// Valid JSON escapes are `" \ / b f n r t u`; anything else the model emits
/// (e.g. `\c`, `\(`) gets its backslash doubled so the string round-trips.
fn fix_invalid_json_escapes(json_str: &str) -> String {
    let mut result = String::with_capacity(json_str.len() + 16);
    let mut chars = json_str.chars();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => match chars.next() {
                    Some(next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                        result.push('\\');
                        result.push(next);
                    }
                    Some(next) => {
                        result.push('\\');
                        result.push('\\');
                        result.push(next);
                    }
                    None => result.push('\\'),
                },
                '"' => {
                    in_string = false;
                    result.push('"');
                }
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }
    result
}

/// Maps a failure to the text surfaced to the model/Display Sink. Recognized
/// [`ProviderError`] variants get actionable guidance (context-too-long tells
/// the Worker to ask the Instructor for compaction or a `grant`); anything
/// else is rendered via its `Display` chain.
fn describe_provider_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ProviderError>() {
        Some(ProviderError::ContextTooLong) => {
            "context window exceeded; ask the instructor to call compact_worker_context or reduce scope".to_string()
        }
        Some(ProviderError::RateLimited) => "rate limited by the model provider; retry shortly".to_string(),
        Some(ProviderError::Auth) => "authentication with the model provider failed".to_string(),
        Some(ProviderError::Cancelled) => "request was cancelled".to_string(),
        Some(ProviderError::Transient(msg)) => format!("transient provider error: {msg}"),
        Some(ProviderError::MalformedHistory(msg)) => format!("malformed conversation history: {msg}"),
        None => format!("{e:#}"),
    }
}

fn speaker_for(role: AgentRole) -> Speaker {
    match role {
        AgentRole::Instructor => Speaker::Instructor,
        AgentRole::Worker => Speaker::Worker,
    }
}
