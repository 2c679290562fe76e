// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Tool-crate-local schema type, kept separate from any model-crate type so
/// `orc-tools` has no dependency on `orc-model`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Which agent is asking to run a tool. The allow-set check is keyed on
/// this, not on any per-agent state the registry itself owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Instructor,
    Worker,
}

/// The static tool set partitioned into Instructor-available,
/// Worker-default-available, and permanently-forbidden-to-Worker, plus a
/// runtime-mutable grant set that lets the Instructor extend the Worker's
/// allow-set. Exclusively owns allow-set/grant-set state (§3 ownership
/// rule); the Orchestrator and Agent Drivers only ever call through it.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    instructor_available: HashSet<String>,
    worker_default: HashSet<String>,
    permanently_forbidden: HashSet<String>,
    worker_grants: Mutex<HashSet<String>>,
    pending_worker_compaction: Mutex<Option<String>>,
}

// `Mutex<HashSet<String>>` is Send+Sync; the remaining fields are immutable
// after construction and themselves Send+Sync (Arc<dyn Tool: Send + Sync>,
// HashMap/HashSet of Send+Sync elements).
unsafe impl Sync for ToolRegistry {}

impl ToolRegistry {
    pub fn new(
        tools: Vec<Arc<dyn Tool>>,
        instructor_available: HashSet<String>,
        worker_default: HashSet<String>,
        permanently_forbidden: HashSet<String>,
    ) -> Self {
        let mut map = HashMap::new();
        for t in tools {
            map.insert(t.name().to_string(), t);
        }
        Self {
            tools: map,
            instructor_available,
            worker_default,
            permanently_forbidden,
            worker_grants: Mutex::new(HashSet::new()),
            pending_worker_compaction: Mutex::new(None),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// The allow-set currently in effect for `role`. For the Worker this is
    /// `worker_default ∪ worker_grants`, always disjoint from
    /// `permanently_forbidden` (invariant 5).
    pub fn allow_set(&self, role: AgentRole) -> HashSet<String> {
        match role {
            AgentRole::Instructor => self.instructor_available.clone(),
            AgentRole::Worker => {
                let grants = self.worker_grants.lock().unwrap();
                self.worker_default.union(&grants).cloned().collect()
            }
        }
    }

    pub fn schemas_for(&self, role: AgentRole) -> Vec<ToolSchema> {
        let allow = self.allow_set(role);
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .filter(|t| allow.contains(t.name()))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        if role == AgentRole::Instructor {
            schemas.push(meta_schema(
                "grant",
                "Grant the worker agent a tool it does not currently have. Fails if the tool is permanently forbidden to the worker.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "tool_name": {"type": "string"},
                        "reason": {"type": "string"}
                    },
                    "required": ["tool_name", "reason"]
                }),
            ));
            schemas.push(meta_schema(
                "revoke",
                "Revoke a previously granted tool from the worker agent.",
                serde_json::json!({
                    "type": "object",
                    "properties": {"tool_name": {"type": "string"}},
                    "required": ["tool_name"]
                }),
            ));
            schemas.push(meta_schema(
                "compact_worker_context",
                "Compact the worker agent's conversation history, replacing older turns with a \
                 summary while keeping the most recent turns verbatim. Use this when the worker's \
                 context is growing too large, rather than waiting for it to fail outright.",
                serde_json::json!({
                    "type": "object",
                    "properties": {"reason": {"type": "string"}},
                    "required": ["reason"]
                }),
            ));
        }
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a tool call on behalf of `role`. The permission check
    /// precedes any argument validation (§4.2). `grant`/`revoke` are
    /// meta-tools handled directly here rather than as registered [`Tool`]
    /// implementations, since they mutate registry state a `Tool` impl has
    /// no access to.
    pub async fn execute(&self, role: AgentRole, call: ToolCall) -> ToolOutput {
        let allow = self.allow_set(role);
        if !allow.contains(&call.name) {
            return ToolOutput::err(
                call.id.clone(),
                format!(
                    "permission denied: tool '{}' is not in this agent's allow-set; \
                     only the other agent may use it",
                    call.name
                ),
            );
        }
        match call.name.as_str() {
            "grant" => {
                let tool_name = call.args.get("tool_name").and_then(|v| v.as_str()).unwrap_or("");
                let reason = call.args.get("reason").and_then(|v| v.as_str()).unwrap_or("");
                let mut out = self.grant(tool_name, reason);
                out.call_id = call.id.clone();
                out
            }
            "revoke" => {
                let tool_name = call.args.get("tool_name").and_then(|v| v.as_str()).unwrap_or("");
                let mut out = self.revoke(tool_name);
                out.call_id = call.id.clone();
                out
            }
            "compact_worker_context" => {
                let reason = call.args.get("reason").and_then(|v| v.as_str()).unwrap_or("").to_string();
                *self.pending_worker_compaction.lock().unwrap() = Some(reason.clone());
                tracing::info!(reason, "instructor requested worker context compaction");
                ToolOutput::ok(
                    call.id.clone(),
                    "compaction requested; the worker's history will be compacted before its next turn",
                )
            }
            _ => match self.tools.get(&call.name) {
                Some(tool) => tool.execute(&call).await,
                None => ToolOutput::err(call.id.clone(), format!("unknown tool: {}", call.name)),
            },
        }
    }

    /// Grant `tool_name` to the Worker. Fails closed on names in the
    /// permanently-forbidden set (invariant 5) regardless of the grant's
    /// stated reason.
    pub fn grant(&self, tool_name: &str, reason: &str) -> ToolOutput {
        if self.permanently_forbidden.contains(tool_name) {
            return ToolOutput::err(
                "grant",
                format!("tool '{tool_name}' is permanently forbidden to the worker and cannot be granted"),
            );
        }
        if !self.tools.contains_key(tool_name) {
            return ToolOutput::err("grant", format!("unknown tool: {tool_name}"));
        }
        self.worker_grants.lock().unwrap().insert(tool_name.to_string());
        tracing::info!(tool = tool_name, reason, "granted tool to worker");
        let allow = self.allow_set(AgentRole::Worker);
        let mut names: Vec<_> = allow.into_iter().collect();
        names.sort();
        ToolOutput::ok("grant", format!("worker allow-set is now: {}", names.join(", ")))
    }

    pub fn revoke(&self, tool_name: &str) -> ToolOutput {
        self.worker_grants.lock().unwrap().remove(tool_name);
        tracing::info!(tool = tool_name, "revoked tool from worker");
        let allow = self.allow_set(AgentRole::Worker);
        let mut names: Vec<_> = allow.into_iter().collect();
        names.sort();
        ToolOutput::ok("revoke", format!("worker allow-set is now: {}", names.join(", ")))
    }

    /// Takes and clears any pending `compact_worker_context` request left by
    /// the Instructor's last turn. The registry has no access to the
    /// worker's message history itself (it would pull `orc-model` into
    /// `orc-tools`); the Orchestrator polls this after every Instructor call
    /// and performs the compaction itself.
    pub fn take_pending_worker_compaction(&self) -> Option<String> {
        self.pending_worker_compaction.lock().unwrap().take()
    }
}

fn meta_schema(name: &str, description: &str, parameters: Value) -> ToolSchema {
    ToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "echo"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(call.id.clone(), "ok")
        }
    }

    fn fixture() -> ToolRegistry {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(EchoTool("read_file")),
            Arc::new(EchoTool("git_write")),
            Arc::new(EchoTool("shell_exec")),
        ];
        ToolRegistry::new(
            tools,
            ["read_file", "git_write", "shell_exec"].iter().map(|s| s.to_string()).collect(),
            ["read_file", "shell_exec"].iter().map(|s| s.to_string()).collect(),
            ["git_write"].iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn worker_cannot_execute_tool_outside_allow_set() {
        let reg = fixture();
        let out = reg
            .execute(
                AgentRole::Worker,
                ToolCall { id: "1".into(), name: "git_write".into(), args: Value::Null },
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("permission denied"));
    }

    #[tokio::test]
    async fn instructor_can_execute_git_write() {
        let reg = fixture();
        let out = reg
            .execute(
                AgentRole::Instructor,
                ToolCall { id: "1".into(), name: "git_write".into(), args: Value::Null },
            )
            .await;
        assert!(!out.is_error);
    }

    #[test]
    fn grant_of_permanently_forbidden_tool_fails_closed() {
        let reg = fixture();
        let out = reg.grant("git_write", "need it for this task");
        assert!(out.is_error);
        assert!(out.content.contains("permanently forbidden"));
        assert!(!reg.allow_set(AgentRole::Worker).contains("git_write"));
    }

    #[tokio::test]
    async fn grant_then_revoke_round_trips_worker_allow_set() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool("grep_search")), Arc::new(EchoTool("git_write"))];
        let reg = ToolRegistry::new(
            tools,
            HashSet::new(),
            HashSet::new(),
            ["git_write"].iter().map(|s| s.to_string()).collect(),
        );
        assert!(!reg.allow_set(AgentRole::Worker).contains("grep_search"));
        reg.grant("grep_search", "needed for search");
        assert!(reg.allow_set(AgentRole::Worker).contains("grep_search"));
        reg.revoke("grep_search");
        assert!(!reg.allow_set(AgentRole::Worker).contains("grep_search"));
    }

    #[tokio::test]
    async fn instructor_grant_of_forbidden_tool_via_execute_is_rejected() {
        let reg = fixture();
        let out = reg
            .execute(
                AgentRole::Instructor,
                ToolCall {
                    id: "call-1".into(),
                    name: "grant".into(),
                    args: serde_json::json!({"tool_name": "git_write", "reason": "x"}),
                },
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("permanently forbidden"));
        assert!(!reg.allow_set(AgentRole::Worker).contains("git_write"));
    }

    #[test]
    fn schemas_for_worker_excludes_instructor_only_tools() {
        let reg = fixture();
        let names: Vec<_> = reg.schemas_for(AgentRole::Worker).into_iter().map(|s| s.name).collect();
        assert!(names.contains(&"read_file".to_string()));
        assert!(!names.contains(&"git_write".to_string()));
    }
}
