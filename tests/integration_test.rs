// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end tests exercising the orchestrator across real crate
//! boundaries (config loading, tool registry construction, the agent
//! drivers, and the session journal) rather than any single crate's unit
//! tests. Providers are scripted directly instead of going through
//! `DebugMockProvider`, since its randomized output is unsuitable for
//! asserting a specific conversation shape.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orc_config::ToolsConfig;
use orc_core::agent::ProviderFactory;
use orc_core::display::NullSink;
use orc_core::session_log::SessionLog;
use orc_core::{AgentDriver, LineOutcome, Orchestrator, OrchestratorConfig};
use orc_model::{CompletionRequest, Message, ModelProvider, ProviderTag, ResponseEvent, ResponseStream};
use orc_tools::{build_default_registry, AgentRole, ToolRegistry};

struct ScriptedProvider {
    turns: Mutex<Vec<Vec<ResponseEvent>>>,
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    fn model_name(&self) -> &str {
        "scripted-model"
    }
    async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let mut turns = self.turns.lock().unwrap();
        let events = if turns.is_empty() { vec![ResponseEvent::Done] } else { turns.remove(0) };
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

struct FixedFactory(Arc<dyn ModelProvider>);

impl ProviderFactory for FixedFactory {
    fn build(&self, _model_id: &str, _tag: ProviderTag) -> Arc<dyn ModelProvider> {
        self.0.clone()
    }
}

fn text_turn(s: &str) -> Vec<ResponseEvent> {
    vec![ResponseEvent::TextDelta(s.to_string()), ResponseEvent::Done]
}

fn scripted_driver(role: AgentRole, tools: Arc<ToolRegistry>, turns: Vec<Vec<ResponseEvent>>) -> AgentDriver {
    let provider = Arc::new(ScriptedProvider { turns: Mutex::new(turns) });
    AgentDriver::new(
        role,
        Arc::new(FixedFactory(provider)),
        tools,
        orc_config::AgentConfig::default(),
        "system prompt",
        "sonnet",
    )
}

#[test]
fn default_config_loads_with_empty_path_and_has_sane_defaults() {
    let config = orc_config::load_config(None).unwrap();
    assert_eq!(config.instructor_model, "sonnet");
    assert_eq!(config.worker_model, "sonnet");
    assert_eq!(config.agent.max_tool_iterations, 50);
    assert!(!config.tools.shell_blocklist.is_empty());
}

#[test]
fn default_registry_splits_worker_and_instructor_allow_sets() {
    let tools = build_default_registry(&ToolsConfig::default());
    let worker_schemas: HashSet<String> =
        tools.schemas_for(AgentRole::Worker).into_iter().map(|s| s.name).collect();
    let instructor_schemas: HashSet<String> =
        tools.schemas_for(AgentRole::Instructor).into_iter().map(|s| s.name).collect();

    assert!(worker_schemas.contains("read_file"));
    assert!(!worker_schemas.contains("git_write"));
    assert!(instructor_schemas.contains("git_write"));
    assert!(instructor_schemas.contains("grant"));
    assert!(instructor_schemas.contains("revoke"));
}

#[tokio::test]
async fn full_turn_persists_to_a_readable_session_journal() {
    let work_dir = tempfile::tempdir().unwrap();
    let session_dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(build_default_registry(&ToolsConfig::default()));

    let instructor = scripted_driver(
        AgentRole::Instructor,
        tools.clone(),
        vec![text_turn("Tell worker: write a readme"), text_turn("DONE")],
    );
    let worker = scripted_driver(AgentRole::Worker, tools, vec![text_turn("Wrote README.md.")]);

    let session_id = "journal-test".to_string();
    let session = SessionLog::open(session_dir.path(), &session_id).unwrap();
    let mut orchestrator = Orchestrator::new(
        instructor,
        worker,
        session,
        session_id.clone(),
        orc_config::AgentConfig::default(),
        OrchestratorConfig { work_dir: work_dir.path().to_path_buf(), initial_remaining_rounds: None },
    );

    let mut sink = NullSink;
    let outcome = orchestrator.handle_user_line("add a readme", &mut sink).await.unwrap();
    assert_eq!(outcome, LineOutcome::Continue);
    assert!(orchestrator.current_round() >= 3);

    let journal_path = session_dir.path().join(format!("session-{session_id}.jsonl"));
    let (messages, metadata) = SessionLog::replay(&journal_path).unwrap();
    assert!(!messages.is_empty());
    let metadata = metadata.expect("a metadata line should have been persisted");
    assert_eq!(metadata.session_id, session_id);
    assert_eq!(metadata.current_round, orchestrator.current_round());
}

#[tokio::test]
async fn exit_command_ends_the_session_without_touching_the_instructor() {
    let work_dir = tempfile::tempdir().unwrap();
    let session_dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(build_default_registry(&ToolsConfig::default()));

    // Scripts with zero turns would panic on `Vec::remove` if called, so an
    // instructor call here would be a test failure, not just a wrong reply.
    let instructor = scripted_driver(AgentRole::Instructor, tools.clone(), vec![]);
    let worker = scripted_driver(AgentRole::Worker, tools, vec![]);

    let session = SessionLog::open(session_dir.path(), "exit-test").unwrap();
    let mut orchestrator = Orchestrator::new(
        instructor,
        worker,
        session,
        "exit-test".into(),
        orc_config::AgentConfig::default(),
        OrchestratorConfig { work_dir: work_dir.path().to_path_buf(), initial_remaining_rounds: None },
    );

    let mut sink = NullSink;
    let outcome = orchestrator.handle_user_line("exit", &mut sink).await.unwrap();
    assert_eq!(outcome, LineOutcome::Exit);
    assert_eq!(orchestrator.current_round(), 0);
}

#[tokio::test]
async fn round_control_token_bounds_worker_delegation() {
    let work_dir = tempfile::tempdir().unwrap();
    let session_dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(build_default_registry(&ToolsConfig::default()));

    let instructor = scripted_driver(AgentRole::Instructor, tools.clone(), vec![text_turn("Tell worker: go")]);
    let worker = scripted_driver(AgentRole::Worker, tools, vec![]);

    let session = SessionLog::open(session_dir.path(), "rounds-test").unwrap();
    let mut orchestrator = Orchestrator::new(
        instructor,
        worker,
        session,
        "rounds-test".into(),
        orc_config::AgentConfig::default(),
        OrchestratorConfig { work_dir: work_dir.path().to_path_buf(), initial_remaining_rounds: Some(0) },
    );

    let mut sink = NullSink;
    orchestrator.handle_user_line("[r=0] do the thing", &mut sink).await.unwrap();
    assert_eq!(orchestrator.remaining_rounds(), Some(0));
}

#[tokio::test]
async fn resuming_a_session_restores_instructor_history_with_an_empty_worker_history() {
    let session_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let tools = Arc::new(build_default_registry(&ToolsConfig::default()));

    {
        let mut session = SessionLog::open(session_dir.path(), "resume-it").unwrap();
        let history = vec![Message::user("hello"), Message::assistant("Tell worker: do it")];
        session.append_instructor_messages(&history).unwrap();
        let metadata = orc_core::SessionMetadata {
            session_id: "resume-it".into(),
            created_at: chrono::Utc::now(),
            last_updated_at: chrono::Utc::now(),
            current_round: 2,
            remaining_rounds: Some(3),
            work_dir: work_dir.path().to_path_buf(),
            config: serde_json::json!({}),
        };
        session.append_metadata(&metadata).unwrap();
    }

    let journal_path = session_dir.path().join("session-resume-it.jsonl");
    let (messages, metadata) = SessionLog::replay(&journal_path).unwrap();
    let metadata = metadata.unwrap();

    let instructor = scripted_driver(AgentRole::Instructor, tools.clone(), vec![]);
    let worker = scripted_driver(AgentRole::Worker, tools, vec![]);
    let session = SessionLog::open(session_dir.path(), "resume-it").unwrap();
    let orchestrator = Orchestrator::resume(
        instructor,
        worker,
        session,
        orc_config::AgentConfig::default(),
        work_dir.path().to_path_buf(),
        messages,
        metadata,
    );

    assert_eq!(orchestrator.instructor_history().len(), 2);
    assert_eq!(orchestrator.current_round(), 2);
    assert_eq!(orchestrator.remaining_rounds(), Some(3));
}
