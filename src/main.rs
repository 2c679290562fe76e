// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, OutputFormatArg};
use orc_core::session_log::{read_current_pointer, write_current_pointer, SessionLog};
use orc_core::{
    instructor_system_prompt, worker_system_prompt, AbortHandle, AgentDriver, CompactSink,
    DisplaySink, JsonSink, LineOutcome, Orchestrator, OrchestratorConfig, ProviderFactory,
    StdoutSink,
};
use orc_model::{
    AnthropicProvider, AuthStyle, DebugMockProvider, MockRole, ModelProvider, OpenAICompatProvider,
    ProviderTag,
};
use orc_tools::{build_default_registry, AgentRole};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = orc_config::load_config(cli.config.as_deref())?;
    let work_dir = resolve_work_dir(cli.work_dir.as_deref())?;
    std::env::set_current_dir(&work_dir)
        .with_context(|| format!("entering working directory {}", work_dir.display()))?;

    let agent_config = config.agent.clone();
    let mut instructor_config = agent_config.clone();
    if cli.no_thinking {
        instructor_config.thinking_budget_tokens = 0;
    }
    let worker_config = agent_config.clone();

    let tools = Arc::new(build_default_registry(&config.tools));

    let instructor_model = cli.instructor_model.clone().unwrap_or_else(|| config.instructor_model.clone());
    let worker_model = cli.worker_model.clone().unwrap_or_else(|| config.worker_model.clone());

    let (instructor_factory, worker_factory): (Arc<dyn ProviderFactory>, Arc<dyn ProviderFactory>) =
        if cli.debug {
            (
                Arc::new(DebugProviderFactory::new(MockRole::Instructor)),
                Arc::new(DebugProviderFactory::new(MockRole::Worker)),
            )
        } else {
            (Arc::new(LiveProviderFactory), Arc::new(LiveProviderFactory))
        };

    let instructor = AgentDriver::new(
        AgentRole::Instructor,
        instructor_factory,
        tools.clone(),
        instructor_config,
        instructor_system_prompt(&work_dir),
        instructor_model,
    );
    let worker = AgentDriver::new(
        AgentRole::Worker,
        worker_factory,
        tools,
        worker_config,
        worker_system_prompt(&work_dir),
        worker_model,
    );

    let session_root = session_storage_dir()?;
    let resume = resolve_resume_request(&cli, &session_root, &work_dir)?;

    let mut sink = build_sink(cli.output_format);

    let mut orchestrator = match resume {
        Some((session_id, instructor_history, metadata)) => {
            sink.on_status(&format!(
                "resumed session {session_id} ({} instructor messages restored; worker context was not persisted)",
                instructor_history.len()
            ));
            let session = SessionLog::open(&session_root, &session_id)?;
            Orchestrator::resume(instructor, worker, session, agent_config, work_dir.clone(), instructor_history, metadata)
        }
        None => {
            let session_id = uuid::Uuid::new_v4().to_string();
            let session = SessionLog::open(&session_root, &session_id)?;
            write_current_pointer(&session_root, &session_id, &work_dir)?;
            Orchestrator::new(
                instructor,
                worker,
                session,
                session_id,
                agent_config,
                OrchestratorConfig { work_dir: work_dir.clone(), initial_remaining_rounds: cli.max_rounds },
            )
        }
    };

    let interactive = is_stdin_tty();

    if let Some(instruction) = &cli.instruction {
        let outcome = run_turn(&mut orchestrator, instruction, sink.as_mut(), interactive).await?;
        if outcome == LineOutcome::Exit {
            return Ok(0);
        }
    }

    // Piped/non-interactive input drains stdin as a sequence of instructions
    // with no prompt printed; an interactive terminal gets a "> " prompt and
    // the ESC listener armed around each turn.
    loop {
        if interactive {
            print!("\n> ");
            io::stdout().flush().ok();
        }
        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.trim().is_empty() {
            continue;
        }
        if run_turn(&mut orchestrator, trimmed, sink.as_mut(), interactive).await? == LineOutcome::Exit {
            break;
        }
    }

    Ok(0)
}

/// Run one user turn with the ESC-key listener armed for its whole
/// duration (Instructor call, any Worker call, and the review that
/// follows) so ESC can interrupt whichever stream is currently active.
/// Only armed when stdin is a real terminal; a piped/non-interactive
/// session has no keyboard to listen on.
async fn run_turn(
    orchestrator: &mut Orchestrator,
    line: &str,
    sink: &mut dyn DisplaySink,
    interactive: bool,
) -> anyhow::Result<LineOutcome> {
    let watcher = if interactive {
        Some(EscWatcher::start(orchestrator.abort_handle()))
    } else {
        None
    };
    let outcome = orchestrator.handle_user_line(line, sink).await;
    if let Some(watcher) = watcher {
        watcher.stop();
    }
    outcome
}

/// Watches stdin for the 0x1B (ESC) byte on a dedicated OS thread for the
/// duration of one turn, triggering whatever abort handle the Orchestrator
/// currently has armed. Runs in raw mode so a bare ESC byte is delivered
/// without waiting on a line to be completed; restores cooked mode on stop
/// regardless of whether ESC ever fired.
struct EscWatcher {
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

impl EscWatcher {
    fn start(abort: Arc<AbortHandle>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let handle = std::thread::spawn(move || {
            let raw_mode_enabled = crossterm::terminal::enable_raw_mode().is_ok();
            while !stop_for_thread.load(Ordering::SeqCst) {
                match crossterm::event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(crossterm::event::Event::Key(key)) = crossterm::event::read() {
                            if key.code == crossterm::event::KeyCode::Esc {
                                abort.trigger();
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
            if raw_mode_enabled {
                let _ = crossterm::terminal::disable_raw_mode();
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn build_sink(format: OutputFormatArg) -> Box<dyn DisplaySink> {
    match format {
        OutputFormatArg::Conversation => Box::new(StdoutSink::default()),
        OutputFormatArg::Json => Box::new(JsonSink),
        OutputFormatArg::Compact => Box::new(CompactSink::default()),
    }
}

fn resolve_work_dir(requested: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match requested {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().context("determining current directory")?,
    };
    let canonical = dir
        .canonicalize()
        .with_context(|| format!("working directory does not exist: {}", dir.display()))?;
    Ok(canonical)
}

/// `~/.local/share/orc/sessions` (or platform equivalent via `dirs`).
fn session_storage_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("could not determine a data directory for session storage")?;
    Ok(base.join("orc").join("sessions"))
}

type ResumeState = (String, Vec<orc_model::Message>, orc_core::SessionMetadata);

/// Resolve `--continue`/`--resume` into a concrete prior session to load, if
/// any. Returns `None` for a fresh session.
fn resolve_resume_request(cli: &Cli, session_root: &Path, work_dir: &Path) -> anyhow::Result<Option<ResumeState>> {
    if cli.r#continue {
        let (session_id, pointer_work_dir) = read_current_pointer(session_root)?
            .context("--continue: no previous session has been recorded")?;
        if pointer_work_dir != work_dir {
            anyhow::bail!(
                "--continue: the most recent session was started in {}, not {}",
                pointer_work_dir.display(),
                work_dir.display()
            );
        }
        return Ok(Some(load_session(session_root, &session_id)?));
    }

    if let Some(requested) = &cli.resume {
        let session_id = if requested.is_empty() {
            read_current_pointer(session_root)?
                .map(|(id, _)| id)
                .context("--resume: no previous session has been recorded")?
        } else {
            requested.clone()
        };
        return Ok(Some(load_session(session_root, &session_id)?));
    }

    Ok(None)
}

fn load_session(session_root: &Path, session_id: &str) -> anyhow::Result<ResumeState> {
    let path = session_root.join(format!("session-{session_id}.jsonl"));
    let (messages, metadata) =
        SessionLog::replay(&path).with_context(|| format!("resuming session {session_id}"))?;
    let metadata = metadata.with_context(|| format!("session {session_id} has no saved metadata"))?;
    Ok((session_id.to_string(), messages, metadata))
}

/// Resolves live model ids to live `ModelProvider`s, reading provider API
/// keys/base URLs from the environment. Anthropic-family models expect
/// `ANTHROPIC_API_KEY` (and optionally `ANTHROPIC_BASE_URL`); the Qwen
/// family's OpenAI-compatible endpoint expects `QWEN_API_KEY` (or
/// `DASHSCOPE_API_KEY`) and an optional `QWEN_BASE_URL`.
struct LiveProviderFactory;

impl ProviderFactory for LiveProviderFactory {
    fn build(&self, model_id: &str, tag: ProviderTag) -> Arc<dyn ModelProvider> {
        match tag {
            ProviderTag::Anthropic => {
                let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
                let base_url = std::env::var("ANTHROPIC_BASE_URL").ok();
                Arc::new(AnthropicProvider::new(model_id.to_string(), api_key, base_url))
            }
            ProviderTag::Qwen => {
                let api_key = std::env::var("QWEN_API_KEY").or_else(|_| std::env::var("DASHSCOPE_API_KEY")).ok();
                let base_url = std::env::var("QWEN_BASE_URL")
                    .unwrap_or_else(|_| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string());
                Arc::new(OpenAICompatProvider::new("qwen", model_id.to_string(), api_key, &base_url, AuthStyle::Bearer))
            }
        }
    }
}

/// One instance per agent role: a `DebugProviderFactory` always builds a
/// [`DebugMockProvider`] scripted for the role it was constructed with,
/// since `ProviderFactory::build` itself carries no role information.
struct DebugProviderFactory {
    role: MockRole,
}

impl DebugProviderFactory {
    fn new(role: MockRole) -> Self {
        Self { role }
    }
}

impl ProviderFactory for DebugProviderFactory {
    fn build(&self, _model_id: &str, _tag: ProviderTag) -> Arc<dyn ModelProvider> {
        Arc::new(DebugMockProvider::new(self.role))
    }
}

fn is_stdin_tty() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(io::stdin().as_raw_fd()) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
