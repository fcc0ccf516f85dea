//! Orchestration for a single `reporter run`.
//!
//! Checks the credential, renders the prompts, starts the agent and renders
//! its event stream to the console until the first terminal event, stream
//! error, or end of stream.

use std::io::{self, Stderr, Stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::message::{AgentMessage, ContentBlock, ResultMessage};
use crate::core::render::{banner, stats_block, tool_use_line};
use crate::core::run_state::RunState;
use crate::io::agent::{Agent, AgentOptions, QueryRequest};
use crate::io::config::ReporterConfig;
use crate::io::env::{DEBUG_VAR, Env, MODEL_VAR, require_credential};
use crate::io::prompt::render_prompts;
use crate::io::report_store::latest_report;
use crate::validate::validate_report_file;

/// Destination for product output.
pub struct Console<O: Write, E: Write> {
    pub out: O,
    pub err: E,
}

impl Console<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self {
            out: io::stdout(),
            err: io::stderr(),
        }
    }
}

impl<O: Write, E: Write> Console<O, E> {
    fn print(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .context("write to stdout")
    }

    fn eprint(&mut self, text: &str) -> Result<()> {
        self.err
            .write_all(text.as_bytes())
            .and_then(|()| self.err.flush())
            .context("write to stderr")
    }
}

/// Inputs for one run, resolved by the CLI layer.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub config: ReporterConfig,
    /// `--model`; wins over the environment and the config file.
    pub model: Option<String>,
    /// `--max-turns`; wins over the config file.
    pub max_turns: Option<u32>,
    pub cwd: PathBuf,
    /// Validate the newest report once the agent succeeds.
    pub validate_output: bool,
}

impl RunSettings {
    /// Model precedence: CLI, then `CLAUDE_MODEL`, then the config file.
    pub fn resolve_model(&self, env: &dyn Env) -> String {
        self.model
            .clone()
            .filter(|model| !model.is_empty())
            .or_else(|| env.non_empty(MODEL_VAR))
            .unwrap_or_else(|| self.config.agent.model.clone())
    }

    pub fn resolve_max_turns(&self) -> u32 {
        self.max_turns.unwrap_or(self.config.agent.max_turns)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub model: String,
    pub result: ResultMessage,
    pub elapsed: Duration,
    /// Report checked by `--validate`, if requested.
    pub validated_report: Option<PathBuf>,
}

/// Run the agent once and render its stream.
#[instrument(skip_all, fields(cwd = %settings.cwd.display()))]
pub fn run_report<A: Agent, O: Write, E: Write>(
    agent: &A,
    env: &dyn Env,
    settings: &RunSettings,
    console: &mut Console<O, E>,
) -> Result<RunSummary> {
    let start = Instant::now();
    require_credential(env)?;

    let prompts = render_prompts(&settings.config.report)?;
    let model = settings.resolve_model(env);
    let request = QueryRequest {
        prompt: prompts.task,
        options: AgentOptions {
            model: model.clone(),
            cwd: settings.cwd.clone(),
            max_turns: settings.resolve_max_turns(),
            permission_mode: settings.config.agent.permission_mode,
            system_prompt: prompts.system,
        },
    };

    let started_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    console.print(&banner(
        &model,
        &settings.cwd.display().to_string(),
        &started_at,
    ))?;

    let debug_dump = env.is_set(DEBUG_VAR);
    let mut state = RunState::Running;
    let mut last_result = None;
    match agent.query(&request) {
        Err(err) => {
            warn!(error = %format!("{err:#}"), "agent failed to start");
            state = state.on_stream_error(format!("{err:#}"));
        }
        Ok(stream) => {
            for item in stream {
                match item {
                    Ok(message) => {
                        render_message(&message, start, debug_dump, console)?;
                        state = state.on_message(&message);
                        if let AgentMessage::Result(result) = message {
                            last_result = Some(result);
                        }
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "agent stream error");
                        state = state.on_stream_error(format!("{err:#}"));
                    }
                }
                if state.is_terminal() {
                    break;
                }
            }
        }
    }
    let state = state.on_stream_end();
    debug!(state = ?state, "stream closed");

    let result = match (state, last_result) {
        (RunState::Succeeded, Some(result)) => result,
        (RunState::Failed(kind), _) => return Err(anyhow!(kind.describe())),
        (state, _) => return Err(anyhow!("run ended in unexpected state {state:?}")),
    };
    console.print("\nDone!\n")?;
    info!(
        input_tokens = result.usage.input_tokens,
        output_tokens = result.usage.output_tokens,
        "run succeeded"
    );

    let validated_report = if settings.validate_output {
        Some(validate_latest(settings, console)?)
    } else {
        None
    };

    Ok(RunSummary {
        model,
        result,
        elapsed: start.elapsed(),
        validated_report,
    })
}

fn render_message<O: Write, E: Write>(
    message: &AgentMessage,
    start: Instant,
    debug_dump: bool,
    console: &mut Console<O, E>,
) -> Result<()> {
    match message {
        AgentMessage::Assistant(assistant) => {
            for block in &assistant.message.content {
                match block {
                    ContentBlock::Text { text } => console.print(text)?,
                    ContentBlock::ToolUse { name, .. } => {
                        debug!(tool = %name, "tool use");
                        console.print(&tool_use_line(name))?;
                    }
                    ContentBlock::Other => {}
                }
            }
        }
        AgentMessage::Result(result) => {
            console.print(&stats_block(result, start.elapsed()))?;
        }
        AgentMessage::System(system) if debug_dump => {
            let pretty = serde_json::to_string_pretty(&system.to_value())
                .context("serialize system event")?;
            console.print(&format!("[System] {pretty}\n"))?;
        }
        AgentMessage::System(_) | AgentMessage::Other => {}
    }
    Ok(())
}

fn validate_latest<O: Write, E: Write>(
    settings: &RunSettings,
    console: &mut Console<O, E>,
) -> Result<PathBuf> {
    let dir = settings.cwd.join(&settings.config.report.output_dir);
    let path = latest_report(&dir)?
        .ok_or_else(|| anyhow!("no report found in {}", dir.display()))?;
    let validation = validate_report_file(&path)?;
    for warning in &validation.warnings {
        console.eprint(&format!("warning: {warning}\n"))?;
    }
    validation.ensure_valid()?;
    console.print(&format!("Validated {}\n", path.display()))?;
    Ok(path)
}
