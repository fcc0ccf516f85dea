//! Agent abstraction for report runs.
//!
//! The [`Agent`] trait decouples the run driver from the actual agent
//! backend (currently the `claude` CLI in `stream-json` mode). Tests use
//! scripted agents that yield predetermined events without spawning
//! processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::message::{AgentMessage, parse_line};
use crate::io::config::{AgentConfig, PermissionMode};
use crate::io::process::{StreamingChild, spawn_streaming};

/// Keep this many characters of agent stderr in error messages.
const STDERR_TAIL_CHARS: usize = 2_000;

/// Per-run agent settings, built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    pub model: String,
    /// Working directory the agent operates in.
    pub cwd: PathBuf,
    pub max_turns: u32,
    pub permission_mode: PermissionMode,
    pub system_prompt: String,
}

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub prompt: String,
    pub options: AgentOptions,
}

/// Events produced by a running agent, in order.
pub type MessageStream<'a> = Box<dyn Iterator<Item = Result<AgentMessage>> + 'a>;

/// Abstraction over agent backends.
pub trait Agent {
    /// Start the agent. Errors raised while starting and errors yielded by
    /// the stream are both run failures.
    fn query(&self, request: &QueryRequest) -> Result<MessageStream<'_>>;
}

/// Agent that spawns the `claude` CLI in print mode.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    command: Vec<String>,
    stderr_limit_bytes: usize,
    exit_grace: Duration,
    transcript_path: Option<PathBuf>,
}

impl ClaudeCli {
    pub fn new(config: &AgentConfig, transcript_path: Option<PathBuf>) -> Self {
        Self {
            command: config.command.clone(),
            stderr_limit_bytes: config.stderr_limit_bytes,
            exit_grace: Duration::from_secs(config.exit_grace_secs),
            transcript_path,
        }
    }

    /// Arguments appended after the configured command.
    pub fn cli_args(options: &AgentOptions) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            options.model.clone(),
            "--max-turns".to_string(),
            options.max_turns.to_string(),
            "--permission-mode".to_string(),
            options.permission_mode.as_str().to_string(),
        ];
        if options.permission_mode == PermissionMode::BypassPermissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args.push("--system-prompt".to_string());
        args.push(options.system_prompt.clone());
        args
    }
}

impl Agent for ClaudeCli {
    #[instrument(skip_all, fields(model = %request.options.model, max_turns = request.options.max_turns))]
    fn query(&self, request: &QueryRequest) -> Result<MessageStream<'_>> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        info!(program = %program, cwd = %request.options.cwd.display(), "starting agent");

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .args(Self::cli_args(&request.options))
            .current_dir(&request.options.cwd);

        let child = spawn_streaming(
            cmd,
            request.prompt.as_bytes(),
            self.stderr_limit_bytes,
            self.exit_grace,
            self.transcript_path.as_deref(),
        )?;
        Ok(Box::new(CliMessages {
            child,
            done: false,
        }))
    }
}

/// Parses the CLI's stdout into events; reaps the child at end of stream.
struct CliMessages {
    child: StreamingChild,
    done: bool,
}

impl CliMessages {
    fn next_message(&mut self) -> Result<Option<AgentMessage>> {
        while let Some(line) = self.child.next_line()? {
            if let Some(message) = parse_line(&line)? {
                return Ok(Some(message));
            }
        }

        let exit = self.child.finish()?;
        if exit.status.success() {
            return Ok(None);
        }
        let tail = exit.stderr_tail(STDERR_TAIL_CHARS);
        let status = if exit.killed {
            "was killed after its output closed".to_string()
        } else {
            format!("exited with {}", exit.status)
        };
        if tail.is_empty() {
            Err(anyhow!("agent {status}"))
        } else {
            Err(anyhow!("agent {status}: {tail}"))
        }
    }
}

impl Iterator for CliMessages {
    type Item = Result<AgentMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => {
                debug!("agent stream exhausted");
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(mode: PermissionMode) -> AgentOptions {
        AgentOptions {
            model: "claude-test".to_string(),
            cwd: PathBuf::from("."),
            max_turns: 12,
            permission_mode: mode,
            system_prompt: "be brief".to_string(),
        }
    }

    #[test]
    fn cli_args_carry_options() {
        let args = ClaudeCli::cli_args(&options(PermissionMode::BypassPermissions));
        let joined = args.join(" ");
        assert!(joined.starts_with("--print --output-format stream-json --verbose"));
        assert!(joined.contains("--model claude-test"));
        assert!(joined.contains("--max-turns 12"));
        assert!(joined.contains("--permission-mode bypassPermissions"));
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
        assert_eq!(args[args.len() - 2..], ["--system-prompt", "be brief"]);
    }

    #[test]
    fn skip_permissions_only_in_bypass_mode() {
        let args = ClaudeCli::cli_args(&options(PermissionMode::AcceptEdits));
        assert!(!args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::io::config::AgentConfig;

        fn agent(script: &str) -> ClaudeCli {
            let config = AgentConfig {
                command: vec!["sh".to_string(), "-c".to_string(), script.to_string(), "fake-agent".to_string()],
                exit_grace_secs: 5,
                ..AgentConfig::default()
            };
            ClaudeCli::new(&config, None)
        }

        fn request() -> QueryRequest {
            QueryRequest {
                prompt: "weekly".to_string(),
                options: options(PermissionMode::BypassPermissions),
            }
        }

        #[test]
        fn streams_events_from_stdout() {
            let agent = agent(
                r#"cat >/dev/null
echo '{"type":"system","subtype":"init"}'
echo ''
echo '{"type":"result","subtype":"success","total_cost_usd":0.5,"usage":{"input_tokens":3,"output_tokens":4}}'"#,
            );
            let messages: Vec<AgentMessage> = agent
                .query(&request())
                .expect("query")
                .collect::<Result<_>>()
                .expect("stream");
            assert_eq!(messages.len(), 2);
            assert!(matches!(messages[0], AgentMessage::System(_)));
            assert!(matches!(messages[1], AgentMessage::Result(_)));
        }

        #[test]
        fn non_zero_exit_is_a_stream_error() {
            let agent = agent("cat >/dev/null; echo 'token rejected' >&2; exit 3");
            let mut stream = agent.query(&request()).expect("query");
            let err = stream.next().expect("item").unwrap_err();
            let message = err.to_string();
            assert!(message.contains("exited with"));
            assert!(message.contains("token rejected"));
            assert!(stream.next().is_none());
        }

        #[test]
        fn malformed_line_is_a_stream_error() {
            let agent = agent("cat >/dev/null; echo 'not json'");
            let mut stream = agent.query(&request()).expect("query");
            let err = stream.next().expect("item").unwrap_err();
            assert!(err.to_string().contains("parse agent event"));
        }

        #[test]
        fn early_exit_keeps_agent_stderr() {
            let agent = agent("echo denied >&2; exit 1");
            let request = QueryRequest {
                prompt: "週報".repeat(50_000),
                ..request()
            };
            let mut stream = agent.query(&request).expect("query");
            let err = stream.next().expect("item").unwrap_err();
            let message = err.to_string();
            assert!(message.contains("exited with"), "{message}");
            assert!(message.contains("denied"), "{message}");
        }

        #[test]
        fn dropping_stream_kills_lingering_agent() {
            let config = AgentConfig {
                command: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    r#"cat >/dev/null
echo '{"type":"result","subtype":"success"}'
exec sleep 30"#
                        .to_string(),
                ],
                exit_grace_secs: 1,
                ..AgentConfig::default()
            };
            let agent = ClaudeCli::new(&config, None);
            let mut stream = agent.query(&request()).expect("query");
            let first = stream.next().expect("item").expect("message");
            assert!(matches!(first, AgentMessage::Result(_)));

            let started = std::time::Instant::now();
            drop(stream);
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[test]
        fn missing_program_fails_to_start() {
            let config = AgentConfig {
                command: vec!["definitely-not-a-real-agent-binary".to_string()],
                ..AgentConfig::default()
            };
            let err = ClaudeCli::new(&config, None).query(&request()).err().expect("error");
            assert!(format!("{err:#}").contains("spawn command"));
        }
    }
}
