//! CLI tests for `reporter run`.
//!
//! Spawns the reporter binary against a shell-script agent configured through
//! `security-weekly.toml` and checks console output, exit codes, and the
//! arguments the agent received.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use reporter::exit_codes;
use reporter::io::env::{CREDENTIAL_VAR, DEBUG_VAR, MODEL_VAR};
use reporter::test_support::{result_line, sample_report, write_report};

const TEXT: &str =
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Collecting news"}]}}"#;
const TOOL: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"mcp__security-news__fetch_security_news","input":{}}]}}"#;
const SYSTEM: &str = r#"{"type":"system","subtype":"init","session_id":"s-1"}"#;

/// Scratch working directory holding a fake agent and its config.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    /// `body` runs after the agent records its args and prompt.
    fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("agent.sh");
        fs::write(
            &script,
            format!(
                "here=$(dirname \"$0\")\nprintf '%s\\n' \"$@\" > \"$here/args.txt\"\ncat > \"$here/prompt.txt\"\n{body}\n"
            ),
        )
        .expect("write agent script");
        fs::write(
            dir.path().join("security-weekly.toml"),
            format!(
                "[agent]\ncommand = [\"sh\", '{}']\nexit_grace_secs = 5\n",
                script.display()
            ),
        )
        .expect("write config");
        Self { dir }
    }

    fn emitting(lines: &[&str]) -> Self {
        let body: Vec<String> = lines.iter().map(|line| format!("echo '{line}'")).collect();
        Self::new(&body.join("\n"))
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_reporter"));
        cmd.current_dir(self.path())
            .env(CREDENTIAL_VAR, "test-token")
            .env_remove(MODEL_VAR)
            .env_remove(DEBUG_VAR)
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run reporter")
    }

    fn agent_args(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("args.txt"))
            .expect("agent args")
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn reports_dir(&self) -> PathBuf {
        self.path().join("output/reports")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1).cloned())
}

#[test]
fn successful_run_prints_stats_and_exits_ok() {
    let ws = Workspace::emitting(&[TEXT, TOOL, &result_line("success", 12_345, 678, 0.1234)]);
    let output = ws.run(&[]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Weekly Security Report Generator"));
    assert!(out.contains("Collecting news\n[Tool] mcp__security-news__fetch_security_news\n"));
    assert!(out.contains("Execution Complete"));
    assert!(out.contains("Input tokens: 12,345"));
    assert!(out.contains("Cost: $0.1234"));
    assert!(out.trim_end().ends_with("Done!"));

    let args = ws.agent_args();
    assert_eq!(args[0], "--print");
    assert_eq!(flag_value(&args, "--output-format").as_deref(), Some("stream-json"));
    assert_eq!(
        flag_value(&args, "--model").as_deref(),
        Some("claude-sonnet-4-20250514")
    );
    assert_eq!(flag_value(&args, "--max-turns").as_deref(), Some("50"));
    assert!(args.contains(&"--dangerously-skip-permissions".to_string()));

    let prompt = fs::read_to_string(ws.path().join("prompt.txt")).expect("prompt");
    assert!(prompt.contains("收集最近 7 天的新聞"));
}

#[test]
fn run_subcommand_matches_default() {
    let ws = Workspace::emitting(&[&result_line("success", 1, 1, 0.0)]);
    let output = ws.run(&["run", "--max-turns", "7"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert_eq!(flag_value(&ws.agent_args(), "--max-turns").as_deref(), Some("7"));
}

#[test]
fn missing_token_fails_before_agent_starts() {
    let ws = Workspace::emitting(&[&result_line("success", 1, 1, 0.0)]);
    let output = ws
        .command()
        .env_remove(CREDENTIAL_VAR)
        .output()
        .expect("run reporter");

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let err = stderr(&output);
    assert!(err.contains(CREDENTIAL_VAR));
    assert!(err.contains("claude setup-token"));
    assert!(!ws.path().join("args.txt").exists());
}

#[test]
fn non_success_status_fails() {
    let ws = Workspace::emitting(&[&result_line("error_max_turns", 10, 20, 0.5)]);
    let output = ws.run(&[]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(stdout(&output).contains("Status: error_max_turns"));
    assert!(stderr(&output).contains("Query ended with status \"error_max_turns\""));
    assert!(!stdout(&output).contains("Done!"));
}

#[test]
fn agent_crash_surfaces_its_stderr() {
    let ws = Workspace::new("echo 'OAuth token has expired' >&2\nexit 2");
    let output = ws.run(&[]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let err = stderr(&output);
    assert!(err.contains("agent stream failed"));
    assert!(err.contains("OAuth token has expired"));
}

#[test]
fn stream_without_result_fails() {
    let ws = Workspace::emitting(&[TEXT]);
    let output = ws.run(&[]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(stderr(&output).contains("without a result event"));
}

#[test]
fn model_precedence_cli_then_env() {
    let ws = Workspace::emitting(&[&result_line("success", 1, 1, 0.0)]);

    let output = ws
        .command()
        .env(MODEL_VAR, "claude-opus-4-1")
        .output()
        .expect("run reporter");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        flag_value(&ws.agent_args(), "--model").as_deref(),
        Some("claude-opus-4-1")
    );
    assert!(stdout(&output).contains("Model: claude-opus-4-1"));

    let output = ws
        .command()
        .env(MODEL_VAR, "claude-opus-4-1")
        .args(["--model", "claude-haiku"])
        .output()
        .expect("run reporter");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        flag_value(&ws.agent_args(), "--model").as_deref(),
        Some("claude-haiku")
    );
}

#[test]
fn debug_dumps_system_events() {
    let ws = Workspace::emitting(&[SYSTEM, &result_line("success", 1, 1, 0.0)]);

    let quiet = ws.run(&[]);
    assert!(!stdout(&quiet).contains("[System]"));

    let loud = ws
        .command()
        .env(DEBUG_VAR, "1")
        .output()
        .expect("run reporter");
    let out = stdout(&loud);
    assert!(out.contains("[System] {"));
    assert!(out.contains("\"session_id\": \"s-1\""));
}

#[test]
fn transcript_records_raw_events() {
    let ws = Workspace::emitting(&[TEXT, &result_line("success", 1, 1, 0.0)]);
    let transcript = ws.path().join("logs/transcript.jsonl");
    let output = ws.run(&["--transcript", transcript.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));

    let recorded = fs::read_to_string(&transcript).expect("transcript");
    let lines: Vec<&str> = recorded.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], TEXT);
}

#[test]
fn validate_flag_checks_newest_report() {
    let ws = Workspace::emitting(&[&result_line("success", 1, 1, 0.0)]);
    write_report(&ws.reports_dir(), "SEC-WEEKLY-2026-08.json", &sample_report());

    let output = ws.run(&["--validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    assert!(stdout(&output).contains("Validated "));

    let mut broken = sample_report();
    broken
        .as_object_mut()
        .expect("object")
        .remove("references");
    write_report(&ws.reports_dir(), "SEC-WEEKLY-2026-09.json", &broken);

    let output = ws.run(&["--validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    let err = stderr(&output);
    assert!(err.contains("SEC-WEEKLY-2026-09.json failed validation"));
    assert!(err.contains("references"));
}

#[test]
fn invalid_config_fails() {
    let ws = Workspace::emitting(&[&result_line("success", 1, 1, 0.0)]);
    fs::write(
        ws.path().join("security-weekly.toml"),
        "[agent]\nmax_turns = 0\n",
    )
    .expect("write config");
    let output = ws.run(&[]);
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(stderr(&output).contains("max_turns"));
}
