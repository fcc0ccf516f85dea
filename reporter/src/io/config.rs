//! Reporter configuration stored in `security-weekly.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "security-weekly.toml";

/// Model used when neither the CLI, the environment, nor the file names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Reporter configuration (TOML).
///
/// Missing fields default to the values the weekly job has always run with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReporterConfig {
    pub agent: AgentConfig,
    pub report: ReportConfig,
    pub feed: FeedConfig,
}

/// How the agent CLI is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Program and leading arguments (e.g. `["claude"]`).
    pub command: Vec<String>,
    pub model: String,
    /// Turn budget handed to the agent; the only bound on run length.
    pub max_turns: u32,
    pub permission_mode: PermissionMode,
    /// Seconds to wait for the agent to exit after its stream closes.
    pub exit_grace_secs: u64,
    /// Keep at most this many bytes of agent stderr for diagnostics.
    pub stderr_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string()],
            model: DEFAULT_MODEL.to_string(),
            max_turns: 50,
            permission_mode: PermissionMode::BypassPermissions,
            exit_grace_secs: 10,
            stderr_limit_bytes: 100_000,
        }
    }
}

/// Agent permission modes accepted by `--permission-mode`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }
}

/// Inputs to the task prompt and where reports land.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// News lookback window in days.
    pub days: u32,
    /// Minimum CVSS score for the vulnerability fetch.
    pub min_cvss: f64,
    /// Cap on glossary terms created per report.
    pub max_new_terms: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output/reports"),
            days: 7,
            min_cvss: 7.0,
            max_new_terms: 5,
        }
    }
}

/// RSS feed metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub site_url: String,
    pub title: String,
    pub description: String,
    pub output_dir: PathBuf,
    pub max_items: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            site_url: "https://astroicers.github.io/security-glossary-tw/weekly".to_string(),
            title: "資安週報 | Security Weekly TW".to_string(),
            description: "台灣資安週報，每週更新最新資安威脅、漏洞與新聞".to_string(),
            output_dir: PathBuf::from("docs"),
            max_items: 20,
        }
    }
}

impl ReporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.agent.model.trim().is_empty() {
            return Err(anyhow!("agent.model must not be empty"));
        }
        if self.agent.max_turns == 0 {
            return Err(anyhow!("agent.max_turns must be > 0"));
        }
        if self.agent.stderr_limit_bytes == 0 {
            return Err(anyhow!("agent.stderr_limit_bytes must be > 0"));
        }
        if self.report.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("report.output_dir must not be empty"));
        }
        if self.report.days == 0 {
            return Err(anyhow!("report.days must be > 0"));
        }
        if !(0.0..=10.0).contains(&self.report.min_cvss) {
            return Err(anyhow!("report.min_cvss must be within 0.0..=10.0"));
        }
        if self.feed.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("feed.output_dir must not be empty"));
        }
        if self.feed.max_items == 0 {
            return Err(anyhow!("feed.max_items must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ReporterConfig::default()`.
pub fn load_config(path: &Path) -> Result<ReporterConfig> {
    if !path.exists() {
        let cfg = ReporterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ReporterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
