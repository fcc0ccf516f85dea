//! Prompt rendering for report runs.
//!
//! Both prompts are minijinja templates compiled into the binary and filled
//! from the `[report]` config section.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::io::config::ReportConfig;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const WEEKLY_TEMPLATE: &str = include_str!("prompts/weekly.md");

/// Rendered prompt pair for one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub system: String,
    pub task: String,
}

/// Render the system and task prompts.
pub fn render_prompts(report: &ReportConfig) -> Result<Prompts> {
    let mut env = Environment::new();
    env.add_template("system", SYSTEM_TEMPLATE)
        .context("load system prompt template")?;
    env.add_template("weekly", WEEKLY_TEMPLATE)
        .context("load weekly prompt template")?;

    let output_dir = report.output_dir.display().to_string();
    let ctx = context! {
        days => report.days,
        min_cvss => report.min_cvss,
        max_new_terms => report.max_new_terms,
        output_dir => output_dir.trim_end_matches('/'),
    };
    let system = env
        .get_template("system")?
        .render(&ctx)
        .context("render system prompt")?;
    let task = env
        .get_template("weekly")?
        .render(&ctx)
        .context("render weekly prompt")?;
    Ok(Prompts { system, task })
}
