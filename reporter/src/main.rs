//! Weekly security report generator.
//!
//! `reporter run` drives the agent that researches and writes the week's
//! report; `validate`, `list` and `feed` work on the reports it produced.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use reporter::exit_codes;
use reporter::feed::generate_feed;
use reporter::io::agent::ClaudeCli;
use reporter::io::config::{DEFAULT_CONFIG_FILE, ReporterConfig, load_config};
use reporter::io::env::ProcessEnv;
use reporter::io::report_store::{latest_report, list_reports, report_files};
use reporter::logging;
use reporter::run::{Console, RunSettings, run_report};
use reporter::validate::validate_report_file;

const DEFAULT_LIST_LIMIT: u64 = 10;

#[derive(Parser)]
#[command(
    name = "reporter",
    version,
    about = "Agent-driven weekly security report generator",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent once to produce this week's report (default).
    Run(RunArgs),
    /// Check reports against the schema and naming rules.
    Validate {
        /// Report file to check. Defaults to every report in the reports dir.
        #[arg(conflicts_with = "latest")]
        path: Option<PathBuf>,
        /// Only check the newest report.
        #[arg(long)]
        latest: bool,
        #[command(flatten)]
        dirs: ReportsDirArgs,
    },
    /// Print the newest reports.
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT, value_parser = clap::value_parser!(u64).range(1..))]
        limit: u64,
        #[command(flatten)]
        dirs: ReportsDirArgs,
    },
    /// Write the RSS feed for the newest reports.
    Feed {
        /// Directory receiving `feed.xml` (config `feed.output_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Items kept in the feed (config `feed.max_items`).
        #[arg(long)]
        max_items: Option<usize>,
        #[command(flatten)]
        dirs: ReportsDirArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Config file (defaults to `security-weekly.toml` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Model override; wins over `CLAUDE_MODEL` and the config file.
    #[arg(long)]
    model: Option<String>,
    /// Turn budget override.
    #[arg(long)]
    max_turns: Option<u32>,
    /// Tee every raw agent event line to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,
    /// Validate the newest report after a successful run.
    #[arg(long)]
    validate: bool,
}

#[derive(Args, Debug, Clone, Default)]
struct ReportsDirArgs {
    /// Config file (defaults to `security-weekly.toml` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reports directory (config `report.output_dir`).
    #[arg(long)]
    reports_dir: Option<PathBuf>,
}

impl ReportsDirArgs {
    fn resolve(&self) -> Result<(ReporterConfig, PathBuf)> {
        let config = load(self.config.as_deref())?;
        let dir = self
            .reports_dir
            .clone()
            .unwrap_or_else(|| config.report.output_dir.clone());
        Ok((config, dir))
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_codes::FAILURE);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => cmd_run(args),
        Command::Validate { path, latest, dirs } => cmd_validate(path, latest, &dirs),
        Command::List { limit, dirs } => cmd_list(limit, &dirs),
        Command::Feed {
            output_dir,
            max_items,
            dirs,
        } => cmd_feed(output_dir, max_items, &dirs),
    }
}

fn load(path: Option<&Path>) -> Result<ReporterConfig> {
    load_config(path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)))
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let cwd = env::current_dir().context("resolve working directory")?;
    let config = load(args.config.as_deref())?;
    let agent = ClaudeCli::new(&config.agent, args.transcript);
    let settings = RunSettings {
        config,
        model: args.model,
        max_turns: args.max_turns,
        cwd,
        validate_output: args.validate,
    };
    run_report(&agent, &ProcessEnv, &settings, &mut Console::stdio())?;
    Ok(())
}

fn cmd_validate(path: Option<PathBuf>, latest: bool, dirs: &ReportsDirArgs) -> Result<()> {
    let (_, dir) = dirs.resolve()?;
    let paths = match path {
        Some(path) => vec![path],
        None if latest => {
            let newest = latest_report(&dir)?
                .with_context(|| format!("no report found in {}", dir.display()))?;
            vec![newest]
        }
        None => report_files(&dir)?,
    };
    if paths.is_empty() {
        bail!("no report found in {}", dir.display());
    }

    let mut failed = 0;
    for path in &paths {
        let validation = match validate_report_file(path) {
            Ok(validation) => validation,
            Err(err) => {
                eprintln!("{err:#}");
                failed += 1;
                continue;
            }
        };
        for warning in &validation.warnings {
            eprintln!("warning: {}: {warning}", path.display());
        }
        match validation.ensure_valid() {
            Ok(()) => println!("ok {}", path.display()),
            Err(err) => {
                eprintln!("{err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} reports failed validation", paths.len());
    }
    Ok(())
}

fn cmd_list(limit: u64, dirs: &ReportsDirArgs) -> Result<()> {
    let (_, dir) = dirs.resolve()?;
    let limit = usize::try_from(limit).context("--limit is too large")?;
    let reports = list_reports(&dir, limit)?;
    if reports.is_empty() {
        println!("no reports found");
        return Ok(());
    }
    for report in reports {
        println!(
            "{}  {} ~ {}  published {}",
            report.report_id, report.period_start, report.period_end, report.publish_date
        );
    }
    Ok(())
}

fn cmd_feed(
    output_dir: Option<PathBuf>,
    max_items: Option<usize>,
    dirs: &ReportsDirArgs,
) -> Result<()> {
    let (config, dir) = dirs.resolve()?;
    let mut feed = config.feed;
    if let Some(output_dir) = output_dir {
        feed.output_dir = output_dir;
    }
    if let Some(max_items) = max_items {
        if max_items == 0 {
            bail!("--max-items must be > 0");
        }
        feed.max_items = max_items;
    }
    let summary = generate_feed(&dir, &feed)?;
    println!("Found {} reports", summary.reports_found);
    println!("Included {} items", summary.items);
    println!(
        "Wrote {} ({:.1} KB)",
        summary.path.display(),
        summary.bytes as f64 / 1024.0
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_runs() {
        let cli = Cli::parse_from(["reporter"]);
        assert!(cli.command.is_none());
        assert!(!cli.run.validate);
    }

    #[test]
    fn top_level_run_flags() {
        let cli = Cli::parse_from(["reporter", "--model", "claude-opus-4-1", "--validate"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.run.model.as_deref(), Some("claude-opus-4-1"));
        assert!(cli.run.validate);
    }

    #[test]
    fn parse_run_subcommand() {
        let cli = Cli::parse_from(["reporter", "run", "--max-turns", "5"]);
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_turns, Some(5));
    }

    #[test]
    fn parse_validate_latest() {
        let cli = Cli::parse_from(["reporter", "validate", "--latest", "--reports-dir", "out"]);
        let Some(Command::Validate { path, latest, dirs }) = cli.command else {
            panic!("expected validate");
        };
        assert!(path.is_none());
        assert!(latest);
        assert_eq!(dirs.reports_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn validate_path_conflicts_with_latest() {
        let parsed = Cli::try_parse_from(["reporter", "validate", "a.json", "--latest"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn list_limit_defaults_to_ten() {
        let cli = Cli::parse_from(["reporter", "list"]);
        assert!(matches!(cli.command, Some(Command::List { limit: 10, .. })));
    }

    #[test]
    fn list_limit_must_be_positive() {
        assert!(Cli::try_parse_from(["reporter", "list", "--limit", "0"]).is_err());
        let cli = Cli::parse_from(["reporter", "list", "--limit", "3"]);
        assert!(matches!(cli.command, Some(Command::List { limit: 3, .. })));
    }

    #[test]
    fn run_flags_conflict_with_other_subcommands() {
        let parsed = Cli::try_parse_from(["reporter", "--validate", "list"]);
        assert!(parsed.is_err());
    }
}
