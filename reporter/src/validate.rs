//! Report validation for `reporter validate` and post-run checks.
//!
//! Two layers: the JSON Schema in `schemas/weekly_report/v1.schema.json`
//! checks structure, then [`check_report`] enforces naming and consistency
//! rules the schema cannot express.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::report_rules::{Level, check_report};
use crate::io::report_store::read_report_value;

const REPORT_SCHEMA: &str = include_str!("../../schemas/weekly_report/v1.schema.json");

/// Compiled on first use and shared by every check.
static REPORT_VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(REPORT_SCHEMA)
        .map_err(|err| format!("parse report schema: {err}"))?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| format!("compile report schema: {err}"))
});

/// Validation result for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportValidation {
    pub path: Option<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReportValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with every error listed when the report is invalid.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            return Ok(());
        }
        let name = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "report".to_string());
        bail!(
            "{name} failed validation:\n- {}",
            self.errors.join("\n- ")
        );
    }
}

/// Validate an in-memory report.
pub fn validate_report_value(report: &Value, file_stem: Option<&str>) -> Result<ReportValidation> {
    let compiled = REPORT_VALIDATOR
        .as_ref()
        .map_err(|err| anyhow!("{err}"))?;

    let mut errors: Vec<String> = compiled
        .iter_errors(report)
        .map(|err| format!("schema: {err}"))
        .collect();
    let mut warnings = Vec::new();
    for finding in check_report(report, file_stem) {
        match finding.level {
            Level::Error => errors.push(finding.to_string()),
            Level::Warning => warnings.push(finding.to_string()),
        }
    }
    debug!(errors = errors.len(), warnings = warnings.len(), "report checked");

    Ok(ReportValidation {
        path: None,
        errors,
        warnings,
    })
}

/// Read and validate a report file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn validate_report_file(path: &Path) -> Result<ReportValidation> {
    let report = read_report_value(path)?;
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    let mut validation = validate_report_value(&report, stem.as_deref())?;
    validation.path = Some(path.to_path_buf());
    Ok(validation)
}
