//! Naming and consistency rules for report JSON beyond what the schema
//! expresses.
//!
//! Alias field names are errors: downstream renderers read only the
//! canonical names, so an aliased field silently drops content. Count and
//! band mismatches are warnings.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::core::report::{DATE_FORMAT, accepted_report_ids, severity_for_cvss};

static W_PREFIXED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SEC-WEEKLY-(\d{4})-W(\d{2})$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// A single rule violation, addressed by a JSON-pointer-like path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub level: Level,
    pub path: String,
    pub message: String,
}

impl Finding {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// (section, alias, canonical) pairs the agent is known to confuse.
const ALIASES: &[(&str, &str, &str)] = &[
    ("events", "description", "summary"),
    ("vulnerabilities", "cve", "cve_id"),
    ("vulnerabilities", "cvss_score", "cvss"),
    ("action_items", "title", "action"),
    ("action_items", "description", "action"),
];

/// Check a parsed report. `file_stem` is the report file name without
/// extension, when the report came from disk.
pub fn check_report(report: &Value, file_stem: Option<&str>) -> Vec<Finding> {
    let mut findings = Vec::new();
    check_aliases(report, &mut findings);
    check_report_id(report, file_stem, &mut findings);
    check_summary_counts(report, &mut findings);
    check_vulnerability_bands(report, &mut findings);
    check_terms(report, &mut findings);
    findings
}

fn items<'a>(report: &'a Value, section: &str) -> &'a [Value] {
    report
        .get(section)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn check_aliases(report: &Value, findings: &mut Vec<Finding>) {
    for (section, alias, canonical) in ALIASES {
        for (idx, item) in items(report, section).iter().enumerate() {
            if item.get(alias).is_some() {
                findings.push(Finding::error(
                    format!("/{section}/{idx}/{alias}"),
                    format!("use `{canonical}`, not `{alias}`"),
                ));
            }
        }
    }
}

fn check_report_id(report: &Value, file_stem: Option<&str>, findings: &mut Vec<Finding>) {
    let Some(report_id) = report.get("report_id").and_then(Value::as_str) else {
        return;
    };

    if let Some(caps) = W_PREFIXED_ID.captures(report_id) {
        findings.push(Finding::error(
            "/report_id",
            format!(
                "week number must not carry a `W` prefix (expected SEC-WEEKLY-{}-{})",
                &caps[1], &caps[2]
            ),
        ));
    }

    if let Some(stem) = file_stem
        && stem != report_id
    {
        findings.push(Finding::warning(
            "/report_id",
            format!("file is named {stem} but report_id is {report_id}"),
        ));
    }

    let start = report
        .pointer("/period/start")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());
    if let Some(start) = start {
        let accepted = accepted_report_ids(start);
        if !accepted.iter().any(|id| id == report_id) {
            findings.push(Finding::warning(
                "/report_id",
                format!(
                    "period starts {start} which maps to {}, not {report_id}",
                    accepted[0]
                ),
            ));
        }
    }
}

fn check_summary_counts(report: &Value, findings: &mut Vec<Finding>) {
    for (field, section) in [
        ("total_events", "events"),
        ("total_vulnerabilities", "vulnerabilities"),
    ] {
        let Some(declared) = report
            .pointer(&format!("/summary/{field}"))
            .and_then(Value::as_u64)
        else {
            continue;
        };
        let actual = items(report, section).len() as u64;
        if declared != actual {
            findings.push(Finding::warning(
                format!("/summary/{field}"),
                format!("declares {declared} but {section} has {actual} entries"),
            ));
        }
    }
}

fn check_vulnerability_bands(report: &Value, findings: &mut Vec<Finding>) {
    for (idx, vuln) in items(report, "vulnerabilities").iter().enumerate() {
        let (Some(cvss), Some(severity)) = (
            vuln.get("cvss").and_then(Value::as_f64),
            vuln.get("severity").and_then(Value::as_str),
        ) else {
            continue;
        };
        let expected = severity_for_cvss(cvss);
        if severity != expected {
            findings.push(Finding::warning(
                format!("/vulnerabilities/{idx}/severity"),
                format!("cvss {cvss} is {expected}, not {severity}"),
            ));
        }
    }
}

fn check_terms(report: &Value, findings: &mut Vec<Finding>) {
    if report.get("terms").and_then(Value::as_array).is_some_and(Vec::is_empty) {
        findings.push(Finding::warning(
            "/terms",
            "no glossary terms were extracted for this report",
        ));
    }
}
