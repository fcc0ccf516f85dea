//! Weekly report naming conventions and the lenient header view used by
//! listing and feed generation.
//!
//! The agent writes the report JSON; this crate only reads it. Headers
//! tolerate missing fields so a partially valid report can still be listed.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

/// Prefix shared by every report id and report file name.
pub const REPORT_PREFIX: &str = "SEC-WEEKLY-";

/// Date format used by `period`, `publish_date`, and event dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Report id for the ISO week containing `date`, e.g. `SEC-WEEKLY-2026-08`.
pub fn report_id_for(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{REPORT_PREFIX}{}-{:02}", week.year(), week.week())
}

/// Ids a report starting on `start` may carry.
///
/// The draft tool pairs the ISO week number with the calendar year, which
/// differs from [`report_id_for`] around New Year; both are accepted.
pub fn accepted_report_ids(start: NaiveDate) -> Vec<String> {
    let iso = report_id_for(start);
    let calendar = format!(
        "{REPORT_PREFIX}{}-{:02}",
        start.year(),
        start.iso_week().week()
    );
    if calendar == iso {
        vec![iso]
    } else {
        vec![iso, calendar]
    }
}

/// Whether a file name looks like a stored report (`SEC-WEEKLY-*.json`).
pub fn is_report_file_name(name: &str) -> bool {
    name.starts_with(REPORT_PREFIX) && name.ends_with(".json")
}

/// Severity band for a CVSS base score.
pub fn severity_for_cvss(cvss: f64) -> &'static str {
    if cvss >= 9.0 {
        "critical"
    } else if cvss >= 7.0 {
        "high"
    } else if cvss >= 4.0 {
        "medium"
    } else {
        "low"
    }
}

/// Human label for a threat level; unknown levels read as "normal".
pub fn threat_level_label(level: &str) -> &'static str {
    match level {
        "elevated" => "升高",
        "high" => "高",
        "critical" => "嚴重",
        _ => "一般",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportHeader {
    pub title: String,
    pub report_id: String,
    pub period: Period,
    pub publish_date: String,
    pub summary: ReportSummary,
    pub events: Vec<EventHeadline>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Period {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportSummary {
    pub total_events: u64,
    pub total_vulnerabilities: u64,
    pub threat_level: String,
}

impl Default for ReportSummary {
    fn default() -> Self {
        Self {
            total_events: 0,
            total_vulnerabilities: 0,
            threat_level: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventHeadline {
    pub title: String,
}
