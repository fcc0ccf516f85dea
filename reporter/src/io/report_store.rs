//! Read access to report files under the reports directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::report::{ReportHeader, is_report_file_name};

/// Report files in `dir`, newest first by file name.
///
/// A missing directory yields an empty list.
pub fn report_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let name = entry.file_name();
        if is_report_file_name(&name.to_string_lossy()) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(files)
}

/// Most recent report file in `dir`, if any.
pub fn latest_report(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(report_files(dir)?.into_iter().next())
}

pub fn read_report_value(path: &Path) -> Result<Value> {
    read_json(path)
}

pub fn read_report_header(path: &Path) -> Result<ReportHeader> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read report {}", path.display()))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(value)
}

/// One row of `reporter list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportListing {
    pub file_name: String,
    pub report_id: String,
    pub period_start: String,
    pub period_end: String,
    pub publish_date: String,
}

/// Up to `limit` reports, newest first.
///
/// A report missing its id falls back to the file stem.
pub fn list_reports(dir: &Path, limit: usize) -> Result<Vec<ReportListing>> {
    let mut listings = Vec::new();
    for path in report_files(dir)?.into_iter().take(limit) {
        let header = read_report_header(&path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let report_id = if header.report_id.is_empty() {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            header.report_id
        };
        listings.push(ReportListing {
            file_name,
            report_id,
            period_start: header.period.start,
            period_end: header.period.end,
            publish_date: header.publish_date,
        });
    }
    Ok(listings)
}
