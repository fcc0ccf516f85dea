//! Test-only helpers: in-memory environment, scripted agent, sample report.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::core::message::parse_line;
use crate::io::agent::{Agent, MessageStream, QueryRequest};
use crate::io::env::Env;

/// Environment backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// One scripted stream item: a raw `stream-json` line or an error message.
#[derive(Debug, Clone)]
pub enum ScriptedItem {
    Line(String),
    Error(String),
}

impl ScriptedItem {
    pub fn line(json: &str) -> Self {
        ScriptedItem::Line(json.to_string())
    }

    pub fn error(message: &str) -> Self {
        ScriptedItem::Error(message.to_string())
    }
}

/// Agent that replays a fixed script and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    items: Vec<ScriptedItem>,
    start_error: Option<String>,
    requests: RefCell<Vec<QueryRequest>>,
}

impl ScriptedAgent {
    pub fn new(items: Vec<ScriptedItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Agent whose `query` call itself fails.
    pub fn failing_start(message: &str) -> Self {
        Self {
            start_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.borrow().clone()
    }
}

impl Agent for ScriptedAgent {
    fn query(&self, request: &QueryRequest) -> Result<MessageStream<'_>> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(message) = &self.start_error {
            return Err(anyhow!("{message}"));
        }
        let stream = self.items.iter().filter_map(|item| match item {
            ScriptedItem::Line(line) => parse_line(line).transpose(),
            ScriptedItem::Error(message) => Some(Err(anyhow!("{message}"))),
        });
        Ok(Box::new(stream))
    }
}

/// `stream-json` line for a terminal event.
pub fn result_line(subtype: &str, input_tokens: u64, output_tokens: u64, cost: f64) -> String {
    json!({
        "type": "result",
        "subtype": subtype,
        "is_error": subtype != "success",
        "duration_ms": 1200,
        "num_turns": 3,
        "total_cost_usd": cost,
        "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}
    })
    .to_string()
}

/// A report that passes schema and naming checks.
pub fn sample_report() -> Value {
    json!({
        "title": "資安週報 2026/02/16 - 2026/02/22",
        "report_id": "SEC-WEEKLY-2026-08",
        "period": {"start": "2026-02-16", "end": "2026-02-22"},
        "publish_date": "2026-02-23",
        "summary": {
            "total_events": 2,
            "total_vulnerabilities": 1,
            "threat_level": "elevated"
        },
        "events": [
            {
                "title": "⚡ Salt Typhoon 持續入侵電信業者",
                "severity": "critical",
                "event_type": "APT",
                "summary": "多家電信業者網路設備遭入侵",
                "source": "The Hacker News",
                "url": "https://example.com/salt-typhoon",
                "date": "2026-02-18"
            },
            {
                "title": "大型零售業者資料外洩",
                "severity": "high",
                "event_type": "資料外洩",
                "summary": "數百萬筆會員資料遭竊",
                "source": "iThome",
                "url": "https://example.com/breach",
                "date": "2026-02-19"
            }
        ],
        "vulnerabilities": [
            {
                "cve_id": "CVE-2026-12345",
                "title": "VPN 閘道遠端程式碼執行",
                "cvss": 9.8,
                "severity": "critical",
                "vendor": "ExampleCorp",
                "product": "SecureGate",
                "description": "未經驗證的遠端程式碼執行"
            }
        ],
        "threat_trends": {"summary": "APT 活動升溫"},
        "action_items": [
            {"priority": "high", "action": "立即更新 SecureGate 至最新版本"}
        ],
        "terms": [{"term": "APT", "definition": "進階持續性威脅"}],
        "references": []
    })
}

/// Write `report` as `<dir>/<file_name>` and return the path.
pub fn write_report(dir: &Path, file_name: &str, report: &Value) -> PathBuf {
    fs::create_dir_all(dir).expect("create reports dir");
    let path = dir.join(file_name);
    let mut contents = serde_json::to_string_pretty(report).expect("serialize report");
    contents.push('\n');
    fs::write(&path, contents).expect("write report");
    path
}
