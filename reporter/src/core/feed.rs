//! Text of RSS feed items.

use crate::core::report::{ReportHeader, threat_level_label};

/// Headlines listed per item.
const MAX_HEADLINES: usize = 3;
const MAX_HEADLINE_CHARS: usize = 60;
const TRUNCATED_HEADLINE_CHARS: usize = 57;

/// Item description: threat level, counts, then up to three headlines.
pub fn format_description(report: &ReportHeader) -> String {
    let summary = &report.summary;
    let mut lines = vec![
        format!("威脅等級：{}", threat_level_label(&summary.threat_level)),
        format!(
            "本週收錄 {} 則事件、{} 個漏洞",
            summary.total_events, summary.total_vulnerabilities
        ),
        String::new(),
    ];

    let top: Vec<_> = report.events.iter().take(MAX_HEADLINES).collect();
    if !top.is_empty() {
        lines.push("重點新聞：".to_string());
        for event in top {
            lines.push(format!("• {}", headline(&event.title)));
        }
    }
    lines.join("\n")
}

/// Strip leading decoration and shorten long titles.
pub fn headline(title: &str) -> String {
    let title = title.trim_start_matches([' ', '⚡', '✨', '❗', '❌', '✅']);
    if title.chars().count() > MAX_HEADLINE_CHARS {
        let mut short: String = title.chars().take(TRUNCATED_HEADLINE_CHARS).collect();
        short.push_str("...");
        short
    } else {
        title.to_string()
    }
}
