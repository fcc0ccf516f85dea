//! Console formatting for the run driver.
//!
//! Pure string builders; the driver decides which stream they go to.

use std::time::Duration;

use crate::core::message::ResultMessage;

const RULE_WIDTH: usize = 60;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Start-of-run banner.
pub fn banner(model: &str, cwd: &str, started_at: &str) -> String {
    let rule = rule();
    let mut out = String::new();
    out.push_str(&format!("{rule}\n"));
    out.push_str("Weekly Security Report Generator\n");
    out.push_str("Using Claude Agent SDK with MCP Server\n");
    out.push_str(&format!("{rule}\n"));
    out.push_str(&format!("Model: {model}\n"));
    out.push_str(&format!("Working directory: {cwd}\n"));
    out.push_str(&format!("Started at: {started_at}\n"));
    out.push_str(&format!("{rule}\n\n"));
    out
}

/// Statistics block printed on the terminal event.
pub fn stats_block(result: &ResultMessage, elapsed: Duration) -> String {
    let rule = rule();
    let mut out = String::from("\n\n");
    out.push_str(&format!("{rule}\n"));
    out.push_str("Execution Complete\n");
    out.push_str(&format!("{rule}\n"));
    out.push_str(&format!("Status: {}\n", result.subtype));
    out.push_str(&format!(
        "Input tokens: {}\n",
        group_thousands(result.usage.input_tokens)
    ));
    out.push_str(&format!(
        "Output tokens: {}\n",
        group_thousands(result.usage.output_tokens)
    ));
    out.push_str(&format!("Cost: ${:.4}\n", result.total_cost_usd));
    out.push_str(&format!("Elapsed time: {:.1}s\n", elapsed.as_secs_f64()));
    out.push_str(&format!("{rule}\n"));
    out
}

pub fn tool_use_line(name: &str) -> String {
    format!("\n[Tool] {name}\n")
}

/// Format an integer with `,` every three digits.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Usage;

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn stats_block_lists_usage_cost_and_time() {
        let result = ResultMessage {
            subtype: "success".to_string(),
            usage: Usage {
                input_tokens: 48_213,
                output_tokens: 9_002,
            },
            total_cost_usd: 0.41237,
            duration_ms: None,
            num_turns: None,
            is_error: false,
            result: None,
        };

        let block = stats_block(&result, Duration::from_millis(93_460));
        assert!(block.contains("Execution Complete"));
        assert!(block.contains("Status: success"));
        assert!(block.contains("Input tokens: 48,213"));
        assert!(block.contains("Output tokens: 9,002"));
        assert!(block.contains("Cost: $0.4124"));
        assert!(block.contains("Elapsed time: 93.5s"));
    }

    #[test]
    fn banner_names_model_and_directory() {
        let text = banner("claude-sonnet-4-20250514", "/work", "2026-02-16T01:00:00Z");
        assert!(text.starts_with(&rule()));
        assert!(text.contains("Model: claude-sonnet-4-20250514"));
        assert!(text.contains("Working directory: /work"));
        assert!(text.ends_with("\n\n"));
    }
}
