//! Typed events emitted by the agent's `stream-json` output.
//!
//! Each stdout line of the agent process is one JSON object tagged by
//! `type`. Only the kinds the run driver reacts to are modelled; every other
//! kind deserializes to [`AgentMessage::Other`] and is ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Subtype carried by a successful terminal event.
pub const SUCCESS_SUBTYPE: &str = "success";

/// One event from the agent stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    Assistant(AssistantMessage),
    Result(ResultMessage),
    System(SystemMessage),
    #[serde(other)]
    Other,
}

/// A complete assistant turn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantMessage {
    pub message: AssistantBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantBody {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

/// Terminal event closing an agent run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultMessage {
    pub subtype: String,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
}

impl ResultMessage {
    pub fn is_success(&self) -> bool {
        self.subtype == SUCCESS_SUBTYPE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Session bookkeeping (init, compaction, ...). Fields are kept verbatim so
/// the debug dump shows the full event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SystemMessage {
    /// Rebuild the event as it appeared on the wire.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String("system".to_string()));
        if let Some(subtype) = &self.subtype {
            object.insert("subtype".to_string(), Value::String(subtype.clone()));
        }
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Parse one stream line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<AgentMessage>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let message = serde_json::from_str(trimmed).with_context(|| {
        let preview: String = trimmed.chars().take(200).collect();
        format!("parse agent event: {preview}")
    })?;
    Ok(Some(message))
}
