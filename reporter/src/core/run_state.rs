//! Run outcome state machine.
//!
//! `Running` is the only non-terminal state. A run leaves it exactly once:
//! on the first `result` event, the first stream error, or when the stream
//! ends. Events observed after a terminal state do not change it.

use crate::core::message::AgentMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Succeeded,
    Failed(FailureKind),
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Terminal event carried a subtype other than `success`.
    Unsuccessful { subtype: String },
    /// Iterating the stream raised an error.
    Stream { message: String },
    /// The stream ended before any terminal event.
    NoResult,
}

impl FailureKind {
    pub fn describe(&self) -> String {
        match self {
            FailureKind::Unsuccessful { subtype } => {
                format!("Query ended with status \"{subtype}\"")
            }
            FailureKind::Stream { message } => format!("agent stream failed: {message}"),
            FailureKind::NoResult => "agent stream ended without a result event".to_string(),
        }
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }

    /// Advance on a stream event.
    pub fn on_message(self, message: &AgentMessage) -> Self {
        if self.is_terminal() {
            return self;
        }
        match message {
            AgentMessage::Result(result) if result.is_success() => RunState::Succeeded,
            AgentMessage::Result(result) => RunState::Failed(FailureKind::Unsuccessful {
                subtype: result.subtype.clone(),
            }),
            AgentMessage::Assistant(_) | AgentMessage::System(_) | AgentMessage::Other => self,
        }
    }

    /// Advance on an error raised while reading the stream.
    pub fn on_stream_error(self, message: impl Into<String>) -> Self {
        if self.is_terminal() {
            return self;
        }
        RunState::Failed(FailureKind::Stream {
            message: message.into(),
        })
    }

    /// Close the run once the stream is exhausted.
    pub fn on_stream_end(self) -> Self {
        match self {
            RunState::Running => RunState::Failed(FailureKind::NoResult),
            terminal => terminal,
        }
    }
}
