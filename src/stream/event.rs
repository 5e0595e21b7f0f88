//! Typed view of the events carried by the chat stream
//!
//! Every frame payload is a JSON object discriminated by `event_name`. Known
//! names get their own variant; anything else lands in [`ChatEvent::Other`]
//! so that handling a new kind is an explicit decision.

use serde::Deserialize;
use serde_json::Value;

/// Wire shape shared by all events
#[derive(Debug, Deserialize)]
struct RawEvent {
    event_name: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    json: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Server-assigned conversation thread
    ThreadInfo { thread_id: Option<String> },
    /// Transient "thinking" text
    DisfluencyGenerated { text: Option<String> },
    /// Incremental answer tokens
    LlmStream { text: Option<String> },
    /// Complete structured object for the streaming message
    LlmJsonComplete { json: Option<Value> },
    /// Widget envelope ready to present as-is
    WorkflowJson { json: Option<Value> },
    /// Widget envelope possibly buried in encoded JSON
    WorkflowWidgetJson { json: Option<Value> },
    /// User-facing workflow error
    ErrorMessage { text: Option<String> },
    /// Backend error
    Error {
        error: Option<String>,
        thread_id: Option<String>,
    },
    /// Any other event name
    Other {
        event_name: String,
        text: Option<String>,
        json: Option<Value>,
    },
}

impl ChatEvent {
    /// Parse a frame payload. Returns `None` for anything that is not a JSON
    /// object with a string `event_name`.
    pub fn parse(frame: &str) -> Option<Self> {
        match serde_json::from_str::<RawEvent>(frame) {
            Ok(raw) => Some(raw.into()),
            Err(e) => {
                tracing::debug!("Skipping malformed frame: {}", e);
                None
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChatEvent::ThreadInfo { .. } => "thread_info",
            ChatEvent::DisfluencyGenerated { .. } => "disfluency_generated",
            ChatEvent::LlmStream { .. } => "llm_stream",
            ChatEvent::LlmJsonComplete { .. } => "llm_json_complete",
            ChatEvent::WorkflowJson { .. } => "workflow_json",
            ChatEvent::WorkflowWidgetJson { .. } => "workflow_widget_json",
            ChatEvent::ErrorMessage { .. } => "error_message",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Other { event_name, .. } => event_name,
        }
    }
}

impl From<RawEvent> for ChatEvent {
    fn from(raw: RawEvent) -> Self {
        match raw.event_name.as_str() {
            "thread_info" => ChatEvent::ThreadInfo {
                thread_id: raw.thread_id,
            },
            "disfluency_generated" => ChatEvent::DisfluencyGenerated { text: raw.text },
            "llm_stream" => ChatEvent::LlmStream { text: raw.text },
            "llm_json_complete" => ChatEvent::LlmJsonComplete { json: raw.json },
            "workflow_json" => ChatEvent::WorkflowJson { json: raw.json },
            "workflow_widget_json" => ChatEvent::WorkflowWidgetJson { json: raw.json },
            "error_message" => ChatEvent::ErrorMessage { text: raw.text },
            "error" => ChatEvent::Error {
                error: raw.error,
                thread_id: raw.thread_id,
            },
            _ => ChatEvent::Other {
                event_name: raw.event_name,
                text: raw.text,
                json: raw.json,
            },
        }
    }
}
