//! Conversation types and state management

pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub use state::ConversationState;

/// Structured UI payload attached to a turn
///
/// The `template` names the view to render and `payload` is passed through
/// to it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub payload: Value,
}

impl Widget {
    pub fn new(template: impl Into<String>, payload: Value) -> Self {
        Self {
            template: template.into(),
            payload,
        }
    }

    /// Interpret an arbitrary JSON value as a widget envelope.
    ///
    /// Only objects qualify; a missing `template` or `payload` falls back to
    /// its default.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

impl Default for Widget {
    fn default() -> Self {
        Self {
            template: String::new(),
            payload: json!({}),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Progress of a tool invocation shown in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Started,
    InProgress,
    Completed,
    Failed,
}

impl ToolStatus {
    pub fn is_active(self) -> bool {
        matches!(self, ToolStatus::Started | ToolStatus::InProgress)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Search,
    Calculation,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<Widget>,

    // Tool entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<ToolType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            widget: None,
            tool_type: None,
            tool_status: None,
            tool_query: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A tool entry in the `started` state
    pub fn tool(tool_type: ToolType, query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            tool_type: Some(tool_type),
            tool_status: Some(ToolStatus::Started),
            tool_query: Some(query.into()),
            start_time: Some(now),
            ..Self::new(Role::Tool, "")
        }
    }

    pub fn streaming(mut self) -> Self {
        self.is_streaming = true;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_chat(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}

/// Partial update applied to a tool entry
#[derive(Debug, Clone, Default)]
pub struct ToolMessageUpdate {
    pub tool_status: Option<ToolStatus>,
    pub content: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
}

fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}
