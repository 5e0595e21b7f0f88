//! Applies stream events to the conversation state

use serde_json::Value;

use crate::conversation::{ConversationState, Widget};
use crate::widget::extract_widget;

use super::event::ChatEvent;

/// What the caller has to do after an event was applied
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// State updated, nothing to announce
    Applied,
    /// A new conversation widget should be announced to listeners
    WidgetPublished(Widget),
}

/// Apply one event to `state`.
pub fn dispatch(state: &mut ConversationState, event: ChatEvent) -> DispatchOutcome {
    tracing::trace!("Dispatching {}", event.name());

    match event {
        ChatEvent::ThreadInfo { thread_id } => {
            if let Some(thread_id) = thread_id {
                if state.set_thread_id(thread_id.as_str()) {
                    tracing::info!("Received thread_id: {}", thread_id);
                }
            }
        }

        ChatEvent::DisfluencyGenerated { text } => {
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                state.mutate_streaming_message(|m| m.content = text.clone());
                state.set_placeholder_text(text);
            }
        }

        ChatEvent::LlmStream { text } => {
            if let Some(text) = text {
                apply_fragment(state, &text);
            }
        }

        ChatEvent::LlmJsonComplete { json } => {
            if let Some(widget) = envelope("llm_json_complete", json.as_ref()) {
                attach_widget(state, widget);
            }
        }

        ChatEvent::WorkflowJson { json } => {
            if let Some(widget) = envelope("workflow_json", json.as_ref()) {
                state.set_widget(Some(widget.clone()));
                return DispatchOutcome::WidgetPublished(widget);
            }
        }

        ChatEvent::WorkflowWidgetJson { json } => {
            if let Some(json) = json {
                return publish_extracted(state, &json);
            }
        }

        ChatEvent::ErrorMessage { text } => {
            if let Some(text) = text {
                tracing::warn!("Workflow error: {}", text);
                state.set_error(Some(text));
            }
        }

        ChatEvent::Error { error, thread_id } => {
            let error = error.unwrap_or_default();
            tracing::warn!("Backend error: {}", error);
            state.set_error(Some(error));
            if let Some(thread_id) = thread_id {
                state.set_thread_id(thread_id);
            }
        }

        ChatEvent::Other {
            event_name,
            text,
            json,
        } => {
            tracing::debug!("Treating '{}' as stream text", event_name);
            if let Some(text) = text {
                apply_fragment(state, &text);
            }
            if let Some(widget) = envelope(&event_name, json.as_ref()) {
                attach_widget(state, widget);
            }
        }
    }

    DispatchOutcome::Applied
}

/// Placeholder-aware text update: while the streaming message still shows
/// the last placeholder, a fragment replaces it; otherwise it is appended.
fn apply_fragment(state: &mut ConversationState, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    let placeholder = state.last_placeholder_text().map(str::to_owned);

    state.mutate_streaming_message(|m| {
        if placeholder.as_deref() == Some(m.content.as_str()) {
            m.content = fragment.to_string();
        } else {
            m.content.push_str(fragment);
        }
    });
}

/// `json` as a widget envelope. Values that are not `{template, payload}`
/// objects are dropped.
fn envelope(event_name: &str, json: Option<&Value>) -> Option<Widget> {
    let json = json?;
    let widget = Widget::from_value(json);
    if widget.is_none() {
        tracing::debug!("Ignoring non-widget json on {} event: {}", event_name, json);
    }
    widget
}

fn attach_widget(state: &mut ConversationState, widget: Widget) {
    state.mutate_streaming_message(|m| m.widget = Some(widget));
}

fn publish_extracted(state: &mut ConversationState, json: &Value) -> DispatchOutcome {
    let encoded = json.to_string();

    match extract_widget(&encoded) {
        Some(widget) => {
            state.set_widget(Some(widget.clone()));
            DispatchOutcome::WidgetPublished(widget)
        }
        None => {
            tracing::debug!("No widget found in workflow_widget_json event");
            state.set_widget(None);
            DispatchOutcome::Applied
        }
    }
}
