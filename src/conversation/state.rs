//! Single-writer store for one conversation
//!
//! Every mutator keeps the streaming invariant: at most one message has
//! `is_streaming` set, and `current_streaming_message_id` names exactly that
//! message or is `None`.

use serde::Serialize;

use super::{Message, Role, ToolMessageUpdate, ToolStatus, Widget};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    current_streaming_message_id: Option<String>,
    thread_id: Option<String>,
    last_placeholder_text: Option<String>,
    widget: Option<Widget>,
    error: Option<String>,
    is_loading: bool,
    tool_status: Option<ToolStatus>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Mutators ==========

    /// Append a finished user message and return its id
    pub fn append_user_message(&mut self, content: impl Into<String>) -> String {
        let message = Message::user(content);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Append the assistant message that will receive the streamed reply.
    ///
    /// The placeholder text is shown until the first real fragment arrives,
    /// so it is also recorded as the last placeholder.
    pub fn append_placeholder_assistant_message(&mut self, placeholder: impl Into<String>) -> String {
        let placeholder = placeholder.into();
        self.last_placeholder_text = Some(placeholder.clone());
        self.push_streaming(Message::assistant(placeholder).streaming())
    }

    /// Append an externally built message.
    ///
    /// A streaming message takes over as the current streaming message.
    pub fn add_message(&mut self, message: Message) -> String {
        if message.is_streaming {
            return self.push_streaming(message);
        }
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    fn push_streaming(&mut self, message: Message) -> String {
        self.finalize_streaming();
        let id = message.id.clone();
        self.current_streaming_message_id = Some(id.clone());
        self.messages.push(message);
        id
    }

    /// Apply `update` to the streaming message, if there is one
    pub fn mutate_streaming_message<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        match self.streaming_message_mut() {
            Some(message) => {
                update(message);
                true
            }
            None => false,
        }
    }

    /// Close the streaming message. Returns `false` when nothing was streaming.
    pub fn finalize_streaming(&mut self) -> bool {
        let Some(id) = self.current_streaming_message_id.take() else {
            return false;
        };
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.is_streaming = false;
        }
        true
    }

    /// Set the thread id. The first id of a conversation wins.
    pub fn set_thread_id(&mut self, thread_id: impl Into<String>) -> bool {
        let thread_id = thread_id.into();
        if self.thread_id.is_some() || thread_id.is_empty() {
            return false;
        }
        self.thread_id = Some(thread_id);
        true
    }

    pub fn set_widget(&mut self, widget: Option<Widget>) {
        self.widget = widget;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn set_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }

    pub fn set_tool_status(&mut self, status: Option<ToolStatus>) {
        self.tool_status = status;
    }

    pub fn set_placeholder_text(&mut self, text: impl Into<String>) {
        self.last_placeholder_text = Some(text.into());
    }

    /// Update a tool entry; other roles are left alone
    pub fn update_tool_message(&mut self, id: &str, update: ToolMessageUpdate) -> bool {
        let Some(message) = self
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.role == Role::Tool)
        else {
            return false;
        };
        if let Some(status) = update.tool_status {
            message.tool_status = Some(status);
        }
        if let Some(content) = update.content {
            message.content = content;
        }
        if let Some(end_time) = update.end_time {
            message.end_time = Some(end_time);
        }
        true
    }

    /// Replace the whole state with the initial empty state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ========== Getters ==========

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_streaming_message_id(&self) -> Option<&str> {
        self.current_streaming_message_id.as_deref()
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        let id = self.current_streaming_message_id.as_deref()?;
        self.messages.iter().find(|m| m.id == id)
    }

    fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        let id = self.current_streaming_message_id.as_deref()?;
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn last_placeholder_text(&self) -> Option<&str> {
        self.last_placeholder_text.as_deref()
    }

    pub fn widget(&self) -> Option<&Widget> {
        self.widget.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn tool_status(&self) -> Option<ToolStatus> {
        self.tool_status
    }

    // ========== Selectors ==========

    pub fn tool_message(&self, id: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.role == Role::Tool && m.id == id)
    }

    pub fn tool_messages(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.role == Role::Tool).collect()
    }

    pub fn chat_messages(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.is_chat()).collect()
    }

    pub fn active_tool_messages(&self) -> Vec<&Message> {
        self.tool_messages_where(ToolStatus::is_active)
    }

    pub fn completed_tool_messages(&self) -> Vec<&Message> {
        self.tool_messages_where(ToolStatus::is_finished)
    }

    fn tool_messages_where(&self, pred: fn(ToolStatus) -> bool) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Tool && m.tool_status.is_some_and(pred))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolType;
    use serde_json::json;

    fn streaming_count(state: &ConversationState) -> usize {
        state.messages().iter().filter(|m| m.is_streaming).count()
    }

    #[test]
    fn test_placeholder_message_becomes_streaming() {
        let mut state = ConversationState::new();
        state.append_user_message("hi");
        let id = state.append_placeholder_assistant_message("Just a moment");

        assert_eq!(state.current_streaming_message_id(), Some(id.as_str()));
        assert_eq!(state.last_placeholder_text(), Some("Just a moment"));
        assert_eq!(state.streaming_message().unwrap().content, "Just a moment");
        assert_eq!(streaming_count(&state), 1);
    }

    #[test]
    fn test_second_streaming_message_finalizes_first() {
        let mut state = ConversationState::new();
        let first = state.append_placeholder_assistant_message("a");
        let second = state.add_message(Message::assistant("b").streaming());

        assert_eq!(streaming_count(&state), 1);
        assert_eq!(state.current_streaming_message_id(), Some(second.as_str()));
        assert!(!state.messages().iter().find(|m| m.id == first).unwrap().is_streaming);
    }

    #[test]
    fn test_finalize_only_once() {
        let mut state = ConversationState::new();
        state.append_placeholder_assistant_message("a");

        assert!(state.finalize_streaming());
        assert!(!state.finalize_streaming());
        assert_eq!(streaming_count(&state), 0);
        assert!(state.current_streaming_message_id().is_none());
        assert!(!state.mutate_streaming_message(|m| m.content.push('x')));
        assert_eq!(state.messages()[0].content, "a");
    }

    #[test]
    fn test_thread_id_first_wins() {
        let mut state = ConversationState::new();
        assert!(!state.set_thread_id(""));
        assert!(state.set_thread_id("t1"));
        assert!(!state.set_thread_id("t2"));
        assert_eq!(state.thread_id(), Some("t1"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = ConversationState::new();
        state.append_user_message("hi");
        state.append_placeholder_assistant_message("wait");
        state.set_thread_id("t1");
        state.set_widget(Some(Widget::new("cart", json!({}))));
        state.set_error(Some("boom".into()));
        state.set_loading(true);
        state.set_tool_status(Some(ToolStatus::Started));

        state.reset();

        assert!(state.messages().is_empty());
        assert!(state.current_streaming_message_id().is_none());
        assert!(state.thread_id().is_none());
        assert!(state.last_placeholder_text().is_none());
        assert!(state.widget().is_none());
        assert!(state.error().is_none());
        assert!(!state.is_loading());
        assert!(state.tool_status().is_none());
    }

    #[test]
    fn test_tool_selectors_and_updates() {
        let mut state = ConversationState::new();
        state.append_user_message("find shoes");
        let search = state.add_message(Message::tool(ToolType::Search, "shoes"));
        let calc = state.add_message(Message::tool(ToolType::Calculation, "2+2"));

        assert_eq!(state.tool_messages().len(), 2);
        assert_eq!(state.chat_messages().len(), 1);
        assert_eq!(state.active_tool_messages().len(), 2);

        assert!(state.update_tool_message(
            &calc,
            ToolMessageUpdate {
                tool_status: Some(ToolStatus::Completed),
                content: Some("4".into()),
                end_time: Some(chrono::Utc::now()),
            },
        ));

        assert_eq!(state.active_tool_messages().len(), 1);
        assert_eq!(state.completed_tool_messages()[0].id, calc);
        assert_eq!(state.tool_message(&calc).unwrap().content, "4");
        assert!(state.tool_message(&search).unwrap().end_time.is_none());

        let user_id = state.messages()[0].id.clone();
        assert!(!state.update_tool_message(&user_id, ToolMessageUpdate::default()));
        assert!(state.tool_message(&user_id).is_none());
    }
}
