//! Chat session driving one conversation
//!
//! The ChatSession is what a UI talks to. It:
//! 1. Appends the user message and a placeholder assistant message
//! 2. Opens the response stream through the transport
//! 3. Decodes frames and dispatches each event into the conversation state
//! 4. Finalizes the assistant message on `[DONE]`, end of stream or failure
//! 5. Announces published widgets to subscribers
//!
//! State lives behind a mutex that is never held across an await, and every
//! stream carries a cancellation token checked under that same lock. Once a
//! stream is cancelled (by [`ChatSession::cancel`] or
//! [`ChatSession::reset_chat`]) it cannot touch the state again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::{pin_mut, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_PLACEHOLDER};
use crate::conversation::{
    ConversationState, Message, ToolMessageUpdate, ToolStatus, Widget,
};
use crate::stream::{dispatch, frames, ChatEvent, DispatchOutcome};
use crate::transport::{ChatTransport, HttpTransport, StreamRequest, TransportError};

/// Errors surfaced to the caller of a session
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Failed to load conversation history: {0}")]
    History(TransportError),

    #[error("A response is already streaming")]
    Busy,

    #[error("Stream cancelled")]
    Cancelled,
}

struct SessionInner {
    state: ConversationState,
    /// Token of the stream currently allowed to write into `state`
    active_stream: Option<CancellationToken>,
}

pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    placeholder_text: String,
    inner: Mutex<SessionInner>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<Widget>>>,
}

impl ChatSession {
    /// Create a new session over the given transport
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            placeholder_text: DEFAULT_PLACEHOLDER.to_string(),
            inner: Mutex::new(SessionInner {
                state: ConversationState::new(),
                active_stream: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Create a session talking HTTP to the configured backend
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)).with_placeholder_text(config.placeholder_text.clone()))
    }

    /// Set the text shown before the reply starts streaming
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Streaming turn ==========

    /// Send a user message and stream the assistant reply into the state.
    ///
    /// Blank input is ignored. Returns once the reply is finalized. Server
    /// error events only land in the state; transport failures are also
    /// returned.
    pub async fn send_message(&self, content: &str) -> Result<(), ChatError> {
        let query = content.trim();
        if query.is_empty() {
            return Ok(());
        }

        let (request, token) = self.begin_turn(query)?;
        let _turn = TurnGuard {
            session: self,
            token: token.clone(),
        };

        let opened = tokio::select! {
            _ = token.cancelled() => return Err(ChatError::Cancelled),
            opened = self.transport.open_stream(&request) => opened,
        };
        let body = match opened {
            Ok(body) => body,
            Err(e) => {
                self.fail_turn(&token, &e);
                return Err(e.into());
            }
        };

        let frames = frames(body);
        pin_mut!(frames);

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Stream cancelled, releasing response body");
                    return Err(ChatError::Cancelled);
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => self.apply_frame(&token, &frame),
                Some(Err(e)) => {
                    self.fail_turn(&token, &e);
                    return Err(e.into());
                }
                None => break,
            }
        }

        self.finish_turn(&token);
        Ok(())
    }

    fn begin_turn(&self, query: &str) -> Result<(StreamRequest, CancellationToken), ChatError> {
        let mut inner = self.lock();
        if inner.active_stream.is_some() {
            return Err(ChatError::Busy);
        }

        let token = CancellationToken::new();
        inner.active_stream = Some(token.clone());

        let state = &mut inner.state;
        state.set_loading(true);
        state.set_error(None);
        state.append_user_message(query);
        state.append_placeholder_assistant_message(self.placeholder_text.as_str());

        let request = StreamRequest {
            query: query.to_string(),
            thread_id: state.thread_id().map(str::to_owned),
        };
        Ok((request, token))
    }

    fn apply_frame(&self, token: &CancellationToken, frame: &str) {
        let Some(event) = ChatEvent::parse(frame) else {
            return;
        };

        let outcome = {
            let mut inner = self.lock();
            if token.is_cancelled() {
                return;
            }
            dispatch(&mut inner.state, event)
        };

        if let DispatchOutcome::WidgetPublished(widget) = outcome {
            self.notify(widget);
        }
    }

    fn finish_turn(&self, token: &CancellationToken) {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return;
        }
        release_turn(&mut inner, token);
    }

    fn fail_turn(&self, token: &CancellationToken, error: &TransportError) {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return;
        }
        tracing::warn!("Error sending message: {}", error);
        inner.state.set_error(Some(error.to_string()));
        release_turn(&mut inner, token);
    }

    /// Stop the in-flight stream, if any, and finalize its message.
    ///
    /// Returns `false` when nothing was streaming.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let Some(token) = inner.active_stream.take() else {
            return false;
        };
        token.cancel();
        close_turn(&mut inner.state);
        true
    }

    /// Drop the in-flight stream and start over with an empty conversation
    pub fn reset_chat(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.active_stream.take() {
            token.cancel();
        }
        inner.state.reset();
    }

    // ========== History ==========

    /// Replace the conversation with the stored history of `thread_id`.
    ///
    /// Returns the number of messages loaded.
    pub async fn load_conversation_history(&self, thread_id: &str) -> Result<usize, ChatError> {
        let history = match self.transport.fetch_history(thread_id).await {
            Ok(history) => history,
            Err(e) => {
                let error = ChatError::History(e);
                tracing::warn!("Error loading conversation history: {}", error);
                self.lock().state.set_error(Some(error.to_string()));
                return Err(error);
            }
        };

        let mut inner = self.lock();
        if let Some(token) = inner.active_stream.take() {
            token.cancel();
        }

        let state = &mut inner.state;
        state.reset();
        state.set_thread_id(thread_id);

        let count = history.messages.len();
        for entry in history.messages {
            let timestamp = entry.parsed_timestamp().unwrap_or_else(Utc::now);
            state.add_message(Message::new(entry.role, entry.content).with_timestamp(timestamp));
        }

        tracing::info!("Loaded {} messages from thread {}", count, thread_id);
        Ok(count)
    }

    // ========== Widgets ==========

    /// Receive every widget published from now on
    pub fn subscribe_widgets(&self) -> mpsc::UnboundedReceiver<Widget> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn notify(&self, widget: Widget) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|tx| tx.send(widget.clone()).is_ok());
    }

    // ========== External updates ==========

    /// Append a message built elsewhere, typically a tool entry
    pub fn add_message(&self, message: Message) -> String {
        self.lock().state.add_message(message)
    }

    pub fn update_tool_message(&self, id: &str, update: ToolMessageUpdate) -> bool {
        self.lock().state.update_tool_message(id, update)
    }

    pub fn set_tool_status(&self, status: Option<ToolStatus>) {
        self.lock().state.set_tool_status(status);
    }

    // ========== Getters ==========

    /// Copy of the whole conversation state
    pub fn snapshot(&self) -> ConversationState {
        self.lock().state.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().state.messages().to_vec()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.lock().state.thread_id().map(str::to_owned)
    }

    pub fn widget(&self) -> Option<Widget> {
        self.lock().state.widget().cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error().map(str::to_owned)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    pub fn tool_status(&self) -> Option<ToolStatus> {
        self.lock().state.tool_status()
    }

    /// Whether a response stream is in flight
    pub fn is_streaming(&self) -> bool {
        self.lock().active_stream.is_some()
    }

    pub fn chat_messages(&self) -> Vec<Message> {
        self.lock().state.chat_messages().into_iter().cloned().collect()
    }

    pub fn tool_messages(&self) -> Vec<Message> {
        self.lock().state.tool_messages().into_iter().cloned().collect()
    }

    pub fn active_tool_messages(&self) -> Vec<Message> {
        self.lock()
            .state
            .active_tool_messages()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn completed_tool_messages(&self) -> Vec<Message> {
        self.lock()
            .state
            .completed_tool_messages()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn tool_message(&self, id: &str) -> Option<Message> {
        self.lock().state.tool_message(id).cloned()
    }
}

/// Closes the turn when `send_message` is dropped before it returns,
/// e.g. by a caller's timeout or a torn-down UI task.
struct TurnGuard<'a> {
    session: &'a ChatSession,
    token: CancellationToken,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if self.token.is_cancelled() {
            return;
        }
        tracing::debug!("Response dropped before completion, finalizing message");
        release_turn(&mut inner, &self.token);
    }
}

/// Retire the turn owning `token`.
///
/// A live token always belongs to `active_stream`: every path that clears
/// `active_stream` also cancels the token it held.
fn release_turn(inner: &mut SessionInner, token: &CancellationToken) {
    token.cancel();
    inner.active_stream = None;
    close_turn(&mut inner.state);
}

/// Finalize the streaming message and clear the per-turn flags
fn close_turn(state: &mut ConversationState) {
    state.finalize_streaming();
    state.set_loading(false);
    state.set_tool_status(None);
}
