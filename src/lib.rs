//! Streaming assistant chat client
//!
//! Consumes the server-sent event stream of an AI assistant backend and keeps
//! a single coherent conversation: user and assistant messages, the server
//! thread id, the placeholder-then-stream text policy, and structured widget
//! payloads recovered from arbitrarily nested JSON.
//!
//! ```ignore
//! use assistant_stream::{ChatSession, Config};
//!
//! let session = ChatSession::from_config(&Config::from_env()?)?;
//! session.send_message("show my cart").await?;
//! println!("{:?}", session.widget());
//! ```

pub mod config;
pub mod conversation;
pub mod core;
pub mod stream;
pub mod transport;
pub mod widget;

pub use config::Config;
pub use conversation::{ConversationState, Message, Role, ToolStatus, Widget};
pub use crate::core::{ChatError, ChatSession};
pub use transport::{ChatTransport, HttpTransport, TransportError};
pub use widget::extract_widget;
