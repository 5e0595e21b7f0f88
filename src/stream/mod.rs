//! Server-sent event stream handling
//!
//! - `decoder` - bytes to `data:` frames, stopping at `[DONE]`
//! - `event` - frame payloads to typed [`ChatEvent`]s
//! - `dispatch` - events to conversation state transitions

pub mod decoder;
pub mod dispatch;
pub mod event;

pub use decoder::{frames, FrameDecoder, DONE_SENTINEL};
pub use dispatch::{dispatch, DispatchOutcome};
pub use event::ChatEvent;
