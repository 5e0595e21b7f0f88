//! Chat backend transport
//!
//! The session only needs two things from the network: open a streaming
//! response for a query, and fetch the stored history of a thread. Both sit
//! behind [`ChatTransport`] so tests can script the byte stream.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Role;

pub use http::HttpTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("No response body available")]
    MissingBody,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Stream interrupted: {0}")]
    Interrupted(String),
}

/// Body of a streaming chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub query: String,
    pub thread_id: Option<String>,
}

/// Raw response body, chunked however the network delivered it
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// One entry of a stored conversation
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HistoryMessage {
    /// Timestamp as sent by the server. RFC 3339 and zone-less ISO 8601
    /// (read as UTC) are accepted; anything else yields `None`.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start a streaming chat turn and hand back the response body
    async fn open_stream(&self, request: &StreamRequest) -> Result<ByteStream, TransportError>;

    /// Load the stored messages of a thread
    async fn fetch_history(&self, thread_id: &str) -> Result<HistoryResponse, TransportError>;
}
