//! HTTP transport for the chat backend
//!
//! Streaming turns are a `POST {base_url}{stream_path}` with a JSON body of
//! `{query, thread_id}` and a bearer token; the response body is read as raw
//! chunks and left to the frame decoder. History is a plain
//! `GET {base_url}{history_path}/{thread_id}`, with the thread id encoded as
//! a single path segment.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};

use crate::config::Config;

use super::{ByteStream, ChatTransport, HistoryResponse, StreamRequest, TransportError};

pub struct HttpTransport {
    client: Client,
    base_url: String,
    stream_path: String,
    history_url: Url,
    api_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport from the resolved configuration
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        // Applies to the whole response, body included
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let history_url = format!("{}{}", base_url, config.history_path);
        let history_url = Url::parse(&history_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", history_url, e)))?;

        Ok(Self {
            client: builder.build()?,
            base_url,
            stream_path: config.stream_path.clone(),
            history_url,
            api_token: config.api_token.clone(),
        })
    }

    fn history_url(&self, thread_id: &str) -> Result<Url, TransportError> {
        let mut url = self.history_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.history_url.to_string()))?
            .pop_if_empty()
            .push(thread_id);
        Ok(url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        let url = self.url(&self.stream_path);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header(
                "Authorization",
                format!("Bearer {}", self.api_token.as_deref().unwrap_or_default()),
            )
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        tracing::debug!("Opened chat stream at {}", url);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));

        Ok(Box::pin(body))
    }

    async fn fetch_history(&self, thread_id: &str) -> Result<HistoryResponse, TransportError> {
        let url = self.history_url(thread_id)?;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            TransportError::InvalidResponse(format!("Failed to parse history: {} - Body: {}", e, body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{header, HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use crate::stream::frames;

    const SSE_BODY: &str = "data: {\"event_name\":\"thread_info\",\"thread_id\":\"t1\"}\n\n\
        data: {\"event_name\":\"llm_stream\",\"text\":\"Hi\"}\n\n\
        data: [DONE]\n\n";

    async fn stream_handler(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret");
        if !authorized || body["query"] != "hello" {
            return (StatusCode::UNAUTHORIZED, [(header::CONTENT_TYPE, "text/plain")], String::new());
        }
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/event-stream")],
            SSE_BODY.to_string(),
        )
    }

    async fn history_handler(Path(thread_id): Path<String>) -> impl IntoResponse {
        if thread_id != "t1" && thread_id != "a/b?c#d" {
            return (StatusCode::NOT_FOUND, Json(json!({"detail": "missing"})));
        }
        (
            StatusCode::OK,
            Json(json!({"messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello", "timestamp": "2024-05-01T10:00:00Z"}
            ]})),
        )
    }

    async fn spawn_server() -> Config {
        let app = Router::new()
            .route("/api/chat/stream", post(stream_handler))
            .route("/api/chat/history/:thread_id", get(history_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Config {
            base_url: format!("http://{}/", addr),
            api_token: Some("secret".into()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_open_stream() {
        let config = spawn_server().await;
        let transport = HttpTransport::new(&config).unwrap();

        let body = transport
            .open_stream(&StreamRequest {
                query: "hello".into(),
                thread_id: None,
            })
            .await
            .unwrap();

        let frames: Vec<String> = frames(body).map(|f| f.unwrap()).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains("\"Hi\""));
    }

    #[tokio::test]
    async fn test_rejected_stream() {
        let config = Config {
            api_token: None,
            ..spawn_server().await
        };
        let transport = HttpTransport::new(&config).unwrap();

        let result = transport
            .open_stream(&StreamRequest {
                query: "hello".into(),
                thread_id: Some("t1".into()),
            })
            .await;
        assert!(matches!(result, Err(TransportError::Status(401))));
    }

    #[tokio::test]
    async fn test_fetch_history() {
        let config = spawn_server().await;
        let transport = HttpTransport::new(&config).unwrap();

        let history = transport.fetch_history("t1").await.unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[1].content, "hello");

        let missing = transport.fetch_history("nope").await;
        assert!(matches!(missing, Err(TransportError::Status(404))));
    }

    #[tokio::test]
    async fn test_history_thread_id_is_one_segment() {
        let config = spawn_server().await;
        let transport = HttpTransport::new(&config).unwrap();

        let url = transport.history_url("a/b?c#d").unwrap();
        assert!(url.path().ends_with("/api/chat/history/a%2Fb%3Fc%23d"));
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        let history = transport.fetch_history("a/b?c#d").await.unwrap();
        assert_eq!(history.messages.len(), 2);
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
