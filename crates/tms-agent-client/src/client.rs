// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the agent `/chat` API.
//!
//! Each call spawns one producer task that owns the response body. The task
//! ends on EOF, on the first read or framing error, or when the caller's
//! cancellation token fires; both channels close when it ends.

use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tms_core::{AgentEvent, AgentStream, AgentTransport, ChatRequest, HealthStatus, TmsError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use crate::sse;

/// Per-call timeout for obtaining a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the per-call events channel.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Upper bound on the error body kept from a non-200 response.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Client for the upstream agent service.
///
/// The timeout covers connecting and receiving response headers. Reading an
/// event stream is bounded only by the caller's cancellation token.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    event_buffer: usize,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TmsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TmsError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            event_buffer: DEFAULT_EVENT_BUFFER,
        })
    }

    /// Overrides the events channel capacity (minimum 1).
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn run_stream(
        &self,
        request: ChatRequest,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), TmsError> {
        let url = format!("{}/chat/process", self.base_url);
        let send = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .json(&request)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TmsError::Cancelled),
            sent = tokio::time::timeout(self.timeout, send) => match sent {
                Err(_) => return Err(TmsError::Timeout { duration: self.timeout }),
                Ok(Err(e)) => {
                    return Err(TmsError::Transport {
                        message: format!("agent request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        debug!(status = %status, session_id = %request.session_id, "agent stream response received");

        if status != StatusCode::OK {
            let body = tokio::select! {
                _ = cancel.cancelled() => return Err(TmsError::Cancelled),
                body = read_capped_body(response, MAX_ERROR_BODY) => body,
            };
            return Err(TmsError::AgentHttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let mut lines = pin!(sse::lines(response.bytes_stream(), sse::MAX_LINE_LENGTH));
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TmsError::Cancelled),
                line = lines.next() => line,
            };

            match line {
                Some(Ok(line)) => deliver(&line, events, cancel).await?,
                Some(Err(e)) => return Err(TmsError::AgentStreamRead { source: Box::new(e) }),
                None => return Ok(()),
            }
        }
    }
}

/// Decode one line and hand it to the caller, blocking while the channel is
/// full. A closed receiver ends the stream like a cancellation.
async fn deliver(
    line: &str,
    events: &mpsc::Sender<AgentEvent>,
    cancel: &CancellationToken,
) -> Result<(), TmsError> {
    let event = match sse::parse_data_line(line) {
        None => return Ok(()),
        Some(Ok(event)) => event,
        Some(Err(e)) => {
            warn!(error = %e, line = %line.trim(), "skipping malformed agent event");
            return Ok(());
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TmsError::Cancelled),
        sent = events.send(event) => sent.map_err(|_| TmsError::Cancelled),
    }
}

async fn read_capped_body(mut response: reqwest::Response, cap: usize) -> String {
    let mut buf = Vec::new();
    while buf.len() < cap {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(cap - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

#[async_trait]
impl AgentTransport for AgentClient {
    fn process_message_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> AgentStream {
        if let Err(e) = request.validate() {
            return AgentStream::failed(e);
        }

        let (events_tx, events) = mpsc::channel(self.event_buffer);
        let (errors_tx, errors) = mpsc::channel(1);
        let client = self.clone();

        tokio::spawn(async move {
            match client.run_stream(request, &events_tx, &cancel).await {
                Ok(()) => debug!("agent stream finished"),
                Err(TmsError::Cancelled) => debug!("agent stream cancelled"),
                Err(err) => {
                    warn!(error = %err, "agent stream failed");
                    // Single slot, single send: only fails if the caller is gone.
                    let _ = errors_tx.try_send(err);
                }
            }
        }
        .in_current_span());

        AgentStream { events, errors }
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<HealthStatus, TmsError> {
        let url = format!("{}/chat/health", self.base_url);
        let request = self.client.get(&url).timeout(self.timeout).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TmsError::Cancelled),
            response = request => response.map_err(|e| TmsError::Unreachable { source: Box::new(e) })?,
        };

        let status = response.status();
        debug!(status = %status, "agent health check");
        if status == StatusCode::OK {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::AgentEventKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;
    use tracing_test::traced_test;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WAIT: Duration = Duration::from_secs(5);

    fn test_client(base_url: &str) -> AgentClient {
        AgentClient::new(base_url, DEFAULT_TIMEOUT).unwrap()
    }

    fn test_request() -> ChatRequest {
        ChatRequest::new("How do I reset my password?", Uuid::new_v4(), Uuid::new_v4(), "sess-1")
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    async fn drain(stream: &mut AgentStream) -> (Vec<AgentEvent>, Vec<TmsError>) {
        let mut events = Vec::new();
        while let Some(ev) = timeout(WAIT, stream.events.recv()).await.unwrap() {
            events.push(ev);
        }
        let mut errors = Vec::new();
        while let Some(err) = timeout(WAIT, stream.errors.recv()).await.unwrap() {
            errors.push(err);
        }
        (events, errors)
    }

    #[tokio::test]
    async fn streams_events_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(sse(
                "data: {\"type\":\"message\",\"content\":\"Hello\"}\n\ndata: {\"type\":\"meta\",\"content\":\"done\"}\n\n",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].known_kind(), Some(AgentEventKind::Message));
        assert_eq!(events[0].content.as_deref(), Some("Hello"));
        assert_eq!(events[1].known_kind(), Some(AgentEventKind::Meta));
        assert_eq!(events[1].content.as_deref(), Some("done"));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn non_200_emits_single_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        assert!(events.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "agent service returned status 500: boom");
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_lines_are_logged_and_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(sse(
                "data: {\"type\":\"message\",\"content\":\"a\"}\n\
                 data: {oops\n\
                 : comment\n\
                 event: ignored\n\
                 data: {\"type\":\"tool_call\"}\n\
                 data: {\"type\":\"done\"}\n",
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["message", "tool_call", "done"]);
        assert!(errors.is_empty());
        assert!(logs_contain("skipping malformed agent event"));
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(sse("data: {\"type\":\"message\",\"content\":\"x\"}\ndata: {\"type\":\"done\"}"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].known_kind(), Some(AgentEventKind::Done));
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn overlong_line_ends_the_stream_with_a_read_error() {
        let server = MockServer::start().await;
        let long = format!("data: {}", "x".repeat(sse::MAX_LINE_LENGTH));
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(sse(&format!("data: {{\"type\":\"message\"}}\n{long}")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(errors.as_slice(), [TmsError::AgentStreamRead { .. }]));
    }

    #[tokio::test]
    async fn sends_sse_headers_and_json_body() {
        let server = MockServer::start().await;
        let request = test_request();
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "text/event-stream"))
            .and(header("cache-control", "no-cache"))
            .and(body_partial_json(serde_json::json!({
                "message": request.message,
                "tenant_id": request.tenant_id,
                "session_id": "sess-1",
            })))
            .respond_with(sse("data: {\"type\":\"done\"}\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut stream = client.process_message_stream(request, CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;
        assert_eq!(events.len(), 1, "headers and body should match: {errors:?}");
    }

    #[tokio::test]
    async fn small_buffer_preserves_order_under_backpressure() {
        let server = MockServer::start().await;
        let body: String = (0..20)
            .map(|i| format!("data: {{\"type\":\"message\",\"content\":\"{i}\"}}\n"))
            .collect();
        Mock::given(method("POST"))
            .and(path("/chat/process"))
            .respond_with(sse(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).with_event_buffer(1);
        let mut stream = client.process_message_stream(test_request(), CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        let contents: Vec<String> = events.into_iter().filter_map(|e| e.content).collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(contents, expected);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_io() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse(""))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut request = test_request();
        request.message = "  ".into();
        let mut stream = client.process_message_stream(request, CancellationToken::new());
        let (events, errors) = drain(&mut stream).await;

        assert!(events.is_empty());
        assert!(matches!(errors.as_slice(), [TmsError::Validation(_)]));
    }

    /// Serves one SSE event over a chunked body that never ends.
    async fn endless_stream_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let event = "data: {\"type\":\"message\",\"content\":\"first\"}\n";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{event}\r\n",
                event.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn cancellation_closes_both_channels() {
        let base_url = endless_stream_server().await;
        let client = test_client(&base_url);
        let cancel = CancellationToken::new();
        let mut stream = client.process_message_stream(test_request(), cancel.clone());

        let first = timeout(WAIT, stream.events.recv()).await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("first"));

        cancel.cancel();

        assert!(timeout(WAIT, stream.events.recv()).await.unwrap().is_none());
        assert!(timeout(WAIT, stream.errors.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn health_check_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/health"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chat/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let cancel = CancellationToken::new();
        assert_eq!(client.health_check(&cancel).await.unwrap(), HealthStatus::Healthy);
        assert_eq!(
            client.health_check(&cancel).await.unwrap(),
            HealthStatus::Unhealthy(503)
        );
    }

    #[tokio::test]
    async fn health_check_unreachable() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{addr}"));
        let err = client
            .health_check(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TmsError::Unreachable { .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = AgentClient::new("http://agent:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), "http://agent:8000");
    }
}
