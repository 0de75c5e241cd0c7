//! HTTP transport for the playback device's REST API
//!
//! Calls `http://{host}:{port}{path}` with a JSON content type. There is no
//! retry: a failed call is reported and the next poll simply tries again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, trace};

use super::{ConnectionStatus, HttpMethod, StatusReporter, Transport, TransportError};

/// reqwest-backed [`Transport`]
pub struct HttpTransport {
    client: RwLock<reqwest::Client>,
    base_url: RwLock<String>,
    status: StatusReporter,
}

impl HttpTransport {
    /// Create a transport for `http://{host}:{port}`
    pub fn new(host: &str, port: u16, timeout: Duration, status: StatusReporter) -> Result<Self> {
        Self::with_base_url(base_url(host, port), timeout, status)
    }

    /// Create a transport for an explicit base URL (no trailing slash)
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
        status: StatusReporter,
    ) -> Result<Self> {
        Ok(Self {
            client: RwLock::new(build_client(timeout)?),
            base_url: RwLock::new(base_url.into()),
            status,
        })
    }

    /// Point the transport at a new device and request timeout
    pub fn reconfigure(&self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        let client = build_client(timeout)?;
        *self.client.write() = client;
        *self.base_url.write() = base_url(host, port);
        Ok(())
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().clone()
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }
}

fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_command(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url.read().as_str(), path);
        let client = self.client.read().clone();

        let mut request = match method {
            HttpMethod::Get => client.get(&url),
            HttpMethod::Post => client.post(&url),
        }
        .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        trace!(%method, %url, "→ device");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error: {}", e);
                self.status
                    .update(ConnectionStatus::ConnectionFailure(e.to_string()));
                return Err(TransportError::Connection(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            self.status.update(ConnectionStatus::Ok);
        } else {
            error!(
                "HTTP Error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            self.status
                .update(ConnectionStatus::Warning(format!("HTTP Error: {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| {
            self.status
                .update(ConnectionStatus::ConnectionFailure(e.to_string()));
            TransportError::Connection(e.to_string())
        })?;

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| TransportError::Parse {
            status: status.as_u16(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport_for(server: &mockito::ServerGuard) -> HttpTransport {
        HttpTransport::with_base_url(server.url(), Duration::from_secs(2), StatusReporter::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_status_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"buttons":[{"buttonNumber":1,"state":"idle"}],"currentPage":0}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let value = transport
            .send_command("/api/status", HttpMethod::Get, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(value["buttons"][0]["buttonNumber"], 1);
        assert_eq!(transport.status().current(), ConnectionStatus::Ok);
    }

    #[tokio::test]
    async fn test_post_with_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/button/button-0/fade")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({ "duration": 3000 })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let value = transport
            .send_command(
                "/api/button/button-0/fade",
                HttpMethod::Post,
                Some(json!({ "duration": 3000 })),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(value, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_http_error_still_returns_body_and_warns() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/stop-all")
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let value = transport
            .send_command("/api/stop-all", HttpMethod::Post, None)
            .await
            .unwrap();

        assert_eq!(value["error"], "boom");
        assert_eq!(
            transport.status().current(),
            ConnectionStatus::Warning("HTTP Error: 500".into())
        );
    }

    #[tokio::test]
    async fn test_http_error_with_garbage_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/status")
            .with_status(503)
            .with_body("<html>unavailable</html>")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .send_command("/api/status", HttpMethod::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Parse { status: 503, .. }));
        assert!(matches!(
            transport.status().current(),
            ConnectionStatus::Warning(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/next")
            .with_status(204)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let value = transport
            .send_command("/api/next", HttpMethod::Post, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_unreachable_device_reports_connection_failure() {
        // Bind then drop a listener so the port is known to be closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport =
            HttpTransport::new("127.0.0.1", port, Duration::from_secs(2), StatusReporter::new())
                .unwrap();
        let err = transport
            .send_command("/api/status", HttpMethod::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connection(_)));
        assert!(matches!(
            transport.status().current(),
            ConnectionStatus::ConnectionFailure(_)
        ));
    }

    #[test]
    fn test_reconfigure_changes_target() {
        let transport =
            HttpTransport::new("localhost", 8090, Duration::from_secs(1), StatusReporter::new())
                .unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8090");

        transport
            .reconfigure("10.0.0.5", 9000, Duration::from_secs(3))
            .unwrap();
        assert_eq!(transport.base_url(), "http://10.0.0.5:9000");
    }
}
