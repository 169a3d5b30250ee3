//! Contains the remote that sends the scenario's requests over HTTP.

use async_trait::async_trait;
use rampload_scenario::{HttpMethod, RequestStep};
use thiserror::Error;

use crate::config::Http;

/// Transport-level failure of a single request.
///
/// Status codes outside the expected range are not errors at this level; they are classified by
/// the caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// No connection could be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other failure while sending the request or reading the response.
    #[error("request failed: {0}")]
    Other(String),
}

impl RequestError {
    /// A short, stable name for the kind of error, used to group errors in the report.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Timeout => "timeout",
            RequestError::Connect(_) => "connect",
            RequestError::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_connect() {
            RequestError::Connect(err.to_string())
        } else {
            RequestError::Other(err.to_string())
        }
    }
}

/// Something that can execute a [`RequestStep`].
///
/// The scheduler only talks to this trait, which keeps the run loop independent of the HTTP
/// client.
#[async_trait]
pub trait Remote: Send + Sync + 'static {
    /// Sends the request and returns the response status code once the body has been read.
    async fn request(&self, step: &RequestStep) -> Result<u16, RequestError>;
}

/// A [`Remote`] that sends requests with a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a new `HttpRemote` with timeouts and user agent taken from `config`.
    ///
    /// The client never retries. Connections are pooled and shared by all virtual users.
    pub fn new(config: &Http) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn request(&self, step: &RequestStep) -> Result<u16, RequestError> {
        let method = match step.method() {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let response = self
            .client
            .request(method, step.url().clone())
            .send()
            .await?;
        let status = response.status().as_u16();

        // Read the body to completion so the connection goes back into the pool.
        response.bytes().await?;

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rampload_test::server::TestServer;

    use super::*;

    fn remote() -> HttpRemote {
        HttpRemote::new(&Http::default()).unwrap()
    }

    #[tokio::test]
    async fn sends_get_without_body() {
        let server = TestServer::new().await;
        let step = RequestStep::get(&server.url("/api/v1/notifications/health")).unwrap();

        let status = remote().request(&step).await.unwrap();
        assert_eq!(status, 200);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].path, "/api/v1/notifications/health");
        assert_eq!(requests[0].body_len, 0);
    }

    #[tokio::test]
    async fn uses_configured_method() {
        let server = TestServer::new().await;
        let step = RequestStep::new(HttpMethod::Delete, &server.url("/thing")).unwrap();

        remote().request(&step).await.unwrap();
        assert_eq!(server.requests()[0].method, "DELETE");
    }

    #[tokio::test]
    async fn returns_error_statuses() {
        let server = TestServer::new().await;
        let step = RequestStep::get(&server.url("/status/503")).unwrap();

        assert_eq!(remote().request(&step).await, Ok(503));
    }

    #[tokio::test]
    async fn classifies_timeouts() {
        let server = TestServer::new().await;
        let config = Http {
            timeout: Duration::from_millis(50),
            ..Http::default()
        };
        let step = RequestStep::get(&server.url("/slow/2000")).unwrap();

        let result = HttpRemote::new(&config).unwrap().request(&step).await;
        assert_eq!(result, Err(RequestError::Timeout));
    }

    #[tokio::test]
    async fn classifies_connection_errors() {
        // Bind and drop a listener to find a port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let step = RequestStep::get(&format!("http://127.0.0.1:{port}/health")).unwrap();

        let err = remote().request(&step).await.unwrap_err();
        assert_eq!(err.kind(), "connect");
    }
}
