//! Exposes an in-process HTTP server for use in integration tests.
//!
//! ```
//! use rampload_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/api/v1/notifications/health");
//!    // point a scenario at the URL ...
//!    assert_eq!(server.hits("/api/v1/notifications/health"), 0);
//! }
//! ```
//!
//! Every request is answered with `200 OK` and recorded, except for:
//!
//!  - `/status/{code}` which responds with the given status code,
//!  - `/slow/{millis}` which waits for the given number of milliseconds before responding.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::routing::any;

/// A request as seen by the [`TestServer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedRequest {
    /// The request method, e.g. `GET`.
    pub method: String,
    /// The request path without query string.
    pub path: String,
    /// Number of bytes in the request body.
    pub body_len: usize,
}

type Recorder = Arc<Mutex<Vec<RecordedRequest>>>;

/// An in-process HTTP server for use in integration tests.
///
/// It listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    requests: Recorder,
}

impl TestServer {
    /// Binds to a random port and starts serving in the background.
    pub async fn new() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let requests = Recorder::default();
        let app = Router::new()
            .route("/status/{code}", any(respond_with_status))
            .route("/slow/{millis}", any(respond_slowly))
            .fallback(respond_ok)
            .with_state(requests.clone());

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            requests,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `127.0.0.1` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://127.0.0.1:{}/{}", self.socket.port(), path)
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `path`, regardless of method.
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn record(requests: &Recorder, method: &Method, uri: &Uri, body: &Bytes) {
    requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_owned(),
        body_len: body.len(),
    });
}

async fn respond_ok(
    State(requests): State<Recorder>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    record(&requests, &method, &uri, &body);
    StatusCode::OK
}

async fn respond_with_status(
    State(requests): State<Recorder>,
    Path(code): Path<u16>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    record(&requests, &method, &uri, &body);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn respond_slowly(
    State(requests): State<Recorder>,
    Path(millis): Path<u64>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    record(&requests, &method, &uri, &body);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    StatusCode::OK
}
