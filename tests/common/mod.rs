//! Local Connect/JSON sample service for integration tests
//!
//! Serves `pb.Sample` on 127.0.0.1 with an ephemeral port:
//! - `Hello` always answers `{"resMsg": "Hello!"}`
//! - `Bye` answers `{"resMsg": "Bye!"}`, or fails with `invalid_argument`
//!   when `reqMsg` is `"error"`
//! - `Poll` answers `{}` until its third call, then `{"ready": true}`
//!
//! Like a proto3 server, it leaves fields at their default value out.
//!
//! Every response closes the connection, so one request per connection.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Calls to `Poll` before it reports ready
pub const POLL_READY_AFTER: usize = 3;

pub struct SampleServer {
    pub base_url: String,
    calls: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl SampleServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind sample server");
        let addr = listener.local_addr().expect("No local address");

        let calls = Arc::new(AtomicUsize::new(0));
        let polls = Arc::new(AtomicUsize::new(0));
        let (task_calls, task_polls) = (calls.clone(), polls.clone());

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let calls = task_calls.clone();
                let polls = task_polls.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, &calls, &polls).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            calls,
            polls,
            handle,
        }
    }

    /// Requests answered so far, across all methods
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Drop for SampleServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

async fn serve(
    mut stream: TcpStream,
    calls: &AtomicUsize,
    polls: &AtomicUsize,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = (header_end + content_length).min(buf.len());
    let request: Value = serde_json::from_slice(&buf[header_end..end]).unwrap_or(Value::Null);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

    calls.fetch_add(1, Ordering::SeqCst);
    let (status, payload) = route(&path, &request, polls);
    let body = payload.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn route(path: &str, request: &Value, polls: &AtomicUsize) -> (&'static str, Value) {
    match path {
        "/pb.Sample/Hello" => ("200 OK", json!({"resMsg": "Hello!"})),
        "/pb.Sample/Bye" if request["reqMsg"] == "error" => (
            "400 Bad Request",
            json!({"code": "invalid_argument", "message": "invalid argument"}),
        ),
        "/pb.Sample/Bye" => ("200 OK", json!({"resMsg": "Bye!"})),
        "/pb.Sample/Poll" => {
            let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= POLL_READY_AFTER {
                ("200 OK", json!({"ready": true}))
            } else {
                ("200 OK", json!({}))
            }
        }
        _ => (
            "404 Not Found",
            json!({"code": "unimplemented", "message": format!("no method at {}", path)}),
        ),
    }
}
