//! One-route HTTP server for offline client tests.
//!
//! Answers every request with the same canned status and JSON body and keeps
//! the raw request text (head + body) so tests can check what was sent.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Request line of the first request, e.g. `GET /api/... HTTP/1.1`.
    pub fn first_request_line(&self) -> String {
        self.requests()
            .first()
            .and_then(|r| r.lines().next().map(str::to_string))
            .unwrap_or_default()
    }
}

pub async fn serve(status: u16, body: impl Into<String>) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.into();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = requests.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let body = body.clone();
            let seen = seen.clone();
            tokio::spawn(answer(stream, status, body, seen));
        }
    });

    StubServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

async fn answer(
    mut stream: TcpStream,
    status: u16,
    body: String,
    seen: Arc<Mutex<Vec<String>>>,
) -> Option<()> {
    let request = read_request(&mut stream).await?;
    // Recorded before replying so the client never sees a response first.
    seen.lock().unwrap().push(request);
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()
}

/// Read the head, then as many body bytes as Content-Length announces.
async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}
