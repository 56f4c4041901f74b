//! Mock API server for testing the HTTP client
//!
//! Serves the same routes as the real services on a random local port:
//! - GET  /ledger/deposits returns two deposits, newest first
//! - GET  /station/balance returns { balanceUsd: "100.00" }
//! - POST /withdrawals, /withdrawals/fiat
//! - POST /auth/passcode/verify accepts "123456"
//! - POST /fund (wallet bridge) returns { signature: "sig-bridge" }

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use super::http::SESSION_HEADER;

const ACCEPTED_PASSCODE: &str = "123456";

#[derive(Debug, Clone, Default)]
pub struct MockApiConfig {
    /// Withdrawals without this session header get a 401
    pub required_session_token: Option<String>,
    /// Fail every withdrawal with (status, message)
    pub fail_withdrawals_with: Option<(u16, String)>,
    /// Wallet bridge fails with this error code
    pub bridge_error_code: Option<String>,
}

pub struct MockApiServer {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockApiServer {
    /// Start on a random available port
    pub fn start(config: MockApiConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        thread::spawn(move || handle_connection(stream, &cfg));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MockRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl MockRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read headers, then as much body as Content-Length announces
fn read_request(stream: &mut TcpStream) -> Option<MockRequest> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;

    let mut data = Vec::new();
    let mut buffer = [0; 4096];
    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }
    let body = String::from_utf8_lossy(&data[header_end..]).to_string();

    Some(MockRequest {
        method,
        path,
        headers,
        body,
    })
}

fn handle_connection(mut stream: TcpStream, config: &MockApiConfig) {
    let Some(request) = read_request(&mut stream) else {
        send_response(&mut stream, 400, "Bad Request", r#"{"error": "Invalid request"}"#);
        return;
    };
    let path = request.path.split('?').next().unwrap_or("").to_string();

    match (request.method.as_str(), path.as_str()) {
        ("GET", "/ledger/deposits") => {
            let body = json!({
                "deposits": [
                    {"id": "dep-2", "amountUsd": "50.00", "signature": "sig-newest", "createdAtEpochMs": 2000},
                    {"id": "dep-1", "amountUsd": "10.00", "signature": null, "createdAtEpochMs": 1000}
                ]
            });
            send_response(&mut stream, 200, "OK", &body.to_string());
        }
        ("GET", "/station/balance") => {
            send_response(&mut stream, 200, "OK", r#"{"balanceUsd": "100.00"}"#);
        }
        ("POST", "/withdrawals") | ("POST", "/withdrawals/fiat") => {
            if let Some((status, message)) = &config.fail_withdrawals_with {
                let body = json!({ "error": message });
                send_response(&mut stream, *status, "Error", &body.to_string());
                return;
            }
            if let Some(required) = &config.required_session_token {
                if request.header(SESSION_HEADER) != Some(required.as_str()) {
                    send_response(
                        &mut stream,
                        401,
                        "Unauthorized",
                        r#"{"error": "Authorization expired"}"#,
                    );
                    return;
                }
            }
            send_response(&mut stream, 200, "OK", r#"{"id": "wd-1", "status": "pending"}"#);
        }
        ("POST", "/auth/passcode/verify") => {
            let passcode = serde_json::from_str::<serde_json::Value>(&request.body)
                .ok()
                .and_then(|v| v.get("passcode").and_then(|p| p.as_str()).map(String::from));
            if passcode.as_deref() == Some(ACCEPTED_PASSCODE) {
                send_response(
                    &mut stream,
                    200,
                    "OK",
                    r#"{"verified": true, "token": "server-token"}"#,
                );
            } else {
                send_response(&mut stream, 401, "Unauthorized", r#"{"error": "Invalid passcode"}"#);
            }
        }
        ("POST", "/fund") => match &config.bridge_error_code {
            Some(code) => {
                let body = json!({ "error": "Wallet hand-off failed", "code": code });
                send_response(&mut stream, 409, "Conflict", &body.to_string());
            }
            None => send_response(&mut stream, 200, "OK", r#"{"signature": "sig-bridge"}"#),
        },
        _ => send_response(
            &mut stream,
            404,
            "Not Found",
            r#"{"error": "Endpoint not found"}"#,
        ),
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
