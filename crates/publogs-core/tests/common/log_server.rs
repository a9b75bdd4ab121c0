//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed bodies by path and counts GET requests per path so tests can
//! check that idempotent tasks stay off the network. Unknown paths get 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Route {
    status: u32,
    body: Vec<u8>,
}

pub struct LogServer {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    body_delay_ms: Arc<AtomicU64>,
}

impl LogServer {
    /// Start serving `routes` (path -> body, status 200) on an ephemeral port.
    /// The server runs until the process exits.
    pub fn start<I, P, B>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        Self::start_with_status(routes.into_iter().map(|(p, b)| (p, 200, b)))
    }

    /// Like `start` with an explicit status per path.
    pub fn start_with_status<I, P, B>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, u32, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let routes: HashMap<String, Route> = routes
            .into_iter()
            .map(|(path, status, body)| {
                (
                    path.into(),
                    Route {
                        status,
                        body: body.into(),
                    },
                )
            })
            .collect();
        let routes = Arc::new(routes);
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let body_delay_ms = Arc::new(AtomicU64::new(0));

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let server_hits = Arc::clone(&hits);
        let server_delay = Arc::clone(&body_delay_ms);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let hits = Arc::clone(&server_hits);
                let delay = Duration::from_millis(server_delay.load(Ordering::SeqCst));
                thread::spawn(move || handle(stream, &routes, &hits, delay));
            }
        });

        Self {
            base: format!("http://127.0.0.1:{}", port),
            hits,
            body_delay_ms,
        }
    }

    /// Hold every response body back for `delay` after the headers, so
    /// transfers overlap.
    pub fn set_body_delay(&self, delay: Duration) {
        self.body_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Absolute URL for `path` (which starts with '/').
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    routes: &HashMap<String, Route>,
    hits: &Mutex<HashMap<String, usize>>,
    body_delay: Duration,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut first = request.lines().next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("/").to_string();

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let (status, body): (u32, &[u8]) = match routes.get(&path) {
        Some(route) => (route.status, route.body.as_slice()),
        None => (404, &b"not found"[..]),
    };
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    if !body_delay.is_zero() {
        thread::sleep(body_delay);
    }
    let _ = stream.write_all(body);
}
