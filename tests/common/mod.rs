//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roundrobin_proxy::config::ProxyConfig;
use roundrobin_proxy::http::Forwarder;
use roundrobin_proxy::{HttpServer, LoadBalancer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// A raw-TCP backend answering every request with its name.
pub struct MockBackend {
    pub addr: SocketAddr,
    /// Request heads received so far, as raw text.
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn last_request(&self) -> String {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Start a mock backend on an ephemeral port.
pub async fn start_mock_backend(name: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = seen.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                seen.lock().unwrap().push(head);

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    name.len(),
                    name
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend { addr, requests }
}

/// Read until the end of the request head. Test requests carry no body.
async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve `lb` directly as the only service of an axum server.
pub async fn serve(lb: LoadBalancer<Forwarder>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = axum::Router::new().fallback_service(lb);

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// A proxy started through [`HttpServer`], with the admin API enabled.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

pub const API_KEY: &str = "test-admin-key";

pub async fn start_proxy(mut config: ProxyConfig) -> TestProxy {
    config.admin.enabled = true;
    config.admin.api_key = API_KEY.to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, Some(admin_listener), server_shutdown).await
    });

    TestProxy {
        addr,
        admin_addr,
        shutdown,
        handle,
    }
}

/// Client that opens a fresh connection per request and ignores proxy
/// environment variables.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Issue `count` GET requests and collect the response bodies.
pub async fn seq(addr: SocketAddr, count: usize) -> Vec<String> {
    let client = client();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let res = client.get(format!("http://{addr}/")).send().await.unwrap();
        out.push(res.text().await.unwrap());
    }
    out
}
