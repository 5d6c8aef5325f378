//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use gatekeeper::config::GateConfig;
use gatekeeper::lifecycle::{Gatekeeper, Shutdown, StartupError};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SECRET: &str = "s3cr3t-value";
pub const ALLOWED_PATH: &str = "/hook";

/// A running echo upstream and the number of requests it has seen.
pub struct Upstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start an upstream that echoes what it received as JSON.
///
/// A `status` query parameter selects the response status and `delay_ms`
/// holds the response back.
pub async fn start_echo_upstream() -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .fallback(echo)
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Upstream { addr, hits }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);

    let param = |key: &str| {
        uri.query()
            .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix(key)))
            .and_then(|v| v.strip_prefix('='))
            .map(str::to_string)
    };

    if let Some(ms) = param("delay_ms").and_then(|v| v.parse::<u64>().ok()) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let status = param("status")
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::OK);

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    (
        status,
        [("x-upstream", "echo")],
        Json(serde_json::json!({
            "method": method.as_str(),
            "uri": uri.to_string(),
            "body": String::from_utf8_lossy(&body),
            "host": header("host"),
            "x_forwarded_for": header("x-forwarded-for"),
            "x_flag": header("x-flag"),
        })),
    )
}

/// Start an upstream that answers any request with `101 Switching Protocols`
/// to `Upgrade: echo` and then echoes raw bytes back.
///
/// The request head it received is sent on the returned channel.
pub async fn start_upgrade_upstream() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = tx.send(head);
                socket
                    .write_all(
                        b"HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\nUpgrade: echo\r\n\r\n",
                    )
                    .await
                    .unwrap();

                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    (addr, rx)
}

/// Read an HTTP/1.1 head byte by byte, up to and including the blank line.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Self-signed certificate and key written as PEM files.
pub struct TestCert {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_pem: String,
}

pub fn write_cert(dir: &Path) -> TestCert {
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();

    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

    TestCert {
        cert_path,
        key_path,
        cert_pem: cert.pem(),
    }
}

/// A config that listens on an ephemeral loopback port with fresh TLS files.
pub fn test_config(dir: &Path, upstream: &str) -> (GateConfig, TestCert) {
    let cert = write_cert(dir);
    let config = GateConfig {
        cert_file: cert.cert_path.display().to_string(),
        key_file: cert.key_path.display().to_string(),
        log_file: dir.join("access.log").display().to_string(),
        upstream_address: upstream.to_string(),
        allowed_path: ALLOWED_PATH.to_string(),
        required_header_value: SECRET.to_string(),
        listen: "127.0.0.1:0".to_string(),
        ..GateConfig::default()
    };
    (config, cert)
}

/// Serialize `config` to `config.json` inside `dir`.
pub fn write_config(dir: &Path, config: &GateConfig) -> PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

/// A gatekeeper running in the background.
pub struct RunningGate {
    pub addr: SocketAddr,
    pub log_path: PathBuf,
    pub cert: TestCert,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), StartupError>>,
    _dir: TempDir,
}

impl RunningGate {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("https://127.0.0.1:{}{}", self.addr.port(), path_and_query)
    }

    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Start a gatekeeper in front of `upstream`, letting `tweak` adjust the config.
pub async fn start_gate_with(upstream: &str, tweak: impl FnOnce(&mut GateConfig)) -> RunningGate {
    let dir = TempDir::new().unwrap();
    let (mut config, cert) = test_config(dir.path(), upstream);
    tweak(&mut config);
    let log_path = PathBuf::from(&config.log_file);

    let gate = Gatekeeper::prepare(config).unwrap();
    let addr = gate.local_addr();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(gate.run(shutdown.subscribe()));

    // The socket is already bound; this only lets the accept loop spin up.
    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningGate {
        addr,
        log_path,
        cert,
        shutdown,
        task,
        _dir: dir,
    }
}

pub async fn start_gate(upstream: &str) -> RunningGate {
    start_gate_with(upstream, |_| {}).await
}

/// HTTPS client that trusts any certificate.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
