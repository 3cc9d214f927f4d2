//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Barrier;

use remote_guard::client::{ConnectionGuard, GuardOptions, Transport, TransportError};
use remote_guard::health::{ConnectionStatus, StatusKind, StatusPublisher, StatusSink};
use remote_guard::resilience::policy::{AutoBlockPolicy, ServerErrorPolicy};

pub const REMOTE: &str = "http://repo.example.com/maven2/";

/// What the scripted transport does with the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Status(u16),
    ConnectRefused,
    PoolTimeout,
    Untrusted,
}

/// Transport whose behaviour the test switches at will.
pub struct ScriptedTransport {
    outcome: Mutex<Outcome>,
    gate: Mutex<Option<(Arc<Barrier>, usize)>>,
    pub calls: AtomicUsize,
    pub heads: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            heads: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    /// Hold the next `n` requests until all `n` are in flight.
    pub fn gate_next(&self, n: usize) {
        *self.gate.lock().unwrap() = Some((Arc::new(Barrier::new(n)), n));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    fn take_gate(&self) -> Option<Arc<Barrier>> {
        let mut gate = self.gate.lock().unwrap();
        let (barrier, remaining) = gate.as_mut()?;
        let barrier = barrier.clone();
        *remaining -= 1;
        if *remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.method() == Method::HEAD {
            self.heads.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(barrier) = self.take_gate() {
            barrier.wait().await;
        }

        let outcome = *self.outcome.lock().unwrap();
        match outcome {
            Outcome::Status(code) => {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::from_u16(code).unwrap();
                Ok(response)
            }
            Outcome::ConnectRefused => Err(TransportError::Connect("connection refused".into())),
            Outcome::PoolTimeout => Err(TransportError::PoolTimeout(Duration::from_secs(5))),
            Outcome::Untrusted => Err(TransportError::UntrustedRemote("unknown issuer".into())),
        }
    }
}

/// Records every forwarded transition.
#[derive(Default)]
pub struct RecordingSink {
    pub seen: Mutex<Vec<(ConnectionStatus, ConnectionStatus)>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<StatusKind> {
        self.seen.lock().unwrap().iter().map(|(_, new)| new.kind()).collect()
    }

    pub fn count(&self, kind: StatusKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl StatusSink for RecordingSink {
    fn on_status_changed(&self, old: &ConnectionStatus, new: &ConnectionStatus) {
        self.seen.lock().unwrap().push((old.clone(), new.clone()));
    }
}

pub fn options() -> GuardOptions {
    GuardOptions {
        repository: "maven-central".to_string(),
        remote_url: Some(url::Url::parse(REMOTE).unwrap()),
        ..Default::default()
    }
}

pub fn guard(
    options: GuardOptions,
    transport: Arc<ScriptedTransport>,
) -> (ConnectionGuard, Arc<RecordingSink>) {
    guard_with_policy(options, transport, Arc::new(ServerErrorPolicy))
}

pub fn guard_with_policy(
    options: GuardOptions,
    transport: Arc<ScriptedTransport>,
    policy: Arc<dyn AutoBlockPolicy>,
) -> (ConnectionGuard, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let publisher = StatusPublisher::new(options.repository.clone()).with_sink(sink.clone());
    let guard = ConnectionGuard::new(options, transport, policy, publisher);
    (guard, sink)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn artifact() -> Request<Body> {
    get("http://repo.example.com/maven2/org/example/lib/1.0/lib-1.0.pom")
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let response = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
