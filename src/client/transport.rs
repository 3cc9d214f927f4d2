//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Define the [`Transport`] seam the guard wraps
//! - Provide [`HyperTransport`], a pooled hyper-util client with connect,
//!   request and pool-checkout timeouts
//! - Translate client failures into [`TransportError`] variants the
//!   classifier understands

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ConnectionConfig;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No pooled connection became available in time.
    #[error("timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),

    /// TLS peer verification failed.
    #[error("remote certificate not trusted: {0}")]
    UntrustedRemote(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Stable short name used in classified reasons.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransportError::PoolTimeout(_) => "PoolTimeout",
            TransportError::UntrustedRemote(_) => "UntrustedRemote",
            TransportError::Connect(_) => "ConnectError",
            TransportError::Timeout(_) => "Timeout",
            TransportError::Io(_) => "IoError",
            TransportError::Protocol(_) => "ProtocolError",
        }
    }
}

/// The real network call, below the guard.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        (**self).send(request).await
    }
}

/// Plain-HTTP transport on the hyper-util pooled client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
    pool_timeout: Duration,
}

impl HyperTransport {
    pub fn new(config: &ConnectionConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.enforce_http(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_connections)
            .build(connector);

        Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            pool_timeout: Duration::from_millis(config.pool_timeout_ms),
        }
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("available_permits", &self.permits.available_permits())
            .field("request_timeout", &self.request_timeout)
            .field("pool_timeout", &self.pool_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let _permit = match tokio::time::timeout(self.pool_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(TransportError::Protocol("transport closed".into())),
            Err(_) => return Err(TransportError::PoolTimeout(self.pool_timeout)),
        };

        let response = match tokio::time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(map_client_error(&e)),
            Err(_) => return Err(TransportError::Timeout(self.request_timeout)),
        };

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn map_client_error(err: &hyper_util::client::legacy::Error) -> TransportError {
    let detail = error_chain(err);

    if err.is_connect() {
        return TransportError::Connect(detail);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return TransportError::Io(std::io::Error::new(io.kind(), detail));
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return TransportError::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, detail));
            }
        }
        source = cause.source();
    }

    TransportError::Protocol(detail)
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
