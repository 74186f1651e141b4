//! Drover control channel
//!
//! The single authenticated channel between a runner and the orchestrator.
//!
//! Every operation is a unary call: a JSON `POST {base}/rpc/{method}` carrying
//! the organization id and runner token, over one pooled keep-alive
//! connection. A background driver task owns the connection lifecycle (dial,
//! liveness ping, reconnect); callers only see [`ControlChannel::is_connected`]
//! and [`ClientError::NotConnected`] while the channel is down. The channel
//! never retries on its own, report pipelines do.
//!
//! # Example
//!
//! ```no_run
//! use drover_client::{ChannelConfig, ControlChannel, Credentials};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let channel = Arc::new(ControlChannel::new(ChannelConfig::new(
//!         "http://localhost:8080",
//!         Credentials::new("org1", "runner-token"),
//!     ))?);
//!     channel.connect();
//!
//!     // ... use the channel ...
//!
//!     channel.disconnect().await;
//!     Ok(())
//! }
//! ```

mod connection;
pub mod error;
mod jobs;
mod oauth;
mod plane;
mod reports;

pub use connection::ConnectionState;
pub use error::{ClientError, Result};
pub use plane::ControlPlane;

use drover_core::dto::{Ack, Envelope};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Organization id and runner token attached to every request
#[derive(Debug, Clone)]
pub struct Credentials {
    pub organization_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(organization_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            token: token.into(),
        }
    }
}

/// PEM material for mutual TLS
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    /// Client certificate chain
    pub cert_pem: Vec<u8>,
    /// PKCS#8 private key for the certificate
    pub key_pem: Vec<u8>,
    /// Extra root certificate to trust for the orchestrator
    pub ca_pem: Option<Vec<u8>>,
}

/// Construction parameters for a [`ControlChannel`]
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub base_url: String,
    pub credentials: Credentials,
    /// Interval between liveness probes
    pub ping_interval: Duration,
    /// Per-request time budget
    pub request_timeout: Duration,
    pub tls: Option<TlsMaterial>,
}

impl ChannelConfig {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            ping_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            tls: None,
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Client side of the control channel
///
/// Owned by the runtime root behind an `Arc`. The connection state lives
/// behind a mutex that is never held across a network call; the
/// `connected` flag mirrors it for lock-free reads and may be stale.
pub struct ControlChannel {
    base_url: String,
    credentials: Credentials,
    ping_interval: Duration,
    request_timeout: Duration,
    tls: Option<TlsMaterial>,

    /// Pooled HTTP client; replaced to drop the underlying sockets
    http: RwLock<Client>,
    state: Mutex<ConnectionState>,
    connected: AtomicBool,

    /// Set once the driver task has been spawned
    started: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
    closing: CancellationToken,
}

impl ControlChannel {
    /// Create a new channel in the `Unconnected` state
    ///
    /// Nothing is dialed until [`ControlChannel::connect`] is called.
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "orchestrator url must start with http:// or https://, got {}",
                base_url
            )));
        }

        let http = build_http_client(config.request_timeout, config.tls.as_ref())?;

        Ok(Self {
            base_url,
            credentials: config.credentials,
            ping_interval: config.ping_interval,
            request_timeout: config.request_timeout,
            tls: config.tls,
            http: RwLock::new(http),
            state: Mutex::new(ConnectionState::Unconnected),
            connected: AtomicBool::new(false),
            started: AtomicBool::new(false),
            driver: Mutex::new(None),
            closing: CancellationToken::new(),
        })
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Organization this runner authenticates as
    pub fn organization_id(&self) -> &str {
        &self.credentials.organization_id
    }

    /// Lock-free view of the connection; may lag the driver by one probe
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // =============================================================================
    // Calls
    // =============================================================================

    /// Issue a call on behalf of the runner's own organization
    pub(crate) async fn call<B, R>(&self, method: &str, body: B) -> Result<R>
    where
        B: Serialize + Send,
        R: DeserializeOwned,
    {
        let organization_id = self.credentials.organization_id.clone();
        self.call_for(method, &organization_id, body).await
    }

    /// Issue a call partitioned by an explicit organization id
    pub(crate) async fn call_for<B, R>(&self, method: &str, organization_id: &str, body: B) -> Result<R>
    where
        B: Serialize + Send,
        R: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.raw_call(method, organization_id, body).await
    }

    /// Issue a call whose reply is a plain acknowledgment
    pub(crate) async fn acknowledged<B>(&self, method: &str, organization_id: &str, body: B) -> Result<()>
    where
        B: Serialize + Send,
    {
        let ack: Ack = self.call_for(method, organization_id, body).await?;
        if !ack.is_done() {
            return Err(ClientError::NotDone {
                method: method.to_string(),
            });
        }
        Ok(())
    }

    /// Send a request regardless of the connection flag
    ///
    /// Used by the driver's liveness probe, which is what sets the flag.
    async fn raw_call<B, R>(&self, method: &str, organization_id: &str, body: B) -> Result<R>
    where
        B: Serialize + Send,
        R: DeserializeOwned,
    {
        // Clone the pooled client out of the lock before any I/O
        let http = self.http_client();
        let url = format!("{}/rpc/{}", self.base_url, method);
        let envelope = Envelope::new(organization_id, self.credentials.token.as_str(), body);

        let response = http.post(&url).json(&envelope).send().await?;
        Self::handle_response(response).await
    }

    fn http_client(&self) -> Client {
        self.http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the pooled client so idle sockets to a dead peer are closed
    fn reset_transport(&self) {
        match build_http_client(self.request_timeout, self.tls.as_ref()) {
            Ok(fresh) => {
                *self.http.write().unwrap_or_else(PoisonError::into_inner) = fresh;
            }
            Err(e) => tracing::warn!("Failed to rebuild HTTP client, keeping the old one: {}", e),
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Build the pooled HTTP client; one idle connection per host keeps the
/// runner observable as a single channel
fn build_http_client(timeout: Duration, tls: Option<&TlsMaterial>) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(1)
        .tcp_keepalive(Duration::from_secs(30));

    if let Some(tls) = tls {
        let identity = reqwest::Identity::from_pkcs8_pem(&tls.cert_pem, &tls.key_pem)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid client identity: {}", e)))?;
        builder = builder.identity(identity);

        if let Some(ca) = &tls.ca_pem {
            let cert = reqwest::Certificate::from_pem(ca)
                .map_err(|e| ClientError::InvalidConfig(format!("invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|e| ClientError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
pub(crate) mod test_server;
