//! Credential-holding relay in front of the Replicate predictions API.
//!
//! Browser or CLI clients post their prompt, image and key here instead of
//! calling Replicate directly. The relay pins the model version and fixed
//! parameters, forwards the call, and passes the upstream JSON back unchanged.
//! Nothing is stored between requests.

mod error;
mod handlers;
mod router;

pub use error::{ApiError, ErrorBody};
pub use router::{proxy_router, ProxyState};

use crate::error::Result;
use crate::prediction::{ReplicateApi, DEFAULT_MODEL_VERSION};
use std::future::Future;
use std::net::SocketAddr;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Upstream base URL; `None` uses `REPLICATE_API_BASE` or the public endpoint.
    pub api_base: Option<String>,
    /// Model version pinned for every submission.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            api_base: None,
            version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    fn state(&self) -> ProxyState {
        let mut builder = ReplicateApi::builder();
        if let Some(base) = &self.api_base {
            builder = builder.api_base(base.clone());
        }
        ProxyState::new(builder.build()).with_version(self.version.clone())
    }
}

/// Runs the relay until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    serve_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Runs the relay until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;
    let state = config.state();

    tracing::info!(%addr, upstream = %state.api.api_base(), "relay listening");

    axum::serve(listener, proxy_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("relay stopped");
    Ok(())
}
