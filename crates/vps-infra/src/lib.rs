pub mod hetzner;
pub mod simulated;
pub mod types;
pub mod webhook;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use types::{Dispatch, ProvisionRequest};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("hetzner api error: {0}")]
    HetznerApi(String),

    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Webhook {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unsupported spec: {0}")]
    UnsupportedSpec(String),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Known provisioning backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Simulated,
    Hetzner,
    Webhook,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Hetzner => "hetzner",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simulated" => Ok(Self::Simulated),
            "hetzner" => Ok(Self::Hetzner),
            "webhook" => Ok(Self::Webhook),
            other => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

/// Out-of-band worker that turns an order into a running server.
///
/// Callers treat `provision` as fire-and-forget: it runs on its own task and
/// may take arbitrarily long. A backend either finishes inline and returns
/// [`Dispatch::Completed`], or hands the job to an external worker and returns
/// [`Dispatch::Deferred`], in which case the outcome is reported back through
/// the portal's callback endpoint.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync + 'static {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Dispatch>;

    /// Backend identifier.
    fn kind(&self) -> BackendKind;
}

/// Construct the selected backend from its environment variables.
pub fn build_backend(kind: BackendKind) -> Result<Arc<dyn ProvisioningBackend>> {
    dotenvy::dotenv().ok();

    let backend: Arc<dyn ProvisioningBackend> = match kind {
        BackendKind::Simulated => Arc::new(simulated::SimulatedBackend::from_env()?),
        BackendKind::Hetzner => Arc::new(hetzner::HetznerBackend::from_env()?),
        BackendKind::Webhook => Arc::new(webhook::WebhookBackend::from_env()?),
    };

    tracing::info!(backend = %kind, "registered provisioning backend");
    Ok(backend)
}

/// Read an optional env var and parse it, falling back to `default` when unset.
pub(crate) fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidEnv { name, value: raw }),
        Err(_) => Ok(default),
    }
}
