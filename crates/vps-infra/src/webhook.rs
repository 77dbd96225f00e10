use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::types::{Dispatch, ProvisionRequest};
use crate::{BackendKind, Error, ProvisioningBackend, Result};

/// Hands orders to an external provisioning worker (Terraform, Proxmox
/// scripts, ...) over HTTP. The worker reports back by calling the portal's
/// outcome endpoint, so `provision` only confirms the hand-off.
pub struct WebhookBackend {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    callback_base_url: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    server_id: &'a str,
    cores: u32,
    ram_gb: u32,
    storage_gb: u32,
    callback_url: String,
}

impl WebhookBackend {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        callback_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            token,
            callback_base_url: callback_base_url.into(),
        }
    }

    /// Create from env vars: `PROVISIONER_WEBHOOK_URL` and
    /// `PROVISIONER_CALLBACK_BASE_URL` (required), `PROVISIONER_WEBHOOK_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("PROVISIONER_WEBHOOK_URL")
            .map_err(|_| Error::MissingEnv("PROVISIONER_WEBHOOK_URL".into()))?;
        let callback_base_url = std::env::var("PROVISIONER_CALLBACK_BASE_URL")
            .map_err(|_| Error::MissingEnv("PROVISIONER_CALLBACK_BASE_URL".into()))?;
        let token = std::env::var("PROVISIONER_WEBHOOK_TOKEN").ok();

        Ok(Self::new(url, token, callback_base_url))
    }

    /// Where the worker should POST the outcome for `server_id`.
    pub fn callback_url(&self, server_id: &str) -> String {
        format!(
            "{}/internal/servers/{server_id}/outcome",
            self.callback_base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ProvisioningBackend for WebhookBackend {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Dispatch> {
        let payload = WebhookPayload {
            server_id: &request.server_id,
            cores: request.cores,
            ram_gb: request.ram_gb,
            storage_gb: request.storage_gb,
            callback_url: self.callback_url(&request.server_id),
        };

        let mut req = self.http.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Webhook { status, body });
        }

        info!(server_id = %request.server_id, "webhook: provisioning handed off");
        Ok(Dispatch::Deferred)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Webhook
    }
}
