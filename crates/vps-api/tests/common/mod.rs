//! Shared fixtures for the vps-api integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use vps_api::orders::{OrderLifecycleManager, OrderLimits};
use vps_infra::types::{ConnectionDetails, Dispatch, ProvisionOutcome, ProvisionRequest};
use vps_infra::{BackendKind, Error, ProvisioningBackend, Result};
use vps_store::ServerRecordStore;
use vps_store::models::{ResourceSpec, ServerId, ServerRecord, ServerStatus};

/// Hands every request to the test and never completes on its own, like a
/// webhook worker that has not called back yet.
pub struct ManualBackend {
    tx: mpsc::UnboundedSender<ProvisionRequest>,
}

impl ManualBackend {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ProvisionRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl ProvisioningBackend for ManualBackend {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Dispatch> {
        let _ = self.tx.send(request.clone());
        Ok(Dispatch::Deferred)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Webhook
    }
}

/// Completes every request inline with the same outcome.
pub struct FixedBackend(pub ProvisionOutcome);

#[async_trait]
impl ProvisioningBackend for FixedBackend {
    async fn provision(&self, _request: &ProvisionRequest) -> Result<Dispatch> {
        Ok(Dispatch::Completed(self.0.clone()))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }
}

/// Fails every request with a backend error.
pub struct BrokenBackend;

#[async_trait]
impl ProvisioningBackend for BrokenBackend {
    async fn provision(&self, _request: &ProvisionRequest) -> Result<Dispatch> {
        Err(Error::HetznerApi("quota exceeded".into()))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hetzner
    }
}

pub fn manager_with(backend: Arc<dyn ProvisioningBackend>) -> OrderLifecycleManager {
    OrderLifecycleManager::new(ServerRecordStore::new(), backend, OrderLimits::default())
}

pub fn spec(cores: u32, ram_gb: u32, storage_gb: u32) -> ResourceSpec {
    ResourceSpec {
        cores,
        ram_gb,
        storage_gb,
    }
}

pub fn success(ip: &str, username: &str, password: &str) -> ProvisionOutcome {
    ProvisionOutcome::Success(ConnectionDetails {
        ip: ip.into(),
        username: username.into(),
        password: password.into(),
    })
}

pub fn failure(reason: &str) -> ProvisionOutcome {
    ProvisionOutcome::Failure {
        reason: reason.into(),
    }
}

/// Poll the store until the record leaves `Pending`.
pub async fn wait_for_terminal(store: &ServerRecordStore, id: ServerId) -> ServerRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = store.get(id).await.expect("record exists");
            if record.status() != ServerStatus::Pending {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("record never left pending")
}
