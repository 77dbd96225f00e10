//! Order admission and provisioning reconciliation.
//!
//! Every record walks `Pending -> Active` or `Pending -> Failed` exactly once.
//! `submit_order` inserts the pending record and hands provisioning to a
//! spawned task; whichever path later reports the outcome (the task itself,
//! a worker callback, or the reaper) goes through `on_provisioning_outcome`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vps_infra::ProvisioningBackend;
use vps_infra::types::{Dispatch, ProvisionOutcome, ProvisionRequest};
use vps_store::models::{
    Connection, RecordMutation, ResourceSpec, ServerId, ServerRecord, ServerStatus,
};
use vps_store::{ServerRecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("server not found: {0}")]
    NotFound(ServerId),

    #[error("invalid server id: {0}")]
    InvalidId(String),

    #[error("duplicate server id: {0}")]
    DuplicateId(ServerId),

    #[error("stale outcome for {id}: server is already {status}")]
    StaleOutcome { id: ServerId, status: ServerStatus },
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::DuplicateId(id) => Self::DuplicateId(id),
            StoreError::AlreadyTerminal { id, status } => Self::StaleOutcome { id, status },
            StoreError::InvalidId(raw) => Self::InvalidId(raw),
        }
    }
}

/// Inclusive range accepted for one resource axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    fn check(&self, field: &str, value: u32) -> Result<(), OrderError> {
        if value == 0 {
            return Err(OrderError::InvalidSpec(format!(
                "{field} must be a positive integer"
            )));
        }
        if value < self.min || value > self.max {
            return Err(OrderError::InvalidSpec(format!(
                "{field} must be between {} and {}, got {value}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// What the configured backends can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderLimits {
    pub cores: Bounds,
    pub ram_gb: Bounds,
    pub storage_gb: Bounds,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            cores: Bounds { min: 1, max: 8 },
            ram_gb: Bounds { min: 2, max: 16 },
            storage_gb: Bounds { min: 50, max: 500 },
        }
    }
}

impl OrderLimits {
    pub fn validate(&self, spec: &ResourceSpec) -> Result<(), OrderError> {
        self.cores.check("cores", spec.cores)?;
        self.ram_gb.check("ram_gb", spec.ram_gb)?;
        self.storage_gb.check("storage_gb", spec.storage_gb)?;
        Ok(())
    }
}

/// Drives server records from submission to a terminal state.
///
/// Cheap to clone; clones share the store and backend.
#[derive(Clone)]
pub struct OrderLifecycleManager {
    store: ServerRecordStore,
    backend: Arc<dyn ProvisioningBackend>,
    limits: OrderLimits,
}

impl OrderLifecycleManager {
    pub fn new(
        store: ServerRecordStore,
        backend: Arc<dyn ProvisioningBackend>,
        limits: OrderLimits,
    ) -> Self {
        Self {
            store,
            backend,
            limits,
        }
    }

    /// Read access for the presentation layer.
    pub fn store(&self) -> &ServerRecordStore {
        &self.store
    }

    pub fn limits(&self) -> &OrderLimits {
        &self.limits
    }

    /// Admit an order and start provisioning it in the background.
    ///
    /// Returns the `Pending` record immediately. Invalid specs are rejected
    /// before anything is stored. Must be called from within a Tokio runtime.
    pub async fn submit_order(
        &self,
        owner: Uuid,
        spec: ResourceSpec,
    ) -> Result<ServerRecord, OrderError> {
        self.limits.validate(&spec)?;

        let record = self.store.insert(ServerRecord::pending(owner, spec)).await?;
        info!(
            server_id = %record.id,
            %owner,
            cores = spec.cores,
            ram_gb = spec.ram_gb,
            storage_gb = spec.storage_gb,
            "order accepted"
        );

        self.dispatch(&record);
        Ok(record)
    }

    fn dispatch(&self, record: &ServerRecord) {
        let manager = self.clone();
        let id = record.id;
        let request = ProvisionRequest {
            server_id: id.to_string(),
            cores: record.spec.cores,
            ram_gb: record.spec.ram_gb,
            storage_gb: record.spec.storage_gb,
        };

        tokio::spawn(async move {
            let outcome = match manager.backend.provision(&request).await {
                Ok(Dispatch::Completed(outcome)) => outcome,
                Ok(Dispatch::Deferred) => {
                    debug!(server_id = %id, backend = %manager.backend.kind(), "awaiting provisioning callback");
                    return;
                }
                Err(e) => {
                    error!(server_id = %id, error = %e, "provisioning backend failed");
                    ProvisionOutcome::Failure {
                        reason: e.to_string(),
                    }
                }
            };

            // Failures are logged inside; nobody is waiting on this task.
            let _ = manager.on_provisioning_outcome(id, outcome).await;
        });
    }

    /// Apply a backend outcome to a pending record.
    ///
    /// A second outcome for the same record yields `StaleOutcome` and leaves
    /// it untouched. An unknown id yields `NotFound`.
    pub async fn on_provisioning_outcome(
        &self,
        id: ServerId,
        outcome: ProvisionOutcome,
    ) -> Result<ServerRecord, OrderError> {
        let delivered_ip = match &outcome {
            ProvisionOutcome::Success(details) => Some(details.ip.clone()),
            ProvisionOutcome::Failure { .. } => None,
        };
        let mutation = match outcome {
            ProvisionOutcome::Success(details) => RecordMutation::Activate(Connection {
                ip: details.ip,
                username: details.username,
                password: details.password,
            }),
            ProvisionOutcome::Failure { reason } => RecordMutation::Fail(reason),
        };
        let target = mutation.target_status();

        match self.store.update(id, mutation).await {
            Ok(record) => {
                match record.failure_reason() {
                    Some(reason) => warn!(server_id = %id, reason, "provisioning failed"),
                    None => info!(server_id = %id, status = %record.status(), "provisioning outcome applied"),
                }
                Ok(record)
            }
            Err(StoreError::AlreadyTerminal { id, status }) => {
                warn!(
                    server_id = %id,
                    %status,
                    ignored = %target,
                    "ignoring stale provisioning outcome"
                );
                if let Some(ip) = delivered_ip {
                    error!(
                        server_id = %id,
                        %ip,
                        %status,
                        backend = %self.backend.kind(),
                        "orphaned server: provisioned after the record was closed, remove it manually"
                    );
                }
                Err(OrderError::StaleOutcome { id, status })
            }
            Err(e) => {
                error!(server_id = %id, error = %e, "provisioning outcome for unknown server");
                Err(e.into())
            }
        }
    }
}
