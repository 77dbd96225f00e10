use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vps_store::models::{Connection, ResourceSpec, ServerId, ServerRecord, ServerStatus};

use crate::orders::{OrderError, OrderLimits};

// ── Requests ───────────────────────────────────────────────────────

/// Body of `POST /servers`. Signed so that negative input reaches
/// validation instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct CreateServerRequest {
    pub cores: i64,
    pub ram_gb: i64,
    pub storage_gb: i64,
}

impl CreateServerRequest {
    pub fn into_spec(self) -> Result<ResourceSpec, OrderError> {
        Ok(ResourceSpec {
            cores: positive("cores", self.cores)?,
            ram_gb: positive("ram_gb", self.ram_gb)?,
            storage_gb: positive("storage_gb", self.storage_gb)?,
        })
    }
}

fn positive(field: &str, value: i64) -> Result<u32, OrderError> {
    if value <= 0 {
        return Err(OrderError::InvalidSpec(format!(
            "{field} must be a positive integer, got {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| OrderError::InvalidSpec(format!("{field} is out of range: {value}")))
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub id: ServerId,
    pub owner: Uuid,
    pub cores: u32,
    pub ram_gb: u32,
    pub storage_gb: u32,
    pub status: ServerStatus,
    pub connection: Option<Connection>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServerRecord> for ServerResponse {
    fn from(r: ServerRecord) -> Self {
        Self {
            id: r.id,
            owner: r.owner,
            cores: r.spec.cores,
            ram_gb: r.spec.ram_gb,
            storage_gb: r.spec.storage_gb,
            status: r.status(),
            connection: r.connection().cloned(),
            failure_reason: r.failure_reason().map(str::to_string),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ServerCounts {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    pub failed: usize,
}

impl ServerCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ServerRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.total += 1;
            match record.status() {
                ServerStatus::Pending => counts.pending += 1,
                ServerStatus::Active => counts.active += 1,
                ServerStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub servers: ServerCounts,
}

/// Bounds plus the preset choices the order form offers.
#[derive(Debug, Serialize)]
pub struct OrderOptionsResponse {
    pub limits: OrderLimits,
    pub cores: Vec<u32>,
    pub ram_gb: Vec<u32>,
    pub storage_gb: Vec<u32>,
}

/// Reply to a provisioning callback. `applied` is false when the record had
/// already reached a terminal state.
#[derive(Debug, Serialize)]
pub struct OutcomeAck {
    pub id: ServerId,
    pub applied: bool,
    pub status: ServerStatus,
}
