use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

// ── ServerId ────────────────────────────────────────────────────────

const ID_PREFIX: &str = "sv_";

/// Opaque server identifier, rendered as `sv_<uuid simple form>`.
///
/// Backed by a random v4 UUID so ids never collide in practice and are
/// never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(Uuid);

impl ServerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{}", self.0.simple())
    }
}

impl FromStr for ServerId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only the lowercase simple form is accepted, so each record has one id.
        s.strip_prefix(ID_PREFIX)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Self)
            .filter(|id| id.to_string() == s)
            .ok_or_else(|| StoreError::InvalidId(s.to_string()))
    }
}

impl TryFrom<String> for ServerId {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.to_string()
    }
}

// ── ResourceSpec ────────────────────────────────────────────────────

/// Resources requested by an order. Fixed once the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cores: u32,
    pub ram_gb: u32,
    pub storage_gb: u32,
}

// ── Connection ──────────────────────────────────────────────────────

/// Login details for an active server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("ip", &self.ip)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── ServerStatus / ServerState ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Pending,
    Active,
    Failed,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a record. Connection details exist only on `Active`
/// and a failure reason only on `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Pending,
    Active { connection: Connection },
    Failed { reason: String },
}

impl ServerState {
    pub fn status(&self) -> ServerStatus {
        match self {
            Self::Pending => ServerStatus::Pending,
            Self::Active { .. } => ServerStatus::Active,
            Self::Failed { .. } => ServerStatus::Failed,
        }
    }
}

/// Field-merge applied to a pending record by
/// [`ServerRecordStore::update`](crate::ServerRecordStore::update).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordMutation {
    /// Move to `Active` with the given connection details.
    Activate(Connection),
    /// Move to `Failed` with the given reason.
    Fail(String),
}

impl RecordMutation {
    pub fn target_status(&self) -> ServerStatus {
        match self {
            Self::Activate(_) => ServerStatus::Active,
            Self::Fail(_) => ServerStatus::Failed,
        }
    }

    pub(crate) fn into_state(self) -> ServerState {
        match self {
            Self::Activate(connection) => ServerState::Active { connection },
            Self::Fail(reason) => ServerState::Failed { reason },
        }
    }
}

// ── ServerRecord ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub id: ServerId,
    pub owner: Uuid,
    pub spec: ResourceSpec,
    pub state: ServerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServerRecord {
    /// A fresh `Pending` record with a newly generated id.
    pub fn pending(owner: Uuid, spec: ResourceSpec) -> Self {
        let now = Utc::now();
        Self {
            id: ServerId::new(),
            owner,
            spec,
            state: ServerState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.state.status()
    }

    pub fn connection(&self) -> Option<&Connection> {
        match &self.state {
            ServerState::Active { connection } => Some(connection),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            ServerState::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}
