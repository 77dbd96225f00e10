use std::fmt;

use serde::{Deserialize, Serialize};

/// What a backend is asked to build for one order.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Portal-side server id, passed through opaquely.
    pub server_id: String,
    pub cores: u32,
    pub ram_gb: u32,
    pub storage_gb: u32,
}

/// Login details produced by a successful provisioning run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetails {
    pub ip: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("ip", &self.ip)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Terminal result of a provisioning attempt.
///
/// On the wire this is tagged by `result`:
/// `{"result":"success","ip":..,"username":..,"password":..}` or
/// `{"result":"failure","reason":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum ProvisionOutcome {
    Success(ConnectionDetails),
    Failure { reason: String },
}

/// How a backend handled a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The backend ran to completion and has the outcome in hand.
    Completed(ProvisionOutcome),
    /// The work was handed off; the outcome arrives later via callback.
    Deferred,
}
