use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::info;

use crate::types::{ConnectionDetails, Dispatch, ProvisionOutcome, ProvisionRequest};
use crate::{BackendKind, Error, ProvisioningBackend, Result, env_parse};

const DEFAULT_DELAY_SECS: u64 = 8;

/// Stand-in backend that sleeps for a while and then hands out random
/// connection details. Useful for demos and local development.
pub struct SimulatedBackend {
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedBackend {
    /// `failure_rate` is clamped to `0.0..=1.0`.
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        Self {
            delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Create from env vars:
    ///
    /// - `SIMULATED_PROVISION_DELAY_SECS` (default: `8`)
    /// - `SIMULATED_FAILURE_RATE` (default: `0.0`, must be within `0.0..=1.0`)
    pub fn from_env() -> Result<Self> {
        let delay_secs = env_parse("SIMULATED_PROVISION_DELAY_SECS", DEFAULT_DELAY_SECS)?;
        let failure_rate: f64 = env_parse("SIMULATED_FAILURE_RATE", 0.0)?;
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(Error::InvalidEnv {
                name: "SIMULATED_FAILURE_RATE",
                value: failure_rate.to_string(),
            });
        }

        Ok(Self::new(Duration::from_secs(delay_secs), failure_rate))
    }

    fn generate_connection() -> ConnectionDetails {
        let host = rand::rng().random_range(50..250);
        ConnectionDetails {
            ip: format!("192.168.1.{host}"),
            username: format!("user_{}", random_alphanumeric(6).to_lowercase()),
            password: format!("P@ss{}", random_alphanumeric(12)),
        }
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl ProvisioningBackend for SimulatedBackend {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Dispatch> {
        tokio::time::sleep(self.delay).await;

        let failed = self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate);
        if failed {
            info!(server_id = %request.server_id, "simulated: provisioning failed");
            return Ok(Dispatch::Completed(ProvisionOutcome::Failure {
                reason: "simulated provisioning failure".into(),
            }));
        }

        let details = Self::generate_connection();
        info!(server_id = %request.server_id, ip = %details.ip, "simulated: server provisioned");
        Ok(Dispatch::Completed(ProvisionOutcome::Success(details)))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }
}
