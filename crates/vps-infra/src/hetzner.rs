use std::time::Duration;

use async_trait::async_trait;
use hcloud::apis::configuration::Configuration;
use hcloud::apis::servers_api;
use hcloud::models;
use tracing::{info, warn};

use crate::types::{ConnectionDetails, Dispatch, ProvisionOutcome, ProvisionRequest};
use crate::{BackendKind, Error, ProvisioningBackend, Result, env_parse};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A Hetzner shared-vCPU server type and what it offers.
struct ServerType {
    name: &'static str,
    cores: u32,
    ram_gb: u32,
    disk_gb: u32,
}

/// Ordered smallest first.
const SERVER_TYPES: &[ServerType] = &[
    ServerType { name: "cpx11", cores: 2, ram_gb: 2, disk_gb: 40 },
    ServerType { name: "cpx21", cores: 3, ram_gb: 4, disk_gb: 80 },
    ServerType { name: "cpx31", cores: 4, ram_gb: 8, disk_gb: 160 },
    ServerType { name: "cpx41", cores: 8, ram_gb: 16, disk_gb: 240 },
    ServerType { name: "cpx51", cores: 16, ram_gb: 32, disk_gb: 360 },
];

/// Hetzner Cloud backend using the `hcloud` crate.
///
/// Creates the server, waits until Hetzner reports it running, and returns
/// its address with the root password Hetzner generated at creation.
pub struct HetznerBackend {
    config: Configuration,
    location: String,
    image: String,
    network_id: Option<i64>,
    firewall_id: Option<i64>,
    max_polls: u32,
}

impl HetznerBackend {
    /// Create from env vars:
    ///
    /// - `HETZNER_API_TOKEN` (required)
    /// - `HETZNER_LOCATION` (default: `"fsn1"`)
    /// - `HETZNER_IMAGE` (default: `"ubuntu-24.04"`)
    /// - `HETZNER_NETWORK_ID` (optional, integer)
    /// - `HETZNER_FIREWALL_ID` (optional, integer)
    /// - `HETZNER_MAX_POLLS` (default: `60`, polled every 5s)
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("HETZNER_API_TOKEN")
            .map_err(|_| Error::MissingEnv("HETZNER_API_TOKEN".into()))?;

        let mut config = Configuration::new();
        config.bearer_access_token = Some(token);

        let location = std::env::var("HETZNER_LOCATION").unwrap_or_else(|_| "fsn1".into());
        let image = std::env::var("HETZNER_IMAGE").unwrap_or_else(|_| "ubuntu-24.04".into());

        let network_id = std::env::var("HETZNER_NETWORK_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok());

        let firewall_id = std::env::var("HETZNER_FIREWALL_ID")
            .ok()
            .and_then(|s| s.parse::<i64>().ok());

        Ok(Self {
            config,
            location,
            image,
            network_id,
            firewall_id,
            max_polls: env_parse("HETZNER_MAX_POLLS", 60)?,
        })
    }

    /// Pick the smallest server type that covers the requested resources.
    fn server_type(cores: u32, ram_gb: u32, storage_gb: u32) -> Result<&'static str> {
        SERVER_TYPES
            .iter()
            .find(|t| t.cores >= cores && t.ram_gb >= ram_gb && t.disk_gb >= storage_gb)
            .map(|t| t.name)
            .ok_or_else(|| {
                Error::UnsupportedSpec(format!(
                    "no hetzner server type offers {cores} cores, {ram_gb} GB RAM, {storage_gb} GB disk"
                ))
            })
    }

    /// Creation request for the portal server `server_id`.
    fn create_request(&self, server_id: &str, server_type: &str) -> models::CreateServerRequest {
        let firewalls = self.firewall_id.map(|fw_id| {
            vec![models::CreateServerRequestFirewalls {
                firewall: fw_id,
            }]
        });

        models::CreateServerRequest {
            // Hetzner names must be valid hostnames.
            name: server_id.replace('_', "-"),
            server_type: server_type.into(),
            image: self.image.clone(),
            location: Some(self.location.clone()),
            user_data: None,
            networks: self.network_id.map(|id| vec![id]),
            firewalls,
            ssh_keys: None,
            volumes: None,
            start_after_create: Some(true),
            automount: None,
            datacenter: None,
            labels: None,
            placement_group: None,
            public_net: None,
        }
    }

    /// Public IPv4 if assigned, otherwise the first private network address.
    fn address(server: &models::Server) -> Option<String> {
        server
            .public_net
            .ipv4
            .as_ref()
            .map(|v4| v4.ip.clone())
            .or_else(|| server.private_net.first().and_then(|net| net.ip.clone()))
    }

    /// Poll until Hetzner reports the server running, then return its address.
    async fn wait_until_running(&self, server_id: i64) -> Result<Option<String>> {
        for _ in 0..self.max_polls {
            let resp = servers_api::get_server(
                &self.config,
                servers_api::GetServerParams { id: server_id },
            )
            .await
            .map_err(|e| Error::HetznerApi(format!("get server: {e}")))?;

            let server = resp
                .server
                .ok_or_else(|| Error::HetznerApi("server not found in response".into()))?;

            if matches!(server.status, models::server::Status::Running) {
                return Ok(Self::address(&server));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(Error::HetznerApi(format!(
            "server {server_id} not running after {} polls",
            self.max_polls
        )))
    }

    async fn destroy(&self, server_id: i64) {
        if let Err(e) = servers_api::delete_server(
            &self.config,
            servers_api::DeleteServerParams { id: server_id },
        )
        .await
        {
            warn!(server_id, error = %e, "hetzner: cleanup after failed provisioning failed");
        }
    }
}

#[async_trait]
impl ProvisioningBackend for HetznerBackend {
    async fn provision(&self, request: &ProvisionRequest) -> Result<Dispatch> {
        let server_type = Self::server_type(request.cores, request.ram_gb, request.storage_gb)?;

        let resp = servers_api::create_server(
            &self.config,
            servers_api::CreateServerParams {
                create_server_request: self.create_request(&request.server_id, server_type),
            },
        )
        .await
        .map_err(|e| Error::HetznerApi(format!("create server: {e}")))?;

        let hetzner_id = resp.server.id;
        info!(
            server_id = %request.server_id,
            hetzner_id,
            server_type,
            "hetzner: server created"
        );

        let Some(password) = resp.root_password else {
            self.destroy(hetzner_id).await;
            return Err(Error::HetznerApi("no root password returned".into()));
        };

        let address = match self.wait_until_running(hetzner_id).await {
            Ok(address) => address,
            Err(e) => {
                self.destroy(hetzner_id).await;
                return Err(e);
            }
        };

        let Some(ip) = address else {
            self.destroy(hetzner_id).await;
            return Ok(Dispatch::Completed(ProvisionOutcome::Failure {
                reason: "server has no reachable address".into(),
            }));
        };

        info!(server_id = %request.server_id, hetzner_id, %ip, "hetzner: server running");

        Ok(Dispatch::Completed(ProvisionOutcome::Success(ConnectionDetails {
            ip,
            username: "root".into(),
            password,
        })))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hetzner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_smallest_fitting_type() {
        assert_eq!(HetznerBackend::server_type(1, 2, 40).unwrap(), "cpx11");
        assert_eq!(HetznerBackend::server_type(2, 4, 50).unwrap(), "cpx21");
        assert_eq!(HetznerBackend::server_type(2, 4, 100).unwrap(), "cpx31");
        assert_eq!(HetznerBackend::server_type(8, 16, 200).unwrap(), "cpx41");
    }

    #[test]
    fn storage_alone_can_force_a_larger_type() {
        assert_eq!(HetznerBackend::server_type(1, 2, 300).unwrap(), "cpx51");
    }

    #[test]
    fn oversized_spec_is_unsupported() {
        let err = HetznerBackend::server_type(8, 16, 500).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSpec(_)));
    }

    fn backend() -> HetznerBackend {
        HetznerBackend {
            config: Configuration::new(),
            location: "nbg1".into(),
            image: "debian-12".into(),
            network_id: Some(42),
            firewall_id: None,
            max_polls: 1,
        }
    }

    #[test]
    fn create_request_carries_image_location_and_hostname() {
        let req = backend().create_request("sv_0123abcd", "cpx21");

        assert_eq!(req.name, "sv-0123abcd");
        assert_eq!(req.server_type, "cpx21");
        assert_eq!(req.image, "debian-12");
        assert_eq!(req.location.as_deref(), Some("nbg1"));
        assert_eq!(req.networks, Some(vec![42]));
        assert!(req.firewalls.is_none());
        assert_eq!(req.start_after_create, Some(true));
    }
}
