use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use vps_infra::BackendKind;

use crate::orders::{Bounds, OrderLimits};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub control_plane_api_key: String,
    /// HS256 secret for user session tokens. Without it only the
    /// control-plane key is accepted.
    pub jwt_secret: Option<String>,
    /// Shared secret provisioning workers sign callbacks with.
    pub callback_secret: String,
    pub backend: BackendKind,
    /// Zero disables the reaper.
    pub provision_timeout_secs: u64,
    pub reaper_interval_secs: u64,
    pub order_limits: OrderLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let control_plane_api_key = vars.required("CONTROL_PLANE_API_KEY")?;
        let callback_secret = vars
            .get("CALLBACK_SECRET")
            .unwrap_or_else(|| control_plane_api_key.clone());

        let reaper_interval_secs = vars.parse("REAPER_INTERVAL_SECS", 30)?;
        if reaper_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REAPER_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            listen_addr: vars.parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            control_plane_api_key,
            jwt_secret: vars.get("JWT_SECRET").filter(|s| !s.is_empty()),
            callback_secret,
            backend: vars.parse("PROVISIONING_BACKEND", BackendKind::Simulated)?,
            provision_timeout_secs: vars.parse("PROVISION_TIMEOUT_SECS", 600)?,
            reaper_interval_secs,
            order_limits: OrderLimits {
                cores: vars.bounds("ORDER_MIN_CORES", "ORDER_MAX_CORES", 1, 8)?,
                ram_gb: vars.bounds("ORDER_MIN_RAM_GB", "ORDER_MAX_RAM_GB", 2, 16)?,
                storage_gb: vars.bounds("ORDER_MIN_STORAGE_GB", "ORDER_MAX_STORAGE_GB", 50, 500)?,
            },
        })
    }

    /// `None` when the reaper is disabled.
    pub fn provision_timeout(&self) -> Option<Duration> {
        (self.provision_timeout_secs > 0).then(|| Duration::from_secs(self.provision_timeout_secs))
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: raw }),
            None => Ok(default),
        }
    }

    fn bounds(
        &self,
        min_name: &'static str,
        max_name: &'static str,
        min: u32,
        max: u32,
    ) -> Result<Bounds, ConfigError> {
        let min = self.parse(min_name, min)?;
        let max = self.parse(max_name, max)?;
        if min == 0 {
            return Err(ConfigError::Invalid {
                name: min_name,
                value: min.to_string(),
            });
        }
        if max < min {
            return Err(ConfigError::Invalid {
                name: max_name,
                value: format!("{max} (below {min_name}={min})"),
            });
        }
        Ok(Bounds { min, max })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let config = config_from(&[("CONTROL_PLANE_API_KEY", "secret")]).unwrap();

        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.callback_secret, "secret");
        assert_eq!(config.backend, BackendKind::Simulated);
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.provision_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.order_limits, OrderLimits::default());
    }

    #[test]
    fn api_key_is_required() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CONTROL_PLANE_API_KEY")));
    }

    #[test]
    fn zero_timeout_disables_reaper() {
        let config =
            config_from(&[("CONTROL_PLANE_API_KEY", "k"), ("PROVISION_TIMEOUT_SECS", "0")]).unwrap();
        assert!(config.provision_timeout().is_none());
    }

    #[test]
    fn rejects_unparseable_and_inverted_values() {
        let err = config_from(&[("CONTROL_PLANE_API_KEY", "k"), ("PROVISIONING_BACKEND", "aws")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PROVISIONING_BACKEND", .. }));

        let err = config_from(&[
            ("CONTROL_PLANE_API_KEY", "k"),
            ("ORDER_MIN_CORES", "4"),
            ("ORDER_MAX_CORES", "2"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ORDER_MAX_CORES", .. }));

        let err = config_from(&[("CONTROL_PLANE_API_KEY", "k"), ("ORDER_MIN_RAM_GB", "0")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ORDER_MIN_RAM_GB", .. }));
    }

    #[test]
    fn custom_bounds_and_secrets_are_read() {
        let config = config_from(&[
            ("CONTROL_PLANE_API_KEY", "k"),
            ("CALLBACK_SECRET", "cb"),
            ("JWT_SECRET", "jwt"),
            ("ORDER_MAX_STORAGE_GB", "1000"),
        ])
        .unwrap();

        assert_eq!(config.callback_secret, "cb");
        assert_eq!(config.jwt_secret.as_deref(), Some("jwt"));
        assert_eq!(config.order_limits.storage_gb, Bounds { min: 50, max: 1000 });
    }
}
