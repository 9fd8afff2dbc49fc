use std::time::Duration;

use printdeck_core::endpoint::Endpoint;
use printdeck_core::error::CoreError;
use printdeck_core::time::NaiveZone;
use printdeck_mirror::{EngineConfig, MirrorConfig};

const DEFAULT_IP: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8000";
const DEFAULT_TICK_MS: u64 = 1000;

/// Errors raised while reading the agent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    Invalid {
        var: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("{var} must be a positive number of milliseconds, got '{value}'")]
    TickInterval { var: &'static str, value: String },
}

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    /// Print server address.
    pub endpoint: Endpoint,
    /// Projector tick period.
    pub tick_interval: Duration,
    /// Zone for server timestamps without a UTC offset.
    pub naive_zone: NaiveZone,
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default     |
    /// |------------------------------|-------------|
    /// | `PRINTDECK_SERVER_IP`        | `127.0.0.1` |
    /// | `PRINTDECK_SERVER_PORT`      | `8000`      |
    /// | `PRINTDECK_TICK_MS`          | `1000`      |
    /// | `PRINTDECK_NAIVE_TIMESTAMPS` | `local`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ip = lookup("PRINTDECK_SERVER_IP").unwrap_or_else(|| DEFAULT_IP.into());
        let port = lookup("PRINTDECK_SERVER_PORT").unwrap_or_else(|| DEFAULT_PORT.into());

        let endpoint = Endpoint::default()
            .with_ip(&ip)
            .map_err(|source| ConfigError::Invalid {
                var: "PRINTDECK_SERVER_IP",
                source,
            })?
            .with_port(&port)
            .map_err(|source| ConfigError::Invalid {
                var: "PRINTDECK_SERVER_PORT",
                source,
            })?;

        let tick_ms = match lookup("PRINTDECK_TICK_MS") {
            None => DEFAULT_TICK_MS,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(ConfigError::TickInterval {
                        var: "PRINTDECK_TICK_MS",
                        value,
                    })
                }
            },
        };

        let naive_zone = match lookup("PRINTDECK_NAIVE_TIMESTAMPS") {
            None => NaiveZone::default(),
            Some(value) => value.parse().map_err(|source| ConfigError::Invalid {
                var: "PRINTDECK_NAIVE_TIMESTAMPS",
                source,
            })?,
        };

        Ok(Self {
            endpoint,
            tick_interval: Duration::from_millis(tick_ms),
            naive_zone,
        })
    }

    pub fn mirror(&self) -> MirrorConfig {
        MirrorConfig {
            endpoint: self.endpoint,
            engine: EngineConfig {
                tick_interval: self.tick_interval,
                naive_zone: self.naive_zone,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.endpoint, Endpoint::default());
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.naive_zone, NaiveZone::Local);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PRINTDECK_SERVER_IP", "192.168.1.20"),
            ("PRINTDECK_SERVER_PORT", "8080"),
            ("PRINTDECK_TICK_MS", "250"),
            ("PRINTDECK_NAIVE_TIMESTAMPS", "UTC"),
        ])
        .unwrap();
        assert_eq!(config.endpoint.ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(config.endpoint.port, 8080);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.naive_zone, NaiveZone::Utc);

        let mirror = config.mirror();
        assert_eq!(mirror.endpoint, config.endpoint);
        assert_eq!(mirror.engine.tick_interval, Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_address() {
        assert_matches!(
            load(&[("PRINTDECK_SERVER_IP", "10.0.0")]),
            Err(ConfigError::Invalid { var: "PRINTDECK_SERVER_IP", .. })
        );
        assert_matches!(
            load(&[("PRINTDECK_SERVER_PORT", "0")]),
            Err(ConfigError::Invalid { var: "PRINTDECK_SERVER_PORT", .. })
        );
    }

    #[test]
    fn rejects_bad_tick_and_zone() {
        assert_matches!(
            load(&[("PRINTDECK_TICK_MS", "0")]),
            Err(ConfigError::TickInterval { .. })
        );
        assert_matches!(
            load(&[("PRINTDECK_TICK_MS", "fast")]),
            Err(ConfigError::TickInterval { .. })
        );
        assert_matches!(
            load(&[("PRINTDECK_NAIVE_TIMESTAMPS", "mars")]),
            Err(ConfigError::Invalid { var: "PRINTDECK_NAIVE_TIMESTAMPS", .. })
        );
    }
}
