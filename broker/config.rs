// Broker configuration read from environment variables
use crate::error::BrokerError;
use im_core::{ChannelNames, DEFAULT_RUNTIME_DIR};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Environment variables for configuration
// IM_RUNTIME_DIR: Directory holding every channel (default: /tmp)
// IM_POLL_TIMEOUT_MS: Upper bound of one readiness wait (default: 500)

pub const RUNTIME_DIR_VAR: &str = "IM_RUNTIME_DIR";
pub const POLL_TIMEOUT_VAR: &str = "IM_POLL_TIMEOUT_MS";

const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub runtime_dir: PathBuf,
    /// How long one loop iteration may wait for traffic. Bounds shutdown latency.
    pub poll_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or unparsable values
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let runtime_dir = lookup(RUNTIME_DIR_VAR)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNTIME_DIR));

        let poll_timeout = lookup(POLL_TIMEOUT_VAR)
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS));

        BrokerConfig {
            runtime_dir,
            poll_timeout,
        }
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.poll_timeout.is_zero() {
            return Err(BrokerError::Config(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.runtime_dir.as_os_str().is_empty() {
            return Err(BrokerError::Config("runtime directory is empty".to_string()));
        }
        Ok(())
    }

    pub fn channel_names(&self) -> ChannelNames {
        ChannelNames::new(&self.runtime_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = BrokerConfig::from_lookup(lookup_in(&[]));
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.channel_names().control(), PathBuf::from("/tmp/im_server_cmd.fifo"));
    }

    #[test]
    fn reads_overrides() {
        let config = BrokerConfig::from_lookup(lookup_in(&[
            (RUNTIME_DIR_VAR, "/run/im"),
            (POLL_TIMEOUT_VAR, "50"),
        ]));
        assert_eq!(config.runtime_dir, PathBuf::from("/run/im"));
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
    }

    #[test]
    fn garbage_falls_back_and_zero_timeout_is_rejected() {
        let config = BrokerConfig::from_lookup(lookup_in(&[(POLL_TIMEOUT_VAR, "soon")]));
        assert_eq!(config.poll_timeout, Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS));

        let config = BrokerConfig::from_lookup(lookup_in(&[(POLL_TIMEOUT_VAR, "0")]));
        assert!(matches!(config.validate(), Err(BrokerError::Config(_))));
    }
}
