//! Configuration management for Rustack services.
//!
//! All configuration is driven by environment variables, matching LocalStack conventions.

use std::net::SocketAddr;

use crate::error::{RustackError, RustackResult};
use crate::types::{AccountId, AwsRegion};

/// Global configuration for Rustack.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RustackConfig {
    /// Bind address for the gateway.
    pub gateway_listen: String,
    /// Default AWS region.
    pub default_region: AwsRegion,
    /// Account used when a request does not identify one.
    pub default_account: AccountId,
    /// Log level.
    pub log_level: String,
}

impl Default for RustackConfig {
    fn default() -> Self {
        Self {
            gateway_listen: "0.0.0.0:4566".to_owned(),
            default_region: AwsRegion::default(),
            default_account: AccountId::default(),
            log_level: "info".to_owned(),
        }
    }
}

impl RustackConfig {
    /// Load configuration from environment variables.
    ///
    /// An invalid `DEFAULT_ACCOUNT` is ignored and the default account is kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("DEFAULT_REGION") {
            config.default_region = AwsRegion::new(v);
        }
        if let Some(account) = lookup("DEFAULT_ACCOUNT").and_then(|v| AccountId::new(v).ok()) {
            config.default_account = account;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The socket address the gateway binds to.
    pub fn listen_addr(&self) -> RustackResult<SocketAddr> {
        self.gateway_listen
            .parse()
            .map_err(|source| RustackError::InvalidListenAddress {
                address: self.gateway_listen.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = RustackConfig::default();
        assert_eq!(config.gateway_listen, "0.0.0.0:4566");
        assert_eq!(config.default_region.as_str(), "us-east-1");
        assert_eq!(config.default_account.as_str(), "000000000000");
    }

    #[test]
    fn test_should_override_from_lookup() {
        let vars = HashMap::from([
            ("DEFAULT_REGION", "eu-west-1"),
            ("DEFAULT_ACCOUNT", "123456789012"),
            ("LOG_LEVEL", "debug"),
        ]);
        let config = RustackConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.default_region.as_str(), "eu-west-1");
        assert_eq!(config.default_account.as_str(), "123456789012");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_should_parse_listen_addr() {
        let config = RustackConfig::default();
        assert_eq!(config.listen_addr().unwrap().port(), 4566);

        let config = RustackConfig {
            gateway_listen: "localhost".to_owned(),
            ..RustackConfig::default()
        };
        let err = config.listen_addr().unwrap_err();
        assert!(matches!(err, RustackError::InvalidListenAddress { .. }));
    }

    #[test]
    fn test_should_ignore_invalid_account() {
        let config = RustackConfig::from_lookup(|k| {
            (k == "DEFAULT_ACCOUNT").then(|| "not-an-account".to_owned())
        });
        assert_eq!(config.default_account, AccountId::default());
    }
}
