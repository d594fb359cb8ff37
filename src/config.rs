//! Server configuration via CLI args and environment variables.

use std::time::Duration;

use clap::Parser;
use storeguard_service::ServiceConfig;
use storeguard_service::policy::PolicyOverride;
use storeguard_service::sweeper::DEFAULT_SWEEP_INTERVAL;

/// Rate limiting and attack screening server for storefront request handlers.
#[derive(Parser, Debug, Clone)]
#[command(name = "storeguard-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "STOREGUARD_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 7480, env = "STOREGUARD_PORT")]
    pub port: u16,

    /// Seconds between sweeps of stale rate-limit entries (0 = disabled).
    #[arg(
        long,
        default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs(),
        env = "STOREGUARD_SWEEP_INTERVAL"
    )]
    pub sweep_interval: u64,

    /// Policy overrides as kind:max_attempts:window_secs:block_secs
    /// (repeatable or comma-separated), e.g. `login:5:900:1800`.
    #[arg(long = "policy", env = "STOREGUARD_POLICIES", value_delimiter = ',')]
    pub policies: Vec<PolicyOverride>,

    /// Log level.
    #[arg(long, default_value = "info", env = "STOREGUARD_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "pretty" or "json".
    #[arg(long, default_value = "pretty", env = "STOREGUARD_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Service-layer subset of the configuration.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            policy_overrides: self.policies.clone(),
        }
    }

    /// Sweep interval, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval > 0).then(|| Duration::from_secs(self.sweep_interval))
    }
}

#[cfg(test)]
mod tests {
    use storeguard_service::policy::ActionKind;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["storeguard-server"]).unwrap();
        assert_eq!(config.port, 7480);
        assert_eq!(config.sweep_interval(), Some(DEFAULT_SWEEP_INTERVAL));
        assert!(config.policies.is_empty());
    }

    #[test]
    fn policy_overrides() {
        let config = Config::try_parse_from([
            "storeguard-server",
            "--policy",
            "login:3:60:120,contact:2:60:60",
            "--policy",
            "checkout:20:300:900",
            "--sweep-interval",
            "0",
        ])
        .unwrap();
        let kinds: Vec<_> = config.policies.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            [ActionKind::Login, ActionKind::Contact, ActionKind::Checkout]
        );
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.service_config().policy_overrides.len(), 3);
    }

    #[test]
    fn invalid_policy_is_rejected() {
        assert!(Config::try_parse_from(["storeguard-server", "--policy", "login:0:60:60"]).is_err());
        assert!(Config::try_parse_from(["storeguard-server", "--policy", "cart:1:1:1"]).is_err());
    }
}
