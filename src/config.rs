use std::fmt;
use std::time::Duration;

use clap::Parser;

use crate::datadog::client::DEFAULT_API_URL;
use crate::endpoint::{EndpointOverrides, EnvironmentDefaults};
use crate::shipper::ShipperSettings;
use crate::slowlog::reader::DEFAULT_PAGE_SIZE;

/// Ships ElastiCache slowlog entries to Datadog as per-minute metrics.
///
/// Every flag can also be set through the environment variable named next
/// to it.
#[derive(Parser, Clone)]
#[command(name = "slowlog-shipper", version, about)]
pub struct Config {
    /// Cache endpoint: hostname, `host:port`, or `redis[s]://` URI.
    #[arg(long, env = "REDIS_HOST")]
    pub redis_host: String,

    /// Port used when the host carries none.
    #[arg(long, env = "REDIS_PORT")]
    pub redis_port: Option<u16>,

    /// Use TLS when neither the URI scheme nor the hostname decides.
    #[arg(long, env = "REDIS_SSL")]
    pub redis_ssl: bool,

    /// Force cluster mode on or off instead of inferring it from the host.
    #[arg(long, env = "REDIS_CLUSTER")]
    pub redis_cluster: Option<bool>,

    #[arg(long, env = "DATADOG_API_KEY", hide_env_values = true)]
    pub datadog_api_key: String,

    #[arg(long, env = "DATADOG_APP_KEY", hide_env_values = true)]
    pub datadog_app_key: String,

    #[arg(long, env = "DATADOG_API_URL", default_value = DEFAULT_API_URL)]
    pub datadog_api_url: String,

    /// Value of the `namespace` tag.
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Value of the `env` tag.
    #[arg(long, env = "ENV")]
    pub env: String,

    /// Prefix of every emitted series.
    #[arg(long, env = "METRICNAME", default_value = "elasticache.slowlog")]
    pub metric_name: String,

    #[arg(long, env = "REDIS_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub redis_connect_timeout_secs: u64,

    #[arg(long, env = "REDIS_COMMAND_TIMEOUT_SECS", default_value_t = 10)]
    pub redis_command_timeout_secs: u64,

    #[arg(long, env = "DATADOG_TIMEOUT_SECS", default_value_t = 10)]
    pub datadog_timeout_secs: u64,

    /// First `SLOWLOG GET` length; doubled until the log is drained.
    #[arg(
        long,
        env = "SLOWLOG_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub slowlog_page_size: u64,

    /// Keep running and ship on this period. Runs once when unset.
    #[arg(long, env = "REPEAT_EVERY_SECS")]
    pub repeat_every_secs: Option<u64>,
}

impl Config {
    pub fn endpoint_overrides(&self) -> EndpointOverrides {
        EndpointOverrides {
            port: None,
            tls: None,
            cluster: self.redis_cluster,
        }
    }

    pub fn environment_defaults(&self) -> EnvironmentDefaults {
        EnvironmentDefaults {
            port: self.redis_port,
            tls: self.redis_ssl,
        }
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_connect_timeout_secs)
    }

    pub fn redis_command_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_command_timeout_secs)
    }

    pub fn datadog_timeout(&self) -> Duration {
        Duration::from_secs(self.datadog_timeout_secs)
    }

    pub fn repeat_every(&self) -> Option<Duration> {
        self.repeat_every_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    pub fn shipper_settings(&self) -> ShipperSettings {
        ShipperSettings {
            metric_prefix: self.metric_name.clone(),
            namespace: self.namespace.clone(),
            env: self.env.clone(),
            page_size: usize::try_from(self.slowlog_page_size).unwrap_or(usize::MAX),
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_ssl", &self.redis_ssl)
            .field("redis_cluster", &self.redis_cluster)
            .field("datadog_api_key", &"<redacted>")
            .field("datadog_app_key", &"<redacted>")
            .field("datadog_api_url", &self.datadog_api_url)
            .field("namespace", &self.namespace)
            .field("env", &self.env)
            .field("metric_name", &self.metric_name)
            .field("redis_connect_timeout_secs", &self.redis_connect_timeout_secs)
            .field("redis_command_timeout_secs", &self.redis_command_timeout_secs)
            .field("datadog_timeout_secs", &self.datadog_timeout_secs)
            .field("slowlog_page_size", &self.slowlog_page_size)
            .field("repeat_every_secs", &self.repeat_every_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec![
            "slowlog-shipper",
            "--redis-host",
            "master.replication-group-123.abcde.use2.cache.amazonaws.com",
            "--datadog-api-key",
            "api-secret",
            "--datadog-app-key",
            "app-secret",
            "--namespace",
            "acme",
            "--env",
            "test",
        ];
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.metric_name, "elasticache.slowlog");
        assert_eq!(config.datadog_api_url, DEFAULT_API_URL);
        assert_eq!(config.slowlog_page_size, 128);
        assert_eq!(config.redis_connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.repeat_every(), None);
        assert_eq!(config.endpoint_overrides().cluster, None);
        assert!(!config.environment_defaults().tls);
    }

    #[test]
    fn cluster_and_environment_tiers() {
        let config = parse(&[
            "--redis-cluster",
            "false",
            "--redis-port",
            "6380",
            "--redis-ssl",
        ]);
        assert_eq!(config.endpoint_overrides().cluster, Some(false));
        assert_eq!(config.environment_defaults().port, Some(6380));
        assert!(config.environment_defaults().tls);
    }

    #[test]
    fn zero_period_means_run_once() {
        assert_eq!(parse(&["--repeat-every-secs", "0"]).repeat_every(), None);
        assert_eq!(
            parse(&["--repeat-every-secs", "60"]).repeat_every(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn page_size_must_be_positive() {
        let args = [
            "slowlog-shipper",
            "--redis-host",
            "h",
            "--datadog-api-key",
            "a",
            "--datadog-app-key",
            "b",
            "--namespace",
            "n",
            "--env",
            "e",
            "--slowlog-page-size",
            "0",
        ];
        assert!(Config::try_parse_from(args).is_err());
    }

    #[test]
    fn debug_hides_credentials() {
        let rendered = format!("{:?}", parse(&[]));
        assert!(!rendered.contains("api-secret"));
        assert!(!rendered.contains("app-secret"));
        assert!(rendered.contains("replication-group-123"));
    }
}
