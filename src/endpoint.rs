use std::fmt;

use crate::error::{Error, Result};

// ─── Constants ───────────────────────────────────────────────────

const DEFAULT_PORT: u16 = 6379;

/// Naming pattern replication groups are expected to follow.
const GROUP_PREFIX: &str = "replication-group-";

/// First labels of ElastiCache primary / configuration endpoints. Both are
/// only issued for groups with in-transit encryption enabled.
const PRIMARY_LABEL: &str = "master";
const CONFIG_LABEL: &str = "clustercfg";

// ─── Inputs ──────────────────────────────────────────────────────

/// Caller-supplied values that win over anything derived from the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointOverrides {
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub cluster: Option<bool>,
}

/// Values taken from the process environment (`REDIS_PORT`, `REDIS_SSL`).
/// They only apply when neither an override nor the host itself decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentDefaults {
    pub port: Option<u16>,
    pub tls: bool,
}

// ─── Output ──────────────────────────────────────────────────────

/// A cache endpoint with everything needed to open a connection and to tag
/// the metrics produced from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub cluster: bool,
    pub replication_group: String,
}

/// Connection parameters in the shape the cache client is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionParams {
    Single { host: String, port: u16, tls: bool },
    Cluster { nodes: Vec<String>, port: u16, tls: bool },
}

impl Endpoint {
    /// Parse `raw`, either a bare hostname (optionally `host:port`) or a
    /// `redis://` / `rediss://` URI.
    pub fn resolve(
        raw: &str,
        overrides: EndpointOverrides,
        defaults: EnvironmentDefaults,
    ) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Configuration("cache host is empty".into()));
        }

        let (scheme_tls, rest) = if let Some(rest) = raw.strip_prefix("rediss://") {
            (Some(true), rest)
        } else if let Some(rest) = raw.strip_prefix("redis://") {
            (Some(false), rest)
        } else {
            (None, raw)
        };

        // Drop any path (`/0`) and credentials (`user:pass@`).
        let authority = rest.split('/').next().unwrap_or_default();
        let authority = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host);

        let (host, uri_port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    Error::Configuration(format!("invalid port in cache host `{raw}`"))
                })?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        let labels: Vec<&str> = host.split('.').collect();
        let replication_group = replication_group(&labels).ok_or_else(|| {
            Error::Configuration(format!(
                "unable to derive a replication group from `{raw}`; is it an ElastiCache endpoint?"
            ))
        })?;

        let first = labels.first().copied().unwrap_or_default();
        let shape_tls = (first == PRIMARY_LABEL || first == CONFIG_LABEL).then_some(true);

        Ok(Self {
            host: host.to_owned(),
            port: overrides
                .port
                .or(uri_port)
                .or(defaults.port)
                .unwrap_or(DEFAULT_PORT),
            tls: overrides
                .tls
                .or(scheme_tls)
                .or(shape_tls)
                .unwrap_or(defaults.tls),
            cluster: overrides.cluster.unwrap_or_else(|| infer_cluster(&labels)),
            replication_group: replication_group.to_owned(),
        })
    }

    /// `redis://host:port` or `rediss://host:port`.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub fn params(&self) -> ConnectionParams {
        if self.cluster {
            ConnectionParams::Cluster {
                nodes: vec![self.url()],
                port: self.port,
                tls: self.tls,
            }
        } else {
            ConnectionParams::Single {
                host: self.host.clone(),
                port: self.port,
                tls: self.tls,
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.replication_group)
    }
}

// ─── Hostname shape ──────────────────────────────────────────────

fn replication_group<'a>(labels: &[&'a str]) -> Option<&'a str> {
    let first = *labels.first()?;
    if first == PRIMARY_LABEL || first == CONFIG_LABEL {
        return labels.get(1).copied().filter(|l| !l.is_empty());
    }
    if first.starts_with(GROUP_PREFIX) {
        return Some(first);
    }
    labels.iter().copied().find(|l| l.starts_with(GROUP_PREFIX))
}

/// Configuration endpoints are cluster mode. So is a bare
/// `<group>.<id>.<region>` name, while `<group>.<id>.<node>.<region>`
/// addresses a single node.
fn infer_cluster(labels: &[&str]) -> bool {
    match labels.first() {
        Some(&CONFIG_LABEL) => true,
        Some(first) if first.starts_with(GROUP_PREFIX) => !is_node_leaf(labels),
        _ => false,
    }
}

fn is_node_leaf(labels: &[&str]) -> bool {
    let before_suffix = labels
        .iter()
        .position(|l| l.eq_ignore_ascii_case("cache"))
        .unwrap_or(labels.len());
    before_suffix >= 4
}
