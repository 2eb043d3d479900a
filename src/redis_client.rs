use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::Value;
use tracing::info;

use crate::endpoint::{ConnectionParams, Endpoint};
use crate::error::{Error, Result};
use crate::slowlog::SlowlogSource;

/// Connection to the cache being observed.
///
/// `ConnectionManager` reconnects on its own; the cluster connection
/// discovers the shard map from the configuration endpoint.
pub enum CacheConnection {
    Single {
        conn: ConnectionManager,
        command_timeout: Duration,
    },
    Cluster {
        conn: ClusterConnection,
        command_timeout: Duration,
    },
}

/// Opens a connection to `endpoint`, giving up after `connect_timeout`.
pub async fn connect(
    endpoint: &Endpoint,
    connect_timeout: Duration,
    command_timeout: Duration,
) -> Result<CacheConnection> {
    let unreachable = |detail: String| Error::Connectivity {
        endpoint: endpoint.to_string(),
        detail,
    };

    let connection = match endpoint.params() {
        ConnectionParams::Single { .. } => {
            let client = redis::Client::open(endpoint.url())
                .map_err(|e| Error::Configuration(format!("invalid cache URL: {e}")))?;
            let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
                .await
                .map_err(|_| unreachable(format!("no connection after {connect_timeout:?}")))?
                .map_err(|e| unreachable(e.to_string()))?;
            CacheConnection::Single {
                conn,
                command_timeout,
            }
        }
        ConnectionParams::Cluster { nodes, .. } => {
            let client = ClusterClient::new(nodes)
                .map_err(|e| Error::Configuration(format!("invalid cluster URL: {e}")))?;
            let conn = tokio::time::timeout(connect_timeout, client.get_async_connection())
                .await
                .map_err(|_| unreachable(format!("no connection after {connect_timeout:?}")))?
                .map_err(|e| unreachable(e.to_string()))?;
            CacheConnection::Cluster {
                conn,
                command_timeout,
            }
        }
    };

    info!(
        endpoint = %endpoint,
        tls = endpoint.tls,
        cluster = endpoint.cluster,
        "connected to cache"
    );
    Ok(connection)
}

#[async_trait]
impl SlowlogSource for CacheConnection {
    async fn slowlog_get(&mut self, length: usize) -> redis::RedisResult<Value> {
        let mut cmd = redis::cmd("SLOWLOG");
        cmd.arg("GET").arg(length);

        let (reply, command_timeout) = match self {
            Self::Single {
                conn,
                command_timeout,
            } => (
                tokio::time::timeout(*command_timeout, cmd.query_async::<_, Value>(conn)).await,
                *command_timeout,
            ),
            Self::Cluster {
                conn,
                command_timeout,
            } => (
                tokio::time::timeout(*command_timeout, cmd.query_async::<_, Value>(conn)).await,
                *command_timeout,
            ),
        };

        reply.unwrap_or_else(|_| {
            Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "SLOWLOG GET timed out",
                format!("no reply after {command_timeout:?}"),
            )))
        })
    }
}
