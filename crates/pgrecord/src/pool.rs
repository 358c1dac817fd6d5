//! Connection pool utilities

use crate::config::ConnectConfig;
use crate::error::{OrmError, OrmResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a connection pool with at most `max_size` connections.
///
/// Uses `NoTls`. Pooled clients implement [`Connection`](crate::Connection), so they
/// can be handed to any builder or record verb.
///
/// # Example
///
/// ```ignore
/// let pool = pgrecord::create_pool(&pgrecord::ConnectConfig::from_env()?, 16)?;
/// let client = pool.get().await?;
/// let users = pgrecord::qb::table("users").get(&client).await?;
/// ```
pub fn create_pool(config: &ConnectConfig, max_size: usize) -> OrmResult<Pool> {
    create_pool_with_manager_config(config, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a connection pool with an injected TLS connector, `ManagerConfig` and
/// `PoolBuilder` tuning.
pub fn create_pool_with_manager_config<T>(
    config: &ConnectConfig,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> OrmResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config = config.to_pg_config()?;
    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| OrmError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}
