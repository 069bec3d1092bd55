// Built-in deps
use std::fmt;
// External imports
use async_trait::async_trait;
use deadpool::managed::{Manager, PoolConfig, RecycleResult, Timeouts};
use deadpool::Runtime;
use sqlx::{postgres::Postgres, Connection, Error as SqlxError, PgConnection, Transaction};
// Local imports
use crate::StorageProcessor;

type Pool = deadpool::managed::Pool<DbPool>;

pub type PooledConnection = deadpool::managed::Object<DbPool>;

/// The connection a `StorageProcessor` works through: borrowed from the
/// pool, established directly, or an open database transaction. Schema
/// queries are agnostic of which one they run on.
pub enum ConnectionHolder<'a> {
    Pooled(PooledConnection),
    Direct(PgConnection),
    Transaction(Transaction<'a, Postgres>),
}

impl<'a> fmt::Debug for ConnectionHolder<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ConnectionHolder::Pooled(_) => "pooled connection",
            ConnectionHolder::Direct(_) => "direct connection",
            ConnectionHolder::Transaction(_) => "database transaction",
        };
        f.write_str(kind)
    }
}

#[derive(Clone)]
pub(crate) struct DbPool {
    url: String,
}

impl DbPool {
    fn create(url: impl Into<String>, max_size: usize) -> Pool {
        let pool_config = PoolConfig {
            max_size,
            timeouts: Timeouts::wait_millis(20_000), // wait 20 seconds before returning error
            runtime: Runtime::Tokio1,
        };
        Pool::from_config(DbPool { url: url.into() }, pool_config)
    }
}

#[async_trait]
impl Manager for DbPool {
    type Type = PgConnection;
    type Error = SqlxError;

    async fn create(&self) -> Result<PgConnection, SqlxError> {
        PgConnection::connect(&self.url).await
    }
    async fn recycle(&self, obj: &mut PgConnection) -> RecycleResult<SqlxError> {
        Ok(obj.ping().await?)
    }
}

/// `ConnectionPool` is a wrapper over a fixed size pool of connections to
/// the database.
#[derive(Clone)]
pub struct ConnectionPool {
    pool: Pool,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Postgres connection pool")
    }
}

impl ConnectionPool {
    /// Establishes a pool of the connections to the database and
    /// creates a new `ConnectionPool` object.
    pub fn new(database_url: impl Into<String>, pool_max_size: usize) -> Self {
        let pool = DbPool::create(database_url, pool_max_size);

        Self { pool }
    }

    /// Creates a `StorageProcessor` entity over a pooled connection.
    /// Blocks until a connection from the pool becomes available.
    pub async fn access_storage(&self) -> Result<StorageProcessor<'_>, anyhow::Error> {
        let connection = self
            .pool
            .get()
            .await
            .map_err(|err| anyhow::format_err!("Failed to get connection from pool: {}", err))?;

        Ok(StorageProcessor::from_pool(connection))
    }
}
