use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, Pipeline, RedisError, RedisFuture, Script, Value};

use leasehold_state::error::StoreError;
use leasehold_state::store::LeaseStore;

use crate::scripts;

/// The connection source behind a [`RedisStore`].
pub(crate) enum Backend {
    /// Pooled connections to a single server.
    Pool(Pool),
    /// One multiplexed connection to a server resolved through the sentinels.
    Multiplexed(MultiplexedConnection),
    /// A cluster-aware connection routing by key slot.
    Cluster(ClusterConnection),
}

impl Backend {
    fn kind(&self) -> &'static str {
        match self {
            Self::Pool(_) => "pool",
            Self::Multiplexed(_) => "multiplexed",
            Self::Cluster(_) => "cluster",
        }
    }
}

/// A connection checked out of a [`Backend`] for one call.
enum Conn {
    Pooled(deadpool_redis::Connection),
    Multiplexed(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl ConnectionLike for Conn {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Pooled(c) => c.req_packed_command(cmd),
            Self::Multiplexed(c) => c.req_packed_command(cmd),
            Self::Cluster(c) => c.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Pooled(c) => c.req_packed_commands(cmd, offset, count),
            Self::Multiplexed(c) => c.req_packed_commands(cmd, offset, count),
            Self::Cluster(c) => c.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Pooled(c) => c.get_db(),
            Self::Multiplexed(c) => c.get_db(),
            Self::Cluster(c) => c.get_db(),
        }
    }
}

/// Redis-backed implementation of [`LeaseStore`].
///
/// Acquire, release and extend run as Lua scripts so the compare and the
/// mutation happen in one server-side step. Every call, including checking
/// out a connection, is bounded by the request timeout.
pub struct RedisStore {
    backend: Backend,
    request_timeout: Duration,
    closed: AtomicBool,
    acquire: Script,
    release: Script,
    extend: Script,
}

impl RedisStore {
    pub(crate) fn new(backend: Backend, request_timeout: Duration) -> Self {
        Self {
            backend,
            request_timeout,
            closed: AtomicBool::new(false),
            acquire: Script::new(scripts::LEASE_ACQUIRE),
            release: Script::new(scripts::LEASE_RELEASE),
            extend: Script::new(scripts::LEASE_EXTEND),
        }
    }

    /// Obtain a connection for one call.
    async fn conn(&self) -> Result<Conn, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        match &self.backend {
            Backend::Pool(pool) => pool
                .get()
                .await
                .map(Conn::Pooled)
                .map_err(|e| StoreError::Connection(e.to_string())),
            Backend::Multiplexed(c) => Ok(Conn::Multiplexed(c.clone())),
            Backend::Cluster(c) => Ok(Conn::Cluster(c.clone())),
        }
    }

    /// Run `fut` under the request timeout.
    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.request_timeout))?
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    // PX rejects zero.
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

fn map_redis_err(e: &RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl LeaseStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))?;
            Ok(())
        })
        .await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let result: i64 = self
                .acquire
                .key(key)
                .arg(value)
                .arg(ttl_millis(ttl))
                .invoke_async(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))?;
            Ok(result == 1)
        })
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let result: i64 = self
                .release
                .key(key)
                .arg(expected)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))?;
            Ok(result == 1)
        })
        .await
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            let result: i64 = self
                .extend
                .key(key)
                .arg(expected)
                .arg(ttl_millis(ttl))
                .invoke_async(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))?;
            Ok(result == 1)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.timed(async {
            let mut conn = self.conn().await?;
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| map_redis_err(&e))
        })
        .await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Backend::Pool(pool) = &self.backend {
            pool.close();
        }
        tracing::debug!(backend = self.backend.kind(), "redis store handle closed");
    }
}
