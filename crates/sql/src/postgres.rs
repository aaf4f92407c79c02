//! Postgres-backed [`Database`].
//!
//! `Helper` owns a shared `PgPool`; every [`in_tx`] call checks out one
//! connection for its duration and hands it back on commit, rollback or drop.
//!
//! Query helpers take already-bound `sqlx` queries and run them inside a
//! `query` span carrying the normalized statement text.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::{Query, QueryAs};
use sqlx::{Execute, FromRow, Postgres, Transaction};
use tracing::{Instrument, instrument};

use crate::config::PostgresConfig;
use crate::query::{query_span, scrub_url};
use crate::tx::{Database, IsolationLevel, TxError, TxHandle, in_tx};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Helper {
    pool: PgPool,
}

impl Helper {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool, giving up after 10 seconds.
    #[instrument(skip_all, fields(url = %scrub_url(&config.url)), err)]
    pub async fn connect(config: &PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("connecting to database");
        tracing::debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            max_lifetime = ?config.max_lifetime,
            idle_timeout = ?config.idle_timeout,
            "setting connection pool options"
        );

        let options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(config.max_lifetime)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(CONNECT_TIMEOUT);

        let pool = tokio::time::timeout(CONNECT_TIMEOUT, options.connect(&config.url))
            .await
            .map_err(|_| sqlx::Error::PoolTimedOut)??;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `callback` in a serializable transaction. See [`in_tx`].
    pub async fn in_tx<T, E, F>(&self, callback: F) -> Result<T, TxError<E>>
    where
        F: for<'c> FnOnce(&'c mut PgTx) -> BoxFuture<'c, Result<T, E>>,
    {
        in_tx(self, callback).await
    }

    /// Round-trip a trivial statement through a transaction.
    pub async fn ping(&self) -> Result<(), TxError<sqlx::Error>> {
        self.in_tx(|tx| {
            Box::pin(async move { tx.exec(sqlx::query("select 1")).await.map(|_| ()) })
        })
        .await
    }

    /// Execute a statement outside a transaction, returning affected rows.
    pub async fn exec<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<u64, sqlx::Error> {
        let span = query_span(query.sql());
        query
            .execute(&self.pool)
            .instrument(span.clone())
            .await
            .map(|done| done.rows_affected())
            .inspect_err(|e| span.in_scope(|| tracing::error!(error = %e, "query failed")))
    }

    pub async fn select<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = query_span(query.sql());
        query
            .fetch_all(&self.pool)
            .instrument(span.clone())
            .await
            .inspect_err(|e| span.in_scope(|| tracing::error!(error = %e, "query failed")))
    }

    /// Fetch exactly one row; no row is `sqlx::Error::RowNotFound`.
    pub async fn get<'q, T>(&self, query: QueryAs<'q, Postgres, T, PgArguments>) -> Result<T, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = query_span(query.sql());
        query
            .fetch_one(&self.pool)
            .instrument(span.clone())
            .await
            .inspect_err(|e| span.in_scope(|| tracing::debug!(error = %e, "query failed")))
    }
}

#[async_trait]
impl Database for Helper {
    type Tx = PgTx;

    async fn begin(&self, isolation: IsolationLevel) -> Result<PgTx, sqlx::Error> {
        let mut inner = self.pool.begin().await?;
        sqlx::query(isolation.set_transaction_sql())
            .execute(&mut *inner)
            .await?;
        Ok(PgTx { inner })
    }
}

/// Transaction handle passed to [`Helper::in_tx`] callbacks.
pub struct PgTx {
    inner: Transaction<'static, Postgres>,
}

impl PgTx {
    pub async fn exec<'q>(&mut self, query: Query<'q, Postgres, PgArguments>) -> Result<u64, sqlx::Error> {
        let span = query_span(query.sql());
        query
            .execute(&mut *self.inner)
            .instrument(span.clone())
            .await
            .map(|done| done.rows_affected())
            .inspect_err(|e| span.in_scope(|| tracing::error!(error = %e, "query failed")))
    }

    pub async fn select<'q, T>(
        &mut self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = query_span(query.sql());
        query
            .fetch_all(&mut *self.inner)
            .instrument(span.clone())
            .await
            .inspect_err(|e| span.in_scope(|| tracing::error!(error = %e, "query failed")))
    }

    pub async fn get<'q, T>(&mut self, query: QueryAs<'q, Postgres, T, PgArguments>) -> Result<T, sqlx::Error>
    where
        T: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        let span = query_span(query.sql());
        query
            .fetch_one(&mut *self.inner)
            .instrument(span.clone())
            .await
            .inspect_err(|e| span.in_scope(|| tracing::debug!(error = %e, "query failed")))
    }
}

#[async_trait]
impl TxHandle for PgTx {
    async fn commit(self) -> Result<(), sqlx::Error> {
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        self.inner.rollback().await
    }
}
