//! Transaction runner.
//!
//! ## Outcomes
//!
//! | Callback outcome | Action | Returned |
//! |------------------|--------|----------|
//! | `Ok(value)` | commit | `Ok(value)`, or `TxError::Commit` |
//! | `Err(e)` | rollback | `TxError::Callback(e)` untouched |
//! | panic | rollback | `TxError::Panic(message)`; the panic does not propagate |
//! | any failure + rollback failure | - | `TxError::Rollback` carrying both errors |
//!
//! Nothing is retried here: begin/commit/rollback failures go back to the
//! caller, who owns the retry policy.
//!
//! ## Cancellation
//!
//! Dropping the future returned by [`in_tx`] drops the transaction handle.
//! `sqlx` transactions roll back on drop, so a cancelled call never leaves a
//! transaction open.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::instrument;

/// Isolation level requested when beginning a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Statement that must run first inside a freshly begun transaction.
    pub fn set_transaction_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

impl core::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A database that can begin transactions.
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: TxHandle;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx, sqlx::Error>;
}

/// A live transaction. Exactly one of `commit`/`rollback` ends it.
#[async_trait]
pub trait TxHandle: Send {
    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}

/// What made the runner roll back.
#[derive(Debug, Error)]
pub enum TxFailure<E> {
    #[error("{0}")]
    Callback(E),

    #[error("panic: {0}")]
    Panic(String),
}

#[derive(Debug, Error)]
pub enum TxError<E> {
    #[error("error beginning transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// The callback's own error, returned as-is after a successful rollback.
    #[error("{0}")]
    Callback(E),

    #[error("panic: {0}")]
    Panic(String),

    #[error(
        "error rolling back transaction after error (transaction error: {rollback}), original error: {cause}"
    )]
    Rollback {
        cause: TxFailure<E>,
        #[source]
        rollback: sqlx::Error,
    },

    #[error("error committing transaction: {0}")]
    Commit(#[source] sqlx::Error),
}

impl<E> TxError<E> {
    /// The callback's error, also when it is wrapped in a rollback failure.
    pub fn callback_error(&self) -> Option<&E> {
        match self {
            TxError::Callback(e) => Some(e),
            TxError::Rollback {
                cause: TxFailure::Callback(e),
                ..
            } => Some(e),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(
            self,
            TxError::Panic(_)
                | TxError::Rollback {
                    cause: TxFailure::Panic(_),
                    ..
                }
        )
    }
}

impl<E> From<TxFailure<E>> for TxError<E> {
    fn from(value: TxFailure<E>) -> Self {
        match value {
            TxFailure::Callback(e) => TxError::Callback(e),
            TxFailure::Panic(msg) => TxError::Panic(msg),
        }
    }
}

/// Run `callback` in a serializable transaction on `db`.
///
/// The callback runs exactly once and gets a handle that cannot outlive it.
#[instrument(name = "tx", skip_all, fields(isolation = %IsolationLevel::Serializable))]
pub async fn in_tx<D, T, E, F>(db: &D, callback: F) -> Result<T, TxError<E>>
where
    D: Database + ?Sized,
    F: for<'c> FnOnce(&'c mut D::Tx) -> BoxFuture<'c, Result<T, E>>,
{
    let mut tx = db
        .begin(IsolationLevel::Serializable)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "tx begin failed");
            TxError::Begin(e)
        })?;

    // Building the callback's future happens inside the guarded block too, so
    // a panic before the first await is caught like any other.
    let handle = &mut tx;
    let outcome = AssertUnwindSafe(async move { callback(handle).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => match tx.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                tracing::error!(error = %e, "tx commit failed");
                Err(TxError::Commit(e))
            }
        },
        Ok(Err(e)) => {
            tracing::debug!("tx callback failed");
            Err(rollback(tx, TxFailure::Callback(e)).await)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "tx callback panicked");
            Err(rollback(tx, TxFailure::Panic(message)).await)
        }
    }
}

/// Roll back, keeping both the triggering failure and any rollback error.
async fn rollback<H: TxHandle, E>(tx: H, cause: TxFailure<E>) -> TxError<E> {
    match tx.rollback().await {
        Ok(()) => cause.into(),
        Err(rollback) => {
            tracing::error!(error = %rollback, "tx rollback failed");
            TxError::Rollback { cause, rollback }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
