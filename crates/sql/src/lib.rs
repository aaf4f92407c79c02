//! `glue-sql` — transactional SQL execution.
//!
//! [`in_tx`] runs a unit of work inside a serializable transaction and
//! guarantees commit-or-rollback, including rollback when the unit of work
//! panics. [`Helper`] is the Postgres-backed [`Database`] most callers use.

pub mod config;
pub mod postgres;
pub mod query;
pub mod tx;

pub use config::PostgresConfig;
pub use postgres::{Helper, PgTx};
pub use query::{is_no_rows, normalize_query, scrub_url};
pub use tx::{Database, IsolationLevel, TxError, TxFailure, TxHandle, in_tx};

/// Boxed future returned by transaction callbacks.
pub use futures_util::future::BoxFuture;
