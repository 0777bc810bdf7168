//! Connection policy (§4.1): every write uses an `IMMEDIATE` transaction,
//! reads use deferred; busy timeout >= 5s; foreign keys ON on every
//! connection (a per-connection pragma, not a global one — the single
//! most dangerous failure mode if forgotten is silently-broken cascade
//! deletes); WAL mode with a `FULL` checkpoint at shutdown.

use std::{str::FromStr, time::Duration};

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, SqlxSqliteConnector, Statement, TransactionTrait,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::instrument;

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the single embedded store file, applying the connection policy
/// to every pooled connection via sqlx's `after_connect` hook.
#[instrument(skip_all, fields(path = %db_path.as_ref().display()))]
pub async fn connect(db_path: impl AsRef<std::path::Path>) -> Result<DatabaseConnection, DbErr> {
    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite://{}",
        db_path.as_ref().display()
    ))
    .map_err(|e| DbErr::Conn(sea_orm::RuntimeErr::Internal(e.to_string())))?
    .create_if_missing(true)
    .foreign_keys(true)
    .journal_mode(SqliteJournalMode::Wal)
    .synchronous(SqliteSynchronous::Normal)
    .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await
        .map_err(|e| DbErr::Conn(sea_orm::RuntimeErr::Internal(e.to_string())))?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Starts a write transaction with `BEGIN IMMEDIATE` (§4.1: "every write
/// uses an IMMEDIATE transaction") rather than the bare `BEGIN` (SQLite's
/// `DEFERRED`) that `TransactionTrait::begin` issues — sea_orm has no
/// native knob for SQLite's transaction-start mode, so this reopens the
/// connection's transaction in place: `begin()` leaves it `DEFERRED` and
/// still empty, so rolling it back and reissuing `BEGIN IMMEDIATE` before
/// any statement runs claims the write lock up front instead of letting
/// SQLite escalate it lazily at the first write. Every multi-step write
/// in the tree should call this instead of `TransactionTrait::begin`.
pub async fn begin_immediate(conn: &DatabaseConnection) -> Result<DatabaseTransaction, DbErr> {
    let txn = conn.begin().await?;
    txn.execute_unprepared("ROLLBACK").await?;
    txn.execute_unprepared("BEGIN IMMEDIATE").await?;
    Ok(txn)
}

/// WAL `PRAGMA wal_checkpoint(FULL)` — called once at app shutdown so the
/// `-wal` sidecar is folded back into the main store file.
pub async fn checkpoint_full(conn: &DatabaseConnection) -> Result<(), DbErr> {
    conn.execute(Statement::from_string(
        conn.get_database_backend(),
        "PRAGMA wal_checkpoint(FULL);",
    ))
    .await?;
    Ok(())
}

/// Returns `true` if foreign-key enforcement is active on this
/// connection — checked at startup per invariant 6 (§8): "Fatal: ...
/// FK-enforcement disabled at runtime."
pub async fn foreign_keys_enabled(conn: &DatabaseConnection) -> Result<bool, DbErr> {
    let row = conn
        .query_one(Statement::from_string(
            conn.get_database_backend(),
            "PRAGMA foreign_keys;",
        ))
        .await?;
    Ok(row.map(|r| r.try_get::<i32>("", "foreign_keys").unwrap_or(0) == 1)
        .unwrap_or(false))
}
