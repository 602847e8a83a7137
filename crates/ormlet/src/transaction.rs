//! Transaction helpers.
//!
//! Transaction scope is decided by the caller: every querier operation runs
//! against whatever [`GenericClient`](crate::GenericClient) it is given, so
//! passing a `tokio_postgres::Transaction` (or the deadpool wrapper) runs the
//! operation inside that transaction, and a plain client runs it
//! autocommitted. The macros here only take care of the commit/rollback
//! bookkeeping around a block.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to [`DbResult`](crate::DbResult).
///
/// ```ignore
/// ormlet::transaction!(&mut client, tx, {
///     let q = Querier::new(&tx);
///     q.create(&mut user).await?;
///     soft_delete::<Volume, _>(&q, &Args::new().value("id", old_id)).await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err($crate::DbError::from_db_error)?;

        let __ormlet_tx_result = async { $body }.await;
        match __ormlet_tx_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::DbError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DbError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint within an existing transaction.
///
/// - Creates a savepoint on `$tx` (named, or auto-numbered in the two-ident
///   form).
/// - Releases on `Ok(_)`.
/// - Rolls back to the savepoint on `Err(_)`, leaving the outer transaction
///   usable.
///
/// The block must evaluate to [`DbResult`](crate::DbResult).
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $name:expr, $sp:ident, $body:block) => {{
        let $sp = ($tx)
            .savepoint($name)
            .await
            .map_err($crate::DbError::from_db_error)?;

        let __ormlet_sp_result = async { $body }.await;
        match __ormlet_sp_result {
            Ok(value) => {
                $sp.commit()
                    .await
                    .map_err($crate::DbError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $sp.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DbError::Other(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
    ($tx:expr, $sp:ident, $body:block) => {{
        let __ormlet_sp_name = $crate::transaction::next_savepoint_name();
        $crate::savepoint!($tx, &__ormlet_sp_name, $sp, $body)
    }};
}

/// Generate a unique anonymous savepoint name.
///
/// Used by the `savepoint!` macro; not intended for direct use.
#[doc(hidden)]
pub fn next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("ormlet_sp_{n}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DbError, DbResult};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    // The macros are duck-typed on `transaction()` / `savepoint()` /
    // `commit()` / `rollback()`, so a recording stand-in works without a
    // database.
    #[derive(Clone, Default)]
    struct Outcome {
        committed: Arc<AtomicBool>,
        rolled_back: Arc<AtomicBool>,
        savepoint_names: Arc<std::sync::Mutex<Vec<String>>>,
    }

    struct FakeTx {
        outcome: Outcome,
    }

    impl FakeTx {
        async fn commit(self) -> Result<(), tokio_postgres::Error> {
            self.outcome.committed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(self) -> Result<(), tokio_postgres::Error> {
            self.outcome.rolled_back.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn savepoint(&self, name: &str) -> Result<FakeTx, tokio_postgres::Error> {
            self.outcome
                .savepoint_names
                .lock()
                .unwrap()
                .push(name.to_string());
            Ok(FakeTx {
                outcome: self.outcome.clone(),
            })
        }
    }

    struct FakeConn {
        outcome: Outcome,
    }

    impl FakeConn {
        async fn transaction(&mut self) -> Result<FakeTx, tokio_postgres::Error> {
            Ok(FakeTx {
                outcome: self.outcome.clone(),
            })
        }
    }

    #[test]
    fn anonymous_savepoint_names_are_unique() {
        let a = next_savepoint_name();
        let b = next_savepoint_name();
        assert_ne!(a, b);
        assert!(a.starts_with("ormlet_sp_"));
    }

    // The macros use `?`, so they expand inside functions returning DbResult.
    async fn run_transaction(conn: &mut FakeConn, body: DbResult<i64>) -> DbResult<i64> {
        crate::transaction!(conn, tx, {
            let _ = &tx;
            body
        })
    }

    async fn run_savepoint(tx: FakeTx, body: DbResult<i64>) -> DbResult<i64> {
        crate::savepoint!(tx, "inner", sp, {
            let _ = &sp;
            body
        })
    }

    async fn run_anonymous_savepoint(tx: FakeTx) -> DbResult<()> {
        crate::savepoint!(tx, sp, {
            let _ = &sp;
            Ok(())
        })
    }

    #[tokio::test]
    async fn transaction_commits_on_ok() {
        let outcome = Outcome::default();
        let mut conn = FakeConn {
            outcome: outcome.clone(),
        };

        let result = run_transaction(&mut conn, Ok(42)).await;

        assert_eq!(result.unwrap(), 42);
        assert!(outcome.committed.load(Ordering::SeqCst));
        assert!(!outcome.rolled_back.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_err() {
        let outcome = Outcome::default();
        let mut conn = FakeConn {
            outcome: outcome.clone(),
        };

        let result = run_transaction(&mut conn, Err(DbError::not_found("missing row"))).await;

        assert!(result.unwrap_err().is_not_found());
        assert!(!outcome.committed.load(Ordering::SeqCst));
        assert!(outcome.rolled_back.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn savepoint_releases_on_ok() {
        let outcome = Outcome::default();
        let tx = FakeTx {
            outcome: outcome.clone(),
        };

        let result = run_savepoint(tx, Ok(7)).await;

        assert_eq!(result.unwrap(), 7);
        assert!(outcome.committed.load(Ordering::SeqCst));
        assert_eq!(
            outcome.savepoint_names.lock().unwrap().as_slice(),
            &["inner".to_string()]
        );
    }

    #[tokio::test]
    async fn savepoint_rolls_back_on_err() {
        let outcome = Outcome::default();
        let tx = FakeTx {
            outcome: outcome.clone(),
        };

        let result = run_savepoint(tx, Err(DbError::not_found("missing row"))).await;

        assert!(result.unwrap_err().is_not_found());
        assert!(outcome.rolled_back.load(Ordering::SeqCst));
        assert!(!outcome.committed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn anonymous_savepoint_form_generates_a_name() {
        let outcome = Outcome::default();
        let tx = FakeTx {
            outcome: outcome.clone(),
        };

        run_anonymous_savepoint(tx).await.unwrap();

        let names = outcome.savepoint_names.lock().unwrap();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("ormlet_sp_"));
    }
}
