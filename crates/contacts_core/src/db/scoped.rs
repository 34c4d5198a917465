//! Scoped read/write execution over [`Database`].
//!
//! # Responsibility
//! - Open a transaction, hand it to caller logic, and resolve it on every
//!   exit path: normal return, returned error, or panic.
//! - Turn panics raised by caller logic into returned errors.
//!
//! # Invariants
//! - A transaction is committed or rolled back exactly once.
//! - Reads always roll back; a failed rollback is logged, never returned.
//! - Writes commit only when the callback returned `Ok`; a failed commit
//!   replaces the callback's value with `TxError::Commit`.
//! - A failed rollback never masks the failure that caused it.
//! - If opening the transaction fails, the callback is not invoked.

use super::open::Database;
use super::transaction::{begin_read, begin_write, Transaction, TxError};
use log::{debug, error, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

impl Database {
    /// Runs `reader` inside a read-only transaction and rolls it back
    /// afterwards.
    ///
    /// `E` absorbs scoped-execution failures through `From<TxError>`. A panic
    /// inside `reader` whose payload is an `E` (raised with
    /// [`std::panic::panic_any`]) is returned as-is; any other panic comes
    /// back as `TxError::Panicked`.
    pub fn read<T, E, F>(&self, reader: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TxError> + Send + 'static,
    {
        let started_at = Instant::now();
        let mut conn = self.connect().map_err(TxError::Connection)?;
        let tx = begin_read(&mut conn)?;

        let outcome = run_guarded(&tx, reader);

        if let Err(err) = tx.rollback() {
            warn!("event=tx_rollback module=tx status=error mode=read error={err}");
        }
        debug!(
            "event=tx_read module=tx status={} duration_ms={}",
            outcome_status(&outcome),
            started_at.elapsed().as_millis()
        );
        outcome
    }

    /// Runs `writer` inside a read-write transaction.
    ///
    /// Commits when `writer` returns `Ok`, otherwise rolls back and returns
    /// the callback's failure. Panic handling matches [`Database::read`].
    pub fn write<T, E, F>(&self, writer: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<TxError> + Send + 'static,
    {
        let started_at = Instant::now();
        let mut conn = self.connect().map_err(TxError::Connection)?;
        let tx = begin_write(&mut conn)?;

        match run_guarded(&tx, writer) {
            Ok(value) => match tx.commit() {
                Ok(()) => {
                    debug!(
                        "event=tx_write module=tx status=ok resolution=commit duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    Ok(value)
                }
                Err(err) => {
                    error!(
                        "event=tx_write module=tx status=error resolution=commit duration_ms={} error={}",
                        started_at.elapsed().as_millis(),
                        err
                    );
                    Err(TxError::Commit(err).into())
                }
            },
            Err(failure) => {
                if let Err(err) = tx.rollback() {
                    warn!("event=tx_rollback module=tx status=error mode=write error={err}");
                }
                debug!(
                    "event=tx_write module=tx status=error resolution=rollback duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(failure)
            }
        }
    }
}

fn run_guarded<T, E, F>(tx: &Transaction<'_>, op: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<TxError> + Send + 'static,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(tx))) {
        Ok(result) => result,
        Err(payload) => Err(recover_panic(payload, tx)),
    }
}

fn recover_panic<E>(payload: Box<dyn Any + Send>, tx: &Transaction<'_>) -> E
where
    E: From<TxError> + Send + 'static,
{
    match payload.downcast::<E>() {
        Ok(typed) => *typed,
        Err(payload) => {
            let description = describe_panic(payload.as_ref());
            error!(
                "event=tx_panic module=tx status=error mode={} payload={}",
                tx.mode(),
                description
            );
            E::from(TxError::Panicked(description))
        }
    }
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn outcome_status<T, E>(outcome: &Result<T, E>) -> &'static str {
    if outcome.is_ok() {
        "ok"
    } else {
        "error"
    }
}
