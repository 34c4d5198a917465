use contacts_core::db::{
    open_db_with_options, Database, DatabaseOptions, DbError, TransactionMode, TxError,
};
use contacts_core::{
    ContactRepository, ContactService, NewContact, ServiceError, ServiceResult,
    SqliteContactRepository,
};
use std::cell::Cell;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug)]
enum TestError {
    Tx(TxError),
    Sqlite(rusqlite::Error),
    Aborted,
}

impl From<TxError> for TestError {
    fn from(value: TxError) -> Self {
        Self::Tx(value)
    }
}

impl From<rusqlite::Error> for TestError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

fn setup_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    // Short busy timeout: a transaction left unresolved makes the next
    // writer fail fast instead of hanging the test.
    let options = DatabaseOptions {
        busy_timeout: Duration::from_millis(200),
    };
    let db = open_db_with_options(dir.path().join("contacts.db"), options).unwrap();
    (dir, db)
}

fn count_contacts(db: &Database) -> i64 {
    db.read(|tx| -> Result<i64, TestError> {
        Ok(tx.query_row("SELECT COUNT(*) FROM contacts;", [], |row| row.get(0))?)
    })
    .unwrap()
}

fn insert_raw(db: &Database, email: &str) -> Result<i64, TestError> {
    db.write(|tx| -> Result<i64, TestError> {
        Ok(tx.query_row(
            "INSERT INTO contacts (email, name) VALUES (?1, 'n') RETURNING id;",
            [email],
            |row| row.get(0),
        )?)
    })
}

#[test]
fn write_commits_when_callback_succeeds() {
    let (_dir, db) = setup_db();

    let id = insert_raw(&db, "alice@example.xyz").unwrap();

    assert!(id > 0);
    assert_eq!(count_contacts(&db), 1);
}

#[test]
fn write_rolls_back_when_callback_returns_error() {
    let (_dir, db) = setup_db();

    let err = db
        .write(|tx| -> Result<(), TestError> {
            tx.execute(
                "INSERT INTO contacts (email, name) VALUES ('a@b.c', 'A');",
                [],
            )?;
            Err(TestError::Aborted)
        })
        .unwrap_err();

    assert!(matches!(err, TestError::Aborted));
    assert_eq!(count_contacts(&db), 0);
    // The write lock was released by the rollback.
    insert_raw(&db, "a@b.c").unwrap();
}

#[test]
fn write_rolls_back_and_reports_panics() {
    let (_dir, db) = setup_db();

    let err = db
        .write(|tx| -> Result<(), TestError> {
            tx.execute(
                "INSERT INTO contacts (email, name) VALUES ('a@b.c', 'A');",
                [],
            )?;
            panic!("boom while writing");
        })
        .unwrap_err();

    match err {
        TestError::Tx(TxError::Panicked(message)) => {
            assert!(message.contains("boom while writing"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count_contacts(&db), 0);
    insert_raw(&db, "a@b.c").unwrap();
}

#[test]
fn panic_with_typed_payload_is_returned_unchanged() {
    let (_dir, db) = setup_db();

    let err = db
        .write(|_tx| -> ServiceResult<()> {
            std::panic::panic_any(ServiceError::Conflict {
                email: "dup@example.xyz".to_string(),
            })
        })
        .unwrap_err();

    assert!(matches!(err, ServiceError::Conflict { email } if email == "dup@example.xyz"));
}

#[test]
fn read_rolls_back_and_reports_panics() {
    let (_dir, db) = setup_db();

    let err = db
        .read(|_tx| -> Result<(), TestError> { panic!("boom while reading") })
        .unwrap_err();

    assert!(matches!(err, TestError::Tx(TxError::Panicked(_))));
    insert_raw(&db, "a@b.c").unwrap();
}

#[test]
fn commit_failure_supersedes_callback_result() {
    let (_dir, db) = setup_db();
    db.write(|tx| -> Result<(), TestError> {
        tx.execute_batch(
            "CREATE TABLE parents (id INTEGER PRIMARY KEY);
             CREATE TABLE children (
                 parent_id INTEGER REFERENCES parents(id) DEFERRABLE INITIALLY DEFERRED
             );",
        )?;
        Ok(())
    })
    .unwrap();

    let err = db
        .write(|tx| -> Result<&'static str, TestError> {
            tx.execute("INSERT INTO children (parent_id) VALUES (42);", [])?;
            Ok("callback finished")
        })
        .unwrap_err();

    assert!(matches!(err, TestError::Tx(TxError::Commit(_))));
    let children = db
        .read(|tx| -> Result<i64, TestError> {
            Ok(tx.query_row("SELECT COUNT(*) FROM children;", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(children, 0);
    insert_raw(&db, "a@b.c").unwrap();
}

#[test]
fn read_transactions_are_read_only() {
    let (_dir, db) = setup_db();

    let err = db
        .read(|tx| -> Result<(), TestError> {
            assert_eq!(tx.mode(), TransactionMode::ReadOnly);
            tx.execute(
                "INSERT INTO contacts (email, name) VALUES ('a@b.c', 'A');",
                [],
            )?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, TestError::Sqlite(_)));
    assert_eq!(count_contacts(&db), 0);
}

#[test]
fn write_transactions_report_their_mode() {
    let (_dir, db) = setup_db();

    let mode = db
        .write(|tx| -> Result<TransactionMode, TestError> { Ok(tx.mode()) })
        .unwrap();

    assert_eq!(mode, TransactionMode::ReadWrite);
}

#[test]
fn connection_failure_skips_callback() {
    let (_dir, db) = setup_db();
    db.close().unwrap();
    let invoked = Cell::new(false);

    let err = db
        .write(|_tx| -> Result<(), TestError> {
            invoked.set(true);
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(
        err,
        TestError::Tx(TxError::Connection(DbError::Closed))
    ));
    assert!(!invoked.get());
}

#[test]
fn missing_store_is_a_connection_failure() {
    let (dir, db) = setup_db();
    drop(dir);

    let err = db
        .read(|_tx| -> Result<(), TestError> { Ok(()) })
        .unwrap_err();

    assert!(matches!(
        err,
        TestError::Tx(TxError::Connection(DbError::Sqlite(_)))
    ));
}

#[test]
fn read_does_not_observe_uncommitted_write() {
    let (_dir, db) = setup_db();
    let db = Arc::new(db);
    let service = ContactService::new(Arc::clone(&db));
    let (inserted_tx, inserted_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            db.write(|tx| -> ServiceResult<i64> {
                let id = SqliteContactRepository::new(tx)
                    .insert_contact(&NewContact::new("carol@example.xyz", "Carol"))?;
                inserted_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(id)
            })
        })
    };

    inserted_rx.recv().unwrap();
    let during = service.get_contact_by_email("carol@example.xyz").unwrap();
    release_tx.send(()).unwrap();
    writer.join().unwrap().unwrap();
    let after = service.get_contact_by_email("carol@example.xyz").unwrap();

    assert!(during.is_none());
    assert_eq!(after.unwrap().name, "Carol");
}

#[test]
fn read_keeps_its_snapshot_across_concurrent_commits() {
    let (_dir, db) = setup_db();
    let db = Arc::new(db);
    let service = ContactService::new(Arc::clone(&db));

    let (before, during) = db
        .read(|tx| -> ServiceResult<_> {
            let repo = SqliteContactRepository::new(tx);
            let before = repo.find_by_email("dave@example.xyz")?;
            thread::scope(|scope| {
                scope
                    .spawn(|| service.add_contact(NewContact::new("dave@example.xyz", "Dave")))
                    .join()
                    .unwrap()
            })?;
            let during = repo.find_by_email("dave@example.xyz")?;
            Ok((before, during))
        })
        .unwrap();

    assert!(before.is_none());
    assert!(during.is_none());
    assert!(service
        .get_contact_by_email("dave@example.xyz")
        .unwrap()
        .is_some());
}
