//! Durability across reopen: both collections must survive a process
//! restart when backed by the SQLite key-value store.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use rollcall_core::{Embedding, Identity};
use rollcall_store::{AttendanceLedger, IdentityStore, MarkOutcome, SqliteKv};

fn identity(name: &str) -> Identity {
    Identity {
        name: name.into(),
        embeddings: vec![
            Embedding::new(vec![1.0, 0.0, 0.0]),
            Embedding::new(vec![0.9, 0.1, 0.0]),
        ],
        enrolled_at: Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap(),
        total_present_days: 0,
        attendance_percentage: 0,
    }
}

#[test]
fn identities_and_events_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("attendance.db");
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();

    {
        let mut store = IdentityStore::new(SqliteKv::open(&db_path).unwrap());
        let mut ledger = AttendanceLedger::new(SqliteKv::open(&db_path).unwrap());

        store.add(identity("Alice")).unwrap();
        let outcome = ledger.mark_attendance("Alice", 93, now).unwrap();
        assert!(matches!(outcome, MarkOutcome::Marked(_)));
        store
            .update("Alice", |i| {
                i.total_present_days = 1;
                i.attendance_percentage = 100;
            })
            .unwrap();
    }

    // Reopen the file as a new process would.
    let store = IdentityStore::new(SqliteKv::open(&db_path).unwrap());
    let mut ledger = AttendanceLedger::new(SqliteKv::open(&db_path).unwrap());

    let alice = store.find_by_name("Alice").unwrap().unwrap();
    assert_eq!(alice.embeddings.len(), 2);
    assert_eq!(alice.total_present_days, 1);
    assert_eq!(alice.attendance_percentage, 100);

    let records = ledger.records_for("Alice").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, now);

    // Daily dedup holds across connections too.
    let later = Utc.with_ymd_and_hms(2026, 3, 10, 16, 0, 0).unwrap();
    assert_eq!(
        ledger.mark_attendance("Alice", 88, later).unwrap(),
        MarkOutcome::AlreadyMarked
    );
}

#[test]
fn clear_wipes_both_collections() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("attendance.db");
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();

    let mut store = IdentityStore::new(SqliteKv::open(&db_path).unwrap());
    let mut ledger = AttendanceLedger::new(SqliteKv::open(&db_path).unwrap());
    store.add(identity("Alice")).unwrap();
    ledger.mark_attendance("Alice", 90, now).unwrap();

    store.clear().unwrap();
    ledger.clear().unwrap();

    let store = IdentityStore::new(SqliteKv::open(&db_path).unwrap());
    let ledger = AttendanceLedger::new(SqliteKv::open(&db_path).unwrap());
    assert!(store.list().unwrap().is_empty());
    assert!(ledger.all_records().unwrap().is_empty());
}
