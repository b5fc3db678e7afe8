//! Append-only attendance ledger with per-identity daily dedup.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use rollcall_core::AttendanceEvent;

use crate::error::Result;
use crate::kv::KeyValueStore;

/// KV key holding the serialized event list.
pub const RECORDS_KEY: &str = "rollcall/attendance_records";

/// Outcome of a mark attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// A new event was appended and persisted.
    Marked(AttendanceEvent),
    /// An event already exists for this identity today; nothing was written.
    AlreadyMarked,
}

/// Attendance events, persisted as one JSON document in the backing
/// key-value store. Events are append-only; only [`clear`](Self::clear)
/// removes them.
pub struct AttendanceLedger<S> {
    kv: S,
}

impl<S: KeyValueStore> AttendanceLedger<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    fn load(&self) -> Result<Vec<AttendanceEvent>> {
        match self.kv.get(RECORDS_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, events: &[AttendanceEvent]) -> Result<()> {
        let bytes = serde_json::to_vec(events)?;
        self.kv.set(RECORDS_KEY, &bytes)
    }

    /// True iff an event exists for exactly this `(name, date)` pair.
    pub fn has_marked_on(&self, name: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.load()?.iter().any(|e| e.name == name && e.date == date))
    }

    /// Append an attendance event for `name` unless one already exists for
    /// the calendar date of `now`. Callers are expected to check first, but
    /// redundant calls are safe and never create a duplicate.
    pub fn mark_attendance(
        &mut self,
        name: &str,
        confidence_percent: u8,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome> {
        let date = now.date_naive();
        let mut events = self.load()?;
        if events.iter().any(|e| e.name == name && e.date == date) {
            tracing::debug!(name, %date, "attendance already marked today");
            return Ok(MarkOutcome::AlreadyMarked);
        }

        let event = AttendanceEvent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            date,
            timestamp: now,
            confidence_percent,
        };
        tracing::info!(name, %date, confidence_percent, "attendance marked");
        events.push(event.clone());
        self.save(&events)?;
        Ok(MarkOutcome::Marked(event))
    }

    /// Every event for `name`, in append order. Ordering for display or
    /// arithmetic is the caller's concern at read time.
    pub fn records_for(&self, name: &str) -> Result<Vec<AttendanceEvent>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| e.name == name)
            .collect())
    }

    /// Every event in the ledger, in append order.
    pub fn all_records(&self) -> Result<Vec<AttendanceEvent>> {
        self.load()
    }

    /// Remove every event.
    pub fn clear(&mut self) -> Result<()> {
        tracing::info!("attendance ledger cleared");
        self.kv.remove(RECORDS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use chrono::TimeZone;

    fn ledger() -> AttendanceLedger<MemoryKv> {
        AttendanceLedger::new(MemoryKv::new())
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_same_day_second_mark_is_noop() {
        let mut ledger = ledger();

        let first = ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();
        assert!(matches!(first, MarkOutcome::Marked(_)));

        let second = ledger.mark_attendance("Alice", 95, at(10, 15)).unwrap();
        assert_eq!(second, MarkOutcome::AlreadyMarked);

        assert_eq!(ledger.records_for("Alice").unwrap().len(), 1);
    }

    #[test]
    fn test_next_day_adds_second_event() {
        let mut ledger = ledger();
        ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();
        let next = ledger.mark_attendance("Alice", 92, at(11, 9)).unwrap();
        assert!(matches!(next, MarkOutcome::Marked(_)));
        assert_eq!(ledger.records_for("Alice").unwrap().len(), 2);
    }

    #[test]
    fn test_dedup_is_per_identity() {
        let mut ledger = ledger();
        ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();
        let bob = ledger.mark_attendance("Bob", 85, at(10, 9)).unwrap();
        assert!(matches!(bob, MarkOutcome::Marked(_)));
    }

    #[test]
    fn test_has_marked_on_exact_pair() {
        let mut ledger = ledger();
        ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();

        assert!(ledger.has_marked_on("Alice", at(10, 0).date_naive()).unwrap());
        assert!(!ledger.has_marked_on("Alice", at(11, 0).date_naive()).unwrap());
        assert!(!ledger.has_marked_on("Bob", at(10, 0).date_naive()).unwrap());
    }

    #[test]
    fn test_event_fields() {
        let mut ledger = ledger();
        let now = at(10, 9);
        let MarkOutcome::Marked(event) = ledger.mark_attendance("Alice", 87, now).unwrap() else {
            panic!("expected a new event");
        };
        assert_eq!(event.name, "Alice");
        assert_eq!(event.date, now.date_naive());
        assert_eq!(event.timestamp, now);
        assert_eq!(event.confidence_percent, 87);
    }

    #[test]
    fn test_records_for_filters_by_name() {
        let mut ledger = ledger();
        ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();
        ledger.mark_attendance("Bob", 85, at(10, 9)).unwrap();
        ledger.mark_attendance("Alice", 91, at(11, 9)).unwrap();

        let alice = ledger.records_for("Alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|e| e.name == "Alice"));
    }

    #[test]
    fn test_clear_empties_ledger() {
        let mut ledger = ledger();
        ledger.mark_attendance("Alice", 90, at(10, 9)).unwrap();
        ledger.clear().unwrap();
        assert!(ledger.all_records().unwrap().is_empty());
    }
}
