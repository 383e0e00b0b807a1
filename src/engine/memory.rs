//! In-process ledger used by the engine tests.

use super::{AttendanceEntry, Ledger, LedgerTx, TapError};
use chrono::{NaiveDate, NaiveTime};
use futures::lock::{Mutex, MutexGuard};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
struct State {
    students: BTreeSet<u64>,
    entries: Vec<AttendanceEntry>,
    next_id: u64,
    conflicts_to_inject: u32,
}

/// A single mutex stands in for the per-student row lock.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn with_students(ids: &[u64]) -> Self {
        let state = State {
            students: ids.iter().copied().collect(),
            next_id: 1,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// The next `n` commits fail with a conflict and write nothing.
    pub fn inject_conflicts(&self, n: u32) {
        self.state
            .try_lock()
            .expect("ledger busy")
            .conflicts_to_inject = n;
    }

    pub fn all_entries(&self) -> Vec<AttendanceEntry> {
        self.state.try_lock().expect("ledger busy").entries.clone()
    }

    pub fn entries_for(&self, student_id: u64) -> Vec<AttendanceEntry> {
        let mut rows: Vec<_> = self
            .all_entries()
            .into_iter()
            .filter(|e| e.student_id == student_id)
            .collect();
        rows.sort_by_key(|e| (e.date, e.entry_number));
        rows
    }
}

pub struct MemoryTx<'a> {
    guard: MutexGuard<'a, State>,
    working: State,
}

impl Ledger for MemoryLedger {
    type Tx<'a> = MemoryTx<'a>;

    async fn begin(&self) -> Result<MemoryTx<'_>, TapError> {
        let guard = self.state.lock().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

impl LedgerTx for MemoryTx<'_> {
    async fn lock_student(&mut self, student_id: u64) -> Result<bool, TapError> {
        Ok(self.working.students.contains(&student_id))
    }

    async fn latest_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEntry>, TapError> {
        Ok(self
            .working
            .entries
            .iter()
            .filter(|e| e.student_id == student_id && e.date == date)
            .max_by_key(|e| e.entry_number)
            .cloned())
    }

    async fn insert_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
        entry_number: u32,
        in_time: NaiveTime,
    ) -> Result<AttendanceEntry, TapError> {
        let duplicate = self.working.entries.iter().any(|e| {
            e.student_id == student_id && e.date == date && e.entry_number == entry_number
        });
        if duplicate {
            return Err(TapError::TransactionConflict);
        }

        let entry = AttendanceEntry {
            id: self.working.next_id,
            student_id,
            date,
            entry_number,
            in_time,
            out_time: None,
        };
        self.working.next_id += 1;
        self.working.entries.push(entry.clone());
        Ok(entry)
    }

    async fn close_entry(&mut self, entry_id: u64, out_time: NaiveTime) -> Result<(), TapError> {
        match self
            .working
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id && e.out_time.is_none())
        {
            Some(entry) => {
                entry.out_time = Some(out_time);
                Ok(())
            }
            None => Err(TapError::TransactionConflict),
        }
    }

    async fn commit(mut self) -> Result<(), TapError> {
        if self.guard.conflicts_to_inject > 0 {
            self.guard.conflicts_to_inject -= 1;
            return Err(TapError::TransactionConflict);
        }
        let conflicts = self.guard.conflicts_to_inject;
        *self.guard = self.working;
        self.guard.conflicts_to_inject = conflicts;
        Ok(())
    }
}
