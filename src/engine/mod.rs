//! Attendance toggle engine.
//!
//! A tap either opens a new entry for the student's day or closes the one that is
//! still open. The whole read-then-write sequence runs inside one ledger
//! transaction that holds a lock on the student, so concurrent taps for the same
//! student serialize and never leave two open entries behind.

pub mod mysql;

#[cfg(test)]
pub mod memory;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use strum_macros::{AsRefStr, Display as StrumDisplay};
use tracing::{debug, info, warn};

pub use crate::model::attendance::AttendanceEntry;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum TapError {
    #[display(fmt = "ID Not Registered")]
    UnregisteredBadge,

    #[display(fmt = "Concurrent tap detected, please tap again")]
    TransactionConflict,

    #[display(fmt = "Attendance store unavailable: {}", _0)]
    StorageUnavailable(String),
}

impl std::error::Error for TapError {}

impl ResponseError for TapError {
    fn status_code(&self) -> StatusCode {
        match self {
            TapError::UnregisteredBadge => StatusCode::NOT_FOUND,
            TapError::TransactionConflict => StatusCode::CONFLICT,
            TapError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // storage details stay in the logs
        let message = match self {
            TapError::StorageUnavailable(_) => "Attendance store unavailable".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "message": message,
            "status": TapStatus::Error.as_ref(),
        }))
    }
}

/// Status string the tap station shows next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TapStatus {
    In,
    Out,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// A new entry was created with in-time set.
    Opened(AttendanceEntry),
    /// The open entry received its out-time.
    Closed(AttendanceEntry),
}

impl TapOutcome {
    pub fn entry(&self) -> &AttendanceEntry {
        match self {
            TapOutcome::Opened(entry) | TapOutcome::Closed(entry) => entry,
        }
    }

    pub fn entry_number(&self) -> u32 {
        self.entry().entry_number
    }

    pub fn status(&self) -> TapStatus {
        match self {
            TapOutcome::Opened(_) => TapStatus::In,
            TapOutcome::Closed(_) => TapStatus::Out,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TapOutcome::Opened(entry) => format!("IN Time Marked (Entry #{})", entry.entry_number),
            TapOutcome::Closed(_) => "OUT Time Marked".to_string(),
        }
    }

    /// Time of day this tap was stamped with.
    pub fn time(&self) -> NaiveTime {
        match self {
            TapOutcome::Opened(entry) => entry.in_time,
            TapOutcome::Closed(entry) => entry.out_time.unwrap_or(entry.in_time),
        }
    }
}

/// What a tap does given the latest entry of the student's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Open { entry_number: u32 },
    Close { entry_id: u64, entry_number: u32 },
}

pub fn next_action(latest: Option<&AttendanceEntry>) -> NextAction {
    match latest {
        None => NextAction::Open { entry_number: 1 },
        Some(entry) if entry.is_closed() => NextAction::Open {
            entry_number: entry.entry_number + 1,
        },
        Some(entry) => NextAction::Close {
            entry_id: entry.id,
            entry_number: entry.entry_number,
        },
    }
}

/// Source of ledger transactions.
#[allow(async_fn_in_trait)]
pub trait Ledger {
    type Tx<'a>: LedgerTx
    where
        Self: 'a;

    async fn begin(&self) -> Result<Self::Tx<'_>, TapError>;
}

/// One open ledger transaction. Dropping it without `commit` discards every write.
#[allow(async_fn_in_trait)]
pub trait LedgerTx {
    /// Locks the student for the rest of the transaction. `false` when unknown.
    async fn lock_student(&mut self, student_id: u64) -> Result<bool, TapError>;

    /// Entry with the highest entry number for this student and date.
    async fn latest_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEntry>, TapError>;

    async fn insert_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
        entry_number: u32,
        in_time: NaiveTime,
    ) -> Result<AttendanceEntry, TapError>;

    /// Sets the out-time of an entry that is still open.
    async fn close_entry(&mut self, entry_id: u64, out_time: NaiveTime) -> Result<(), TapError>;

    async fn commit(self) -> Result<(), TapError>;
}

/// Local civil time, truncated to whole seconds.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub async fn record_tap<L: Ledger>(
    ledger: &L,
    student_id: u64,
    now: NaiveDateTime,
) -> Result<TapOutcome, TapError> {
    let date = now.date();
    let time = now.time();

    let mut tx = ledger.begin().await?;

    if !tx.lock_student(student_id).await? {
        debug!(student_id, "Tap for unknown student");
        return Err(TapError::UnregisteredBadge);
    }

    let latest = tx.latest_entry(student_id, date).await?;

    let outcome = match next_action(latest.as_ref()) {
        NextAction::Open { entry_number } => {
            let entry = tx.insert_entry(student_id, date, entry_number, time).await?;
            TapOutcome::Opened(entry)
        }
        NextAction::Close { entry_id, entry_number } => {
            debug!(student_id, entry_id, entry_number, "Closing open entry");
            tx.close_entry(entry_id, time).await?;
            let mut entry = latest.ok_or_else(|| {
                TapError::StorageUnavailable("latest entry vanished".to_string())
            })?;
            entry.out_time = Some(time);
            TapOutcome::Closed(entry)
        }
    };

    tx.commit().await?;

    info!(
        student_id,
        %date,
        %time,
        entry_number = outcome.entry_number(),
        status = %outcome.status(),
        "Tap recorded"
    );

    Ok(outcome)
}

/// `record_tap`, run a second time if the first attempt lost a write race.
pub async fn record_tap_with_retry<L: Ledger>(
    ledger: &L,
    student_id: u64,
    now: NaiveDateTime,
) -> Result<TapOutcome, TapError> {
    match record_tap(ledger, student_id, now).await {
        Err(TapError::TransactionConflict) => {
            warn!(student_id, "Tap conflicted with a concurrent tap, retrying once");
            record_tap(ledger, student_id, now).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLedger;
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    #[test]
    fn next_action_opens_first_entry_of_the_day() {
        assert_eq!(next_action(None), NextAction::Open { entry_number: 1 });
    }

    #[test]
    fn next_action_follows_latest_entry_state() {
        let mut entry = AttendanceEntry {
            id: 7,
            student_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            entry_number: 3,
            in_time: t("10:00:00"),
            out_time: None,
        };
        assert_eq!(
            next_action(Some(&entry)),
            NextAction::Close { entry_id: 7, entry_number: 3 }
        );

        entry.out_time = Some(t("11:00:00"));
        assert_eq!(next_action(Some(&entry)), NextAction::Open { entry_number: 4 });
    }

    #[actix_web::test]
    async fn first_tap_of_the_day_opens_entry_one() {
        let ledger = MemoryLedger::with_students(&[1]);

        let outcome = record_tap(&ledger, 1, at("2026-03-02", "09:00:00")).await.unwrap();

        assert_eq!(outcome.status(), TapStatus::In);
        assert_eq!(outcome.entry_number(), 1);
        assert_eq!(outcome.message(), "IN Time Marked (Entry #1)");
    }

    #[actix_web::test]
    async fn in_out_in_scenario() {
        let ledger = MemoryLedger::with_students(&[1]);

        let first = record_tap(&ledger, 1, at("2026-03-02", "09:00:00")).await.unwrap();
        assert!(matches!(first, TapOutcome::Opened(ref e) if e.entry_number == 1));
        assert_eq!(first.entry().in_time, t("09:00:00"));
        assert_eq!(first.entry().out_time, None);

        let second = record_tap(&ledger, 1, at("2026-03-02", "17:00:00")).await.unwrap();
        assert!(matches!(second, TapOutcome::Closed(ref e) if e.entry_number == 1));
        assert_eq!(second.entry().out_time, Some(t("17:00:00")));
        assert_eq!(second.message(), "OUT Time Marked");

        let third = record_tap(&ledger, 1, at("2026-03-02", "17:05:00")).await.unwrap();
        assert!(matches!(third, TapOutcome::Opened(ref e) if e.entry_number == 2));
        assert_eq!(third.entry().in_time, t("17:05:00"));
        assert_eq!(third.entry().out_time, None);

        let rows = ledger.entries_for(1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].in_time, t("09:00:00"));
        assert_eq!(rows[0].out_time, Some(t("17:00:00")));
    }

    #[actix_web::test]
    async fn repeated_taps_alternate_and_number_without_gaps() {
        let ledger = MemoryLedger::with_students(&[4]);

        for i in 0..10u32 {
            // gaps between taps do not matter
            let time = format!("{:02}:{:02}:00", 6 + i, (i * 7) % 60);
            let outcome = record_tap(&ledger, 4, at("2026-03-02", &time)).await.unwrap();
            let expected_status = if i % 2 == 0 { TapStatus::In } else { TapStatus::Out };
            assert_eq!(outcome.status(), expected_status, "tap {i}");
            assert_eq!(outcome.entry_number(), i / 2 + 1, "tap {i}");
        }

        let numbers: Vec<u32> = ledger.entries_for(4).iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(ledger.entries_for(4).iter().all(|e| e.is_closed()));
    }

    #[actix_web::test]
    async fn unregistered_student_mutates_nothing() {
        let ledger = MemoryLedger::with_students(&[1]);

        let err = record_tap(&ledger, 99, at("2026-03-02", "09:00:00")).await.unwrap_err();

        assert_eq!(err, TapError::UnregisteredBadge);
        assert!(ledger.all_entries().is_empty());
    }

    #[actix_web::test]
    async fn entry_left_open_yesterday_does_not_carry_over() {
        let ledger = MemoryLedger::with_students(&[1]);

        record_tap(&ledger, 1, at("2026-03-01", "09:00:00")).await.unwrap();
        let today = record_tap(&ledger, 1, at("2026-03-02", "08:30:00")).await.unwrap();

        assert!(matches!(today, TapOutcome::Opened(ref e) if e.entry_number == 1));

        // yesterday's entry stays open, untouched
        let rows = ledger.entries_for(1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(rows[0].out_time, None);
    }

    #[actix_web::test]
    async fn students_do_not_share_entries() {
        let ledger = MemoryLedger::with_students(&[1, 2]);

        record_tap(&ledger, 1, at("2026-03-02", "09:00:00")).await.unwrap();
        let other = record_tap(&ledger, 2, at("2026-03-02", "09:00:01")).await.unwrap();

        assert!(matches!(other, TapOutcome::Opened(ref e) if e.entry_number == 1));
    }

    #[actix_web::test]
    async fn concurrent_taps_open_then_close() {
        let ledger = MemoryLedger::with_students(&[1]);
        let now = at("2026-03-02", "09:00:00");

        let (a, b) = futures::join!(record_tap(&ledger, 1, now), record_tap(&ledger, 1, now));
        let mut statuses = vec![a.unwrap(), b.unwrap()];
        statuses.sort_by_key(|o| o.status().as_ref().to_string());

        // "in" sorts before "out"
        assert!(matches!(statuses[0], TapOutcome::Opened(ref e) if e.entry_number == 1));
        assert!(matches!(statuses[1], TapOutcome::Closed(ref e) if e.entry_number == 1));
        assert_eq!(ledger.entries_for(1).len(), 1);
    }

    #[actix_web::test]
    async fn conflict_is_retried_once() {
        let ledger = MemoryLedger::with_students(&[1]);
        ledger.inject_conflicts(1);

        let outcome = record_tap_with_retry(&ledger, 1, at("2026-03-02", "09:00:00"))
            .await
            .unwrap();

        assert_eq!(outcome.entry_number(), 1);
        assert_eq!(ledger.entries_for(1).len(), 1);
    }

    #[actix_web::test]
    async fn second_conflict_is_surfaced_without_writes() {
        let ledger = MemoryLedger::with_students(&[1]);
        ledger.inject_conflicts(2);

        let err = record_tap_with_retry(&ledger, 1, at("2026-03-02", "09:00:00"))
            .await
            .unwrap_err();

        assert_eq!(err, TapError::TransactionConflict);
        assert!(ledger.all_entries().is_empty());
    }

    #[test]
    fn tap_error_status_codes() {
        assert_eq!(TapError::UnregisteredBadge.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(TapError::TransactionConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            TapError::StorageUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(TapError::UnregisteredBadge.to_string(), "ID Not Registered");
    }
}
