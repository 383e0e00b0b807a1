use super::{AttendanceEntry, Ledger, LedgerTx, TapError};
use chrono::{NaiveDate, NaiveTime};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::error;

/// MySQL error numbers that mean another transaction won the race.
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

impl From<sqlx::Error> for TapError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            // 23000: duplicate (student_id, date, entry_number)
            if matches!(db_err.code().as_deref(), Some("23000") | Some("40001")) {
                return TapError::TransactionConflict;
            }
            if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
                if matches!(mysql_err.number(), ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK) {
                    return TapError::TransactionConflict;
                }
            }
        }

        error!(error = %e, "Attendance ledger query failed");
        TapError::StorageUnavailable(e.to_string())
    }
}

/// Ledger over the `students` / `attendance` tables.
#[derive(Clone)]
pub struct MySqlLedger {
    pool: MySqlPool,
}

impl MySqlLedger {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

pub struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

impl Ledger for MySqlLedger {
    type Tx<'a> = MySqlTx;

    async fn begin(&self) -> Result<MySqlTx, TapError> {
        let tx = self.pool.begin().await?;
        Ok(MySqlTx { tx })
    }
}

impl LedgerTx for MySqlTx {
    async fn lock_student(&mut self, student_id: u64) -> Result<bool, TapError> {
        // row lock on the student serializes taps for the same student
        let row = sqlx::query_scalar::<_, u64>("SELECT id FROM students WHERE id = ? FOR UPDATE")
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.is_some())
    }

    async fn latest_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceEntry>, TapError> {
        let entry = sqlx::query_as::<_, AttendanceEntry>(
            r#"
            SELECT id, student_id, date, entry_number, in_time, out_time
            FROM attendance
            WHERE student_id = ? AND date = ?
            ORDER BY entry_number DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(date)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn insert_entry(
        &mut self,
        student_id: u64,
        date: NaiveDate,
        entry_number: u32,
        in_time: NaiveTime,
    ) -> Result<AttendanceEntry, TapError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (student_id, date, entry_number, in_time)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(student_id)
        .bind(date)
        .bind(entry_number)
        .bind(in_time)
        .execute(&mut *self.tx)
        .await?;

        Ok(AttendanceEntry {
            id: result.last_insert_id(),
            student_id,
            date,
            entry_number,
            in_time,
            out_time: None,
        })
    }

    async fn close_entry(&mut self, entry_id: u64, out_time: NaiveTime) -> Result<(), TapError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET out_time = ?
            WHERE id = ?
            AND out_time IS NULL
            "#,
        )
        .bind(out_time)
        .bind(entry_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TapError::TransactionConflict);
        }

        Ok(())
    }

    async fn commit(self) -> Result<(), TapError> {
        self.tx.commit().await?;
        Ok(())
    }
}
