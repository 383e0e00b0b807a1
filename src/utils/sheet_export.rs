//! Spreadsheet projection of the attendance ledger.
//!
//! The same rows back the `/export` download and the post-tap sync that mirrors
//! the ledger into a spreadsheet file.

use crate::model::attendance::{AttendanceRecord, roll_or_dash, time_or_dash};
use anyhow::{Context, Result};
use sqlx::MySqlPool;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const HEADER: [&str; 6] = ["Date", "Name", "Roll No", "Entry #", "In Time", "Out Time"];

pub async fn fetch_records(pool: &MySqlPool) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT students.name, students.roll_number,
               attendance.date, attendance.entry_number,
               attendance.in_time, attendance.out_time
        FROM attendance
        JOIN students ON students.id = attendance.student_id
        ORDER BY attendance.date, students.name, attendance.entry_number
        "#,
    )
    .fetch_all(pool)
    .await
}

pub fn to_rows(records: &[AttendanceRecord]) -> Vec<[String; 6]> {
    records
        .iter()
        .map(|r| {
            [
                r.date.format("%Y-%m-%d").to_string(),
                r.name.clone(),
                roll_or_dash(r.roll_number.as_deref()),
                r.entry_number.to_string(),
                time_or_dash(Some(r.in_time)),
                time_or_dash(r.out_time),
            ]
        })
        .collect()
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn render_csv(records: &[AttendanceRecord]) -> String {
    let mut csv = HEADER.join(",");
    csv.push('\n');

    for row in to_rows(records) {
        let line = row.iter().map(|f| csv_quote(f)).collect::<Vec<_>>().join(",");
        csv.push_str(&line);
        csv.push('\n');
    }

    csv
}

/// Replaces `path` with `contents` without exposing a half-written file.
pub fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let tmp = path.with_extension("csv.tmp");
    std::fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;

    Ok(())
}

/// Mirrors the whole ledger into a spreadsheet file after each committed tap.
#[derive(Clone)]
pub struct SheetSync {
    target: Option<PathBuf>,
}

impl SheetSync {
    pub fn new(target: Option<PathBuf>) -> Self {
        Self { target }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Fire-and-forget. The tap is already committed; failures are only logged.
    pub fn notify(&self, pool: MySqlPool) {
        let Some(target) = self.target.clone() else {
            return;
        };

        actix_web::rt::spawn(async move {
            if let Err(e) = sync(&pool, &target).await {
                error!(error = %e, path = %target.display(), "Sheet sync failed");
            }
        });
    }
}

async fn sync(pool: &MySqlPool, target: &Path) -> Result<()> {
    let records = fetch_records(pool).await.context("loading attendance records")?;
    write_atomically(target, &render_csv(&records))?;
    debug!(rows = records.len(), path = %target.display(), "Sheet synced");
    Ok(())
}
