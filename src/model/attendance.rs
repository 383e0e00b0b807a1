use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One in/out cycle of a student on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceEntry {
    pub id: u64,
    pub student_id: u64,
    pub date: NaiveDate,
    pub entry_number: u32,
    pub in_time: NaiveTime,
    pub out_time: Option<NaiveTime>,
}

impl AttendanceEntry {
    pub fn is_open(&self) -> bool {
        self.out_time.is_none()
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }
}

/// Ledger row joined with its student, as shown on the dashboard and in exports.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "name": "Asha Rahman",
        "roll_number": "12",
        "date": "2026-03-02",
        "entry_number": 1,
        "in_time": "09:00:00",
        "out_time": "17:00:00"
    })
)]
pub struct AttendanceRecord {
    #[schema(example = "Asha Rahman")]
    pub name: String,

    #[schema(example = "12", nullable = true)]
    pub roll_number: Option<String>,

    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(example = 1)]
    pub entry_number: u32,

    #[schema(example = "09:00:00", value_type = String)]
    pub in_time: NaiveTime,

    #[schema(example = "17:00:00", value_type = String, nullable = true)]
    pub out_time: Option<NaiveTime>,
}

/// `HH:MM:SS`, or `-` while the entry is open.
pub fn time_or_dash(value: Option<NaiveTime>) -> String {
    value
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// 12-hour clock used on the dashboard, e.g. `05:05:00 PM`.
pub fn to_12hr(value: Option<NaiveTime>) -> String {
    value
        .map(|t| t.format("%I:%M:%S %p").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn roll_or_dash(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(roll) if !roll.is_empty() => roll.to_string(),
        _ => "-".to_string(),
    }
}
