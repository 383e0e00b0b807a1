use crate::model::attendance::{AttendanceRecord, roll_or_dash, time_or_dash, to_12hr};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardRow {
    #[schema(example = "Asha Rahman")]
    pub name: String,
    #[schema(example = "2026-03-02")]
    pub date: String,
    #[schema(example = 1)]
    pub entry_number: u32,
    #[schema(example = "09:00:00 AM")]
    pub in_time: String,
    #[schema(example = "-")]
    pub out_time: String,
}

impl From<AttendanceRecord> for DashboardRow {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            name: r.name,
            date: r.date.format("%Y-%m-%d").to_string(),
            entry_number: r.entry_number,
            in_time: to_12hr(Some(r.in_time)),
            out_time: to_12hr(r.out_time),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub data: Vec<DashboardRow>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 50)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Row of the per-date history view.
#[derive(Serialize, ToSchema)]
pub struct DayRecord {
    #[schema(example = "Asha Rahman")]
    pub name: String,
    #[schema(example = "12")]
    pub roll_number: String,
    #[schema(example = "09:00:00")]
    pub in_time: String,
    #[schema(example = "-")]
    pub out_time: String,
    #[schema(example = 1)]
    pub entry_number: u32,
}

impl From<AttendanceRecord> for DayRecord {
    fn from(r: AttendanceRecord) -> Self {
        Self {
            roll_number: roll_or_dash(r.roll_number.as_deref()),
            in_time: time_or_dash(Some(r.in_time)),
            out_time: time_or_dash(r.out_time),
            entry_number: r.entry_number,
            name: r.name,
        }
    }
}

/// Page, page size and row offset. The offset is widened so any `u32` page is valid.
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(50).clamp(1, 500);
    let offset = (i64::from(page) - 1) * i64::from(per_page);
    (page, per_page, offset)
}

/// Dashboard feed, newest first
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Paginated attendance records", body = DashboardResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn dashboard(
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance")
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count attendance");
            ErrorInternalServerError("Database error")
        })?;

    debug!(page, per_page, offset, "Fetching dashboard records");

    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT students.name, students.roll_number,
               attendance.date, attendance.entry_number,
               attendance.in_time, attendance.out_time
        FROM attendance
        JOIN students ON students.id = attendance.student_id
        ORDER BY attendance.date DESC, attendance.id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch dashboard records");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(DashboardResponse {
        data: records.into_iter().map(DashboardRow::from).collect(),
        page,
        per_page,
        total,
    }))
}

/// Dates that have at least one entry
#[utoipa::path(
    get,
    path = "/api/attendance/dates",
    responses(
        (status = 200, description = "Dates ascending", body = Vec<String>, example = json!(["2026-03-01", "2026-03-02"])),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn attendance_dates(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let dates = sqlx::query_scalar::<_, NaiveDate>("SELECT DISTINCT date FROM attendance ORDER BY date")
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch attendance dates");
            ErrorInternalServerError("Database error")
        })?;

    let dates: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    Ok(HttpResponse::Ok().json(dates))
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Attendance for one date
#[utoipa::path(
    get,
    path = "/api/attendance/{date}",
    params(
        ("date" = String, Path, description = "Calendar date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Entries of the day", body = Vec<DayRecord>),
        (status = 400, description = "Malformed date", body = Object, example = json!({
            "message": "Date must be YYYY-MM-DD"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn attendance_by_date(
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let Some(date) = parse_day(&path) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Date must be YYYY-MM-DD"
        })));
    };

    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT students.name, students.roll_number,
               attendance.date, attendance.entry_number,
               attendance.in_time, attendance.out_time
        FROM attendance
        JOIN students ON students.id = attendance.student_id
        WHERE attendance.date = ?
        ORDER BY attendance.in_time, attendance.id
        "#,
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, %date, "Failed to fetch attendance for date");
        ErrorInternalServerError("Database error")
    })?;

    let data: Vec<DayRecord> = records.into_iter().map(DayRecord::from).collect();

    Ok(HttpResponse::Ok().json(data))
}
