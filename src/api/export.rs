use crate::utils::sheet_export::{fetch_records, render_csv};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, http::header, web};
use sqlx::MySqlPool;
use tracing::error;

/// Download the ledger as a spreadsheet (CSV)
#[utoipa::path(
    get,
    path = "/api/export",
    responses(
        (status = 200, description = "CSV with Date, Name, Roll No, Entry #, In Time, Out Time", content_type = "text/csv", body = String),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn export_csv(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let records = fetch_records(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to load records for export");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"attendance.csv\"",
        ))
        .body(render_csv(&records)))
}
