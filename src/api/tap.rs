use crate::{
    engine::{TapError, TapOutcome, TapStatus, local_now, mysql::MySqlLedger, record_tap_with_retry},
    utils::{badge_cache::BadgeCache, sheet_export::SheetSync},
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct TapRequest {
    /// Badge UID as read by the station
    #[schema(example = "04A1B2C3")]
    pub rfid: String,
}

#[derive(Serialize, ToSchema)]
pub struct TapResponse {
    #[schema(example = "IN Time Marked (Entry #1)")]
    pub message: String,
    #[schema(example = "in", value_type = String)]
    pub status: TapStatus,
    #[schema(example = 1)]
    pub entry_number: u32,
    #[schema(example = "Asha Rahman")]
    pub name: String,
    #[schema(example = "2026-03-02")]
    pub date: String,
    #[schema(example = "09:00:00")]
    pub time: String,
}

impl TapResponse {
    fn from_outcome(outcome: &TapOutcome, name: String) -> Self {
        Self {
            message: outcome.message(),
            status: outcome.status(),
            entry_number: outcome.entry_number(),
            name,
            date: outcome.entry().date.format("%Y-%m-%d").to_string(),
            time: outcome.time().format("%H:%M:%S").to_string(),
        }
    }
}

/// Student name for the station display. Empty when it cannot be read; the tap is
/// already committed by then.
async fn display_name(pool: &MySqlPool, student_id: u64) -> String {
    match sqlx::query_scalar::<_, String>("SELECT name FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(pool)
        .await
    {
        Ok(name) => name.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, student_id, "Failed to load student name for tap response");
            String::new()
        }
    }
}

/// Record a badge tap
#[utoipa::path(
    post,
    path = "/api/tap",
    request_body = TapRequest,
    responses(
        (status = 200, description = "IN or OUT time marked", body = TapResponse),
        (status = 404, description = "Badge not enrolled", body = Object, example = json!({
            "message": "ID Not Registered",
            "status": "error"
        })),
        (status = 409, description = "Concurrent tap for the same student", body = Object),
        (status = 503, description = "Attendance store unavailable", body = Object)
    ),
    tag = "Tap"
)]
#[instrument(name = "tap", skip_all, fields(rfid = %payload.rfid.trim()))]
pub async fn tap(
    pool: web::Data<MySqlPool>,
    ledger: web::Data<MySqlLedger>,
    badges: web::Data<BadgeCache>,
    sheet: web::Data<SheetSync>,
    payload: web::Json<TapRequest>,
) -> Result<impl Responder, TapError> {
    let uid = payload.rfid.trim();
    if uid.is_empty() {
        return Err(TapError::UnregisteredBadge);
    }

    let student_id = badges
        .resolve(pool.get_ref(), uid)
        .await?
        .ok_or(TapError::UnregisteredBadge)?;

    let outcome = match record_tap_with_retry(ledger.get_ref(), student_id, local_now()).await {
        Err(TapError::UnregisteredBadge) => {
            // student removed since the badge was cached
            badges.invalidate(uid).await;
            return Err(TapError::UnregisteredBadge);
        }
        other => other?,
    };

    let name = display_name(pool.get_ref(), student_id).await;

    sheet.notify(pool.get_ref().clone());

    info!(student_id, status = %outcome.status(), "Tap answered");

    Ok(HttpResponse::Ok().json(TapResponse::from_outcome(&outcome, name)))
}
