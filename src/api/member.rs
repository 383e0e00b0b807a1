use crate::{
    model::student::Student,
    utils::{
        badge_cache::BadgeCache,
        db_utils::{build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

/// Columns an enrolled student may have changed. The badge is fixed at enrollment.
const EDITABLE_COLUMNS: &[&str] = &["name", "roll_number"];

#[derive(Deserialize, ToSchema)]
pub struct CreateMember {
    #[schema(example = "Asha Rahman")]
    pub name: String,
    #[schema(example = "12", nullable = true)]
    pub roll_number: Option<String>,
    #[schema(example = "04A1B2C3")]
    pub rfid_uid: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub roll_number: Option<String>,
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Enroll a student badge
#[utoipa::path(
    post,
    path = "/api/members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Student enrolled", body = Object, example = json!({
            "message": "Asha Rahman added successfully!",
            "id": 1
        })),
        (status = 400, description = "Missing name or badge"),
        (status = 409, description = "Badge already enrolled", body = Object, example = json!({
            "message": "This RFID UID is already registered!"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Members"
)]
pub async fn create_member(
    pool: web::Data<MySqlPool>,
    badges: web::Data<BadgeCache>,
    payload: web::Json<CreateMember>,
) -> actix_web::Result<impl Responder> {
    let name = payload.name.trim();
    let rfid_uid = payload.rfid_uid.trim();

    if name.is_empty() || rfid_uid.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Name and RFID UID must not be empty"
        })));
    }

    let result = sqlx::query("INSERT INTO students (name, roll_number, rfid_uid) VALUES (?, ?, ?)")
        .bind(name)
        .bind(blank_to_none(payload.roll_number.as_deref()))
        .bind(rfid_uid)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            let id = res.last_insert_id();
            badges.insert(rfid_uid, id).await;
            info!(student_id = id, "Student enrolled");

            Ok(HttpResponse::Created().json(json!({
                "message": format!("{} added successfully!", name),
                "id": id
            })))
        }
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "message": "This RFID UID is already registered!"
                    })));
                }
            }

            error!(error = %e, "Failed to enroll student");
            Err(ErrorInternalServerError("Internal Server Error"))
        }
    }
}

/// List enrolled students by name
#[utoipa::path(
    get,
    path = "/api/members",
    responses(
        (status = 200, description = "Enrolled students", body = Vec<Student>),
        (status = 500, description = "Internal server error")
    ),
    tag = "Members"
)]
pub async fn list_members(pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT id, name, roll_number, rfid_uid FROM students ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to list students");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(students))
}

async fn fetch_student(pool: &MySqlPool, student_id: u64) -> actix_web::Result<Option<Student>> {
    sqlx::query_as::<_, Student>("SELECT id, name, roll_number, rfid_uid FROM students WHERE id = ?")
        .bind(student_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, student_id, "Failed to fetch student");
            ErrorInternalServerError("Internal Server Error")
        })
}

/// Get student by ID
#[utoipa::path(
    get,
    path = "/api/members/{id}",
    params(
        ("id" = u64, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student found", body = Student),
        (status = 404, description = "Student not found", body = Object, example = json!({
            "message": "Student not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Members"
)]
pub async fn get_member(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    match fetch_student(pool.get_ref(), path.into_inner()).await? {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Student not found"
        }))),
    }
}

/// Edit name and roll number
#[utoipa::path(
    put,
    path = "/api/members/{id}",
    params(
        ("id" = u64, Path, description = "Student ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Field not editable or name empty"),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Members"
)]
pub async fn update_member(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let student_id = path.into_inner();

    if let Some(name) = body.get("name") {
        if name.as_str().map(str::trim).unwrap_or("").is_empty() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Name must not be empty"
            })));
        }
    }

    let update = build_update_sql("students", &body, EDITABLE_COLUMNS, "id", student_id)?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, student_id, "Failed to update student");
        ErrorInternalServerError("Internal Server Error")
    })?;

    // MySQL reports 0 affected rows for a no-op update, so existence is checked afterwards
    match fetch_student(pool.get_ref(), student_id).await? {
        Some(student) => Ok(HttpResponse::Ok().json(student)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Student not found"
        }))),
    }
}

/// Delete a student together with their attendance history
#[utoipa::path(
    delete,
    path = "/api/members/{id}",
    params(
        ("id" = u64, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Student not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Members"
)]
pub async fn delete_member(
    pool: web::Data<MySqlPool>,
    badges: web::Data<BadgeCache>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let student_id = path.into_inner();

    let deleted = delete_student(pool.get_ref(), student_id).await.map_err(|e| {
        error!(error = %e, student_id, "Failed to delete student");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match deleted {
        Some(rfid_uid) => {
            badges.invalidate(&rfid_uid).await;
            info!(student_id, "Student deleted");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Student not found"
        }))),
    }
}

/// Removes attendance rows and the student atomically. Returns the freed badge UID.
async fn delete_student(pool: &MySqlPool, student_id: u64) -> Result<Option<String>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let rfid_uid = sqlx::query_scalar::<_, String>(
        "SELECT rfid_uid FROM students WHERE id = ? FOR UPDATE",
    )
    .bind(student_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(rfid_uid) = rfid_uid else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM attendance WHERE student_id = ?")
        .bind(student_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(rfid_uid))
}
