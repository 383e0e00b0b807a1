use sqlx::MySqlPool;

pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPool::connect(database_url)
        .await
        .expect("Failed to connect to database")
}

const CREATE_STUDENTS: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    roll_number VARCHAR(64) NULL,
    rfid_uid VARCHAR(128) NOT NULL,
    UNIQUE KEY uq_students_rfid_uid (rfid_uid)
)
"#;

// uq_attendance_entry rejects two taps claiming the same entry number
const CREATE_ATTENDANCE: &str = r#"
CREATE TABLE IF NOT EXISTS attendance (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    student_id BIGINT UNSIGNED NOT NULL,
    date DATE NOT NULL,
    entry_number INT UNSIGNED NOT NULL DEFAULT 1,
    in_time TIME NOT NULL,
    out_time TIME NULL,
    UNIQUE KEY uq_attendance_entry (student_id, date, entry_number),
    KEY idx_attendance_date (date),
    CONSTRAINT fk_attendance_student FOREIGN KEY (student_id)
        REFERENCES students (id) ON DELETE CASCADE
)
"#;

pub async fn init_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_STUDENTS).execute(pool).await?;
    sqlx::query(CREATE_ATTENDANCE).execute(pool).await?;
    Ok(())
}
