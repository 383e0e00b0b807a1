use crate::api::attendance::{DashboardQuery, DashboardResponse, DashboardRow, DayRecord};
use crate::api::member::{CreateMember, UpdateMember};
use crate::api::tap::{TapRequest, TapResponse};
use crate::model::attendance::AttendanceRecord;
use crate::model::student::Student;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RFID Attendance Tap Terminal API",
        version = "1.0.0",
        description = r#"
## RFID Attendance Tap Terminal

Students tap an RFID badge at a station. Each tap toggles between an **IN** and an
**OUT** time for the current day.

### Tapping
- The first tap of the day opens entry #1.
- The next tap closes it; a later tap opens entry #2, and so on.
- An entry left open on a previous day is ignored; no auto-close, no carry-over.

### Reading
- Dashboard feed, per-date history and the list of dates with records
- CSV export: `Date, Name, Roll No, Entry #, In Time, Out Time`

### Members
- Enroll a badge, edit name and roll number, remove a student with their history
"#,
    ),
    paths(
        crate::api::tap::tap,

        crate::api::attendance::dashboard,
        crate::api::attendance::attendance_dates,
        crate::api::attendance::attendance_by_date,
        crate::api::export::export_csv,

        crate::api::member::create_member,
        crate::api::member::list_members,
        crate::api::member::get_member,
        crate::api::member::update_member,
        crate::api::member::delete_member
    ),
    components(
        schemas(
            TapRequest,
            TapResponse,
            DashboardQuery,
            DashboardRow,
            DashboardResponse,
            DayRecord,
            AttendanceRecord,
            CreateMember,
            UpdateMember,
            Student
        )
    ),
    tags(
        (name = "Tap", description = "Badge tap recording"),
        (name = "Attendance", description = "Read-only attendance views and export"),
        (name = "Members", description = "Student enrollment"),
    )
)]
pub struct ApiDoc;
