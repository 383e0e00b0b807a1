use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Asha Rahman",
        "roll_number": "12",
        "rfid_uid": "04A1B2C3"
    })
)]
pub struct Student {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Asha Rahman")]
    pub name: String,

    #[schema(example = "12", nullable = true)]
    pub roll_number: Option<String>,

    /// Badge UID as delivered by the reader.
    #[schema(example = "04A1B2C3")]
    pub rfid_uid: String,
}
