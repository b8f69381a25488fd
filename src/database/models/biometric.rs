use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sqlx::FromRow;

/// Enrolled fingerprint template. The payload is opaque; it is stored as
/// bytes and echoed back as text.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BiometricTemplate {
    pub template_id: i64,
    pub student_id: i64,
    #[serde(serialize_with = "as_text")]
    pub template_data: Vec<u8>,
    pub finger_index: Option<i32>,
    pub enrolled_by: Option<i64>,
    pub is_active: bool,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiometricTemplate {
    pub const COLUMNS: &'static str =
        "template_id, student_id, template_data, finger_index, enrolled_by, is_active, enrolled_at, updated_at";
}

fn as_text<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_as_text() {
        let template = BiometricTemplate {
            template_id: 1,
            student_id: 2,
            template_data: b"Rk1SACAyMAAAAAEs".to_vec(),
            finger_index: Some(1),
            enrolled_by: Some(3),
            is_active: true,
            enrolled_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["templateData"], "Rk1SACAyMAAAAAEs");
        assert_eq!(value["fingerIndex"], 1);
    }
}
