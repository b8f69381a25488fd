//! Field-level validation shared by the resource services.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const GENDERS: &[&str] = &["M", "F", "O"];
pub const STUDENT_STATUSES: &[&str] = &["Active", "Inactive", "Graduated"];

/// Regional district codes look like `10-06`.
pub fn is_district_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 5
        && bytes[2] == b'-'
        && bytes.iter().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit())
}

pub fn is_role_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Trimmed, non-empty text or `None`.
pub fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "La contraseña debe tener al menos {} caracteres.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn check_gender(gender: &str) -> Result<(), ApiError> {
    if GENDERS.contains(&gender) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Género inválido. Usar 'M', 'F' u 'O'."))
    }
}

pub fn check_status(status: &str) -> Result<(), ApiError> {
    if STUDENT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Estado inválido. Usar 'Active', 'Inactive' o 'Graduated'."))
    }
}

pub fn date_field(raw: Option<String>, message: &str) -> Result<Option<NaiveDate>, ApiError> {
    match present(raw) {
        None => Ok(None),
        Some(v) => parse_date(&v).map(Some).ok_or_else(|| ApiError::bad_request(message)),
    }
}

/// Parses a path segment as a numeric id.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("El ID {} debe ser un número válido.", what)))
}

/// Ids arrive in JSON bodies either as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    pub fn value(&self, what: &str) -> Result<i64, ApiError> {
        match self {
            IdInput::Number(n) => Ok(*n),
            IdInput::Text(s) => parse_id(s, what),
        }
    }
}

pub fn optional_id(input: Option<&IdInput>, what: &str) -> Result<Option<i64>, ApiError> {
    input.map(|id| id.value(what)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn district_codes() {
        assert!(is_district_code("10-06"));
        assert!(!is_district_code("1-06"));
        assert!(!is_district_code("10_06"));
        assert!(!is_district_code("ab-cd"));
        assert!(!is_district_code("10-066"));
    }

    #[test]
    fn role_names() {
        assert!(is_role_name("Coordinador_2"));
        assert!(!is_role_name("Admin App"));
        assert!(!is_role_name(""));
    }

    #[test]
    fn dates_are_strict() {
        assert_eq!(parse_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("2024-2-1"), None);
        assert_eq!(parse_date("01/02/2024"), None);
    }

    #[test]
    fn enumerations() {
        assert!(check_gender("O").is_ok());
        assert!(check_gender("X").is_err());
        assert!(check_status("Graduated").is_ok());
        assert!(check_status("active").is_err());
        assert!(check_password("12345").is_err());
        assert!(check_password("123456").is_ok());
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let n: IdInput = serde_json::from_str("42").unwrap();
        let s: IdInput = serde_json::from_str("\"42\"").unwrap();
        let bad: IdInput = serde_json::from_str("\"cuarenta\"").unwrap();
        assert_eq!(n.value("del estudiante").unwrap(), 42);
        assert_eq!(s.value("del estudiante").unwrap(), 42);
        assert_eq!(bad.value("del estudiante").unwrap_err().status_code(), 400);
    }
}
