pub mod attendance_service;
pub mod auth_service;
pub mod biometric_service;
pub mod district_service;
pub mod excuse_service;
pub mod group_service;
pub mod institution_service;
pub mod role_service;
pub mod student_service;
pub mod user_matrix;
pub mod user_service;

use crate::database::manager::DatabaseError;
use crate::error::ApiError;

/// Group a student's attendance and excuses are attributed to. Students are
/// expected to sit in one group; when they sit in several the lowest id wins.
pub fn primary_group_of(student_id_sql: &str) -> String {
    format!(
        "(SELECT MIN(gm.group_id) FROM student_group_members gm WHERE gm.student_id = {})",
        student_id_sql
    )
}

/// Maps a unique-key violation to a specific 409, anything else through the
/// generic conversion.
pub fn unique_as_conflict(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |err| match DatabaseError::from(err) {
        e if e.is_unique_violation() => ApiError::conflict(message),
        e => e.into(),
    }
}

/// Maps a unique-key violation to a specific 400.
pub fn unique_as_bad_request(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |err| match DatabaseError::from(err) {
        e if e.is_unique_violation() => ApiError::bad_request(message),
        e => e.into(),
    }
}

/// Deletes that hit a foreign key surface as 409.
pub fn referenced_as_conflict(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |err| match DatabaseError::from(err) {
        e if e.is_foreign_key_violation() => ApiError::conflict(message),
        e => e.into(),
    }
}

/// Same, for `DatabaseError` values coming out of shared helpers.
pub fn db_unique_as_conflict(message: &'static str) -> impl Fn(DatabaseError) -> ApiError {
    move |err| {
        if err.is_unique_violation() {
            ApiError::conflict(message)
        } else {
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_group_picks_lowest_id() {
        let sql = primary_group_of("s.student_id");
        assert_eq!(
            sql,
            "(SELECT MIN(gm.group_id) FROM student_group_members gm WHERE gm.student_id = s.student_id)"
        );
    }

    #[test]
    fn non_constraint_errors_pass_through() {
        let err = unique_as_conflict("dup")(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), 503);
        let err = referenced_as_conflict("in use")(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), 500);
    }
}
