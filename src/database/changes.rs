use sqlx::{Encode, PgPool, Postgres, QueryBuilder, Type};

use crate::database::manager::DatabaseError;

/// Partial UPDATE: only the columns given a value are written.
pub struct UpdateSet {
    qb: QueryBuilder<'static, Postgres>,
    key_column: &'static str,
    touch_updated_at: bool,
    count: usize,
}

impl UpdateSet {
    pub fn new(table: &'static str, key_column: &'static str) -> Self {
        Self {
            qb: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            key_column,
            touch_updated_at: true,
            count: 0,
        }
    }

    /// For tables without an `updated_at` column.
    pub fn without_timestamp(mut self) -> Self {
        self.touch_updated_at = false;
        self
    }

    pub fn set<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'static + Encode<'static, Postgres> + Send + Type<Postgres>,
    {
        if let Some(value) = value {
            if self.count > 0 {
                self.qb.push(", ");
            }
            self.qb.push(column);
            self.qb.push(" = ");
            self.qb.push_bind(value);
            self.count += 1;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn finish(&mut self, id: i64) {
        if self.touch_updated_at {
            self.qb.push(", updated_at = NOW()");
        }
        self.qb.push(" WHERE ");
        self.qb.push(self.key_column);
        self.qb.push(" = ");
        self.qb.push_bind(id);
    }

    /// Runs the update; `false` when no row has `id`. Callers check
    /// [`UpdateSet::is_empty`] first.
    pub async fn execute(mut self, pool: &PgPool, id: i64) -> Result<bool, DatabaseError> {
        self.finish(id);
        let result = self.qb.build().execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    fn sql(mut self, id: i64) -> String {
        self.finish(id);
        self.qb.sql().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_present_fields_are_written() {
        let mut set = UpdateSet::new("students", "student_id");
        set.set("first_name", Some("Ana".to_string()))
            .set::<String>("last_name", None)
            .set("status", Some("Inactive".to_string()));
        assert!(!set.is_empty());
        assert_eq!(
            set.sql(5),
            "UPDATE students SET first_name = $1, status = $2, updated_at = NOW() WHERE student_id = $3"
        );
    }

    #[test]
    fn empty_set_is_detected() {
        let mut set = UpdateSet::new("roles", "role_id");
        set.set::<bool>("is_active", None);
        assert!(set.is_empty());
    }

    #[test]
    fn timestamp_can_be_skipped() {
        let mut set = UpdateSet::new("attendance_records", "record_id").without_timestamp();
        set.set("notes", Some("tarde".to_string()));
        assert_eq!(set.sql(1), "UPDATE attendance_records SET notes = $1 WHERE record_id = $2");
    }
}
