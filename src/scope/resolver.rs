use async_trait::async_trait;
use sqlx::PgPool;

use super::{ScopeResolver, ScopeTarget};
use crate::database::manager::DatabaseError;

/// Resolves ownership with one query per target kind
#[derive(Debug, Clone)]
pub struct PgScopeResolver {
    pool: PgPool,
}

impl PgScopeResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn owner_query(target: ScopeTarget) -> (&'static str, i64) {
        match target {
            ScopeTarget::Institution(id) => (
                "SELECT institution_id FROM institutions WHERE institution_id = $1",
                id,
            ),
            ScopeTarget::Student(id) => ("SELECT institution_id FROM students WHERE student_id = $1", id),
            ScopeTarget::Group(id) => ("SELECT institution_id FROM student_groups WHERE group_id = $1", id),
            ScopeTarget::AttendanceRecord(id) => (
                "SELECT s.institution_id FROM attendance_records a \
                 JOIN students s ON s.student_id = a.student_id WHERE a.record_id = $1",
                id,
            ),
            ScopeTarget::Excuse(id) => (
                "SELECT s.institution_id FROM daily_excuses e \
                 JOIN students s ON s.student_id = e.student_id WHERE e.excuse_id = $1",
                id,
            ),
            ScopeTarget::BiometricTemplate(id) => (
                "SELECT s.institution_id FROM biometric_templates b \
                 JOIN students s ON s.student_id = b.student_id WHERE b.template_id = $1",
                id,
            ),
        }
    }
}

#[async_trait]
impl ScopeResolver for PgScopeResolver {
    async fn owning_institution(&self, target: ScopeTarget) -> Result<Option<i64>, DatabaseError> {
        let (sql, id) = Self::owner_query(target);
        let owner = sqlx::query_scalar::<_, i64>(sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(owner)
    }

    async fn district_of(&self, institution_id: i64) -> Result<Option<i64>, DatabaseError> {
        let district = sqlx::query_scalar::<_, i64>("SELECT district_id FROM institutions WHERE institution_id = $1")
            .bind(institution_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(district)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_targets_resolve_through_the_student() {
        for target in [
            ScopeTarget::AttendanceRecord(1),
            ScopeTarget::Excuse(1),
            ScopeTarget::BiometricTemplate(1),
        ] {
            let (sql, _) = PgScopeResolver::owner_query(target);
            assert!(sql.contains("JOIN students s"), "{}", sql);
        }
        let (sql, id) = PgScopeResolver::owner_query(ScopeTarget::Group(42));
        assert_eq!(id, 42);
        assert!(sql.starts_with("SELECT institution_id FROM student_groups"));
    }
}
