//! Shared machinery for paginated list endpoints.
//!
//! Every list query is assembled from a FROM clause, a set of bound
//! [`Conditions`], an allow-listed [`SortSpec`] and a [`PageRequest`]. The
//! count query reuses the exact same FROM clause and conditions, so the
//! reported totals always describe the rows being paged through.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

use crate::config::PaginationConfig;
use crate::database::manager::DatabaseError;
use crate::error::ApiError;
use crate::validate;

/// Raw list query string: paging, sorting, and any resource filters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    #[serde(flatten)]
    pub filters: HashMap<String, String>,
}

impl ListQuery {
    fn raw(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    pub fn id(&self, name: &str) -> Result<Option<i64>, ApiError> {
        self.raw(name)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| ApiError::bad_request(format!("El parámetro {} debe ser un número válido.", name)))
            })
            .transpose()
    }

    pub fn flag(&self, name: &str) -> Result<Option<bool>, ApiError> {
        self.raw(name)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ApiError::bad_request(format!("El parámetro {} debe ser true o false.", name))),
            })
            .transpose()
    }

    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>, ApiError> {
        self.raw(name)
            .map(|v| {
                validate::parse_date(v)
                    .ok_or_else(|| ApiError::bad_request(format!("El parámetro {} debe tener formato YYYY-MM-DD.", name)))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// `default_limit` is the per-resource default; `limit` wins over `pageSize`.
    pub fn from_query(
        query: &ListQuery,
        default_limit: i64,
        config: &PaginationConfig,
    ) -> Result<Self, ApiError> {
        let page = parse_positive(query.page.as_deref(), "page")?.unwrap_or(1);
        let limit = parse_positive(query.limit.as_deref().or(query.page_size.as_deref()), "limit")?
            .unwrap_or(default_limit)
            .min(config.max_limit);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::bad_request("El parámetro page está fuera de rango."));
        }
        Ok(Self { page, limit })
    }

    /// Requests built by `from_query` never saturate.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(raw: Option<&str>, name: &str) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => match v.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(Some(n)),
            _ => Err(ApiError::bad_request(format!("El parámetro {} debe ser un entero positivo.", name))),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub limit: i64,
    pub total_records: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total_records: i64) -> Self {
        let total_pages = if total_records == 0 { 0 } else { (total_records + request.limit - 1) / request.limit };
        Self {
            current_page: request.page,
            limit: request.limit,
            total_records,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A sortable column: the name clients send and the SQL expression it maps to.
pub type SortColumn = (&'static str, &'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub direction: SortDirection,
    /// Unique column appended so pages are stable when the sort key ties.
    pub tiebreak: &'static str,
}

impl SortSpec {
    /// Unknown `sortBy` values fall back to the default column; SQL text
    /// only ever comes from `allowed`.
    pub fn resolve(
        query: &ListQuery,
        allowed: &[SortColumn],
        default: SortColumn,
        default_direction: SortDirection,
        tiebreak: &'static str,
    ) -> Self {
        let column = query
            .sort_by
            .as_deref()
            .and_then(|requested| {
                allowed
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(requested.trim()))
                    .map(|(_, column)| *column)
            })
            .unwrap_or(default.1);

        let direction = match query.sort_order.as_deref().map(str::trim) {
            Some(order) if order.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(order) if order.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => default_direction,
        };

        Self { column, direction, tiebreak }
    }

    pub fn to_sql(&self) -> String {
        if self.column == self.tiebreak {
            format!("ORDER BY {} {}", self.column, self.direction.to_sql())
        } else {
            format!("ORDER BY {} {}, {} ASC", self.column, self.direction.to_sql(), self.tiebreak)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<NaiveDate> for BindValue {
    fn from(v: NaiveDate) -> Self {
        BindValue::Date(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    sql: String,
    value: Option<BindValue>,
    close: &'static str,
}

/// AND-joined WHERE predicates whose values are always bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `sql` is the predicate up to its operator, e.g. `"s.institution_id ="`.
    pub fn bind(&mut self, sql: impl Into<String>, value: impl Into<BindValue>) -> &mut Self {
        self.bind_enclosed(sql, value, "")
    }

    /// Like [`Conditions::bind`], with `close` written after the value, for
    /// predicates such as subqueries that wrap the parameter.
    pub fn bind_enclosed(
        &mut self,
        sql: impl Into<String>,
        value: impl Into<BindValue>,
        close: &'static str,
    ) -> &mut Self {
        self.0.push(Condition { sql: sql.into(), value: Some(value.into()), close });
        self
    }

    pub fn bind_opt<V: Into<BindValue>>(&mut self, sql: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.bind(sql, value);
        }
        self
    }

    /// Substring match; `%` and `_` in the needle are escaped.
    pub fn contains(&mut self, sql_expr: &str, needle: Option<String>) -> &mut Self {
        if let Some(needle) = needle {
            let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            self.bind(format!("{} ILIKE", sql_expr), format!("%{}%", escaped));
        }
        self
    }

    /// Constant predicate with no user input.
    pub fn raw(&mut self, sql: &'static str) -> &mut Self {
        self.0.push(Condition { sql: sql.to_string(), value: None, close: "" });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (index, condition) in self.0.iter().enumerate() {
            qb.push(if index == 0 { " WHERE " } else { " AND " });
            qb.push(&condition.sql);
            match &condition.value {
                None => {}
                Some(value) => {
                    qb.push(" ");
                    match value {
                        BindValue::Int(v) => qb.push_bind(*v),
                        BindValue::Text(v) => qb.push_bind(v.clone()),
                        BindValue::Bool(v) => qb.push_bind(*v),
                        BindValue::Date(v) => qb.push_bind(*v),
                    };
                }
            }
            qb.push(condition.close);
        }
    }
}

/// Runs the page query and its count with the same predicate.
pub async fn fetch_page<T>(
    pool: &PgPool,
    columns: &str,
    from: &str,
    conditions: &Conditions,
    sort: &SortSpec,
    request: PageRequest,
) -> Result<Page<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {}", from));
    conditions.apply(&mut count);
    let (total_records,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} {}", columns, from));
    conditions.apply(&mut select);
    select.push(" ");
    select.push(sort.to_sql());
    select.push(" LIMIT ");
    select.push_bind(request.limit);
    select.push(" OFFSET ");
    select.push_bind(request.offset());
    let items = select.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(request, total_records),
    })
}

/// Single-row lookup under the same kind of predicate a list uses.
pub async fn fetch_optional<T>(
    pool: &PgPool,
    columns: &str,
    from: &str,
    conditions: &Conditions,
) -> Result<Option<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} {}", columns, from));
    conditions.apply(&mut select);
    Ok(select.build_query_as::<T>().fetch_optional(pool).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[SortColumn] = &[
        ("lastName", "s.last_name"),
        ("studentId", "s.student_id"),
    ];

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (k, v) in pairs {
            match *k {
                "page" => q.page = Some(v.to_string()),
                "limit" => q.limit = Some(v.to_string()),
                "pageSize" => q.page_size = Some(v.to_string()),
                "sortBy" => q.sort_by = Some(v.to_string()),
                "sortOrder" => q.sort_order = Some(v.to_string()),
                _ => {
                    q.filters.insert(k.to_string(), v.to_string());
                }
            }
        }
        q
    }

    fn pagination() -> PaginationConfig {
        PaginationConfig { default_limit: 20, max_limit: 100 }
    }

    #[test]
    fn page_defaults_and_offset() {
        let req = PageRequest::from_query(&query(&[]), 20, &pagination()).unwrap();
        assert_eq!(req, PageRequest { page: 1, limit: 20 });
        assert_eq!(req.offset(), 0);

        let req = PageRequest::from_query(&query(&[("page", "3"), ("pageSize", "10")]), 20, &pagination()).unwrap();
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn limit_is_capped_and_must_be_positive() {
        let req = PageRequest::from_query(&query(&[("limit", "5000")]), 20, &pagination()).unwrap();
        assert_eq!(req.limit, 100);

        let err = PageRequest::from_query(&query(&[("page", "0")]), 20, &pagination()).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(PageRequest::from_query(&query(&[("limit", "abc")]), 20, &pagination()).is_err());
    }

    #[test]
    fn huge_page_numbers_are_bad_requests() {
        let err = PageRequest::from_query(&query(&[("page", "9223372036854775807")]), 20, &pagination()).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let req = PageRequest::from_query(&query(&[("page", "9223372036854775807"), ("limit", "1")]), 20, &pagination())
            .unwrap();
        assert_eq!(req.offset(), i64::MAX - 1);
        assert_eq!(PageRequest { page: i64::MAX, limit: 20 }.offset(), i64::MAX);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest { page: 1, limit: 20 };
        assert_eq!(Pagination::new(req, 0).total_pages, 0);
        assert_eq!(Pagination::new(req, 20).total_pages, 1);
        assert_eq!(Pagination::new(req, 21).total_pages, 2);
    }

    #[test]
    fn sort_uses_allow_list_only() {
        let spec = SortSpec::resolve(
            &query(&[("sortBy", "LastName"), ("sortOrder", "desc")]),
            ALLOWED,
            ALLOWED[0],
            SortDirection::Asc,
            "s.student_id",
        );
        assert_eq!(spec.to_sql(), "ORDER BY s.last_name DESC, s.student_id ASC");

        let injected = SortSpec::resolve(
            &query(&[("sortBy", "last_name; DROP TABLE students"), ("sortOrder", "sideways")]),
            ALLOWED,
            ALLOWED[0],
            SortDirection::Asc,
            "s.student_id",
        );
        assert_eq!(injected.column, "s.last_name");
        assert_eq!(injected.direction, SortDirection::Asc);
    }

    #[test]
    fn conditions_bind_every_value() {
        let mut conditions = Conditions::new();
        conditions
            .bind("s.institution_id =", 7_i64)
            .raw("s.status <> 'Graduated'")
            .contains("s.last_name", Some("o'brien%".to_string()))
            .bind_enclosed("s.student_id IN (SELECT student_id FROM student_group_members WHERE group_id =", 3_i64, ")");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM students s");
        conditions.apply(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM students s WHERE s.institution_id = $1 AND s.status <> 'Graduated' \
             AND s.last_name ILIKE $2 AND s.student_id IN (SELECT student_id FROM student_group_members WHERE group_id = $3)"
        );
    }

    #[test]
    fn typed_filters_reject_garbage() {
        let q = query(&[("studentId", "12"), ("isActive", "false"), ("startDate", "2024-13-01")]);
        assert_eq!(q.id("studentId").unwrap(), Some(12));
        assert_eq!(q.flag("isActive").unwrap(), Some(false));
        assert!(q.date("startDate").is_err());
        assert_eq!(q.id("groupId").unwrap(), None);
    }
}
