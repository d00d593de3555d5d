//! Status-action log repository
//!
//! Append-only audit of task status transitions. Writes happen inside
//! the task repository's transactions; reads power the reporting
//! endpoints: filtered listing and per-day summaries.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};

use taskhive_core::TaskStatus;

use crate::models::{Paginated, Pagination};

use super::DbError;

/// Status action record from database
#[derive(Debug, Clone, FromRow)]
pub struct StatusAction {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub user_id: i64,
    pub project_id: i64,
    pub challenge_id: i64,
    pub task_id: i64,
    pub old_status: i32,
    pub new_status: i32,
}

/// Fields for a new status action
#[derive(Debug, Clone)]
pub struct NewStatusAction {
    pub user_id: i64,
    pub project_id: i64,
    pub challenge_id: i64,
    pub task_id: i64,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
}

/// Filters for listing and summarizing status actions.
/// Empty vectors / None mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct StatusActionCriteria {
    pub project_ids: Vec<i64>,
    pub challenge_ids: Vec<i64>,
    pub task_id: Option<i64>,
    pub user_ids: Vec<i64>,
    /// Filter on the status the task moved TO
    pub statuses: Vec<TaskStatus>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Counts per destination status
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub created: i64,
    pub fixed: i64,
    pub false_positive: i64,
    pub skipped: i64,
    pub deleted: i64,
    pub already_fixed: i64,
    pub too_hard: i64,
    pub answered: i64,
}

/// One day of status-action activity
#[derive(Debug, Clone, serde::Serialize)]
pub struct DailySummary {
    pub day: DateTime<Utc>,
    pub total: i64,
    pub counts: StatusCounts,
}

/// Bind value produced by the criteria clause builder.
#[derive(Debug, Clone, PartialEq)]
enum CriteriaBind {
    Ids(Vec<i64>),
    Id(i64),
    Statuses(Vec<i32>),
    Time(DateTime<Utc>),
}

/// Build WHERE fragments for the criteria, binds numbered from `$first`.
fn build_criteria_clauses(
    criteria: &StatusActionCriteria,
    first: usize,
) -> (Vec<String>, Vec<CriteriaBind>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    let mut n = first;

    if !criteria.project_ids.is_empty() {
        clauses.push(format!("project_id = ANY(${})", n));
        binds.push(CriteriaBind::Ids(criteria.project_ids.clone()));
        n += 1;
    }
    if !criteria.challenge_ids.is_empty() {
        clauses.push(format!("challenge_id = ANY(${})", n));
        binds.push(CriteriaBind::Ids(criteria.challenge_ids.clone()));
        n += 1;
    }
    if let Some(task_id) = criteria.task_id {
        clauses.push(format!("task_id = ${}", n));
        binds.push(CriteriaBind::Id(task_id));
        n += 1;
    }
    if !criteria.user_ids.is_empty() {
        clauses.push(format!("user_id = ANY(${})", n));
        binds.push(CriteriaBind::Ids(criteria.user_ids.clone()));
        n += 1;
    }
    if !criteria.statuses.is_empty() {
        clauses.push(format!("new_status = ANY(${})", n));
        binds.push(CriteriaBind::Statuses(
            criteria.statuses.iter().map(|s| s.as_i32()).collect(),
        ));
        n += 1;
    }
    if let Some(start) = criteria.start {
        clauses.push(format!("created >= ${}", n));
        binds.push(CriteriaBind::Time(start));
        n += 1;
    }
    if let Some(end) = criteria.end {
        clauses.push(format!("created <= ${}", n));
        binds.push(CriteriaBind::Time(end));
    }

    (clauses, binds)
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

/// Status action repository
pub struct StatusActionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StatusActionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one action. Takes any executor so callers can write
    /// inside their own transaction.
    pub async fn record<'e, E>(
        executor: E,
        action: &NewStatusAction,
    ) -> Result<StatusAction, DbError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query_as(
            r#"
            INSERT INTO status_actions
                (user_id, project_id, challenge_id, task_id, old_status, new_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created, user_id, project_id, challenge_id, task_id,
                      old_status, new_status
            "#,
        )
        .bind(action.user_id)
        .bind(action.project_id)
        .bind(action.challenge_id)
        .bind(action.task_id)
        .bind(action.old_status.as_i32())
        .bind(action.new_status.as_i32())
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// List actions matching the criteria, newest first.
    pub async fn list(
        &self,
        criteria: &StatusActionCriteria,
        page: Pagination,
    ) -> Result<Paginated<StatusAction>, DbError> {
        let (clauses, binds) = build_criteria_clauses(criteria, 1);

        let query = format!(
            r#"
            SELECT id, created, user_id, project_id, challenge_id, task_id,
                   old_status, new_status, COUNT(*) OVER() as total
            FROM status_actions{}
            ORDER BY created DESC
            LIMIT ${} OFFSET ${}
            "#,
            where_sql(&clauses),
            binds.len() + 1,
            binds.len() + 2
        );

        let mut builder = sqlx::query(&query);
        for bind in binds {
            builder = apply_bind(builder, bind);
        }
        builder = builder.bind(page.limit()).bind(page.offset());

        let rows = builder.fetch_all(self.pool).await?;
        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .into_iter()
            .map(|r| StatusAction {
                id: r.get("id"),
                created: r.get("created"),
                user_id: r.get("user_id"),
                project_id: r.get("project_id"),
                challenge_id: r.get("challenge_id"),
                task_id: r.get("task_id"),
                old_status: r.get("old_status"),
                new_status: r.get("new_status"),
            })
            .collect();
        Ok(Paginated::from_rows(items, total, page))
    }

    /// Summarize matching actions per day, newest day first.
    ///
    /// Each row carries the total plus a count per destination status,
    /// computed with FILTER clauses in a single pass.
    pub async fn daily_summary(
        &self,
        criteria: &StatusActionCriteria,
    ) -> Result<Vec<DailySummary>, DbError> {
        let (clauses, binds) = build_criteria_clauses(criteria, 1);

        let mut filters = String::new();
        for status in TaskStatus::ALL {
            filters.push_str(&format!(
                ", COUNT(*) FILTER (WHERE new_status = {}) as {}_count",
                status.as_i32(),
                status.as_str()
            ));
        }

        let query = format!(
            r#"
            SELECT date_trunc('day', created) as day, COUNT(*) as total{}
            FROM status_actions{}
            GROUP BY day
            ORDER BY day DESC
            "#,
            filters,
            where_sql(&clauses),
        );

        let mut builder = sqlx::query(&query);
        for bind in binds {
            builder = apply_bind(builder, bind);
        }

        let rows = builder.fetch_all(self.pool).await?;
        let summaries = rows
            .into_iter()
            .map(|r| DailySummary {
                day: r.get("day"),
                total: r.get("total"),
                counts: StatusCounts {
                    created: r.get("created_count"),
                    fixed: r.get("fixed_count"),
                    false_positive: r.get("false_positive_count"),
                    skipped: r.get("skipped_count"),
                    deleted: r.get("deleted_count"),
                    already_fixed: r.get("already_fixed_count"),
                    too_hard: r.get("too_hard_count"),
                    answered: r.get("answered_count"),
                },
            })
            .collect();
        Ok(summaries)
    }
}

fn apply_bind<'q>(
    builder: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    bind: CriteriaBind,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match bind {
        CriteriaBind::Ids(v) => builder.bind(v),
        CriteriaBind::Id(v) => builder.bind(v),
        CriteriaBind::Statuses(v) => builder.bind(v),
        CriteriaBind::Time(v) => builder.bind(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_criteria_builds_nothing() {
        let (clauses, binds) = build_criteria_clauses(&StatusActionCriteria::default(), 1);
        assert!(clauses.is_empty());
        assert!(binds.is_empty());
        assert_eq!(where_sql(&clauses), "");
    }

    #[test]
    fn full_criteria_numbers_binds_in_order() {
        let criteria = StatusActionCriteria {
            project_ids: vec![1, 2],
            challenge_ids: vec![3],
            task_id: Some(4),
            user_ids: vec![5],
            statuses: vec![TaskStatus::Fixed, TaskStatus::Skipped],
            start: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        };
        let (clauses, binds) = build_criteria_clauses(&criteria, 1);

        assert_eq!(
            clauses,
            vec![
                "project_id = ANY($1)".to_owned(),
                "challenge_id = ANY($2)".to_owned(),
                "task_id = $3".to_owned(),
                "user_id = ANY($4)".to_owned(),
                "new_status = ANY($5)".to_owned(),
                "created >= $6".to_owned(),
                "created <= $7".to_owned(),
            ]
        );
        assert_eq!(binds.len(), 7);
        assert_eq!(binds[4], CriteriaBind::Statuses(vec![1, 3]));
    }

    #[test]
    fn sparse_criteria_keeps_numbering_dense() {
        let criteria = StatusActionCriteria {
            challenge_ids: vec![10],
            statuses: vec![TaskStatus::Answered],
            ..Default::default()
        };
        let (clauses, _) = build_criteria_clauses(&criteria, 1);
        assert_eq!(
            clauses,
            vec![
                "challenge_id = ANY($1)".to_owned(),
                "new_status = ANY($2)".to_owned(),
            ]
        );
    }

    #[test]
    fn where_sql_joins_with_and() {
        let clauses = vec!["a = $1".to_owned(), "b = $2".to_owned()];
        assert_eq!(where_sql(&clauses), " WHERE a = $1 AND b = $2");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn daily_summary_buckets_by_day() {
        // Two fixed actions and one skip on the same day should produce
        // one summary row with total 3, fixed 2, skipped 1.
    }
}
