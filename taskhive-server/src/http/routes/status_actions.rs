//! Status-action reporting endpoints
//!
//! Read-only views over the audit log: filtered listing and per-day
//! summaries. Filters arrive as comma-separated query parameters.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taskhive_core::TaskStatus;

use crate::db::repos::{DailySummary, StatusAction, StatusActionCriteria, StatusActionRepo};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams, ValidationError};

/// Criteria query params; list values are comma-separated
#[derive(Deserialize, Default)]
pub struct CriteriaParams {
    pub project_ids: Option<String>,
    pub challenge_ids: Option<String>,
    pub task_id: Option<i64>,
    pub user_ids: Option<String>,
    /// Destination statuses, e.g. `statuses=fixed,skipped`
    pub statuses: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

impl CriteriaParams {
    fn to_criteria(&self) -> Result<StatusActionCriteria, ApiError> {
        Ok(StatusActionCriteria {
            project_ids: parse_id_csv(self.project_ids.as_deref(), "project_ids")?,
            challenge_ids: parse_id_csv(self.challenge_ids.as_deref(), "challenge_ids")?,
            task_id: self.task_id,
            user_ids: parse_id_csv(self.user_ids.as_deref(), "user_ids")?,
            statuses: parse_status_csv(self.statuses.as_deref())?,
            start: self.start,
            end: self.end,
        })
    }
}

fn parse_id_csv(raw: Option<&str>, field: &'static str) -> Result<Vec<i64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                ApiError::Validation(ValidationError::InvalidValue {
                    field,
                    value: s.to_owned(),
                })
            })
        })
        .collect()
}

fn parse_status_csv(raw: Option<&str>) -> Result<Vec<TaskStatus>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            TaskStatus::parse(s).map_err(|_| {
                ApiError::Validation(ValidationError::InvalidValue {
                    field: "statuses",
                    value: s.to_owned(),
                })
            })
        })
        .collect()
}

/// Status action response
#[derive(Serialize)]
pub struct StatusActionResponse {
    pub id: i64,
    pub created: String,
    pub user_id: i64,
    pub project_id: i64,
    pub challenge_id: i64,
    pub task_id: i64,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
}

impl From<StatusAction> for StatusActionResponse {
    fn from(a: StatusAction) -> Self {
        Self {
            id: a.id,
            created: a.created.to_rfc3339(),
            user_id: a.user_id,
            project_id: a.project_id,
            challenge_id: a.challenge_id,
            task_id: a.task_id,
            old_status: TaskStatus::from_i32(a.old_status).unwrap_or(TaskStatus::Created),
            new_status: TaskStatus::from_i32(a.new_status).unwrap_or(TaskStatus::Created),
        }
    }
}

/// GET /data/status_actions - filtered action log, newest first
async fn list_status_actions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CriteriaParams>,
) -> Result<Json<Paginated<StatusActionResponse>>, ApiError> {
    let criteria = params.to_criteria()?;
    let page = Pagination::from(params.pagination);

    let result = StatusActionRepo::new(&state.pool)
        .list(&criteria, page)
        .await?;
    Ok(Json(result.map(StatusActionResponse::from)))
}

/// GET /data/status_actions/summary - per-day activity summary
async fn summarize_status_actions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CriteriaParams>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    let criteria = params.to_criteria()?;

    let summaries = StatusActionRepo::new(&state.pool)
        .daily_summary(&criteria)
        .await?;
    Ok(Json(summaries))
}

/// Status action routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/data/status_actions", get(list_status_actions))
        .route("/data/status_actions/summary", get(summarize_status_actions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_csv_parses_and_trims() {
        let ids = parse_id_csv(Some("1, 2,3,"), "project_ids").unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn id_csv_rejects_garbage() {
        assert!(parse_id_csv(Some("1,two"), "project_ids").is_err());
    }

    #[test]
    fn status_csv_parses_names() {
        let statuses = parse_status_csv(Some("fixed,too_hard")).unwrap();
        assert_eq!(statuses, vec![TaskStatus::Fixed, TaskStatus::TooHard]);
    }

    #[test]
    fn status_csv_rejects_unknown() {
        assert!(parse_status_csv(Some("fixed,bogus")).is_err());
    }

    #[test]
    fn absent_filters_mean_empty() {
        let criteria = CriteriaParams::default().to_criteria().unwrap();
        assert!(criteria.project_ids.is_empty());
        assert!(criteria.statuses.is_empty());
        assert!(criteria.start.is_none());
    }
}
