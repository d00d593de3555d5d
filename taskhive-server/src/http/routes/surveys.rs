//! Survey endpoints
//!
//! Surveys are challenges with kind = survey; these routes are the
//! read side scoped to that variant. Creation goes through the
//! challenges endpoint with `"kind": "survey"`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{ChallengeKind, ChallengeRepo, TaskRepo};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams};

use super::challenges::ChallengeResponse;
use super::tasks::AnswerResponse;

/// List filter query params
#[derive(Deserialize, Default)]
pub struct ListSurveysParams {
    pub project_id: Option<i64>,
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// GET /surveys - list surveys
async fn list_surveys(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSurveysParams>,
) -> Result<Json<Paginated<ChallengeResponse>>, ApiError> {
    let page = Pagination::from(params.pagination);
    let result = ChallengeRepo::new(&state.pool)
        .list(
            params.project_id,
            params.enabled,
            Some(ChallengeKind::Survey),
            page,
        )
        .await?;
    Ok(Json(result.map(ChallengeResponse::from)))
}

/// GET /surveys/{id} - get one survey
///
/// A challenge id that exists but is not a survey is a 404 here, not a
/// different representation of the same row.
async fn get_survey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state
        .challenge_cache
        .get_or_load(id, || async { ChallengeRepo::new(&state.pool).find(id).await })
        .await?
        .filter(|c| c.is_survey())
        .ok_or(ApiError::NotFound {
            resource: "survey",
            id: id.to_string(),
        })?;
    Ok(Json(ChallengeResponse::from(challenge)))
}

/// GET /surveys/{id}/answers - collected answers, newest first
async fn list_survey_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<AnswerResponse>>, ApiError> {
    let challenge = ChallengeRepo::new(&state.pool).get(id).await?;
    if !challenge.is_survey() {
        return Err(ApiError::NotFound {
            resource: "survey",
            id: id.to_string(),
        });
    }

    let page = Pagination::from(params);
    let result = TaskRepo::new(&state.pool)
        .answers_for_challenge(id, page)
        .await?;
    Ok(Json(result.map(AnswerResponse::from)))
}

/// Survey routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/surveys", get(list_surveys))
        .route("/surveys/{id}", get(get_survey))
        .route("/surveys/{id}/answers", get(list_survey_answers))
}

#[cfg(test)]
mod tests {
    // Integration tests with test database
    // Run with: DATABASE_URL=... cargo test -p taskhive-server -- --ignored
}
