//! Challenge endpoints
//!
//! Reads go through the challenge cache; every write invalidates the
//! touched id before returning.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use taskhive_core::{Role, TaskStatus};

use crate::db::repos::{
    Challenge, ChallengeKind, ChallengeRepo, ChallengeSearch, NewChallenge, StatusCounts,
    TaskRepo, UpdateChallenge,
};
use crate::http::auth::{require_project_role, AuthenticatedUser};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{ChallengeName, Paginated, Pagination, PaginationParams, TagList};

use super::tasks::TaskResponse;

/// Create challenge request
#[derive(Deserialize)]
pub struct CreateChallengeRequest {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: ChallengeKind,
    pub question: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_kind() -> ChallengeKind {
    ChallengeKind::Challenge
}

fn default_enabled() -> bool {
    true
}

/// Update challenge request
#[derive(Deserialize, Default)]
pub struct UpdateChallengeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    pub question: Option<String>,
    pub enabled: Option<bool>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Challenge response
#[derive(Serialize)]
pub struct ChallengeResponse {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    pub kind: ChallengeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub enabled: bool,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Challenge> for ChallengeResponse {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            name: c.name,
            description: c.description,
            instruction: c.instruction,
            blurb: c.blurb,
            kind: ChallengeKind::from_i32(c.kind).unwrap_or(ChallengeKind::Challenge),
            question: c.question,
            enabled: c.enabled,
            featured: c.featured,
            tags: c.tags,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

/// List filter query params
#[derive(Deserialize, Default)]
pub struct ListChallengesParams {
    pub project_id: Option<i64>,
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Search query params
#[derive(Deserialize, Default)]
pub struct SearchChallengesParams {
    /// Substring match on name
    pub q: Option<String>,
    /// Comma-separated tag list
    pub tags: Option<String>,
    pub project_id: Option<i64>,
    pub enabled: Option<bool>,
    pub kind: Option<ChallengeKind>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Summary response: task counts per status for one challenge
#[derive(Serialize)]
pub struct SummaryResponse {
    pub challenge_id: i64,
    pub total: i64,
    pub counts: StatusCounts,
}

/// Random task query params
#[derive(Deserialize)]
pub struct RandomParams {
    pub limit: Option<i64>,
}

/// GET /challenges - list with optional filters
async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListChallengesParams>,
) -> Result<Json<Paginated<ChallengeResponse>>, ApiError> {
    let page = Pagination::from(params.pagination);
    let result = ChallengeRepo::new(&state.pool)
        .list(params.project_id, params.enabled, None, page)
        .await?;
    Ok(Json(result.map(ChallengeResponse::from)))
}

/// POST /challenges - create a challenge (write role on project)
async fn create_challenge(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    require_project_role(&state, &user, req.project_id, Role::Write).await?;

    let name = ChallengeName::new(&req.name)?;
    let tags = TagList::new(&req.tags)?;
    if req.kind == ChallengeKind::Survey && req.question.as_deref().unwrap_or("").trim().is_empty()
    {
        return Err(ApiError::Validation(
            crate::models::ValidationError::Empty { field: "question" },
        ));
    }

    let challenge = ChallengeRepo::new(&state.pool)
        .create(NewChallenge {
            project_id: req.project_id,
            name: name.into_string(),
            description: req.description,
            instruction: req.instruction,
            blurb: req.blurb,
            kind: req.kind,
            question: req.question,
            enabled: req.enabled,
            featured: req.featured,
            tags: tags.into_vec(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ChallengeResponse::from(challenge))))
}

/// GET /challenges/search - search by name, tags and filters
async fn search_challenges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchChallengesParams>,
) -> Result<Json<Paginated<ChallengeResponse>>, ApiError> {
    let tags = match params.tags.as_deref() {
        Some(csv) => TagList::parse_csv(csv)?,
        None => TagList::default(),
    };
    let search = ChallengeSearch {
        query: params.q,
        tags: tags.into_vec(),
        project_id: params.project_id,
        enabled: params.enabled,
        kind: params.kind,
    };
    let page = Pagination::from(params.pagination);

    let result = ChallengeRepo::new(&state.pool).search(&search, page).await?;
    Ok(Json(result.map(ChallengeResponse::from)))
}

/// GET /challenges/{id} - get one challenge (cached)
async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state
        .challenge_cache
        .get_or_load(id, || async { ChallengeRepo::new(&state.pool).find(id).await })
        .await?
        .ok_or(ApiError::NotFound {
            resource: "challenge",
            id: id.to_string(),
        })?;
    Ok(Json(ChallengeResponse::from(challenge)))
}

/// PUT /challenges/{id} - update (write role on project)
async fn update_challenge(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let repo = ChallengeRepo::new(&state.pool);
    let existing = repo.get(id).await?;
    require_project_role(&state, &user, existing.project_id, Role::Write).await?;

    let name = match req.name {
        Some(raw) => Some(ChallengeName::new(&raw)?.into_string()),
        None => None,
    };
    let tags = match req.tags {
        Some(raw) => Some(TagList::new(&raw)?.into_vec()),
        None => None,
    };

    let challenge = repo
        .update(
            id,
            UpdateChallenge {
                name,
                description: req.description,
                instruction: req.instruction,
                blurb: req.blurb,
                question: req.question,
                enabled: req.enabled,
                featured: req.featured,
                tags,
            },
        )
        .await?;

    state.challenge_cache.invalidate(id).await;
    Ok(Json(ChallengeResponse::from(challenge)))
}

/// DELETE /challenges/{id} - delete (admin role on project)
async fn delete_challenge(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let repo = ChallengeRepo::new(&state.pool);
    let existing = repo.get(id).await?;
    require_project_role(&state, &user, existing.project_id, Role::Admin).await?;

    repo.delete(id).await?;
    state.challenge_cache.invalidate(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /challenges/{id}/tasks/random - random open tasks
async fn random_challenge_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<RandomParams>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    ChallengeRepo::new(&state.pool).get(id).await?;

    let tasks = TaskRepo::new(&state.pool)
        .random_for_challenge(id, params.limit.unwrap_or(1))
        .await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// GET /challenges/{id}/summary - task counts per status
async fn challenge_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let rows = ChallengeRepo::new(&state.pool).summary(id).await?;

    let mut counts = StatusCounts::default();
    let mut total = 0;
    for row in rows {
        total += row.count;
        match row.status {
            TaskStatus::Created => counts.created = row.count,
            TaskStatus::Fixed => counts.fixed = row.count,
            TaskStatus::FalsePositive => counts.false_positive = row.count,
            TaskStatus::Skipped => counts.skipped = row.count,
            TaskStatus::Deleted => counts.deleted = row.count,
            TaskStatus::AlreadyFixed => counts.already_fixed = row.count,
            TaskStatus::TooHard => counts.too_hard = row.count,
            TaskStatus::Answered => counts.answered = row.count,
        }
    }

    Ok(Json(SummaryResponse {
        challenge_id: id,
        total,
        counts,
    }))
}

/// Challenge routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/challenges", get(list_challenges).post(create_challenge))
        .route("/challenges/search", get(search_challenges))
        .route(
            "/challenges/{id}",
            get(get_challenge)
                .put(update_challenge)
                .delete(delete_challenge),
        )
        .route("/challenges/{id}/tasks/random", get(random_challenge_tasks))
        .route("/challenges/{id}/summary", get(challenge_summary))
}

#[cfg(test)]
mod tests {
    // Integration tests with test database
    // Run with: DATABASE_URL=... cargo test -p taskhive-server -- --ignored
}
