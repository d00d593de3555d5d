//! Task endpoints
//!
//! Status changes and survey answers go through the transactional repo
//! paths so the action log stays consistent with the task table.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use taskhive_core::{Role, TaskStatus};

use crate::db::repos::{ChallengeRepo, NewTask, Task, TaskAnswer, TaskRepo, UpdateTask};
use crate::http::auth::{require_project_role, AuthenticatedUser};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{ChallengeName, Paginated, Pagination, PaginationParams, ValidationError};

/// Longest accepted free-form answer
const MAX_ANSWER_LEN: usize = 4000;

/// Create task request
#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    pub instruction: Option<String>,
    pub geometry: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: i32,
}

/// Update task request
#[derive(Deserialize, Default)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub instruction: Option<String>,
    pub geometry: Option<serde_json::Value>,
    pub priority: Option<i32>,
}

/// Status change request
#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: TaskStatus,
}

/// Survey answer request
#[derive(Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

/// Task response
#[derive(Serialize)]
pub struct TaskResponse {
    pub id: i64,
    pub challenge_id: i64,
    pub name: String,
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    pub status: TaskStatus,
    pub priority: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            challenge_id: t.challenge_id,
            name: t.name,
            instruction: t.instruction,
            geometry: t.geometry,
            status: TaskStatus::from_i32(t.status).unwrap_or(TaskStatus::Created),
            priority: t.priority,
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
        }
    }
}

/// Answer response
#[derive(Serialize)]
pub struct AnswerResponse {
    pub id: i64,
    pub task_id: i64,
    pub user_id: Option<i64>,
    pub answer: String,
    pub created_at: String,
}

impl From<TaskAnswer> for AnswerResponse {
    fn from(a: TaskAnswer) -> Self {
        Self {
            id: a.id,
            task_id: a.task_id,
            user_id: a.user_id,
            answer: a.answer,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// GET /challenges/{id}/tasks - paginated task list
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<TaskResponse>>, ApiError> {
    // 404 before returning an empty page for a bogus id
    ChallengeRepo::new(&state.pool).get(challenge_id).await?;

    let page = Pagination::from(params);
    let result = TaskRepo::new(&state.pool)
        .list_for_challenge(challenge_id, page)
        .await?;
    Ok(Json(result.map(TaskResponse::from)))
}

/// POST /challenges/{id}/tasks - add a task (write role on project)
async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(challenge_id): Path<i64>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let challenge = ChallengeRepo::new(&state.pool).get(challenge_id).await?;
    require_project_role(&state, &user, challenge.project_id, Role::Write).await?;

    let name = ChallengeName::new(&req.name)?;
    let task = TaskRepo::new(&state.pool)
        .create(
            challenge_id,
            NewTask {
                name: name.into_string(),
                instruction: req.instruction,
                geometry: req.geometry,
                priority: req.priority,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// GET /tasks/{id} - get one task
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskRepo::new(&state.pool).get(id).await?;
    Ok(Json(TaskResponse::from(task)))
}

/// PUT /tasks/{id} - update metadata (write role on project)
async fn update_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let repo = TaskRepo::new(&state.pool);
    let existing = repo.get(id).await?;
    let challenge = ChallengeRepo::new(&state.pool)
        .get(existing.challenge_id)
        .await?;
    require_project_role(&state, &user, challenge.project_id, Role::Write).await?;

    let name = match req.name {
        Some(raw) => Some(ChallengeName::new(&raw)?.into_string()),
        None => None,
    };

    let task = repo
        .update(
            id,
            UpdateTask {
                name,
                instruction: req.instruction,
                geometry: req.geometry,
                priority: req.priority,
            },
        )
        .await?;
    Ok(Json(TaskResponse::from(task)))
}

/// DELETE /tasks/{id} - delete (write role on project)
async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let repo = TaskRepo::new(&state.pool);
    let existing = repo.get(id).await?;
    let challenge = ChallengeRepo::new(&state.pool)
        .get(existing.challenge_id)
        .await?;
    require_project_role(&state, &user, challenge.project_id, Role::Write).await?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /tasks/{id}/status - move a task through the workflow
async fn set_task_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = TaskRepo::new(&state.pool)
        .set_status(id, req.status, user.id)
        .await?;
    Ok(Json(TaskResponse::from(task)))
}

/// POST /tasks/{id}/answer - answer a survey task
async fn answer_task(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<AnswerRequest>,
) -> Result<(StatusCode, Json<AnswerResponse>), ApiError> {
    let answer = req.answer.trim();
    if answer.is_empty() {
        return Err(ApiError::Validation(ValidationError::Empty {
            field: "answer",
        }));
    }
    if answer.chars().count() > MAX_ANSWER_LEN {
        return Err(ApiError::Validation(ValidationError::TooLong {
            field: "answer",
            max: MAX_ANSWER_LEN,
        }));
    }

    let row = TaskRepo::new(&state.pool).answer(id, answer, user.id).await?;
    Ok((StatusCode::CREATED, Json(AnswerResponse::from(row))))
}

/// Task routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/challenges/{id}/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/status", put(set_task_status))
        .route("/tasks/{id}/answer", post(answer_task))
}

#[cfg(test)]
mod tests {
    // Integration tests with test database
    // Run with: DATABASE_URL=... cargo test -p taskhive-server -- --ignored
}
