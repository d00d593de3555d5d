//! Project endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use taskhive_core::Role;

use crate::db::repos::{NewProject, Project, ProjectRepo};
use crate::http::auth::{require_project_role, require_superuser, AuthenticatedUser};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{ChallengeName, Paginated, Pagination, PaginationParams};

/// Create project request
#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Update project request
#[derive(Deserialize, Default)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

/// Project response
#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            enabled: p.enabled,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

/// GET /projects - list projects with pagination
async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<ProjectResponse>>, ApiError> {
    let page = Pagination::from(params);
    let result = ProjectRepo::new(&state.pool).list(page).await?;
    Ok(Json(result.map(ProjectResponse::from)))
}

/// POST /projects - create a project (superuser)
async fn create_project(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    require_superuser(&user)?;
    let name = ChallengeName::new(&req.name)?;

    let project = ProjectRepo::new(&state.pool)
        .create(NewProject {
            name: name.into_string(),
            description: req.description,
            enabled: req.enabled,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// GET /projects/{id} - get a single project
async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project = ProjectRepo::new(&state.pool).get(id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

/// PUT /projects/{id} - update a project (project admin)
async fn update_project(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    require_project_role(&state, &user, id, Role::Admin).await?;

    let name = match req.name {
        Some(raw) => Some(ChallengeName::new(&raw)?.into_string()),
        None => None,
    };

    let project = ProjectRepo::new(&state.pool)
        .update(id, name, req.description, req.enabled)
        .await?;
    Ok(Json(ProjectResponse::from(project)))
}

/// DELETE /projects/{id} - delete a project (superuser)
async fn delete_project(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_superuser(&user)?;
    ProjectRepo::new(&state.pool).delete(id).await?;
    // challenges cascaded away; drop any cached ones wholesale
    state.challenge_cache.clear().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Project routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

#[cfg(test)]
mod tests {
    // Integration tests with test database
    // Run with: DATABASE_URL=... cargo test -p taskhive-server -- --ignored
}
