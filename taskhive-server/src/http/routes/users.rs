//! User endpoints
//!
//! Account reads and settings are self-or-superuser; the OSM upsert is
//! a service endpoint (superuser key) called after the external OAuth
//! handshake completes. API keys never appear in plain user responses,
//! only from the apikey endpoint itself.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use taskhive_core::Role;

use crate::db::repos::{Group, NewOsmUser, UpdateUser, User, UserRepo};
use crate::http::auth::{
    require_project_role, require_self_or_superuser, require_superuser, AuthenticatedUser,
};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{ChallengeName, ValidationError};

/// OSM profile upsert request
#[derive(Deserialize)]
pub struct UpsertOsmRequest {
    pub osm_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub oauth_token: Option<String>,
    pub oauth_secret: Option<String>,
}

/// Settings update request
#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// User response (no credentials)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub osm_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_superuser: bool,
    pub created_at: String,
    pub modified_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            osm_id: u.osm_id,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            is_superuser: u.is_superuser,
            created_at: u.created_at.to_rfc3339(),
            modified_at: u.modified_at.to_rfc3339(),
        }
    }
}

/// API key response
#[derive(Serialize)]
pub struct ApiKeyResponse {
    pub user_id: i64,
    pub api_key: String,
}

/// Group response
#[derive(Serialize)]
pub struct GroupResponse {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub role: Option<Role>,
}

impl From<Group> for GroupResponse {
    fn from(g: Group) -> Self {
        let role = g.group_role();
        Self {
            id: g.id,
            project_id: g.project_id,
            name: g.name,
            role,
        }
    }
}

/// POST /users/osm - upsert a user from an OSM profile (superuser)
async fn upsert_osm_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(req): Json<UpsertOsmRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    require_superuser(&caller)?;

    let display_name = ChallengeName::new(&req.display_name)?;
    let user = UserRepo::new(&state.pool)
        .upsert_osm(NewOsmUser {
            osm_id: req.osm_id,
            display_name: display_name.into_string(),
            avatar_url: req.avatar_url,
            oauth_token: req.oauth_token,
            oauth_secret: req.oauth_secret,
        })
        .await?;

    state.user_cache.invalidate(user.id).await;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/{id} - get a user (self or superuser, cached)
async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    require_self_or_superuser(&caller, id)?;

    let user = state
        .user_cache
        .get_or_load(id, || async { UserRepo::new(&state.pool).find(id).await })
        .await?
        .ok_or(ApiError::NotFound {
            resource: "user",
            id: id.to_string(),
        })?;
    Ok(Json(UserResponse::from(user)))
}

/// PUT /users/{id} - update settings (self or superuser)
async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_self_or_superuser(&caller, id)?;

    let display_name = match req.display_name {
        Some(raw) => Some(ChallengeName::new(&raw)?.into_string()),
        None => None,
    };

    let user = UserRepo::new(&state.pool)
        .update(
            id,
            UpdateUser {
                display_name,
                avatar_url: req.avatar_url,
            },
        )
        .await?;

    state.user_cache.invalidate(id).await;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /users/{id} - delete an account (superuser)
async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_superuser(&caller)?;

    UserRepo::new(&state.pool).delete(id).await?;
    state.user_cache.invalidate(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/apikey - rotate the API key (self or superuser)
async fn regenerate_api_key(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    require_self_or_superuser(&caller, id)?;

    let user = UserRepo::new(&state.pool).regenerate_api_key(id).await?;
    state.user_cache.invalidate(id).await;

    let api_key = user.api_key.ok_or(ApiError::Internal {
        message: "api key missing after regeneration".to_owned(),
    })?;
    Ok(Json(ApiKeyResponse {
        user_id: id,
        api_key,
    }))
}

/// GET /users/{id}/groups - the user's group memberships
async fn list_user_groups(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    require_self_or_superuser(&caller, id)?;

    let groups = UserRepo::new(&state.pool).groups_for(id).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

/// POST /users/{id}/projects/{pid}/{role} - grant a project role
/// (project admin)
async fn grant_project_role(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path((id, project_id, role)): Path<(i64, i64, String)>,
) -> Result<(StatusCode, Json<GroupResponse>), ApiError> {
    let role = Role::parse(&role).map_err(|_| {
        ApiError::Validation(ValidationError::InvalidValue {
            field: "role",
            value: role.clone(),
        })
    })?;
    require_project_role(&state, &caller, project_id, Role::Admin).await?;

    // target must exist; not_found beats a dangling membership row
    UserRepo::new(&state.pool).get(id).await?;

    let group = UserRepo::new(&state.pool)
        .add_to_project(id, project_id, role)
        .await?;
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

/// DELETE /users/{id}/groups/{group_id} - revoke a membership
/// (project admin)
async fn revoke_group_membership(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path((id, group_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let repo = UserRepo::new(&state.pool);
    let group = repo
        .find_group(group_id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "group",
            id: group_id.to_string(),
        })?;
    require_project_role(&state, &caller, group.project_id, Role::Admin).await?;

    repo.remove_from_group(id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/osm", post(upsert_osm_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/apikey", post(regenerate_api_key))
        .route("/users/{id}/groups", get(list_user_groups))
        .route(
            "/users/{id}/projects/{pid}/{role}",
            post(grant_project_role),
        )
        .route(
            "/users/{id}/groups/{group_id}",
            delete(revoke_group_membership),
        )
}

#[cfg(test)]
mod tests {
    // Integration tests with test database
    // Run with: DATABASE_URL=... cargo test -p taskhive-server -- --ignored
}
