//! Project repository
//!
//! Projects are the permission boundary: creating one seeds its three
//! role groups (admin/write/read) in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};

use taskhive_core::Role;

use crate::models::{Paginated, Pagination};

use super::DbError;

/// Project record from database
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
}

/// Project repository
pub struct ProjectRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProjectRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a project and seed its role groups atomically.
    pub async fn create(&self, new: NewProject) -> Result<Project, DbError> {
        let mut tx = self.pool.begin().await?;

        let project: Project = sqlx::query_as(
            r#"
            INSERT INTO projects (name, description, enabled)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, enabled, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.enabled)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from_sqlx(e, "project name already taken"))?;

        for role in [Role::Admin, Role::Write, Role::Read] {
            sqlx::query(
                r#"
                INSERT INTO groups (project_id, name, role)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(project.id)
            .bind(format!("{}_{}", project.name, role.as_str()))
            .bind(role.as_i32())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(project_id = project.id, name = %project.name, "Project created");
        Ok(project)
    }

    /// Fetch a project, or None when missing.
    pub async fn find(&self, id: i64) -> Result<Option<Project>, DbError> {
        let project = sqlx::query_as(
            "SELECT id, name, description, enabled, created_at, updated_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(project)
    }

    /// Fetch a project, erroring when missing.
    pub async fn get(&self, id: i64) -> Result<Project, DbError> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("project", id))
    }

    /// List projects, newest first.
    pub async fn list(&self, page: Pagination) -> Result<Paginated<Project>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, enabled, created_at, updated_at,
                   COUNT(*) OVER() as total
            FROM projects
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows
            .into_iter()
            .map(|r| Project {
                id: r.get("id"),
                name: r.get("name"),
                description: r.get("description"),
                enabled: r.get("enabled"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect();
        Ok(Paginated::from_rows(items, total, page))
    }

    /// Update name/description/enabled; untouched fields keep their value.
    pub async fn update(
        &self,
        id: i64,
        name: Option<String>,
        description: Option<String>,
        enabled: Option<bool>,
    ) -> Result<Project, DbError> {
        let project = sqlx::query_as(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                enabled = COALESCE($4, enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(enabled)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from_sqlx(e, "project name already taken"))?
        .ok_or_else(|| DbError::not_found("project", id))?;

        Ok(project)
    }

    /// Delete a project; challenges, tasks and groups cascade.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("project", id));
        }
        tracing::info!(project_id = id, "Project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Integration tests - run with DATABASE_URL set
    // cargo test -p taskhive-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_seeds_role_groups() {
        // Creating a project should leave exactly three groups behind,
        // one per role.
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_name_is_conflict() {
        // Second insert with the same name must surface DbError::Conflict.
    }
}
