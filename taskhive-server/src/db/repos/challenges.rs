//! Challenge repository
//!
//! Challenges (and surveys, kind = 4) live in one table. Search builds
//! its WHERE clause dynamically with numbered binds; plain list uses
//! NULL-tolerant static filters.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};

use taskhive_core::TaskStatus;

use crate::models::{Paginated, Pagination};

use super::DbError;

/// Challenge variant discriminator, stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    Challenge,
    Survey,
}

impl ChallengeKind {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Challenge => 1,
            Self::Survey => 4,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Challenge),
            4 => Some(Self::Survey),
            _ => None,
        }
    }
}

/// Challenge record from database
#[derive(Debug, Clone, FromRow)]
pub struct Challenge {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    pub kind: i32,
    pub question: Option<String>,
    pub enabled: bool,
    pub featured: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_survey(&self) -> bool {
        self.kind == ChallengeKind::Survey.as_i32()
    }
}

/// Fields for a new challenge
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    pub kind: ChallengeKind,
    pub question: Option<String>,
    pub enabled: bool,
    pub featured: bool,
    pub tags: Vec<String>,
}

/// Partial update; None leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateChallenge {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub blurb: Option<String>,
    pub question: Option<String>,
    pub enabled: Option<bool>,
    pub featured: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Search filters; every field optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ChallengeSearch {
    /// Substring match on name, case-insensitive
    pub query: Option<String>,
    /// Tag overlap (any of)
    pub tags: Vec<String>,
    pub project_id: Option<i64>,
    pub enabled: Option<bool>,
    pub kind: Option<ChallengeKind>,
}

/// One row of a challenge status summary
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: i64,
}

/// Bind value produced by the search clause builder.
#[derive(Debug, Clone, PartialEq)]
enum SearchBind {
    Text(String),
    Tags(Vec<String>),
    Id(i64),
    Flag(bool),
    Kind(i32),
}

/// Build the dynamic WHERE fragments for a search, with binds numbered
/// from `$first`. Returned clauses are ANDed by the caller.
fn build_search_clauses(search: &ChallengeSearch, first: usize) -> (Vec<String>, Vec<SearchBind>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    let mut n = first;

    if let Some(q) = &search.query {
        let escaped = q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        clauses.push(format!("name ILIKE ${}", n));
        binds.push(SearchBind::Text(format!("%{}%", escaped)));
        n += 1;
    }
    if !search.tags.is_empty() {
        clauses.push(format!("tags && ${}", n));
        binds.push(SearchBind::Tags(search.tags.clone()));
        n += 1;
    }
    if let Some(project_id) = search.project_id {
        clauses.push(format!("project_id = ${}", n));
        binds.push(SearchBind::Id(project_id));
        n += 1;
    }
    if let Some(enabled) = search.enabled {
        clauses.push(format!("enabled = ${}", n));
        binds.push(SearchBind::Flag(enabled));
        n += 1;
    }
    if let Some(kind) = search.kind {
        clauses.push(format!("kind = ${}", n));
        binds.push(SearchBind::Kind(kind.as_i32()));
    }

    (clauses, binds)
}

const CHALLENGE_COLS: &str = "id, project_id, name, description, instruction, blurb, kind, \
                              question, enabled, featured, tags, created_at, updated_at";

/// Challenge repository
pub struct ChallengeRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ChallengeRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new challenge. The parent project must exist.
    pub async fn create(&self, new: NewChallenge) -> Result<Challenge, DbError> {
        let project_exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
                .bind(new.project_id)
                .fetch_one(self.pool)
                .await?;
        if !project_exists.0 {
            return Err(DbError::not_found("project", new.project_id));
        }

        let challenge = sqlx::query_as(&format!(
            r#"
            INSERT INTO challenges
                (project_id, name, description, instruction, blurb, kind, question,
                 enabled, featured, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CHALLENGE_COLS
        ))
        .bind(new.project_id)
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.instruction.as_deref())
        .bind(new.blurb.as_deref())
        .bind(new.kind.as_i32())
        .bind(new.question.as_deref())
        .bind(new.enabled)
        .bind(new.featured)
        .bind(&new.tags)
        .fetch_one(self.pool)
        .await?;

        Ok(challenge)
    }

    /// Fetch a challenge, or None when missing.
    pub async fn find(&self, id: i64) -> Result<Option<Challenge>, DbError> {
        let challenge = sqlx::query_as(&format!(
            "SELECT {} FROM challenges WHERE id = $1",
            CHALLENGE_COLS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(challenge)
    }

    /// Fetch a challenge, erroring when missing.
    pub async fn get(&self, id: i64) -> Result<Challenge, DbError> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("challenge", id))
    }

    /// List challenges with NULL-tolerant filters, newest first.
    pub async fn list(
        &self,
        project_id: Option<i64>,
        enabled: Option<bool>,
        kind: Option<ChallengeKind>,
        page: Pagination,
    ) -> Result<Paginated<Challenge>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, COUNT(*) OVER() as total
            FROM challenges
            WHERE ($1::bigint IS NULL OR project_id = $1)
              AND ($2::boolean IS NULL OR enabled = $2)
              AND ($3::int IS NULL OR kind = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            CHALLENGE_COLS
        ))
        .bind(project_id)
        .bind(enabled)
        .bind(kind.map(ChallengeKind::as_i32))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows.into_iter().map(challenge_from_row).collect();
        Ok(Paginated::from_rows(items, total, page))
    }

    /// Search challenges by name substring, tag overlap and filters.
    ///
    /// The WHERE clause is assembled with dynamically numbered binds;
    /// only the filter values are bound, never interpolated.
    pub async fn search(
        &self,
        search: &ChallengeSearch,
        page: Pagination,
    ) -> Result<Paginated<Challenge>, DbError> {
        let (clauses, binds) = build_search_clauses(search, 1);

        let mut query = format!(
            "SELECT {}, COUNT(*) OVER() as total FROM challenges",
            CHALLENGE_COLS
        );
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(&format!(
            " ORDER BY featured DESC, created_at DESC LIMIT ${} OFFSET ${}",
            binds.len() + 1,
            binds.len() + 2
        ));

        let mut builder = sqlx::query(&query);
        for bind in binds {
            builder = match bind {
                SearchBind::Text(v) => builder.bind(v),
                SearchBind::Tags(v) => builder.bind(v),
                SearchBind::Id(v) => builder.bind(v),
                SearchBind::Flag(v) => builder.bind(v),
                SearchBind::Kind(v) => builder.bind(v),
            };
        }
        builder = builder.bind(page.limit()).bind(page.offset());

        let rows = builder.fetch_all(self.pool).await?;
        let total = rows.first().map(|r| r.get::<i64, _>("total")).unwrap_or(0);
        let items = rows.into_iter().map(challenge_from_row).collect();
        Ok(Paginated::from_rows(items, total, page))
    }

    /// Apply a partial update; untouched fields keep their value.
    pub async fn update(&self, id: i64, update: UpdateChallenge) -> Result<Challenge, DbError> {
        let challenge = sqlx::query_as(&format!(
            r#"
            UPDATE challenges
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                instruction = COALESCE($4, instruction),
                blurb = COALESCE($5, blurb),
                question = COALESCE($6, question),
                enabled = COALESCE($7, enabled),
                featured = COALESCE($8, featured),
                tags = COALESCE($9, tags),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CHALLENGE_COLS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.instruction)
        .bind(update.blurb)
        .bind(update.question)
        .bind(update.enabled)
        .bind(update.featured)
        .bind(update.tags)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("challenge", id))?;

        Ok(challenge)
    }

    /// Delete a challenge; its tasks cascade.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM challenges WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("challenge", id));
        }
        tracing::info!(challenge_id = id, "Challenge deleted");
        Ok(())
    }

    /// Task counts per status for one challenge.
    ///
    /// Statuses with no tasks are absent; callers fill zeroes if they
    /// need the full table.
    pub async fn summary(&self, id: i64) -> Result<Vec<StatusCount>, DbError> {
        // ensure the challenge exists so a bare id typo 404s
        self.get(id).await?;

        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) as count
            FROM tasks
            WHERE challenge_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let summary = rows
            .into_iter()
            .filter_map(|r| {
                let status = TaskStatus::from_i32(r.get::<i32, _>("status"))?;
                Some(StatusCount {
                    status,
                    count: r.get("count"),
                })
            })
            .collect();
        Ok(summary)
    }
}

fn challenge_from_row(r: sqlx::postgres::PgRow) -> Challenge {
    Challenge {
        id: r.get("id"),
        project_id: r.get("project_id"),
        name: r.get("name"),
        description: r.get("description"),
        instruction: r.get("instruction"),
        blurb: r.get("blurb"),
        kind: r.get("kind"),
        question: r.get("question"),
        enabled: r.get("enabled"),
        featured: r.get("featured"),
        tags: r.get("tags"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        assert_eq!(ChallengeKind::from_i32(1), Some(ChallengeKind::Challenge));
        assert_eq!(ChallengeKind::from_i32(4), Some(ChallengeKind::Survey));
        assert_eq!(ChallengeKind::from_i32(2), None);
    }

    #[test]
    fn empty_search_builds_no_clauses() {
        let (clauses, binds) = build_search_clauses(&ChallengeSearch::default(), 1);
        assert!(clauses.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn search_clauses_number_binds_in_order() {
        let search = ChallengeSearch {
            query: Some("bridge".into()),
            tags: vec!["roads".into()],
            project_id: Some(9),
            enabled: Some(true),
            kind: Some(ChallengeKind::Survey),
        };
        let (clauses, binds) = build_search_clauses(&search, 1);

        assert_eq!(
            clauses,
            vec![
                "name ILIKE $1".to_owned(),
                "tags && $2".to_owned(),
                "project_id = $3".to_owned(),
                "enabled = $4".to_owned(),
                "kind = $5".to_owned(),
            ]
        );
        assert_eq!(binds.len(), 5);
        assert_eq!(binds[0], SearchBind::Text("%bridge%".into()));
        assert_eq!(binds[4], SearchBind::Kind(4));
    }

    #[test]
    fn search_skips_missing_filters() {
        let search = ChallengeSearch {
            enabled: Some(false),
            ..Default::default()
        };
        let (clauses, binds) = build_search_clauses(&search, 1);
        assert_eq!(clauses, vec!["enabled = $1".to_owned()]);
        assert_eq!(binds, vec![SearchBind::Flag(false)]);
    }

    #[test]
    fn search_escapes_like_wildcards() {
        let search = ChallengeSearch {
            query: Some("50%_done".into()),
            ..Default::default()
        };
        let (_, binds) = build_search_clauses(&search, 1);
        assert_eq!(binds[0], SearchBind::Text("%50\\%\\_done%".into()));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn search_matches_name_and_tags() {
        // A challenge named "Broken bridges" tagged roads should match
        // query=bridge and tags=roads but not tags=buildings.
    }
}
