use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::models::{
    CandidateRecord, CompatibilityScore, ContactRestrictions, MatchPreferences, ProfileAttributes,
    UserProfile,
};
use crate::services::cache::{CacheError, DurableScoreTier};
use crate::services::repository::{ProfileRepository, RepositoryError};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl PostgresError {
    /// The row was fetched but its contents could not be turned into a model
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            PostgresError::InvalidData(_)
                | PostgresError::SqlxError(
                    sqlx::Error::ColumnDecode { .. }
                        | sqlx::Error::Decode(_)
                        | sqlx::Error::ColumnNotFound(_)
                        | sqlx::Error::TypeNotFound { .. }
                )
        )
    }
}

impl From<PostgresError> for RepositoryError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::SqlxError(sqlx::Error::RowNotFound) => {
                RepositoryError::NotFound("row not found".to_string())
            }
            other if other.is_decode_error() => RepositoryError::InvalidData(other.to_string()),
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

impl From<PostgresError> for CacheError {
    fn from(err: PostgresError) -> Self {
        CacheError::BackendError(err.to_string())
    }
}

const PROFILE_COLUMNS: &str = r#"
    p.user_id, p.display_name, p.gender, p.country, p.latitude, p.longitude,
    p.is_banned, p.photo_count, p.last_active_at, p.created_at,
    CAST(date_part('year', age(NOW(), p.birthdate)) AS INTEGER) AS age,
    p.attributes, p.preferences, p.contact_restrictions, p.interest_ids, p.hobby_ids
"#;

/// PostgreSQL-backed profile repository and durable score tier
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    pub async fn ping(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn ids(raw: Vec<i32>) -> BTreeSet<u32> {
    raw.into_iter().filter_map(|id| u32::try_from(id).ok()).collect()
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile, PostgresError> {
    let age: Option<i32> = row.try_get("age")?;
    let photo_count: i32 = row.try_get("photo_count")?;
    let attributes: Json<ProfileAttributes> = row.try_get("attributes")?;
    let preferences: Json<MatchPreferences> = row.try_get("preferences")?;
    let contact_restrictions: Json<ContactRestrictions> = row.try_get("contact_restrictions")?;

    Ok(UserProfile {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        age: age.and_then(|a| u8::try_from(a).ok()),
        gender: row.try_get("gender")?,
        country: row.try_get("country")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        is_banned: row.try_get("is_banned")?,
        photo_count: u32::try_from(photo_count).unwrap_or(0),
        last_active_at: row.try_get("last_active_at")?,
        created_at: row.try_get("created_at")?,
        attributes: attributes.0,
        preferences: preferences.0,
        contact_restrictions: contact_restrictions.0,
        interest_ids: ids(row.try_get("interest_ids")?),
        hobby_ids: ids(row.try_get("hobby_ids")?),
    })
}

fn score_from_i16(raw: i16) -> Result<u8, PostgresError> {
    u8::try_from(raw).map_err(|_| PostgresError::InvalidData(format!("score {} out of range", raw)))
}

fn candidate_from_row(row: &PgRow) -> Result<CandidateRecord, PostgresError> {
    let cached_score: Option<i16> = row.try_get("cached_score")?;
    Ok(CandidateRecord {
        profile: profile_from_row(row)?,
        blocked: false,
        in_contact: row.try_get("in_contact")?,
        matched: row.try_get("matched")?,
        matched_at: row.try_get("matched_at")?,
        liked_requester_at: row.try_get("liked_requester_at")?,
        requester_liked_at: row.try_get("requester_liked_at")?,
        cached_score: cached_score.map(score_from_i16).transpose()?,
    })
}

/// Keep the rows that decoded, logging each one that did not
fn keep_decoded<T>(
    requester_id: &str,
    decoded: impl IntoIterator<Item = (String, Result<T, PostgresError>)>,
) -> Vec<T> {
    decoded
        .into_iter()
        .filter_map(|(user_id, result)| match result {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping pool row {} for {}: {}", user_id, requester_id, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl ProfileRepository for PostgresClient {
    async fn get_profile(&self, user_id: &str) -> Result<UserProfile, RepositoryError> {
        let query = format!("SELECT {} FROM profiles p WHERE p.user_id = $1", PROFILE_COLUMNS);

        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("Profile not found for user {}", user_id)))?;

        Ok(profile_from_row(&row)?)
    }

    /// Self, banned, nameless and blocked users are dropped in SQL; the
    /// remaining rules run in `EligibilityFilter`
    async fn query_candidate_pool(
        &self,
        requester: &UserProfile,
    ) -> Result<Vec<CandidateRecord>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {columns},
                EXISTS (
                    SELECT 1 FROM messages m
                    WHERE m.deleted_at IS NULL
                      AND m.kind <> 'like'
                      AND ((m.sender_id = $1 AND m.receiver_id = p.user_id)
                        OR (m.sender_id = p.user_id AND m.receiver_id = $1))
                ) AS in_contact,
                COALESCE(mt.is_active, FALSE) AS matched,
                mt.matched_at,
                lc.created_at AS liked_requester_at,
                lr.created_at AS requester_liked_at,
                cs.score AS cached_score
            FROM profiles p
            LEFT JOIN matches mt
                ON mt.user_low = LEAST($1, p.user_id) AND mt.user_high = GREATEST($1, p.user_id)
            LEFT JOIN likes lc ON lc.liker_id = p.user_id AND lc.liked_id = $1
            LEFT JOIN likes lr ON lr.liker_id = $1 AND lr.liked_id = p.user_id
            LEFT JOIN compatibility_scores cs ON cs.requester_id = $1 AND cs.target_id = p.user_id
            WHERE p.user_id <> $1
              AND NOT p.is_banned
              AND COALESCE(TRIM(p.display_name), '') <> ''
              AND NOT EXISTS (
                  SELECT 1 FROM blocks b
                  WHERE (b.blocker_id = $1 AND b.blocked_id = p.user_id)
                     OR (b.blocker_id = p.user_id AND b.blocked_id = $1)
              )
            "#,
            columns = PROFILE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(&requester.user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        let records = keep_decoded(
            &requester.user_id,
            rows.iter().map(|row| {
                let user_id = row
                    .try_get::<String, _>("user_id")
                    .unwrap_or_else(|_| "<unknown>".to_string());
                (user_id, candidate_from_row(row))
            }),
        );

        tracing::debug!("Loaded {} pool rows for {}", records.len(), requester.user_id);

        Ok(records)
    }

    async fn remove_match(&self, user_id: &str, other_id: &str) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(PostgresError::from)?;

        let matches = sqlx::query(
            "DELETE FROM matches WHERE user_low = LEAST($1, $2) AND user_high = GREATEST($1, $2)",
        )
        .bind(user_id)
        .bind(other_id)
        .execute(&mut *tx)
        .await
        .map_err(PostgresError::from)?;

        let likes = sqlx::query(
            r#"
            DELETE FROM likes
            WHERE (liker_id = $1 AND liked_id = $2)
               OR (liker_id = $2 AND liked_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .execute(&mut *tx)
        .await
        .map_err(PostgresError::from)?;

        tx.commit().await.map_err(PostgresError::from)?;

        tracing::info!(
            "Unmatched {} and {} ({} match rows, {} like rows)",
            user_id,
            other_id,
            matches.rows_affected(),
            likes.rows_affected()
        );

        Ok(matches.rows_affected() + likes.rows_affected() > 0)
    }

    async fn save_min_score(&self, user_id: &str, min_score: u8) -> Result<(), RepositoryError> {
        let query = r#"
            INSERT INTO match_settings (user_id, min_score, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                min_score = EXCLUDED.min_score,
                updated_at = EXCLUDED.updated_at
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(i16::from(min_score))
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(())
    }

    async fn get_min_score(&self, user_id: &str) -> Result<Option<u8>, RepositoryError> {
        let row = sqlx::query("SELECT min_score FROM match_settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: i16 = row.try_get("min_score").map_err(PostgresError::from)?;
        Ok(Some(score_from_i16(raw)?))
    }

    async fn health_check(&self) -> bool {
        self.ping().await.unwrap_or(false)
    }
}

#[async_trait]
impl DurableScoreTier for PostgresClient {
    async fn load_score(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Option<CompatibilityScore>, CacheError> {
        let row = sqlx::query(
            r#"
            SELECT score, computed_at
            FROM compatibility_scores
            WHERE requester_id = $1 AND target_id = $2
            "#,
        )
        .bind(requester_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: i16 = row.try_get("score").map_err(PostgresError::from)?;

        Ok(Some(CompatibilityScore {
            requester_id: requester_id.to_string(),
            target_id: target_id.to_string(),
            score: score_from_i16(raw)?,
            computed_at: row.try_get("computed_at").map_err(PostgresError::from)?,
        }))
    }

    async fn upsert_score(&self, score: &CompatibilityScore) -> Result<(), CacheError> {
        let query = r#"
            INSERT INTO compatibility_scores (requester_id, target_id, score, computed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (requester_id, target_id)
            DO UPDATE SET
                score = EXCLUDED.score,
                computed_at = EXCLUDED.computed_at
        "#;

        sqlx::query(query)
            .bind(&score.requester_id)
            .bind(&score.target_id)
            .bind(i16::from(score.score))
            .bind(score.computed_at)
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        tracing::trace!("Stored score {} -> {} = {}", score.requester_id, score.target_id, score.score);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_ids_are_dropped() {
        let parsed = ids(vec![3, -1, 7, 3]);
        assert_eq!(parsed.into_iter().collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn test_score_range_check() {
        assert_eq!(score_from_i16(87).unwrap(), 87);
        assert!(score_from_i16(-4).is_err());
        assert!(score_from_i16(300).is_err());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = RepositoryError::from(PostgresError::SqlxError(sqlx::Error::RowNotFound));
        assert!(matches!(err, RepositoryError::NotFound(_)));

        let err = RepositoryError::from(PostgresError::SqlxError(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, RepositoryError::Unavailable(_)));
    }

    #[test]
    fn test_decode_errors_are_invalid_data() {
        let err = RepositoryError::from(PostgresError::InvalidData("bad".to_string()));
        assert!(matches!(err, RepositoryError::InvalidData(_)));

        let err = RepositoryError::from(PostgresError::SqlxError(sqlx::Error::ColumnDecode {
            index: "\"attributes\"".to_string(),
            source: "invalid type: string \"2\", expected u32".into(),
        }));
        assert!(matches!(err, RepositoryError::InvalidData(_)));

        let err = RepositoryError::from(PostgresError::SqlxError(sqlx::Error::ColumnNotFound(
            "age".to_string(),
        )));
        assert!(matches!(err, RepositoryError::InvalidData(_)));
    }

    #[test]
    fn test_undecodable_rows_are_skipped() {
        let decoded = vec![
            ("a".to_string(), Ok(1)),
            ("b".to_string(), Err(PostgresError::InvalidData("score 300 out of range".to_string()))),
            ("c".to_string(), Ok(3)),
        ];
        assert_eq!(keep_decoded("me", decoded), vec![1, 3]);
    }
}
