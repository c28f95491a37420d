//! services/api/src/adapters/db.rs
//!
//! This module contains the cloud store adapter, which is the concrete
//! implementation of the `CloudStore` port. Records live in per-user tables,
//! one row per record id, in PostgreSQL via `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devotion_core::domain::{CheckInRecord, DevotionRecord, ScripturePassage, User, UserCredentials};
use devotion_core::ports::{CloudStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A PostgreSQL adapter that implements the `CloudStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// JSON shape of one passage inside the `scripture` column.
#[derive(Serialize, Deserialize)]
struct PassageDoc {
    reference: String,
    text: String,
}

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRow {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct UserCredentialsRow {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl UserCredentialsRow {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct DevotionRow {
    id: Uuid,
    date: DateTime<Utc>,
    scripture: Json<Vec<PassageDoc>>,
    observation: String,
    application: String,
    prayer_text: String,
}
impl DevotionRow {
    fn to_domain(self) -> DevotionRecord {
        DevotionRecord {
            id: self.id,
            date: self.date,
            scripture: self
                .scripture
                .0
                .into_iter()
                .map(|p| ScripturePassage {
                    reference: p.reference,
                    text: p.text,
                })
                .collect(),
            observation: self.observation,
            application: self.application,
            prayer_text: self.prayer_text,
        }
    }
}

#[derive(FromRow)]
struct CheckInRow {
    id: Uuid,
    date: DateTime<Utc>,
    mood: Option<String>,
    note: Option<String>,
}
impl CheckInRow {
    fn to_domain(self) -> CheckInRecord {
        CheckInRecord {
            id: self.id,
            date: self.date,
            mood: self.mood,
            note: self.note,
        }
    }
}

//=========================================================================================
// `CloudStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CloudStore for PgStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) \
             RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(row.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let row = sqlx::query_as::<_, UserCredentialsRow>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("No user with email {email}"))
            }
            _ => unexpected(e),
        })?;

        Ok(row.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn load_devotion_records(&self, user_id: Uuid) -> PortResult<Vec<DevotionRecord>> {
        let rows = sqlx::query_as::<_, DevotionRow>(
            "SELECT id, date, scripture, observation, application, prayer_text \
             FROM devotion_records WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows.into_iter().map(DevotionRow::to_domain).collect())
    }

    async fn replace_devotion_records(
        &self,
        user_id: Uuid,
        records: &[DevotionRecord],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        for record in records {
            let passages: Vec<PassageDoc> = record
                .scripture
                .iter()
                .map(|p| PassageDoc {
                    reference: p.reference.clone(),
                    text: p.text.clone(),
                })
                .collect();
            sqlx::query(
                "INSERT INTO devotion_records \
                     (id, user_id, date, scripture, observation, application, prayer_text) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET \
                     date = EXCLUDED.date, scripture = EXCLUDED.scripture, \
                     observation = EXCLUDED.observation, application = EXCLUDED.application, \
                     prayer_text = EXCLUDED.prayer_text",
            )
            .bind(record.id)
            .bind(user_id)
            .bind(record.date)
            .bind(Json(passages))
            .bind(&record.observation)
            .bind(&record.application)
            .bind(&record.prayer_text)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        // Prune documents whose ids are no longer in the list.
        let keep: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        sqlx::query("DELETE FROM devotion_records WHERE user_id = $1 AND id <> ALL($2)")
            .bind(user_id)
            .bind(&keep)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }

    async fn load_check_ins(&self, user_id: Uuid) -> PortResult<Vec<CheckInRecord>> {
        let rows = sqlx::query_as::<_, CheckInRow>(
            "SELECT id, date, mood, note FROM check_in_records \
             WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows.into_iter().map(CheckInRow::to_domain).collect())
    }

    async fn replace_check_ins(
        &self,
        user_id: Uuid,
        check_ins: &[CheckInRecord],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        for check_in in check_ins {
            sqlx::query(
                "INSERT INTO check_in_records (id, user_id, date, mood, note) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO UPDATE SET \
                     date = EXCLUDED.date, mood = EXCLUDED.mood, note = EXCLUDED.note",
            )
            .bind(check_in.id)
            .bind(user_id)
            .bind(check_in.date)
            .bind(&check_in.mood)
            .bind(&check_in.note)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        let keep: Vec<Uuid> = check_ins.iter().map(|c| c.id).collect();
        sqlx::query("DELETE FROM check_in_records WHERE user_id = $1 AND id <> ALL($2)")
            .bind(user_id)
            .bind(&keep)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }
}
