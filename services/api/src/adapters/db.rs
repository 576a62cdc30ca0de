//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `ExtractionStore`, `ProgressStore` and `UserStore`
//! ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Slot routing is never duplicated here: the adapter fetches the owned
//! record, applies the core state transition, and writes the record's
//! mutable fields back in one statement. The fetch-then-update shape means
//! concurrent writers to the same extraction are last-writer-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use extractor_core::domain::{
    Extraction, NewExtraction, StepAdvance, User, UserCredentials, UserProgress,
};
use extractor_core::ports::{
    ExtractionStore, PortError, PortResult, ProgressStore, UserStore,
};
use extractor_core::progress;

const EXTRACTION_COLUMNS: &str = "id, user_id, title, niche, target_audience, transformation, \
     product_idea, six_pillars, perc_method, resources, sales_page, current_step, is_complete, \
     created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_progress(&self, user_id: Uuid) -> PortResult<Option<UserProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT user_id, completed_extractions, completed_products, time_in_system, \
             achievements, current_phase, last_active_at FROM user_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.map(ProgressRecord::to_domain))
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ExtractionRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    niche: String,
    target_audience: String,
    transformation: String,
    product_idea: String,
    six_pillars: Option<Value>,
    perc_method: Option<Value>,
    resources: Option<Value>,
    sales_page: Option<Value>,
    current_step: i32,
    is_complete: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ExtractionRecord {
    fn to_domain(self) -> Extraction {
        Extraction {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            niche: self.niche,
            target_audience: self.target_audience,
            transformation: self.transformation,
            product_idea: self.product_idea,
            six_pillars: self.six_pillars,
            perc_method: self.perc_method,
            resources: self.resources,
            sales_page: self.sales_page,
            current_step: self.current_step,
            is_complete: self.is_complete,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    user_id: Uuid,
    completed_extractions: i32,
    completed_products: i32,
    time_in_system: i32,
    achievements: Value,
    current_phase: String,
    last_active_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> UserProgress {
        UserProgress {
            user_id: self.user_id,
            completed_extractions: self.completed_extractions,
            completed_products: self.completed_products,
            time_in_system: self.time_in_system,
            achievements: self.achievements,
            current_phase: self.current_phase,
            last_active_at: self.last_active_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `ExtractionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExtractionStore for DbAdapter {
    async fn create_extraction(
        &self,
        user_id: Uuid,
        new: NewExtraction,
    ) -> PortResult<Extraction> {
        let record = sqlx::query_as::<_, ExtractionRecord>(&format!(
            "INSERT INTO extractions \
             (id, user_id, title, niche, target_audience, transformation, product_idea, six_pillars, current_step) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1) RETURNING {EXTRACTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&new.title)
        .bind(&new.niche)
        .bind(&new.target_audience)
        .bind(&new.transformation)
        .bind(new.product_idea())
        .bind(new.seed_six_pillars())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_extraction(&self, extraction_id: Uuid, user_id: Uuid) -> PortResult<Extraction> {
        let record = sqlx::query_as::<_, ExtractionRecord>(&format!(
            "SELECT {EXTRACTION_COLUMNS} FROM extractions WHERE id = $1 AND user_id = $2"
        ))
        .bind(extraction_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Extraction not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn list_extractions(&self, user_id: Uuid) -> PortResult<Vec<Extraction>> {
        let records = sqlx::query_as::<_, ExtractionRecord>(&format!(
            "SELECT {EXTRACTION_COLUMNS} FROM extractions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(ExtractionRecord::to_domain).collect())
    }

    async fn apply_step_result(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        step: i32,
        result: Value,
    ) -> PortResult<()> {
        let mut extraction = self.get_extraction(extraction_id, user_id).await?;
        extraction.apply_step_result(step, result);
        write_back(&self.pool, extraction).await?;
        Ok(())
    }

    async fn advance_step(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        target_step: i32,
        data: Option<Value>,
    ) -> PortResult<StepAdvance> {
        let mut extraction = self.get_extraction(extraction_id, user_id).await?;
        extraction.apply_manual_advance(target_step, data);
        let advance = StepAdvance {
            id: extraction.id,
            current_step: extraction.current_step,
            is_complete: extraction.is_complete,
        };
        write_back(&self.pool, extraction).await?;
        Ok(advance)
    }
}

/// Writes an extraction's mutable fields back in one statement, re-filtering
/// by owner. Zero rows affected means the record vanished between fetch and
/// write, which is reported the same way as never having existed.
async fn write_back(pool: &PgPool, extraction: Extraction) -> PortResult<()> {
    let done = sqlx::query(
        "UPDATE extractions SET six_pillars = $1, perc_method = $2, resources = $3, \
         sales_page = $4, current_step = $5, is_complete = $6, updated_at = now() \
         WHERE id = $7 AND user_id = $8",
    )
    .bind(extraction.six_pillars)
    .bind(extraction.perc_method)
    .bind(extraction.resources)
    .bind(extraction.sales_page)
    .bind(extraction.current_step)
    .bind(extraction.is_complete)
    .bind(extraction.id)
    .bind(extraction.user_id)
    .execute(pool)
    .await
    .map_err(|e| PortError::Unexpected(e.to_string()))?;

    if done.rows_affected() == 0 {
        return Err(PortError::NotFound("Extraction not found".to_string()));
    }
    Ok(())
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn record_advance(&self, user_id: Uuid, target_step: i32) -> PortResult<UserProgress> {
        // Read-modify-write on purpose: the aggregate is a best-effort
        // indicator and the upsert rule lives in one place, in the core.
        let existing = self.fetch_progress(user_id).await?;
        let next = progress::advance(existing, user_id, target_step, Utc::now());

        sqlx::query(
            "INSERT INTO user_progress \
             (user_id, completed_extractions, completed_products, time_in_system, achievements, current_phase, last_active_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
             completed_extractions = EXCLUDED.completed_extractions, \
             completed_products = EXCLUDED.completed_products, \
             time_in_system = EXCLUDED.time_in_system, \
             achievements = EXCLUDED.achievements, \
             current_phase = EXCLUDED.current_phase, \
             last_active_at = EXCLUDED.last_active_at",
        )
        .bind(next.user_id)
        .bind(next.completed_extractions)
        .bind(next.completed_products)
        .bind(next.time_in_system)
        .bind(&next.achievements)
        .bind(&next.current_phase)
        .bind(next.last_active_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(next)
    }

    async fn get_progress(&self, user_id: Uuid) -> PortResult<UserProgress> {
        self.fetch_progress(user_id)
            .await?
            .ok_or_else(|| PortError::NotFound("Progress not found".to_string()))
    }
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("User not found".to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
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
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
