//! crates/extractor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or the upstream model API.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    Extraction, NewExtraction, StepAdvance, User, UserCredentials, UserProgress,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ExtractionStore: Send + Sync {
    /// Creates a new extraction at step 1 with its six-pillar slot seeded.
    async fn create_extraction(&self, user_id: Uuid, new: NewExtraction)
        -> PortResult<Extraction>;

    /// Fetches an extraction, filtered by both id and owner. A record owned
    /// by someone else is indistinguishable from an absent one.
    async fn get_extraction(&self, extraction_id: Uuid, user_id: Uuid) -> PortResult<Extraction>;

    async fn list_extractions(&self, user_id: Uuid) -> PortResult<Vec<Extraction>>;

    /// Persists a pipeline-generated step result and advances the cursor.
    /// Ownership is re-validated before mutating.
    async fn apply_step_result(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        step: i32,
        result: Value,
    ) -> PortResult<()>;

    /// The explicit step-jump path: sets the cursor and completion flag, and
    /// optionally writes client-supplied data into the target step's slot.
    async fn advance_step(
        &self,
        extraction_id: Uuid,
        user_id: Uuid,
        target_step: i32,
        data: Option<Value>,
    ) -> PortResult<StepAdvance>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Upserts the user's progress aggregate for an advance to `target_step`.
    /// Best-effort counter semantics; see `progress::advance` for the rules.
    async fn record_advance(&self, user_id: Uuid, target_step: i32) -> PortResult<UserProgress>;

    async fn get_progress(&self, user_id: Uuid) -> PortResult<UserProgress>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

//=========================================================================================
// Upstream LLM Port
//=========================================================================================

/// The raw upstream byte stream: `data: <json>` lines in arbitrary-sized
/// chunks, terminated by the `[DONE]` sentinel.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, PortError>> + Send>>;

/// A single-message streaming chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    /// When set, the upstream call asks for a JSON object response.
    pub expects_json: bool,
}

#[async_trait]
pub trait ChatCompletionStream: Send + Sync {
    /// Opens the streaming completion call. A connection or non-success
    /// status failure surfaces here, before any stream event exists.
    async fn open_stream(&self, request: ChatRequest) -> PortResult<ByteStream>;
}
