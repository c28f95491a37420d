//! crates/devotion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    CheckInRecord, DevotionRecord, ScripturePassage, ScriptureQuery, User, UserCredentials,
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

/// The cloud document store: per-user record lists, one document per record id,
/// plus the account and auth-session bookkeeping that gates cloud sync.
#[async_trait]
pub trait CloudStore: Send + Sync {
    // --- Account / Auth ---
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

    // --- Devotion Records ---
    async fn load_devotion_records(&self, user_id: Uuid) -> PortResult<Vec<DevotionRecord>>;

    /// Makes the stored list equal to `records`: upserts every record by id
    /// and prunes documents whose ids are no longer present.
    async fn replace_devotion_records(
        &self,
        user_id: Uuid,
        records: &[DevotionRecord],
    ) -> PortResult<()>;

    // --- Check-Ins ---
    async fn load_check_ins(&self, user_id: Uuid) -> PortResult<Vec<CheckInRecord>>;

    async fn replace_check_ins(
        &self,
        user_id: Uuid,
        check_ins: &[CheckInRecord],
    ) -> PortResult<()>;
}

/// Local device storage: JSON-serialized record lists under fixed keys.
/// There is one local store per device, shared by all (and anonymous) users.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn load_devotion_records(&self) -> PortResult<Vec<DevotionRecord>>;

    async fn save_devotion_records(&self, records: &[DevotionRecord]) -> PortResult<()>;

    async fn load_check_ins(&self) -> PortResult<Vec<CheckInRecord>>;

    async fn save_check_ins(&self, check_ins: &[CheckInRecord]) -> PortResult<()>;
}

/// The external scripture provider (lookup by book/chapter/verse-range).
#[async_trait]
pub trait ScriptureService: Send + Sync {
    async fn fetch_passage(&self, query: &ScriptureQuery) -> PortResult<ScripturePassage>;
}

/// A language-model backend that turns a composed review prompt into free text.
#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn generate_review(&self, prompt: &str) -> PortResult<String>;
}
