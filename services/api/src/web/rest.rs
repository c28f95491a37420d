//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use devotion_core::domain::{
    CheckInRecord, DevotionRecord, ReviewPeriod, ScripturePassage, ScriptureQuery,
};
use devotion_core::merge::local_day_key;
use devotion_core::review::{build_prompt, prepare_review_data};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::adapters::review_llm::ReviewOutcome;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_devotions_handler,
        delete_devotion_handler,
        list_check_ins_handler,
        save_check_in_handler,
        scripture_handler,
        create_review_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            PassageResponse,
            DevotionRecordResponse,
            DeleteDevotionResponse,
            CheckInResponse,
            SaveCheckInRequest,
            CheckInSavedResponse,
            ScriptureResponse,
            ReviewRequest,
            ReviewPeriodParam,
            ReviewResponse,
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
        )
    ),
    tags(
        (name = "Devotion Journal API", description = "API endpoints for guided devotions, mood check-ins, and AI reviews.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct PassageResponse {
    pub reference: String,
    pub text: String,
}

impl PassageResponse {
    fn from_domain(passage: &ScripturePassage) -> Self {
        Self {
            reference: passage.reference.clone(),
            text: passage.text.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DevotionRecordResponse {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub scripture: Vec<PassageResponse>,
    pub observation: String,
    pub application: String,
    pub prayer_text: String,
}

impl DevotionRecordResponse {
    fn from_domain(record: &DevotionRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            scripture: record.scripture.iter().map(PassageResponse::from_domain).collect(),
            observation: record.observation.clone(),
            application: record.application.clone(),
            prayer_text: record.prayer_text.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeleteDevotionResponse {
    pub deleted: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub mood: Option<String>,
    pub note: Option<String>,
}

impl CheckInResponse {
    fn from_domain(check_in: &CheckInRecord) -> Self {
        Self {
            id: check_in.id,
            date: check_in.date,
            mood: check_in.mood.clone(),
            note: check_in.note.clone(),
        }
    }
}

/// The body of a check-in save. Omitting `date` records the check-in now;
/// an explicit date must still fall on the current local day.
#[derive(Deserialize, ToSchema)]
pub struct SaveCheckInRequest {
    pub mood: Option<String>,
    pub note: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInSavedResponse {
    pub record: CheckInResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct ScriptureQueryParams {
    /// Provider book id, e.g. "PSA".
    pub book_id: String,
    /// Display name used in the rendered reference, e.g. "Psalm".
    pub book_name: String,
    pub chapter: u32,
    pub verse_from: Option<u32>,
    pub verse_to: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct ScriptureResponse {
    pub reference: String,
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub period: ReviewPeriodParam,
}

#[derive(Deserialize, ToSchema, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPeriodParam {
    Week,
    Month,
}

impl From<ReviewPeriodParam> for ReviewPeriod {
    fn from(value: ReviewPeriodParam) -> Self {
        match value {
            ReviewPeriodParam::Week => ReviewPeriod::Week,
            ReviewPeriodParam::Month => ReviewPeriod::Month,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub review: String,
    /// Which backend produced the review; absent when no provider is
    /// configured and `review` carries setup instructions instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

fn internal_error(context: &str, e: impl std::fmt::Display) -> (StatusCode, String) {
    error!("{context}: {e}");
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}

/// Check-ins may only be recorded for the current local calendar day.
fn falls_on_day(date: DateTime<Utc>, day: chrono::NaiveDate) -> bool {
    local_day_key(date) == day
}

/// A range query where both ends are given must not be inverted.
fn invalid_verse_range(verse_from: Option<u32>, verse_to: Option<u32>) -> bool {
    matches!((verse_from, verse_to), (Some(from), Some(to)) if from > to)
}

/// List devotion records.
///
/// Signed in, the cloud copy wins; anonymously, this is the device-local list.
#[utoipa::path(
    get,
    path = "/records/devotions",
    responses(
        (status = 200, description = "The devotion records, newest first", body = [DevotionRecordResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_devotions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = app_state
        .sync
        .load_devotion_records(user_id)
        .await
        .map_err(|e| internal_error("Failed to load devotion records", e))?;

    let response: Vec<DevotionRecordResponse> = records
        .iter()
        .map(DevotionRecordResponse::from_domain)
        .collect();
    Ok(Json(response))
}

/// Delete one devotion record by id.
#[utoipa::path(
    delete,
    path = "/records/devotions/{id}",
    params(
        ("id" = Uuid, Path, description = "The id of the record to delete.")
    ),
    responses(
        (status = 200, description = "Record deleted", body = DeleteDevotionResponse),
        (status = 404, description = "No record with that id"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_devotion_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = app_state
        .sync
        .load_devotion_records(user_id)
        .await
        .map_err(|e| internal_error("Failed to load devotion records", e))?;

    if !records.iter().any(|r| r.id == id) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No devotion record with id {id}"),
        ));
    }
    let remaining: Vec<DevotionRecord> =
        records.into_iter().filter(|r| r.id != id).collect();

    let outcome = app_state
        .sync
        .save_devotion_records(&remaining, user_id)
        .await
        .map_err(|e| internal_error("Failed to save devotion records", e))?;

    Ok(Json(DeleteDevotionResponse {
        deleted: id,
        warning: outcome.cloud_warning,
    }))
}

/// List mood check-ins, reconciled across the local and cloud stores.
#[utoipa::path(
    get,
    path = "/checkins",
    responses(
        (status = 200, description = "The check-ins, newest first", body = [CheckInResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_check_ins_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let check_ins = app_state
        .sync
        .load_check_ins(user_id)
        .await
        .map_err(|e| internal_error("Failed to load check-ins", e))?;

    let response: Vec<CheckInResponse> =
        check_ins.iter().map(CheckInResponse::from_domain).collect();
    Ok(Json(response))
}

/// Record today's mood check-in.
///
/// There is one check-in per local calendar day; saving again the same day
/// replaces that day's entry in place.
#[utoipa::path(
    put,
    path = "/checkins",
    request_body = SaveCheckInRequest,
    responses(
        (status = 200, description = "Check-in saved", body = CheckInSavedResponse),
        (status = 400, description = "Empty check-in, or a date outside today"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn save_check_in_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<SaveCheckInRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.mood.is_none() && req.note.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "A check-in needs a mood or a note.".to_string(),
        ));
    }

    let date = req.date.unwrap_or_else(Utc::now);
    let today = local_day_key(Utc::now());
    if !falls_on_day(date, today) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Check-ins can only be recorded for the current day.".to_string(),
        ));
    }

    let existing = app_state
        .sync
        .load_check_ins(user_id)
        .await
        .map_err(|e| internal_error("Failed to load check-ins", e))?;

    // Reuse today's id if the day already has an entry, so the update is an
    // in-place replacement everywhere rather than a duplicate day.
    let id = existing
        .iter()
        .find(|c| local_day_key(c.date) == today)
        .map(|c| c.id)
        .unwrap_or_else(Uuid::new_v4);
    let record = CheckInRecord {
        id,
        date,
        mood: req.mood,
        note: req.note,
    };

    let mut check_ins: Vec<CheckInRecord> = existing
        .into_iter()
        .filter(|c| local_day_key(c.date) != today)
        .collect();
    check_ins.insert(0, record.clone());

    let outcome = app_state
        .sync
        .save_check_ins(&check_ins, user_id)
        .await
        .map_err(|e| internal_error("Failed to save check-ins", e))?;

    // The merge may have preferred a richer same-day entry from another device.
    let saved = outcome
        .records
        .iter()
        .find(|c| local_day_key(c.date) == today)
        .unwrap_or(&record);

    Ok(Json(CheckInSavedResponse {
        record: CheckInResponse::from_domain(saved),
        warning: outcome.cloud_warning,
    }))
}

/// Look up a scripture chapter or verse range.
///
/// Without a configured provider key the response carries setup instructions
/// in place of the passage text.
#[utoipa::path(
    get,
    path = "/scripture",
    params(ScriptureQueryParams),
    responses(
        (status = 200, description = "The passage, or setup instructions when no provider is configured", body = ScriptureResponse),
        (status = 400, description = "Invalid verse range"),
        (status = 404, description = "The provider has no such chapter or passage"),
        (status = 502, description = "The scripture provider failed")
    )
)]
pub async fn scripture_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ScriptureQueryParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.chapter == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Chapter numbers start at 1.".to_string(),
        ));
    }
    if invalid_verse_range(params.verse_from, params.verse_to) {
        return Err((
            StatusCode::BAD_REQUEST,
            "verse_from must not be greater than verse_to.".to_string(),
        ));
    }

    let query = ScriptureQuery {
        book_id: params.book_id,
        book_name: params.book_name,
        chapter: params.chapter,
        verse_from: params.verse_from,
        verse_to: params.verse_to,
    };

    let Some(scripture) = &app_state.scripture else {
        let reference = match (query.verse_from, query.verse_to) {
            (Some(from), Some(to)) => {
                format!("{} {}:{}-{}", query.book_name, query.chapter, from, to)
            }
            (Some(from), None) => format!("{} {}:{}", query.book_name, query.chapter, from),
            _ => format!("{} {}", query.book_name, query.chapter),
        };
        return Ok(Json(ScriptureResponse {
            reference,
            text: "No scripture provider is configured. Set SCRIPTURE_API_KEY to a key from \
                   https://scripture.api.bible and restart the server, or paste the passage \
                   text yourself."
                .to_string(),
        }));
    };

    match scripture.fetch_passage(&query).await {
        Ok(passage) => Ok(Json(ScriptureResponse {
            reference: passage.reference,
            text: passage.text,
        })),
        Err(devotion_core::ports::PortError::NotFound(detail)) => {
            Err((StatusCode::NOT_FOUND, detail))
        }
        Err(e) => {
            error!("Scripture lookup failed: {e}");
            Err((StatusCode::BAD_GATEWAY, "Scripture lookup failed".to_string()))
        }
    }
}

/// Generate an AI review of the current week or month.
#[utoipa::path(
    post,
    path = "/reviews",
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "The generated review, or configuration instructions", body = ReviewResponse),
        (status = 502, description = "The review provider failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_review_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let devotions = app_state
        .sync
        .load_devotion_records(user_id)
        .await
        .map_err(|e| internal_error("Failed to load devotion records", e))?;
    let check_ins = app_state
        .sync
        .load_check_ins(user_id)
        .await
        .map_err(|e| internal_error("Failed to load check-ins", e))?;

    let data = prepare_review_data(
        &devotions,
        &check_ins,
        req.period.into(),
        Local::now().date_naive(),
    );
    let prompt = build_prompt(&data);

    let outcome = app_state.review.generate(&prompt).await.map_err(|e| {
        error!("Review generation failed: {e}");
        (StatusCode::BAD_GATEWAY, "Review generation failed".to_string())
    })?;

    let (review, provider) = match outcome {
        ReviewOutcome::Generated { provider, text } => (text, Some(provider.name().to_string())),
        ReviewOutcome::MissingCredentials { message } => (message, None),
    };

    Ok(Json(ReviewResponse {
        review,
        provider,
        period_start: data.range.start,
        period_end: data.range.end,
    }))
}
