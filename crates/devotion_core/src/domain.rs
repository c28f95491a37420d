//! crates/devotion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A single scripture passage: a human-readable reference plus its text.
///
/// A devotion record carries one or more of these, one per translation the
/// user meditated on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScripturePassage {
    pub reference: String,
    pub text: String,
}

/// A completed guided-reflection journal entry.
///
/// Created once when the user finishes a guided session and never edited
/// afterwards; the only mutation is deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevotionRecord {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub scripture: Vec<ScripturePassage>,
    pub observation: String,
    pub application: String,
    pub prayer_text: String,
}

/// A daily mood/note entry. One conceptual record per calendar day;
/// during reconciliation records are keyed by their local calendar date,
/// not by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInRecord {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub mood: Option<String>,
    pub note: Option<String>,
}

/// A lookup request against the scripture provider. `verse_from == None`
/// means the whole chapter.
#[derive(Debug, Clone)]
pub struct ScriptureQuery {
    /// Provider book id, e.g. "PSA".
    pub book_id: String,
    /// Display name used when rendering the reference, e.g. "Psalm".
    pub book_name: String,
    pub chapter: u32,
    pub verse_from: Option<u32>,
    pub verse_to: Option<u32>,
}

/// The span a generated review covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPeriod {
    Week,
    Month,
}

impl ReviewPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewPeriod::Week => "weekly",
            ReviewPeriod::Month => "monthly",
        }
    }
}

/// An inclusive range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Everything the review prompt is assembled from: both record kinds,
/// already filtered down to the requested period.
#[derive(Debug, Clone)]
pub struct ReviewData {
    pub devotion_records: Vec<DevotionRecord>,
    pub check_in_records: Vec<CheckInRecord>,
    pub period: ReviewPeriod,
    pub range: PeriodRange,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
