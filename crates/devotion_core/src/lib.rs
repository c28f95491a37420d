pub mod domain;
pub mod merge;
pub mod ports;
pub mod review;

pub use domain::{
    CheckInRecord, DevotionRecord, PeriodRange, ReviewData, ReviewPeriod, ScripturePassage,
    ScriptureQuery, User, UserCredentials,
};
pub use merge::{local_day_key, merge_by_day, DayKeyed};
pub use ports::{
    CloudStore, LocalStore, PortError, PortResult, ReviewService, ScriptureService,
};
pub use review::{build_prompt, month_range, prepare_review_data, week_range};
