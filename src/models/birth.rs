//! Birth profile entered during onboarding, and the chart payload derived
//! from it by the external computation service.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sentinel for "time of birth unknown" in `hour`/`minute`.
pub const TIME_UNKNOWN: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Birth data supplied by the user to complete onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BirthProfile {
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    #[validate(range(min = 1900))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1, max = 31))]
    pub day: u32,
    /// Hour of birth, or -1 when unknown
    pub hour: i32,
    /// Minute of birth, or -1 when unknown
    pub minute: i32,
    /// Lunar (true) vs. solar (false) calendar for the birth date
    pub lunar: bool,
    pub gender: Gender,
}

impl BirthProfile {
    pub fn has_time(&self) -> bool {
        self.hour >= 0 && self.minute >= 0
    }

    /// Full validation: derive-level field checks plus the cross-field rules
    /// (calendar-valid date, not in the future, time either fully known or
    /// fully unknown).
    pub fn check(&self) -> Result<(), BirthProfileError> {
        self.validate()
            .map_err(|e| BirthProfileError::Field(e.to_string()))?;

        if self.year > Utc::now().year() {
            return Err(BirthProfileError::DateOutOfRange);
        }
        if NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_none() {
            return Err(BirthProfileError::DateOutOfRange);
        }

        let time_valid = (self.hour == TIME_UNKNOWN && self.minute == TIME_UNKNOWN)
            || ((0..=23).contains(&self.hour) && (0..=59).contains(&self.minute));
        if !time_valid {
            return Err(BirthProfileError::TimeOutOfRange);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BirthProfileError {
    #[error("invalid field: {0}")]
    Field(String),
    #[error("birth date out of range")]
    DateOutOfRange,
    #[error("birth time out of range")]
    TimeOutOfRange,
}

/// Chart payload computed by the external service from a birth profile.
///
/// The payload is carried and stored verbatim; this client never interprets
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedChart {
    pub payload: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}
