use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::PrayerType;

/// Errors raised by the scoring and authorization core.
///
/// These are caller bugs (bad input), never runtime conditions to retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid prayer window: end {end} is not after start {start}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Unknown prayer: '{0}'")]
    UnknownPrayer(String),

    #[error("Invalid privacy config: {0}")]
    InvalidConfig(String),

    #[error("Registration time {0} is in the future")]
    FutureRegistration(NaiveDateTime),

    #[error("No {0} window among the given windows")]
    MissingWindow(PrayerType),
}
