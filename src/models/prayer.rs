use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerType {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerType {
    pub const COUNT: usize = 5;

    pub fn all() -> [PrayerType; Self::COUNT] {
        [
            PrayerType::Fajr,
            PrayerType::Dhuhr,
            PrayerType::Asr,
            PrayerType::Maghrib,
            PrayerType::Isha,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "fajr",
            PrayerType::Dhuhr => "dhuhr",
            PrayerType::Asr => "asr",
            PrayerType::Maghrib => "maghrib",
            PrayerType::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "Fajr",
            PrayerType::Dhuhr => "Dhuhr",
            PrayerType::Asr => "Asr",
            PrayerType::Maghrib => "Maghrib",
            PrayerType::Isha => "Isha",
        }
    }
}

impl std::fmt::Display for PrayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerType::Fajr),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerType::Dhuhr),
            "asr" => Ok(PrayerType::Asr),
            "maghrib" => Ok(PrayerType::Maghrib),
            "isha" => Ok(PrayerType::Isha),
            _ => Err(CoreError::UnknownPrayer(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerStatus {
    Upcoming,
    Active,
    Missed,
    Completed,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::Upcoming => "upcoming",
            PrayerStatus::Active => "active",
            PrayerStatus::Missed => "missed",
            PrayerStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PrayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scoring window of one prayer on one day.
///
/// `scheduled_end` is exclusive. Construction rejects windows that do not
/// move forward in time, so every `PrayerWindow` in circulation has a
/// positive width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPrayerWindow")]
pub struct PrayerWindow {
    prayer: PrayerType,
    scheduled_start: NaiveDateTime,
    scheduled_end: NaiveDateTime,
}

#[derive(Deserialize)]
struct RawPrayerWindow {
    prayer: PrayerType,
    scheduled_start: NaiveDateTime,
    scheduled_end: NaiveDateTime,
}

impl TryFrom<RawPrayerWindow> for PrayerWindow {
    type Error = CoreError;

    fn try_from(raw: RawPrayerWindow) -> Result<Self, Self::Error> {
        PrayerWindow::new(raw.prayer, raw.scheduled_start, raw.scheduled_end)
    }
}

impl PrayerWindow {
    pub fn new(
        prayer: PrayerType,
        scheduled_start: NaiveDateTime,
        scheduled_end: NaiveDateTime,
    ) -> Result<Self, CoreError> {
        if scheduled_end <= scheduled_start {
            return Err(CoreError::InvalidWindow {
                start: scheduled_start,
                end: scheduled_end,
            });
        }
        Ok(Self {
            prayer,
            scheduled_start,
            scheduled_end,
        })
    }

    pub fn prayer(&self) -> PrayerType {
        self.prayer
    }

    pub fn scheduled_start(&self) -> NaiveDateTime {
        self.scheduled_start
    }

    pub fn scheduled_end(&self) -> NaiveDateTime {
        self.scheduled_end
    }

    /// Whole window length in milliseconds, always > 0.
    pub fn width_millis(&self) -> i64 {
        (self.scheduled_end - self.scheduled_start).num_milliseconds()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerScoreResult {
    pub prayer: PrayerType,
    pub scheduled_start: NaiveDateTime,
    pub registered_at: NaiveDateTime,
    pub at_mosque: bool,
    /// In [0, 10], one decimal place.
    pub score: f64,
}

/// A persisted registration, as read back from the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerRecord {
    pub id: i64,
    pub user_id: String,
    pub date: String,
    pub prayer: PrayerType,
    pub scheduled_start: NaiveDateTime,
    pub registered_at: NaiveDateTime,
    pub at_mosque: bool,
    pub score: f64,
    pub made_up: bool,
}

impl PrayerRecord {
    pub fn is_missed(&self) -> bool {
        self.score == 0.0 && !self.at_mosque
    }

    pub fn as_score(&self) -> PrayerScoreResult {
        PrayerScoreResult {
            prayer: self.prayer,
            scheduled_start: self.scheduled_start,
            registered_at: self.registered_at,
            at_mosque: self.at_mosque,
            score: self.score,
        }
    }
}
