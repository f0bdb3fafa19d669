pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod prayer_times;
pub mod social;
pub mod utils;

pub use engine::{DenyReason, PrayerWindowEngine, ReminderAuthorizer, ReminderDecision};
pub use error::CoreError;
pub use models::{PrayerScoreResult, PrayerStatus, PrayerType, PrayerWindow, PrivacyConfig, PrivacyLevel};
