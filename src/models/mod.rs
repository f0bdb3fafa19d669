pub mod prayer;
pub mod privacy;
pub mod reminder;
pub mod stats;

pub use prayer::{PrayerRecord, PrayerScoreResult, PrayerStatus, PrayerType, PrayerWindow};
pub use privacy::{ExceptionKind, NotificationPreferences, PrivacyConfig, PrivacyLevel};
pub use reminder::{PendingFriend, PrayerReminder, ReminderStatus};
pub use stats::{DailyStats, Streak};
