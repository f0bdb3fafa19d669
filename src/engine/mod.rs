pub mod authorizer;
pub mod window;

pub use authorizer::{DenyReason, ReminderAuthorizer, ReminderDecision};
pub use window::PrayerWindowEngine;
