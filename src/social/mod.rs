pub mod reminders;

pub use reminders::{LogDispatcher, ReminderDispatcher, SendOutcome};
