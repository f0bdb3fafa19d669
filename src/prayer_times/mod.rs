pub mod calculator;
pub mod registration;

pub use calculator::{build_windows, DayTimes, PrayerCalculator, CALC_METHODS};
pub use registration::{plan_registration, registration_time, Registration};
