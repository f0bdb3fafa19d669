pub mod settings;

pub use settings::{AppConfig, PrayerAdjustments, SalahConfig, UserConfig};
