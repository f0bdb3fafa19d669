use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    pub prayers_registered: u8,
    /// Sum of the day's scores divided by five.
    pub average: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub best: u32,
}
