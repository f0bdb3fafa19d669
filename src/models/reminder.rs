use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::PrayerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Sent,
    Delivered,
    Read,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Sent => "sent",
            ReminderStatus::Delivered => "delivered",
            ReminderStatus::Read => "read",
        }
    }
}

impl FromStr for ReminderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(ReminderStatus::Sent),
            "delivered" => Ok(ReminderStatus::Delivered),
            "read" => Ok(ReminderStatus::Read),
            _ => Err(anyhow::anyhow!("Unknown reminder status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerReminder {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub prayer: PrayerType,
    pub sent_at: NaiveDateTime,
    pub status: ReminderStatus,
    pub message: String,
}

/// One row of the "who still needs a nudge" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFriend {
    pub friend_id: String,
    pub can_send_reminder: bool,
    pub reason_if_blocked: Option<String>,
}
