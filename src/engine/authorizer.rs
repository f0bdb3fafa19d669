use serde::{Deserialize, Serialize};

use crate::models::{PrivacyConfig, PrivacyLevel};

/// Why a reminder was refused. `as_str` gives the code shown to front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    SenderDisabled,
    ExplicitlyBlocked,
    NotFriends,
    GloballyDisabled,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::SenderDisabled => "SENDER_DISABLED",
            DenyReason::ExplicitlyBlocked => "EXPLICITLY_BLOCKED",
            DenyReason::NotFriends => "NOT_FRIENDS",
            DenyReason::GloballyDisabled => "GLOBALLY_DISABLED",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serializes as `{ "allowed": .., "reason": .. }`. Only built through
/// [`allow`](Self::allow) and [`deny`](Self::deny), so a denial always
/// carries its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderDecision {
    allowed: bool,
    reason: Option<DenyReason>,
}

impl ReminderDecision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// `Some` exactly when the reminder was refused.
    pub fn reason(&self) -> Option<DenyReason> {
        self.reason
    }

    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    fn friends_only(are_friends: bool) -> Self {
        if are_friends {
            Self::allow()
        } else {
            Self::deny(DenyReason::NotFriends)
        }
    }
}

/// Reminder and status-visibility permissions.
///
/// Relationship and configs arrive already resolved; a missing config is
/// treated as [`PrivacyConfig::default`].
pub struct ReminderAuthorizer;

impl ReminderAuthorizer {
    /// First match wins:
    /// 1. sender has outgoing reminders off
    /// 2. receiver blocked the sender
    /// 3. receiver allow-listed the sender (beats any level, even `none`)
    /// 4. receiver's general reminder level
    pub fn can_send_reminder_to(
        sender: &str,
        receiver: &str,
        are_friends: bool,
        sender_config: Option<&PrivacyConfig>,
        receiver_config: Option<&PrivacyConfig>,
    ) -> ReminderDecision {
        let sending_enabled = sender_config.map_or(true, |c| c.reminder_sending_enabled);
        if !sending_enabled {
            log::debug!("{} -> {}: sender has reminders disabled", sender, receiver);
            return ReminderDecision::deny(DenyReason::SenderDisabled);
        }

        let Some(receiver_config) = receiver_config else {
            return ReminderDecision::friends_only(are_friends);
        };

        if receiver_config.is_blocked(sender) {
            return ReminderDecision::deny(DenyReason::ExplicitlyBlocked);
        }
        if receiver_config.is_allowed(sender) {
            return ReminderDecision::allow();
        }

        match receiver_config.reminder_permission {
            PrivacyLevel::Everyone => ReminderDecision::allow(),
            PrivacyLevel::FriendsOnly => ReminderDecision::friends_only(are_friends),
            PrivacyLevel::None => ReminderDecision::deny(DenyReason::GloballyDisabled),
        }
    }

    /// Self-visibility cannot be restricted.
    pub fn can_view_status(
        viewer: &str,
        target: &str,
        are_friends: bool,
        target_config: Option<&PrivacyConfig>,
    ) -> bool {
        if viewer == target {
            return true;
        }
        let level = target_config.map_or(PrivacyLevel::FriendsOnly, |c| c.status_visibility);
        match level {
            PrivacyLevel::Everyone => true,
            PrivacyLevel::FriendsOnly => are_friends,
            PrivacyLevel::None => false,
        }
    }
}
