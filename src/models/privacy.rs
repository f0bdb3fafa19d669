use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::CoreError;

/// Audience for status visibility and for incoming reminders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyLevel {
    Everyone,
    #[default]
    #[serde(alias = "friends")]
    FriendsOnly,
    None,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Everyone => "everyone",
            PrivacyLevel::FriendsOnly => "friendsOnly",
            PrivacyLevel::None => "none",
        }
    }
}

impl std::fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "everyone" => Ok(PrivacyLevel::Everyone),
            "friends" | "friendsonly" | "friends-only" | "friends_only" => {
                Ok(PrivacyLevel::FriendsOnly)
            }
            "none" => Ok(PrivacyLevel::None),
            _ => Err(CoreError::InvalidConfig(format!(
                "unknown privacy level '{}'",
                s
            ))),
        }
    }
}

/// Which exception list an id is added to or removed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Allowed,
    Blocked,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "default_true")]
    pub missed_prayers: bool,
    #[serde(default = "default_true")]
    pub upcoming_prayers: bool,
    #[serde(default = "default_true")]
    pub friend_reminders: bool,
    #[serde(default)]
    pub daily_summary: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            missed_prayers: true,
            upcoming_prayers: true,
            friend_reminders: true,
            daily_summary: false,
        }
    }
}

/// Privacy settings owned by one user.
///
/// `allow_list` and `block_list` never share an id: adding to one list goes
/// through [`PrivacyConfig::add_exception`], which drops the id from the
/// other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub status_visibility: PrivacyLevel,
    #[serde(default)]
    pub reminder_permission: PrivacyLevel,
    #[serde(default)]
    allow_list: BTreeSet<String>,
    #[serde(default)]
    block_list: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub reminder_sending_enabled: bool,
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            status_visibility: PrivacyLevel::FriendsOnly,
            reminder_permission: PrivacyLevel::FriendsOnly,
            allow_list: BTreeSet::new(),
            block_list: BTreeSet::new(),
            reminder_sending_enabled: true,
            notifications: NotificationPreferences::default(),
        }
    }
}

impl PrivacyConfig {
    pub fn allow_list(&self) -> &BTreeSet<String> {
        &self.allow_list
    }

    pub fn block_list(&self) -> &BTreeSet<String> {
        &self.block_list
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allow_list.contains(user_id)
    }

    pub fn is_blocked(&self, user_id: &str) -> bool {
        self.block_list.contains(user_id)
    }

    pub fn add_exception(&mut self, kind: ExceptionKind, user_id: &str) {
        let (target, opposite) = match kind {
            ExceptionKind::Allowed => (&mut self.allow_list, &mut self.block_list),
            ExceptionKind::Blocked => (&mut self.block_list, &mut self.allow_list),
        };
        opposite.remove(user_id);
        target.insert(user_id.to_string());
    }

    /// Returns whether the id was present.
    pub fn remove_exception(&mut self, kind: ExceptionKind, user_id: &str) -> bool {
        match kind {
            ExceptionKind::Allowed => self.allow_list.remove(user_id),
            ExceptionKind::Blocked => self.block_list.remove(user_id),
        }
    }

    pub fn set_status_visibility(&mut self, level: PrivacyLevel) {
        self.status_visibility = level;
    }

    pub fn set_reminder_permission(&mut self, level: PrivacyLevel) {
        self.reminder_permission = level;
    }

    pub fn set_reminder_sending(&mut self, enabled: bool) {
        self.reminder_sending_enabled = enabled;
    }

    /// Repairs a config whose lists overlap (e.g. hand-edited JSON). Block wins.
    pub fn normalize(&mut self) {
        let overlap: Vec<String> = self
            .allow_list
            .intersection(&self.block_list)
            .cloned()
            .collect();
        for id in overlap {
            self.allow_list.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_friends_only_and_sending_enabled() {
        let cfg = PrivacyConfig::default();
        assert_eq!(cfg.status_visibility, PrivacyLevel::FriendsOnly);
        assert_eq!(cfg.reminder_permission, PrivacyLevel::FriendsOnly);
        assert!(cfg.allow_list().is_empty());
        assert!(cfg.block_list().is_empty());
        assert!(cfg.reminder_sending_enabled);
        assert!(cfg.notifications.friend_reminders);
        assert!(!cfg.notifications.daily_summary);
    }

    #[test]
    fn adding_an_exception_moves_it_out_of_the_other_list() {
        let mut cfg = PrivacyConfig::default();
        cfg.add_exception(ExceptionKind::Allowed, "amina");
        assert!(cfg.is_allowed("amina"));

        cfg.add_exception(ExceptionKind::Blocked, "amina");
        assert!(cfg.is_blocked("amina"));
        assert!(!cfg.is_allowed("amina"));

        cfg.add_exception(ExceptionKind::Allowed, "amina");
        assert!(cfg.is_allowed("amina"));
        assert!(!cfg.is_blocked("amina"));
    }

    #[test]
    fn removing_a_missing_exception_is_a_no_op() {
        let mut cfg = PrivacyConfig::default();
        assert!(!cfg.remove_exception(ExceptionKind::Blocked, "yusuf"));
        cfg.add_exception(ExceptionKind::Blocked, "yusuf");
        assert!(cfg.remove_exception(ExceptionKind::Blocked, "yusuf"));
        assert!(!cfg.is_blocked("yusuf"));
    }

    #[test]
    fn parses_levels() {
        assert_eq!("everyone".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::Everyone);
        assert_eq!("friends".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::FriendsOnly);
        assert_eq!("friendsOnly".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::FriendsOnly);
        assert_eq!("NONE".parse::<PrivacyLevel>().unwrap(), PrivacyLevel::None);
        assert!(matches!(
            "public".parse::<PrivacyLevel>(),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_json_fields_fall_back_to_defaults() {
        let cfg: PrivacyConfig =
            serde_json::from_str(r#"{"reminder_permission":"none"}"#).unwrap();
        assert_eq!(cfg.reminder_permission, PrivacyLevel::None);
        assert_eq!(cfg.status_visibility, PrivacyLevel::FriendsOnly);
        assert!(cfg.reminder_sending_enabled);
    }

    #[test]
    fn normalize_drops_overlapping_allow_entries() {
        let mut cfg: PrivacyConfig = serde_json::from_str(
            r#"{"allow_list":["a","b"],"block_list":["b"]}"#,
        )
        .unwrap();
        cfg.normalize();
        assert!(cfg.is_allowed("a"));
        assert!(!cfg.is_allowed("b"));
        assert!(cfg.is_blocked("b"));
    }
}
