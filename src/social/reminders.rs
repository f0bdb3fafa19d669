use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::repository::{FriendRepo, PrivacyRepo, RecordRepo, ReminderRepo};
use crate::engine::{DenyReason, ReminderAuthorizer, ReminderDecision};
use crate::models::{PendingFriend, PrayerReminder, PrayerType, ReminderStatus};

pub const DEFAULT_INBOX_LIMIT: u32 = 20;

/// Hands a stored reminder to whatever actually notifies the receiver.
pub trait ReminderDispatcher {
    fn dispatch(&self, reminder: &PrayerReminder) -> Result<()>;
}

/// Dispatcher for the local CLI: there is no push channel, so delivery is a log line.
pub struct LogDispatcher;

impl ReminderDispatcher for LogDispatcher {
    fn dispatch(&self, reminder: &PrayerReminder) -> Result<()> {
        log::info!(
            "Delivering reminder #{} from {} to {} for {}",
            reminder.id,
            reminder.sender_id,
            reminder.receiver_id,
            reminder.prayer
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent { reminder_id: i64, delivered: bool },
    Denied(DenyReason),
}

/// Resolve relationship and both configs, then ask the authorizer.
pub fn check_permission(conn: &Connection, sender: &str, receiver: &str) -> Result<ReminderDecision> {
    let are_friends = FriendRepo::are_friends(conn, sender, receiver)?;
    let sender_config = PrivacyRepo::get(conn, sender)?;
    let receiver_config = PrivacyRepo::get(conn, receiver)?;
    Ok(ReminderAuthorizer::can_send_reminder_to(
        sender,
        receiver,
        are_friends,
        sender_config.as_ref(),
        receiver_config.as_ref(),
    ))
}

pub fn can_view_prayer_status(conn: &Connection, viewer: &str, target: &str) -> Result<bool> {
    if viewer == target {
        return Ok(true);
    }
    let are_friends = FriendRepo::are_friends(conn, viewer, target)?;
    let target_config = PrivacyRepo::get(conn, target)?;
    Ok(ReminderAuthorizer::can_view_status(
        viewer,
        target,
        are_friends,
        target_config.as_ref(),
    ))
}

/// Store a reminder if permitted and dispatch it when the receiver accepts
/// friend reminders. Denials write nothing.
pub fn send_prayer_reminder(
    conn: &Connection,
    dispatcher: &dyn ReminderDispatcher,
    sender: &str,
    receiver: &str,
    prayer: PrayerType,
    message: Option<&str>,
    now: NaiveDateTime,
) -> Result<SendOutcome> {
    if let Some(reason) = check_permission(conn, sender, receiver)?.reason() {
        log::info!("Reminder {} -> {} denied: {}", sender, receiver, reason);
        return Ok(SendOutcome::Denied(reason));
    }

    let id = ReminderRepo::insert(conn, sender, receiver, prayer, now, message.unwrap_or(""))?;

    let wants_reminders = PrivacyRepo::get(conn, receiver)?
        .map_or(true, |c| c.notifications.friend_reminders);
    if !wants_reminders {
        log::debug!("{} has friend reminders muted; #{} stays 'sent'", receiver, id);
        return Ok(SendOutcome::Sent {
            reminder_id: id,
            delivered: false,
        });
    }

    let Some(reminder) = ReminderRepo::get(conn, id)? else {
        return Ok(SendOutcome::Sent {
            reminder_id: id,
            delivered: false,
        });
    };

    let delivered = match dispatcher.dispatch(&reminder) {
        Ok(()) => ReminderRepo::set_status(conn, id, ReminderStatus::Delivered)?,
        Err(e) => {
            log::warn!("Dispatch of reminder #{} failed: {:#}", id, e);
            false
        }
    };

    Ok(SendOutcome::Sent {
        reminder_id: id,
        delivered,
    })
}

/// Friends of `user_id` whose status is visible and who have not registered
/// `prayer` on `date`, with whether a reminder could be sent to each.
pub fn friends_who_havent_prayed(
    conn: &Connection,
    user_id: &str,
    prayer: PrayerType,
    date: NaiveDate,
) -> Result<Vec<PendingFriend>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let mut result = Vec::new();

    for friend_id in FriendRepo::list_friends(conn, user_id)? {
        if !can_view_prayer_status(conn, user_id, &friend_id)? {
            continue;
        }
        if RecordRepo::has_registered(conn, &friend_id, &date_str, prayer)? {
            continue;
        }
        let decision = check_permission(conn, user_id, &friend_id)?;
        result.push(PendingFriend {
            friend_id,
            can_send_reminder: decision.is_allowed(),
            reason_if_blocked: decision.reason().map(|r| r.as_str().to_string()),
        });
    }

    result.sort_by(|a, b| a.friend_id.cmp(&b.friend_id));
    Ok(result)
}

pub fn inbox(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<PrayerReminder>> {
    ReminderRepo::list_for_receiver(conn, user_id, limit)
}

/// Only the receiver can mark a reminder as read.
pub fn mark_read(conn: &Connection, user_id: &str, reminder_id: i64) -> Result<bool> {
    match ReminderRepo::get(conn, reminder_id)? {
        Some(r) if r.receiver_id == user_id => {
            ReminderRepo::set_status(conn, reminder_id, ReminderStatus::Read)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{ExceptionKind, PrayerScoreResult, PrivacyConfig, PrivacyLevel};
    use std::cell::RefCell;

    struct Recording {
        seen: RefCell<Vec<i64>>,
        fail: bool,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl ReminderDispatcher for Recording {
        fn dispatch(&self, reminder: &PrayerReminder) -> Result<()> {
            if self.fail {
                anyhow::bail!("push channel down");
            }
            self.seen.borrow_mut().push(reminder.id);
            Ok(())
        }
    }

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn befriend(conn: &Connection, a: &str, b: &str) {
        FriendRepo::request(conn, a, b).unwrap();
        FriendRepo::accept(conn, b, a).unwrap();
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    fn send(conn: &Connection, d: &dyn ReminderDispatcher, from: &str, to: &str) -> SendOutcome {
        send_prayer_reminder(conn, d, from, to, PrayerType::Dhuhr, Some("Dhuhr time"), now())
            .unwrap()
    }

    #[test]
    fn friends_get_delivered_reminders() {
        let conn = db();
        befriend(&conn, "a", "b");
        let d = Recording::new();

        let outcome = send(&conn, &d, "a", "b");
        let SendOutcome::Sent { reminder_id, delivered } = outcome else {
            panic!("expected send, got {:?}", outcome);
        };
        assert!(delivered);
        assert_eq!(*d.seen.borrow(), vec![reminder_id]);

        let stored = ReminderRepo::get(&conn, reminder_id).unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Delivered);
        assert_eq!(stored.message, "Dhuhr time");
    }

    #[test]
    fn strangers_are_denied_and_nothing_is_stored() {
        let conn = db();
        let d = Recording::new();
        assert_eq!(send(&conn, &d, "a", "b"), SendOutcome::Denied(DenyReason::NotFriends));
        assert!(inbox(&conn, "b", DEFAULT_INBOX_LIMIT).unwrap().is_empty());
        assert!(d.seen.borrow().is_empty());
    }

    #[test]
    fn sender_toggle_is_checked_from_the_store() {
        let conn = db();
        befriend(&conn, "a", "b");
        let mut cfg = PrivacyConfig::default();
        cfg.set_reminder_sending(false);
        PrivacyRepo::put(&conn, "a", &cfg).unwrap();

        let d = Recording::new();
        assert_eq!(send(&conn, &d, "a", "b"), SendOutcome::Denied(DenyReason::SenderDisabled));
    }

    #[test]
    fn muted_receiver_keeps_reminder_as_sent() {
        let conn = db();
        befriend(&conn, "a", "b");
        let mut cfg = PrivacyConfig::default();
        cfg.notifications.friend_reminders = false;
        PrivacyRepo::put(&conn, "b", &cfg).unwrap();

        let d = Recording::new();
        let SendOutcome::Sent { reminder_id, delivered } = send(&conn, &d, "a", "b") else {
            panic!("expected send");
        };
        assert!(!delivered);
        assert!(d.seen.borrow().is_empty());
        let stored = ReminderRepo::get(&conn, reminder_id).unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
    }

    #[test]
    fn dispatch_failure_leaves_reminder_sent() {
        let conn = db();
        befriend(&conn, "a", "b");
        let d = Recording {
            seen: RefCell::new(Vec::new()),
            fail: true,
        };
        let SendOutcome::Sent { reminder_id, delivered } = send(&conn, &d, "a", "b") else {
            panic!("expected send");
        };
        assert!(!delivered);
        let stored = ReminderRepo::get(&conn, reminder_id).unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
    }

    #[test]
    fn only_the_receiver_marks_read() {
        let conn = db();
        befriend(&conn, "a", "b");
        let d = Recording::new();
        let SendOutcome::Sent { reminder_id, .. } = send(&conn, &d, "a", "b") else {
            panic!("expected send");
        };
        assert!(!mark_read(&conn, "a", reminder_id).unwrap());
        assert!(mark_read(&conn, "b", reminder_id).unwrap());
        assert_eq!(inbox(&conn, "b", 5).unwrap()[0].status, ReminderStatus::Read);
        assert!(!mark_read(&conn, "b", 4242).unwrap());
    }

    #[test]
    fn pending_list_skips_hidden_and_already_prayed_friends() {
        let conn = db();
        for f in ["carol", "bob", "dina", "eve"] {
            befriend(&conn, "me", f);
        }

        // dina hides her status
        let mut hidden = PrivacyConfig::default();
        hidden.set_status_visibility(PrivacyLevel::None);
        PrivacyRepo::put(&conn, "dina", &hidden).unwrap();

        // eve already prayed
        let t = now();
        let done = PrayerScoreResult {
            prayer: PrayerType::Dhuhr,
            scheduled_start: t,
            registered_at: t,
            at_mosque: false,
            score: 10.0,
        };
        RecordRepo::insert(&conn, "eve", "2024-03-10", &done).unwrap();

        // carol blocks me
        let mut blocking = PrivacyConfig::default();
        blocking.add_exception(ExceptionKind::Blocked, "me");
        PrivacyRepo::put(&conn, "carol", &blocking).unwrap();

        let pending =
            friends_who_havent_prayed(&conn, "me", PrayerType::Dhuhr, t.date()).unwrap();
        assert_eq!(
            pending,
            vec![
                PendingFriend {
                    friend_id: "bob".to_string(),
                    can_send_reminder: true,
                    reason_if_blocked: None,
                },
                PendingFriend {
                    friend_id: "carol".to_string(),
                    can_send_reminder: false,
                    reason_if_blocked: Some("EXPLICITLY_BLOCKED".to_string()),
                },
            ]
        );
    }

    #[test]
    fn public_status_is_visible_to_strangers() {
        let conn = db();
        assert!(!can_view_prayer_status(&conn, "a", "b").unwrap());
        let mut open = PrivacyConfig::default();
        open.set_status_visibility(PrivacyLevel::Everyone);
        PrivacyRepo::put(&conn, "b", &open).unwrap();
        assert!(can_view_prayer_status(&conn, "a", "b").unwrap());
        assert!(can_view_prayer_status(&conn, "a", "a").unwrap());
    }
}
