use anyhow::{anyhow, bail, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;
use rusqlite::Connection;
use std::str::FromStr;

use crate::cli::args::{FriendCommands, MissedCommands, PrivacyCommands};
use crate::config::AppConfig;
use crate::db::repository::{FriendRepo, PrivacyRepo, RecordRepo, StatsRepo};
use crate::engine::PrayerWindowEngine;
use crate::models::{ExceptionKind, PrayerStatus, PrayerType, PrivacyConfig, PrivacyLevel};
use crate::prayer_times::{plan_registration, registration_time, PrayerCalculator, Registration, CALC_METHODS};
use crate::social::reminders::{self, LogDispatcher, SendOutcome};
use crate::utils::format::{format_duration_secs, format_score, format_time, progress_bar};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

/// `times` highlights the next prayer when it starts within this many seconds.
const UPCOMING_NOTICE_SECS: i64 = 15 * 60;

fn who(config: &AppConfig) -> String {
    match &config.user.display_name {
        Some(name) => format!("{} ({})", name, config.user.id),
        None => config.user.id.clone(),
    }
}

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_prayer(s: &str) -> Result<PrayerType> {
    PrayerType::from_str(s)
        .map_err(|_| anyhow!("Unknown prayer '{}'. Use: fajr, dhuhr, asr, maghrib, isha", s))
}

// ─── Setup ───────────────────────────────────────────────────────────────────

pub struct SetupArgs {
    pub user: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub method: Option<String>,
    pub madhab: Option<String>,
    pub tz: Option<String>,
}

pub fn handle_setup(conn: &Connection, config: &mut AppConfig, args: SetupArgs) -> Result<()> {
    if let Some(user) = args.user {
        config.user.id = user;
    }
    if let Some(name) = args.name {
        config.user.display_name = Some(name).filter(|n| !n.trim().is_empty());
    }
    if let Some(location) = args.location {
        config.salah.location_name = location;
    }
    if let Some(lat) = args.lat {
        if !(-90.0..=90.0).contains(&lat) {
            bail!("Latitude must be between -90 and 90");
        }
        config.salah.latitude = lat;
    }
    if let Some(lng) = args.lng {
        if !(-180.0..=180.0).contains(&lng) {
            bail!("Longitude must be between -180 and 180");
        }
        config.salah.longitude = lng;
    }
    if let Some(method) = args.method {
        if !CALC_METHODS.contains(&method.as_str()) {
            bail!("Unknown method '{}'. Options: {}", method, CALC_METHODS.join(", "));
        }
        config.salah.calc_method = method;
    }
    if let Some(madhab) = args.madhab {
        config.salah.madhab = madhab;
    }
    if let Some(tz) = args.tz {
        config.salah.timezone_offset =
            parse_tz_offset(&tz).map_err(|e| anyhow!("Bad timezone '{}': {}", tz, e))?;
    }

    // Validates method + madhab and drops times cached for the old location
    PrayerCalculator::open(conn, &config.salah)?;
    config.save()?;

    println_colored!(GREEN, "  ✓ Configuration saved");
    println!(
        "  {} · {} ({:.4}, {:.4}) · {} / {} · UTC{}",
        who(config),
        config.salah.location_name,
        config.salah.latitude,
        config.salah.longitude,
        config.salah.calc_method,
        config.salah.madhab,
        format_tz_offset(config.salah.timezone_offset)
    );
    Ok(())
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(conn: &Connection, config: &AppConfig) -> Result<()> {
    let now = now_local();
    let today = now.date();
    let calc = PrayerCalculator::open(conn, &config.salah)?;
    calc.ensure_cached(conn, today, 7)?;
    let prefs = PrivacyRepo::get(conn, &config.user.id)?
        .unwrap_or_default()
        .notifications;

    let windows = calc.windows_for_date(conn, today)?;
    let records = RecordRepo::get_by_date(conn, &config.user.id, &date_str(today))?;

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times — {} ({})",
        config.salah.location_name,
        date_str(today)
    );
    println!();

    for window in &windows {
        let record = records.iter().find(|r| r.prayer == window.prayer());
        let status = PrayerWindowEngine::get_status(window, now, record.is_some());
        let span = format!(
            "{} – {}",
            format_time(window.scheduled_start()),
            format_time(window.scheduled_end())
        );
        match (status, record) {
            (PrayerStatus::Completed, Some(r)) => println_colored!(
                GREEN,
                "  {:<10}  {}  ✓ {}",
                window.prayer().display_name(),
                span,
                format_score(r.score)
            ),
            (PrayerStatus::Active, _) => println_colored!(
                BOLD,
                "  {:<10}  {}  ● {}",
                window.prayer().display_name(),
                span,
                status
            ),
            (PrayerStatus::Missed, _) => println_colored!(
                RED,
                "  {:<10}  {}  ✗ {}",
                window.prayer().display_name(),
                span,
                status
            ),
            _ => println_colored!(DIM, "  {:<10}  {}", window.prayer().display_name(), span),
        }
    }

    let (next_prayer, secs) = calc.get_next_prayer(conn, now)?;
    println!();
    if prefs.upcoming_prayers && secs <= UPCOMING_NOTICE_SECS {
        println_colored!(
            BOLD,
            "  Next: {} in {} — get ready",
            next_prayer.display_name(),
            format_duration_secs(secs)
        );
    } else {
        println_colored!(
            AMBER,
            "  Next: {} in {}",
            next_prayer.display_name(),
            format_duration_secs(secs)
        );
    }

    if prefs.missed_prayers {
        let missed = RecordRepo::get_missed(conn, &config.user.id)?.len();
        if missed > 0 {
            println_colored!(RED, "  {} missed prayer(s) to make up — see `missed list`", missed);
        }
    }
    if prefs.daily_summary {
        let day = StatsRepo::get_daily_stats_range(conn, &config.user.id, today, today)?;
        if let Some(stats) = day.first() {
            println_colored!(
                DIM,
                "  Today so far: {} / 10 ({}/5 registered)",
                format_score(stats.average),
                stats.prayers_registered
            );
        }
    }
    println!();
    Ok(())
}

// ─── Register ────────────────────────────────────────────────────────────────

pub fn handle_register(
    conn: &Connection,
    config: &AppConfig,
    prayer_str: &str,
    at_mosque: bool,
    at: Option<&str>,
) -> Result<()> {
    let prayer = parse_prayer(prayer_str)?;
    let clock = at
        .map(|s| {
            NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow!("Bad time '{}'. Use HH:MM", s))
        })
        .transpose()?;
    let registered_at = registration_time(now_local(), clock)?;

    let calc = PrayerCalculator::open(conn, &config.salah)?;
    let date = registered_at.date();
    let today = calc.windows_for_date(conn, date)?;
    let yesterday = match date.pred_opt() {
        Some(previous) => calc.windows_for_date(conn, previous)?,
        None => Vec::new(),
    };

    let (window, result, date) =
        match plan_registration(prayer, registered_at, at_mosque, &yesterday, &today)? {
            Registration::NotStarted(window) => {
                println_colored!(
                    AMBER,
                    "  {} has not started yet (begins {}). Nothing recorded.",
                    prayer.display_name(),
                    format_time(window.scheduled_start())
                );
                return Ok(());
            }
            Registration::Record { date, window, result } => (window, result, date_str(date)),
        };
    log::debug!("Scored {} for {} on {}: {}", prayer, config.user.id, date, result.score);

    match RecordRepo::insert(conn, &config.user.id, &date, &result)? {
        None => {
            println_colored!(AMBER, "  {} is already registered for {}", prayer.display_name(), date);
        }
        Some(_) if result.at_mosque => {
            println_colored!(GREEN, "  ✓ {} at the mosque — 10.0", prayer.display_name());
        }
        Some(_) if result.score == 0.0 => {
            println_colored!(
                RED,
                "  ✗ {} window closed at {} — recorded as missed (0.0)",
                prayer.display_name(),
                format_time(window.scheduled_end())
            );
        }
        Some(_) => {
            println_colored!(
                GREEN,
                "  ✓ {} registered — {}  {}",
                prayer.display_name(),
                format_score(result.score),
                progress_bar(result.score, 10.0, 10)
            );
        }
    }
    Ok(())
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub fn handle_stats(conn: &Connection, config: &AppConfig, week: bool) -> Result<()> {
    let user = &config.user.id;
    let today = now_local().date();

    let streak = StatsRepo::calculate_streak(conn, user, today)?;
    let today_stats = StatsRepo::get_daily_stats_range(conn, user, today, today)?;
    let missed = RecordRepo::get_missed(conn, user)?.len();

    println!();
    println_colored!(GOLD, "  Statistics");
    println!();
    if let Some(stats) = today_stats.first() {
        println_colored!(
            BOLD,
            "  Today:       {} / 10  ({}/5 registered)",
            format_score(stats.average),
            stats.prayers_registered
        );
    }
    println_colored!(
        BOLD,
        "  Streak:      {} days current  |  {} days best",
        streak.current,
        streak.best
    );
    if missed == 0 {
        println_colored!(GREEN, "  Missed:      0 prayers ✓");
    } else {
        println_colored!(AMBER, "  Missed:      {} prayers to make up", missed);
    }

    if week {
        let start = today - chrono::Duration::days(6);
        println!();
        println_colored!(DIM, "  Last 7 days (daily average over 5 prayers)");
        println!();
        for stat in StatsRepo::get_daily_stats_range(conn, user, start, today)? {
            println!(
                "  {}  {:>4}  {}  {}/5",
                stat.date,
                format_score(stat.average),
                progress_bar(stat.average, 10.0, 10),
                stat.prayers_registered
            );
        }
    }

    println!();
    Ok(())
}

// ─── Missed ──────────────────────────────────────────────────────────────────

pub fn handle_missed(conn: &Connection, config: &AppConfig, action: &MissedCommands) -> Result<()> {
    let user = &config.user.id;
    match action {
        MissedCommands::List => {
            let missed = RecordRepo::get_missed(conn, user)?;
            println!();
            if missed.is_empty() {
                println_colored!(GREEN, "  ✓ No missed prayers. Keep it up.");
            } else {
                println_colored!(AMBER, "  Missed prayers ({})", missed.len());
                println!();
                for r in &missed {
                    println!(
                        "  #{:<5} {}  {:<8} registered {}",
                        r.id,
                        r.date,
                        r.prayer.display_name(),
                        format_time(r.registered_at)
                    );
                }
            }
            println!();
        }
        MissedCommands::Makeup { id } => {
            if RecordRepo::mark_made_up(conn, user, *id)? {
                println_colored!(GREEN, "  ✓ Prayer #{} marked as made up", id);
            } else {
                println_colored!(AMBER, "  No outstanding missed prayer #{}", id);
            }
        }
    }
    Ok(())
}

// ─── Privacy ─────────────────────────────────────────────────────────────────

fn on_off(state: &str) -> bool {
    state == "on"
}

pub fn handle_privacy(conn: &Connection, config: &AppConfig, action: &PrivacyCommands) -> Result<()> {
    let user = &config.user.id;
    let mut settings = PrivacyRepo::get_or_create(conn, user)?;

    match action {
        PrivacyCommands::Show => {
            println!();
            println_colored!(GOLD, "  Privacy — {}", who(config));
            println!();
            println!("  Status visible to:     {}", settings.status_visibility);
            println!("  Reminders accepted from: {}", settings.reminder_permission);
            println!("  Always allow:          {}", join_or_dash(settings.allow_list()));
            println!("  Never allow:           {}", join_or_dash(settings.block_list()));
            println!(
                "  Sending reminders:     {}",
                if settings.reminder_sending_enabled { "on" } else { "off" }
            );
            println!();
            println_colored!(DIM, "  Notifications");
            for (kind, enabled) in notification_rows(&settings) {
                println!("  {:<22} {}", kind, if enabled { "on" } else { "off" });
            }
            println!();
            return Ok(());
        }
        PrivacyCommands::Visibility { level } => {
            settings.set_status_visibility(PrivacyLevel::from_str(level)?);
        }
        PrivacyCommands::Reminders { level } => {
            settings.set_reminder_permission(PrivacyLevel::from_str(level)?);
        }
        PrivacyCommands::Allow { user: other } => {
            settings.add_exception(ExceptionKind::Allowed, other);
        }
        PrivacyCommands::Block { user: other } => {
            settings.add_exception(ExceptionKind::Blocked, other);
        }
        PrivacyCommands::Unlist { user: other } => {
            let was_allowed = settings.remove_exception(ExceptionKind::Allowed, other);
            let was_blocked = settings.remove_exception(ExceptionKind::Blocked, other);
            if !was_allowed && !was_blocked {
                println_colored!(DIM, "  {} is not on either list", other);
                return Ok(());
            }
        }
        PrivacyCommands::Sending { state } => {
            settings.set_reminder_sending(on_off(state));
        }
        PrivacyCommands::Notify { kind, state } => {
            let prefs = &mut settings.notifications;
            let slot = match kind.as_str() {
                "friend-reminders" => &mut prefs.friend_reminders,
                "missed-prayers" => &mut prefs.missed_prayers,
                "upcoming-prayers" => &mut prefs.upcoming_prayers,
                "daily-summary" => &mut prefs.daily_summary,
                other => bail!("Unknown notification '{}'", other),
            };
            *slot = on_off(state);
        }
    }

    PrivacyRepo::put(conn, user, &settings)?;
    println_colored!(GREEN, "  ✓ Privacy settings updated");
    Ok(())
}

fn notification_rows(settings: &PrivacyConfig) -> [(&'static str, bool); 4] {
    let n = &settings.notifications;
    [
        ("friend-reminders", n.friend_reminders),
        ("missed-prayers", n.missed_prayers),
        ("upcoming-prayers", n.upcoming_prayers),
        ("daily-summary", n.daily_summary),
    ]
}

fn join_or_dash(ids: &BTreeSet<String>) -> String {
    if ids.is_empty() {
        "—".to_string()
    } else {
        ids.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

// ─── Friends ─────────────────────────────────────────────────────────────────

pub fn handle_friend(conn: &Connection, config: &AppConfig, action: &FriendCommands) -> Result<()> {
    let me = &config.user.id;
    match action {
        FriendCommands::Add { user } => {
            if user == me {
                bail!("You cannot befriend yourself");
            }
            if FriendRepo::request(conn, me, user)? {
                println_colored!(GREEN, "  ✓ Friend request sent to {}", user);
            } else {
                println_colored!(DIM, "  Request to {} already exists", user);
            }
        }
        FriendCommands::Accept { user } => {
            if FriendRepo::accept(conn, me, user)? {
                println_colored!(GREEN, "  ✓ You and {} are now friends", user);
            } else {
                println_colored!(AMBER, "  No pending request from {}", user);
            }
        }
        FriendCommands::Remove { user } => {
            if FriendRepo::remove(conn, me, user)? {
                println_colored!(DIM, "  Removed {}", user);
            } else {
                println_colored!(AMBER, "  {} is not a friend", user);
            }
        }
        FriendCommands::List => {
            let friends = FriendRepo::list_friends(conn, me)?;
            let incoming = FriendRepo::incoming_requests(conn, me)?;
            println!();
            println_colored!(GOLD, "  Friends ({})", friends.len());
            for f in &friends {
                println!("  {}", f);
            }
            if !incoming.is_empty() {
                println!();
                println_colored!(AMBER, "  Waiting for you to accept");
                for f in &incoming {
                    println!("  {}", f);
                }
            }
            println!();
        }
    }
    Ok(())
}

// ─── Reminders ───────────────────────────────────────────────────────────────

pub fn handle_remind(
    conn: &Connection,
    config: &AppConfig,
    receiver: &str,
    prayer_str: &str,
    message: Option<&str>,
) -> Result<()> {
    let prayer = parse_prayer(prayer_str)?;
    let outcome = reminders::send_prayer_reminder(
        conn,
        &LogDispatcher,
        &config.user.id,
        receiver,
        prayer,
        message,
        now_local(),
    )?;

    match outcome {
        SendOutcome::Sent { reminder_id, delivered: true } => {
            println_colored!(GREEN, "  ✓ Reminder #{} delivered to {}", reminder_id, receiver);
        }
        SendOutcome::Sent { reminder_id, delivered: false } => {
            println_colored!(AMBER, "  Reminder #{} sent to {} (not delivered)", reminder_id, receiver);
        }
        SendOutcome::Denied(reason) => {
            println_colored!(RED, "  ✗ Cannot send reminder: {}", reason);
        }
    }
    Ok(())
}

pub fn handle_pending(conn: &Connection, config: &AppConfig, prayer_str: &str) -> Result<()> {
    let prayer = parse_prayer(prayer_str)?;
    let today = now_local().date();
    let pending = reminders::friends_who_havent_prayed(conn, &config.user.id, prayer, today)?;

    println!();
    if pending.is_empty() {
        println_colored!(GREEN, "  ✓ Every visible friend has registered {}", prayer.display_name());
    } else {
        println_colored!(AMBER, "  Not yet registered {}", prayer.display_name());
        println!();
        for p in &pending {
            match &p.reason_if_blocked {
                None => println!("  {:<20} can remind", p.friend_id),
                Some(reason) => println_colored!(DIM, "  {:<20} {}", p.friend_id, reason),
            }
        }
    }
    println!();
    Ok(())
}

pub fn handle_inbox(conn: &Connection, config: &AppConfig, limit: u32) -> Result<()> {
    let inbox = reminders::inbox(conn, &config.user.id, limit)?;
    println!();
    println_colored!(GOLD, "  Inbox — {}", who(config));
    println!();
    if inbox.is_empty() {
        println_colored!(DIM, "  No reminders");
    }
    for r in &inbox {
        let line = format!(
            "  #{:<5} {} {}  {:<8} from {}{}",
            r.id,
            r.sent_at.format("%Y-%m-%d"),
            format_time(r.sent_at),
            r.prayer.display_name(),
            r.sender_id,
            if r.message.is_empty() { String::new() } else { format!(" — {}", r.message) }
        );
        match r.status {
            crate::models::ReminderStatus::Read => println_colored!(DIM, "{}", line),
            _ => println_colored!(BOLD, "{}", line),
        }
    }
    println!();
    Ok(())
}

pub fn handle_read(conn: &Connection, config: &AppConfig, id: i64) -> Result<()> {
    if reminders::mark_read(conn, &config.user.id, id)? {
        println_colored!(GREEN, "  ✓ Reminder #{} marked as read", id);
    } else {
        println_colored!(AMBER, "  No reminder #{} in your inbox", id);
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Parse a UTC offset string into total minutes.
/// Accepts: "5:30", "+5:30", "-5:30", "5", "+5", "5.5"
fn parse_tz_offset(s: &str) -> Result<i32> {
    let s = s.trim_start_matches('+');
    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-');
    let sign = if negative { -1 } else { 1 };

    let minutes = if s.contains(':') {
        let mut parts = s.splitn(2, ':');
        let hours: i32 = parts.next().unwrap_or("0").parse()?;
        let mins: i32 = parts.next().unwrap_or("0").parse()?;
        hours * 60 + mins
    } else if s.contains('.') {
        let hours: f64 = s.parse()?;
        (hours * 60.0).round() as i32
    } else {
        let hours: i32 = s.parse()?;
        hours * 60
    };

    if minutes > 14 * 60 {
        bail!("offset out of range");
    }
    Ok(sign * minutes)
}

/// Format total minutes as "+H:MM" string
fn format_tz_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { "-" } else { "+" };
    let abs = minutes.abs();
    let h = abs / 60;
    let m = abs % 60;
    if m == 0 {
        format!("{}{}", sign, h)
    } else {
        format!("{}{}:{:02}", sign, h, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tz_offsets_parse() {
        assert_eq!(parse_tz_offset("5").unwrap(), 300);
        assert_eq!(parse_tz_offset("+5:30").unwrap(), 330);
        assert_eq!(parse_tz_offset("-4").unwrap(), -240);
        assert_eq!(parse_tz_offset("5.75").unwrap(), 345);
        assert!(parse_tz_offset("abc").is_err());
        assert!(parse_tz_offset("20").is_err());
    }

    #[test]
    fn display_name_is_shown_next_to_the_id() {
        let mut config = AppConfig::default();
        assert_eq!(who(&config), "me");
        config.user.display_name = Some("Amina".to_string());
        assert_eq!(who(&config), "Amina (me)");
    }

    #[test]
    fn every_notification_preference_is_listed() {
        let mut settings = PrivacyConfig::default();
        settings.notifications.daily_summary = true;
        settings.notifications.missed_prayers = false;
        let rows = notification_rows(&settings);
        assert_eq!(
            rows,
            [
                ("friend-reminders", true),
                ("missed-prayers", false),
                ("upcoming-prayers", true),
                ("daily-summary", true),
            ]
        );
    }

    #[test]
    fn tz_offsets_format() {
        assert_eq!(format_tz_offset(300), "+5");
        assert_eq!(format_tz_offset(330), "+5:30");
        assert_eq!(format_tz_offset(-210), "-3:30");
    }
}
