use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::engine::PrayerWindowEngine;
use crate::models::{
    DailyStats, PrayerRecord, PrayerReminder, PrayerScoreResult, PrayerType, PrivacyConfig,
    ReminderStatus, Streak,
};
use crate::prayer_times::DayTimes;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

pub fn format_datetime(t: NaiveDateTime) -> String {
    t.format(DATETIME_FMT).to_string()
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).with_context(|| format!("Bad timestamp '{}'", s))
}

/// Read column `idx` and parse it, surfacing failures as a column conversion error.
fn parsed_column<T, E>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ─── Cached prayer times ────────────────────────────────────────────────────

pub struct CacheRepo;

impl CacheRepo {
    pub fn get_times_for_date(conn: &Connection, date: &str) -> Result<Option<DayTimes>> {
        let row = conn
            .query_row(
                "SELECT fajr, sunrise, dhuhr, asr, maghrib, isha FROM prayer_times_cache WHERE date = ?1",
                params![date],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((fajr, sunrise, dhuhr, asr, maghrib, isha)) => Ok(Some(DayTimes {
                fajr: parse_datetime(&fajr)?,
                sunrise: parse_datetime(&sunrise)?,
                dhuhr: parse_datetime(&dhuhr)?,
                asr: parse_datetime(&asr)?,
                maghrib: parse_datetime(&maghrib)?,
                isha: parse_datetime(&isha)?,
            })),
        }
    }

    pub fn clear_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM prayer_times_cache", [])?;
        Ok(())
    }

    pub fn store_times(conn: &Connection, date: &str, times: &DayTimes) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO prayer_times_cache (date, fajr, sunrise, dhuhr, asr, maghrib, isha)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                date,
                format_datetime(times.fajr),
                format_datetime(times.sunrise),
                format_datetime(times.dhuhr),
                format_datetime(times.asr),
                format_datetime(times.maghrib),
                format_datetime(times.isha),
            ],
        )?;
        Ok(())
    }
}

// ─── App metadata ───────────────────────────────────────────────────────────

/// Small key/value store for bookkeeping that is not user data.
pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}

// ─── Prayer records ──────────────────────────────────────────────────────────

const RECORD_COLUMNS: &str = "id, user_id, date, prayer_type, scheduled_start, registered_at,
                              at_mosque, score, made_up";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PrayerRecord> {
    Ok(PrayerRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        prayer: parsed_column(row, 3)?,
        scheduled_start: datetime_column(row, 4)?,
        registered_at: datetime_column(row, 5)?,
        at_mosque: row.get::<_, i32>(6)? != 0,
        score: row.get(7)?,
        made_up: row.get::<_, i32>(8)? != 0,
    })
}

pub struct RecordRepo;

impl RecordRepo {
    /// Append a scored registration. Returns `None` when the user already
    /// registered this prayer on this date.
    pub fn insert(
        conn: &Connection,
        user_id: &str,
        date: &str,
        result: &PrayerScoreResult,
    ) -> Result<Option<i64>> {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO prayer_records
                (user_id, date, prayer_type, scheduled_start, registered_at, at_mosque, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                date,
                result.prayer.as_str(),
                format_datetime(result.scheduled_start),
                format_datetime(result.registered_at),
                result.at_mosque as i32,
                result.score,
            ],
        )?;
        Ok((inserted == 1).then(|| conn.last_insert_rowid()))
    }

    pub fn get_by_date(conn: &Connection, user_id: &str, date: &str) -> Result<Vec<PrayerRecord>> {
        Self::get_date_range(conn, user_id, date, date)
    }

    pub fn get_date_range(
        conn: &Connection,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<PrayerRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM prayer_records WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, CASE prayer_type
               WHEN 'fajr' THEN 1 WHEN 'dhuhr' THEN 2 WHEN 'asr' THEN 3
               WHEN 'maghrib' THEN 4 WHEN 'isha' THEN 5 END"
        ))?;

        let rows = stmt.query_map(params![user_id, start, end], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn has_registered(
        conn: &Connection,
        user_id: &str,
        date: &str,
        prayer: PrayerType,
    ) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM prayer_records WHERE user_id = ?1 AND date = ?2 AND prayer_type = ?3",
                params![user_id, date, prayer.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Zero-scored, non-mosque registrations that have not been made up yet.
    pub fn get_missed(conn: &Connection, user_id: &str) -> Result<Vec<PrayerRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM prayer_records
             WHERE user_id = ?1 AND score = 0 AND at_mosque = 0 AND made_up = 0
             ORDER BY date, id"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn mark_made_up(conn: &Connection, user_id: &str, id: i64) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE prayer_records SET made_up = 1, made_up_at = datetime('now')
             WHERE id = ?1 AND user_id = ?2 AND score = 0 AND at_mosque = 0 AND made_up = 0",
            params![id, user_id],
        )?;
        Ok(updated == 1)
    }
}

// ─── Privacy settings ────────────────────────────────────────────────────────

/// Keyed get/put store for each user's [`PrivacyConfig`], kept as JSON.
pub struct PrivacyRepo;

impl PrivacyRepo {
    pub fn get(conn: &Connection, user_id: &str) -> Result<Option<PrivacyConfig>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT settings FROM privacy_settings WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            None => Ok(None),
            Some(json) => {
                let mut config: PrivacyConfig = serde_json::from_str(&json)
                    .with_context(|| format!("Parsing privacy settings for '{}'", user_id))?;
                config.normalize();
                Ok(Some(config))
            }
        }
    }

    /// Reads the config, writing the defaults first if the user has none.
    pub fn get_or_create(conn: &Connection, user_id: &str) -> Result<PrivacyConfig> {
        if let Some(config) = Self::get(conn, user_id)? {
            return Ok(config);
        }
        let config = PrivacyConfig::default();
        Self::put(conn, user_id, &config)?;
        log::debug!("Created default privacy settings for {}", user_id);
        Ok(config)
    }

    pub fn put(conn: &Connection, user_id: &str, config: &PrivacyConfig) -> Result<()> {
        let json = serde_json::to_string(config).context("Serializing privacy settings")?;
        conn.execute(
            "INSERT INTO privacy_settings (user_id, settings) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET settings = ?2, updated_at = datetime('now')",
            params![user_id, json],
        )?;
        Ok(())
    }
}

// ─── Friendships ─────────────────────────────────────────────────────────────

pub struct FriendRepo;

impl FriendRepo {
    /// Record an outgoing request. A no-op if any row already exists.
    pub fn request(conn: &Connection, user_id: &str, friend_id: &str) -> Result<bool> {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO friendships (user_id, friend_id, status) VALUES (?1, ?2, 'pending')",
            params![user_id, friend_id],
        )?;
        Ok(inserted == 1)
    }

    /// Accept `requester`'s pending request, making the relationship mutual.
    pub fn accept(conn: &Connection, user_id: &str, requester: &str) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE friendships SET status = 'accepted'
             WHERE user_id = ?1 AND friend_id = ?2 AND status = 'pending'",
            params![requester, user_id],
        )?;
        if updated == 0 {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO friendships (user_id, friend_id, status) VALUES (?1, ?2, 'accepted')
             ON CONFLICT(user_id, friend_id) DO UPDATE SET status = 'accepted'",
            params![user_id, requester],
        )?;
        Ok(true)
    }

    pub fn remove(conn: &Connection, user_id: &str, friend_id: &str) -> Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM friendships
             WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
            params![user_id, friend_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn are_friends(conn: &Connection, a: &str, b: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM friendships
             WHERE status = 'accepted'
               AND ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))",
            params![a, b],
            |row| row.get(0),
        )?;
        Ok(count == 2)
    }

    pub fn list_friends(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT a.friend_id FROM friendships a
             JOIN friendships b ON b.user_id = a.friend_id AND b.friend_id = a.user_id
             WHERE a.user_id = ?1 AND a.status = 'accepted' AND b.status = 'accepted'
             ORDER BY a.friend_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    /// Users waiting for `user_id` to accept them.
    pub fn incoming_requests(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM friendships
             WHERE friend_id = ?1 AND status = 'pending'
             ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }
}

// ─── Reminders ───────────────────────────────────────────────────────────────

fn row_to_reminder(row: &Row<'_>) -> rusqlite::Result<PrayerReminder> {
    let status: String = row.get(5)?;
    let status = ReminderStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into())
    })?;
    Ok(PrayerReminder {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        prayer: parsed_column(row, 3)?,
        sent_at: datetime_column(row, 4)?,
        status,
        message: row.get(6)?,
    })
}

pub struct ReminderRepo;

impl ReminderRepo {
    pub fn insert(
        conn: &Connection,
        sender_id: &str,
        receiver_id: &str,
        prayer: PrayerType,
        sent_at: NaiveDateTime,
        message: &str,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO prayer_reminders (sender_id, receiver_id, prayer_type, sent_at, status, message)
             VALUES (?1, ?2, ?3, ?4, 'sent', ?5)",
            params![sender_id, receiver_id, prayer.as_str(), format_datetime(sent_at), message],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<PrayerReminder>> {
        conn.query_row(
            "SELECT id, sender_id, receiver_id, prayer_type, sent_at, status, message
             FROM prayer_reminders WHERE id = ?1",
            params![id],
            row_to_reminder,
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set_status(conn: &Connection, id: i64, status: ReminderStatus) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE prayer_reminders SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(updated == 1)
    }

    /// Newest first.
    pub fn list_for_receiver(
        conn: &Connection,
        receiver_id: &str,
        limit: u32,
    ) -> Result<Vec<PrayerReminder>> {
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, receiver_id, prayer_type, sent_at, status, message
             FROM prayer_reminders WHERE receiver_id = ?1
             ORDER BY sent_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![receiver_id, limit], row_to_reminder)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }
}

// ─── Stats repo ──────────────────────────────────────────────────────────────

pub struct StatsRepo;

impl StatsRepo {
    /// One entry per calendar day in `[start, end]`, including empty days.
    pub fn get_daily_stats_range(
        conn: &Connection,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStats>> {
        let records = RecordRepo::get_date_range(
            conn,
            user_id,
            &start.format(DATE_FMT).to_string(),
            &end.format(DATE_FMT).to_string(),
        )?;

        let mut by_date: BTreeMap<String, Vec<PrayerScoreResult>> = BTreeMap::new();
        for r in &records {
            by_date.entry(r.date.clone()).or_default().push(r.as_score());
        }

        let mut result = Vec::new();
        let mut day = start;
        while day <= end {
            let date = day.format(DATE_FMT).to_string();
            let scores = by_date.remove(&date).unwrap_or_default();
            result.push(DailyStats {
                prayers_registered: scores.len() as u8,
                average: PrayerWindowEngine::daily_average(&scores),
                date,
            });
            day += Duration::days(1);
        }
        Ok(result)
    }

    /// A day counts toward the streak when all five prayers were registered
    /// with a non-zero score. Today may still be in progress, so the current
    /// streak may end yesterday.
    pub fn calculate_streak(conn: &Connection, user_id: &str, today: NaiveDate) -> Result<Streak> {
        let mut stmt = conn.prepare(
            "SELECT date FROM prayer_records
             WHERE user_id = ?1 AND score > 0
             GROUP BY date
             HAVING COUNT(DISTINCT prayer_type) >= 5
             ORDER BY date DESC",
        )?;

        let dates: Vec<NaiveDate> = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .iter()
            .filter_map(|s| NaiveDate::parse_from_str(s, DATE_FMT).ok())
            .collect();

        let yesterday = today.pred_opt().unwrap_or(today);
        let mut current = 0u32;
        let mut check_date = match dates.first() {
            Some(d) if *d == today || *d == yesterday => *d,
            _ => return Ok(Streak { current: 0, best: calculate_best_streak(&dates) }),
        };

        for d in &dates {
            if *d != check_date {
                break;
            }
            current += 1;
            check_date = check_date.pred_opt().unwrap_or(check_date);
        }

        Ok(Streak {
            current,
            best: calculate_best_streak(&dates),
        })
    }
}

fn calculate_best_streak(dates: &[NaiveDate]) -> u32 {
    if dates.is_empty() {
        return 0;
    }

    let mut sorted = dates.to_vec();
    sorted.sort();

    let mut best = 0u32;
    let mut current = 1u32;

    for i in 1..sorted.len() {
        let prev = sorted[i - 1];
        let curr = sorted[i];
        if curr == prev.succ_opt().unwrap_or(curr) {
            current += 1;
        } else {
            current = 1;
        }
        best = best.max(current);
    }
    best.max(current)
}
