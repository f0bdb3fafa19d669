use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS prayer_records (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id          TEXT NOT NULL,
            date             TEXT NOT NULL,
            prayer_type      TEXT NOT NULL CHECK(prayer_type IN ('fajr','dhuhr','asr','maghrib','isha')),
            scheduled_start  TEXT NOT NULL,
            registered_at    TEXT NOT NULL,
            at_mosque        INTEGER NOT NULL DEFAULT 0,
            score            REAL NOT NULL CHECK(score >= 0 AND score <= 10),
            made_up          INTEGER NOT NULL DEFAULT 0,
            made_up_at       TEXT,
            created_at       TEXT DEFAULT (datetime('now')),
            UNIQUE(user_id, date, prayer_type)
        );

        CREATE TABLE IF NOT EXISTS prayer_times_cache (
            date     TEXT PRIMARY KEY,
            fajr     TEXT,
            sunrise  TEXT,
            dhuhr    TEXT,
            asr      TEXT,
            maghrib  TEXT,
            isha     TEXT
        );

        CREATE TABLE IF NOT EXISTS privacy_settings (
            user_id     TEXT PRIMARY KEY,
            settings    TEXT NOT NULL,
            updated_at  TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS friendships (
            user_id     TEXT NOT NULL,
            friend_id   TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending'
                        CHECK(status IN ('pending','accepted')),
            created_at  TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS prayer_reminders (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id    TEXT NOT NULL,
            receiver_id  TEXT NOT NULL,
            prayer_type  TEXT NOT NULL,
            sent_at      TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'sent'
                         CHECK(status IN ('sent','delivered','read')),
            message      TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_receiver
            ON prayer_reminders (receiver_id, sent_at);

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ")?;
    Ok(())
}
