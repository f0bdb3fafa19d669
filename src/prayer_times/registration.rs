use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::engine::PrayerWindowEngine;
use crate::error::CoreError;
use crate::models::{PrayerScoreResult, PrayerType, PrayerWindow};

/// What a registration turns into once its window is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    /// Store `result` under `date`, the day the window opened.
    Record {
        date: NaiveDate,
        window: PrayerWindow,
        result: PrayerScoreResult,
    },
    /// The window has not opened and the prayer was not at a mosque.
    /// Nothing is stored, so a later registration still counts.
    NotStarted(PrayerWindow),
}

/// The latest moment at or before `now` whose clock reads `at`.
///
/// A clock time later than `now` means the previous day, so `--at 23:50`
/// typed at 00:10 lands on last night.
pub fn registration_time(
    now: NaiveDateTime,
    at: Option<NaiveTime>,
) -> Result<NaiveDateTime, CoreError> {
    let Some(time) = at else {
        return Ok(now);
    };
    let same_day = now.date().and_time(time);
    if same_day <= now {
        return Ok(same_day);
    }
    match now.date().pred_opt().map(|d| d.and_time(time)) {
        Some(previous) if previous <= now => Ok(previous),
        _ => Err(CoreError::FutureRegistration(same_day)),
    }
}

fn find(windows: &[PrayerWindow], prayer: PrayerType) -> Option<&PrayerWindow> {
    windows.iter().find(|w| w.prayer() == prayer)
}

/// Pick the window `registered_at` belongs to and score it.
///
/// `today` holds the windows of `registered_at`'s date and `yesterday` those
/// of the day before. Isha prayed after midnight counts against yesterday's
/// Isha while that window is still open.
pub fn plan_registration(
    prayer: PrayerType,
    registered_at: NaiveDateTime,
    at_mosque: bool,
    yesterday: &[PrayerWindow],
    today: &[PrayerWindow],
) -> Result<Registration, CoreError> {
    let current = find(today, prayer).ok_or(CoreError::MissingWindow(prayer))?;

    let window = match find(yesterday, prayer) {
        Some(previous)
            if prayer == PrayerType::Isha
                && registered_at < current.scheduled_start()
                && registered_at < previous.scheduled_end() =>
        {
            previous
        }
        _ => current,
    };

    if !at_mosque && registered_at < window.scheduled_start() {
        return Ok(Registration::NotStarted(window.clone()));
    }

    Ok(Registration::Record {
        date: window.scheduled_start().date(),
        window: window.clone(),
        result: PrayerWindowEngine::score(window, registered_at, at_mosque),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrayerAdjustments;
    use crate::db::migrations::run_migrations;
    use crate::db::repository::RecordRepo;
    use crate::prayer_times::{build_windows, DayTimes};
    use chrono::Datelike;
    use rusqlite::Connection;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    /// Fajr 05:00-06:20, Dhuhr 12:15-15:40, Asr 15:40-18:10,
    /// Maghrib 18:10-19:30, Isha 19:30 until next Fajr (05:00).
    fn windows(d: u32) -> Vec<PrayerWindow> {
        let day = DayTimes {
            fajr: at(d, 5, 0),
            sunrise: at(d, 6, 20),
            dhuhr: at(d, 12, 15),
            asr: at(d, 15, 40),
            maghrib: at(d, 18, 10),
            isha: at(d, 19, 30),
        };
        build_windows(&day, at(d + 1, 5, 0), &PrayerAdjustments::default()).unwrap()
    }

    fn plan(prayer: PrayerType, t: NaiveDateTime, mosque: bool) -> Registration {
        let d = t.date().day();
        plan_registration(prayer, t, mosque, &windows(d - 1), &windows(d)).unwrap()
    }

    #[test]
    fn no_clock_time_means_now() {
        assert_eq!(registration_time(at(10, 8, 0), None).unwrap(), at(10, 8, 0));
    }

    #[test]
    fn earlier_clock_time_stays_today() {
        assert_eq!(registration_time(at(10, 14, 0), hm(12, 30)).unwrap(), at(10, 12, 30));
        assert_eq!(registration_time(at(10, 14, 0), hm(14, 0)).unwrap(), at(10, 14, 0));
    }

    #[test]
    fn later_clock_time_means_yesterday() {
        // typed at 00:10 about last night's Isha
        assert_eq!(registration_time(at(11, 0, 10), hm(23, 50)).unwrap(), at(10, 23, 50));
        // never a future Dhuhr
        assert_eq!(registration_time(at(10, 8, 0), hm(12, 0)).unwrap(), at(9, 12, 0));
    }

    #[test]
    fn first_representable_day_cannot_go_back() {
        let now = NaiveDate::MIN.and_hms_opt(8, 0, 0).unwrap();
        assert!(matches!(
            registration_time(now, hm(12, 0)),
            Err(CoreError::FutureRegistration(_))
        ));
    }

    #[test]
    fn isha_after_midnight_counts_for_the_previous_day() {
        let reg = plan(PrayerType::Isha, at(11, 0, 30), false);
        let Registration::Record { date, window, result } = reg else {
            panic!("expected a record");
        };
        assert_eq!(date, at(10, 0, 0).date());
        assert_eq!(window.scheduled_start(), at(10, 19, 30));
        assert!(result.score > 0.0 && result.score < 10.0);
    }

    #[test]
    fn late_night_clock_time_lands_in_last_nights_isha() {
        let t = registration_time(at(11, 0, 10), hm(23, 50)).unwrap();
        let Registration::Record { date, result, .. } = plan(PrayerType::Isha, t, false) else {
            panic!("expected a record");
        };
        assert_eq!(date, at(10, 0, 0).date());
        // 260 of 570 minutes gone
        assert_eq!(result.score, 5.4);
    }

    #[test]
    fn isha_before_tonight_and_after_last_fajr_is_not_started() {
        assert_eq!(
            plan(PrayerType::Isha, at(10, 17, 0), false),
            Registration::NotStarted(windows(10)[4].clone())
        );
    }

    #[test]
    fn other_prayers_never_look_back() {
        // 00:30 is before today's Fajr, even though yesterday's has long closed
        let reg = plan(PrayerType::Fajr, at(10, 0, 30), false);
        assert_eq!(reg, Registration::NotStarted(windows(10)[0].clone()));
    }

    #[test]
    fn mosque_before_the_window_still_records_ten() {
        let reg = plan(PrayerType::Asr, at(10, 14, 0), true);
        let Registration::Record { result, date, .. } = reg else {
            panic!("expected a record");
        };
        assert_eq!(result.score, 10.0);
        assert_eq!(date, at(10, 0, 0).date());
    }

    #[test]
    fn missing_window_is_an_error() {
        let today: Vec<_> = windows(10).into_iter().take(4).collect();
        assert_eq!(
            plan_registration(PrayerType::Isha, at(10, 20, 0), false, &[], &today),
            Err(CoreError::MissingWindow(PrayerType::Isha))
        );
    }

    fn store(conn: &Connection, reg: &Registration) -> Option<i64> {
        match reg {
            Registration::Record { date, result, .. } => {
                let date = date.format("%Y-%m-%d").to_string();
                RecordRepo::insert(conn, "u", &date, result).unwrap()
            }
            Registration::NotStarted(_) => None,
        }
    }

    #[test]
    fn early_registration_leaves_room_for_the_real_one() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let early = plan(PrayerType::Dhuhr, at(10, 11, 0), false);
        assert!(matches!(early, Registration::NotStarted(_)));
        assert_eq!(store(&conn, &early), None);
        assert!(RecordRepo::get_by_date(&conn, "u", "2024-03-10").unwrap().is_empty());

        let on_time = plan(PrayerType::Dhuhr, at(10, 12, 15), false);
        assert!(store(&conn, &on_time).is_some());
        let rows = RecordRepo::get_by_date(&conn, "u", "2024-03-10").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 10.0);
    }

    #[test]
    fn late_registration_is_stored_as_missed() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let late = plan(PrayerType::Fajr, at(10, 9, 0), false);
        let Registration::Record { result, .. } = &late else {
            panic!("expected a record");
        };
        assert_eq!(result.score, 0.0);
        let id = store(&conn, &late).unwrap();

        let missed = RecordRepo::get_missed(&conn, "u").unwrap();
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].id, id);
        assert_eq!(missed[0].prayer, PrayerType::Fajr);
    }
}
