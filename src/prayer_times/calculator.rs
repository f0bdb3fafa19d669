use anyhow::{anyhow, Result};
use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, SubsecRound};
use rusqlite::Connection;
use salah::prelude::*;

use crate::config::{PrayerAdjustments, SalahConfig};
use crate::db::repository::{CacheRepo, MetaRepo};
use crate::error::CoreError;
use crate::models::{PrayerType, PrayerWindow};

/// Raw astronomical times for one day, in the configured local offset.
#[derive(Debug, Clone, PartialEq)]
pub struct DayTimes {
    pub fajr: NaiveDateTime,
    pub sunrise: NaiveDateTime,
    pub dhuhr: NaiveDateTime,
    pub asr: NaiveDateTime,
    pub maghrib: NaiveDateTime,
    pub isha: NaiveDateTime,
}

const CACHE_FINGERPRINT_KEY: &str = "prayer_times_cache.fingerprint";

pub struct PrayerCalculator {
    pub lat: f64,
    pub lng: f64,
    pub method_str: String,
    pub madhab_str: String,
    pub tz_offset_minutes: i32,
    pub adjustments: PrayerAdjustments,
}

impl PrayerCalculator {
    pub fn new(salah: &SalahConfig) -> Result<Self> {
        // Validate method + madhab early
        parse_method(&salah.calc_method)?;
        parse_madhab(&salah.madhab)?;
        Ok(Self {
            lat: salah.latitude,
            lng: salah.longitude,
            method_str: salah.calc_method.clone(),
            madhab_str: salah.madhab.clone(),
            tz_offset_minutes: salah.timezone_offset,
            adjustments: salah.adjustments,
        })
    }

    /// Build a calculator and drop cached times that were computed for a
    /// different location, method, madhab or offset.
    pub fn open(conn: &Connection, salah: &SalahConfig) -> Result<Self> {
        let calc = Self::new(salah)?;
        calc.sync_cache(conn)?;
        Ok(calc)
    }

    /// Everything the cached astronomical times depend on. Adjustments are
    /// applied after the cache, so they are not part of it.
    pub fn cache_fingerprint(&self) -> String {
        format!(
            "{:.6},{:.6}|{}|{}|{}",
            self.lat, self.lng, self.method_str, self.madhab_str, self.tz_offset_minutes
        )
    }

    /// Returns true when the cache was cleared.
    pub fn sync_cache(&self, conn: &Connection) -> Result<bool> {
        let fingerprint = self.cache_fingerprint();
        let stored = MetaRepo::get(conn, CACHE_FINGERPRINT_KEY)?;
        if stored.as_deref() == Some(fingerprint.as_str()) {
            return Ok(false);
        }
        CacheRepo::clear_all(conn)?;
        MetaRepo::set(conn, CACHE_FINGERPRINT_KEY, &fingerprint)?;
        log::info!("Prayer time settings changed ({}); cache cleared", fingerprint);
        Ok(true)
    }

    fn compute_times(&self, date: NaiveDate) -> Result<DayTimes> {
        let coords = Coordinates::new(self.lat, self.lng);
        let method = parse_method(&self.method_str)?;
        let madhab = parse_madhab(&self.madhab_str)?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| anyhow!("Prayer calculation failed: {}", e))?;

        let offset = FixedOffset::east_opt(self.tz_offset_minutes * 60)
            .ok_or_else(|| anyhow!("Invalid timezone offset: {}", self.tz_offset_minutes))?;

        let to_local = |utc: chrono::DateTime<chrono::Utc>| -> NaiveDateTime {
            utc.with_timezone(&offset).naive_local().trunc_subsecs(0)
        };

        log::debug!("Computed prayer times for {}", date);
        Ok(DayTimes {
            fajr: to_local(times.time(Prayer::Fajr)),
            sunrise: to_local(times.time(Prayer::Sunrise)),
            dhuhr: to_local(times.time(Prayer::Dhuhr)),
            asr: to_local(times.time(Prayer::Asr)),
            maghrib: to_local(times.time(Prayer::Maghrib)),
            isha: to_local(times.time(Prayer::Isha)),
        })
    }

    /// Ensure prayer_times_cache has entries for `from` through `days_ahead` days.
    pub fn ensure_cached(&self, conn: &Connection, from: NaiveDate, days_ahead: u32) -> Result<()> {
        for i in 0..=(days_ahead as i64) {
            let date = from + Duration::days(i);
            self.get_cached_or_compute(conn, date)?;
        }
        Ok(())
    }

    /// Get times from cache (or compute and store if missing) for a specific date.
    pub fn get_cached_or_compute(&self, conn: &Connection, date: NaiveDate) -> Result<DayTimes> {
        let date_str = date.format("%Y-%m-%d").to_string();

        if let Some(cached) = CacheRepo::get_times_for_date(conn, &date_str)? {
            return Ok(cached);
        }

        let times = self.compute_times(date)?;
        CacheRepo::store_times(conn, &date_str, &times)?;
        Ok(times)
    }

    /// The five scoring windows for `date`. Isha runs until the next day's Fajr.
    pub fn windows_for_date(&self, conn: &Connection, date: NaiveDate) -> Result<Vec<PrayerWindow>> {
        let today = self.get_cached_or_compute(conn, date)?;
        let tomorrow = date.succ_opt().unwrap_or(date);
        let next_fajr = self.get_cached_or_compute(conn, tomorrow)?.fajr;
        Ok(build_windows(&today, next_fajr, &self.adjustments)?)
    }

    pub fn window_for(
        &self,
        conn: &Connection,
        date: NaiveDate,
        prayer: PrayerType,
    ) -> Result<PrayerWindow> {
        self.windows_for_date(conn, date)?
            .into_iter()
            .find(|w| w.prayer() == prayer)
            .ok_or_else(|| anyhow!("No window computed for {}", prayer))
    }

    /// Returns (next PrayerType, seconds until it starts).
    pub fn get_next_prayer(&self, conn: &Connection, now: NaiveDateTime) -> Result<(PrayerType, i64)> {
        let today = now.date();
        for window in self.windows_for_date(conn, today)? {
            if window.scheduled_start() > now {
                let secs = (window.scheduled_start() - now).num_seconds();
                return Ok((window.prayer(), secs));
            }
        }

        // All prayers passed — next is Fajr tomorrow
        let tomorrow = today.succ_opt().unwrap_or(today);
        let fajr = self.window_for(conn, tomorrow, PrayerType::Fajr)?;
        Ok((PrayerType::Fajr, (fajr.scheduled_start() - now).num_seconds()))
    }
}

/// Each window closes when the next obligation begins: Fajr at sunrise,
/// Dhuhr at Asr, Asr at Maghrib, Maghrib at Isha, Isha at the next Fajr.
/// A prayer's minute adjustment shifts both ends of its own window.
pub fn build_windows(
    today: &DayTimes,
    next_fajr: NaiveDateTime,
    adjustments: &PrayerAdjustments,
) -> Result<Vec<PrayerWindow>, CoreError> {
    let bounds = [
        (PrayerType::Fajr, today.fajr, today.sunrise),
        (PrayerType::Dhuhr, today.dhuhr, today.asr),
        (PrayerType::Asr, today.asr, today.maghrib),
        (PrayerType::Maghrib, today.maghrib, today.isha),
        (PrayerType::Isha, today.isha, next_fajr),
    ];

    bounds
        .into_iter()
        .map(|(prayer, start, end)| {
            let shift = Duration::minutes(adjustments.minutes_for(prayer));
            PrayerWindow::new(prayer, start + shift, end + shift)
        })
        .collect()
}

fn parse_method(s: &str) -> Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(anyhow!("Unknown calculation method: '{}'", s)),
    }
}

fn parse_madhab(s: &str) -> Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(anyhow!("Unknown madhab: '{}'", s)),
    }
}

pub const CALC_METHODS: &[&str] = &[
    "MuslimWorldLeague",
    "Egyptian",
    "Karachi",
    "UmmAlQura",
    "Dubai",
    "MoonsightingCommittee",
    "NorthAmerica",
    "Kuwait",
    "Qatar",
    "Singapore",
    "Tehran",
    "Turkey",
    "Other",
];
