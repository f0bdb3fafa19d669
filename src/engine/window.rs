use chrono::NaiveDateTime;

use crate::models::{PrayerScoreResult, PrayerStatus, PrayerType, PrayerWindow};

pub const MAX_SCORE: f64 = 10.0;

/// Pure status and scoring rules for a single prayer window.
///
/// Time is always passed in; nothing here reads a clock.
pub struct PrayerWindowEngine;

impl PrayerWindowEngine {
    /// Classify a prayer at `now`. `registered` is tracked by the caller and
    /// overrides the time-based status.
    pub fn get_status(window: &PrayerWindow, now: NaiveDateTime, registered: bool) -> PrayerStatus {
        if registered {
            PrayerStatus::Completed
        } else if now < window.scheduled_start() {
            PrayerStatus::Upcoming
        } else if now < window.scheduled_end() {
            PrayerStatus::Active
        } else {
            PrayerStatus::Missed
        }
    }

    /// Score a registration. Mosque attendance is always 10; outside the
    /// window is always 0; inside it decays linearly from 10 at the start.
    pub fn score(
        window: &PrayerWindow,
        registered_at: NaiveDateTime,
        at_mosque: bool,
    ) -> PrayerScoreResult {
        let score = if at_mosque {
            MAX_SCORE
        } else if registered_at < window.scheduled_start()
            || registered_at >= window.scheduled_end()
        {
            0.0
        } else {
            let elapsed = (registered_at - window.scheduled_start()).num_milliseconds();
            let remaining = i128::from(window.width_millis() - elapsed);
            let width = i128::from(window.width_millis());
            // 10 * remaining / width in tenths, rounded half up on integers
            let tenths = (200 * remaining + width) / (2 * width);
            tenths as f64 / 10.0
        };

        PrayerScoreResult {
            prayer: window.prayer(),
            scheduled_start: window.scheduled_start(),
            registered_at,
            at_mosque,
            score,
        }
    }

    /// Day average over all five obligatory prayers: absent prayers count as 0.
    pub fn daily_average(scores: &[PrayerScoreResult]) -> f64 {
        let total: i64 = scores.iter().map(|s| to_tenths(s.score)).sum();
        let count = PrayerType::COUNT as i64;
        let tenths = (2 * total + count) / (2 * count);
        tenths as f64 / 10.0
    }
}

/// Scores are stored at one decimal; snap back to whole tenths before
/// doing arithmetic on them.
fn to_tenths(score: f64) -> i64 {
    (score * 10.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn fajr() -> PrayerWindow {
        PrayerWindow::new(PrayerType::Fajr, at(5, 0), at(7, 0)).unwrap()
    }

    fn dhuhr() -> PrayerWindow {
        PrayerWindow::new(PrayerType::Dhuhr, at(12, 0), at(15, 0)).unwrap()
    }

    fn scored(w: &PrayerWindow, t: NaiveDateTime) -> f64 {
        PrayerWindowEngine::score(w, t, false).score
    }

    #[test]
    fn status_follows_the_clock() {
        let w = fajr();
        assert_eq!(PrayerWindowEngine::get_status(&w, at(4, 59), false), PrayerStatus::Upcoming);
        assert_eq!(PrayerWindowEngine::get_status(&w, at(5, 0), false), PrayerStatus::Active);
        assert_eq!(PrayerWindowEngine::get_status(&w, at(6, 59), false), PrayerStatus::Active);
        assert_eq!(PrayerWindowEngine::get_status(&w, at(7, 0), false), PrayerStatus::Missed);
    }

    #[test]
    fn registered_overrides_time() {
        let w = fajr();
        for t in [at(3, 0), at(6, 0), at(9, 0)] {
            assert_eq!(PrayerWindowEngine::get_status(&w, t, true), PrayerStatus::Completed);
        }
    }

    #[test]
    fn fajr_half_past_five_scores_seven_and_a_half() {
        let result = PrayerWindowEngine::score(&fajr(), at(5, 30), false);
        assert_eq!(result.score, 7.5);
        assert_eq!(result.prayer, PrayerType::Fajr);
        assert_eq!(result.scheduled_start, at(5, 0));
        assert_eq!(result.registered_at, at(5, 30));
        assert!(!result.at_mosque);
    }

    #[test]
    fn dhuhr_on_the_dot_scores_ten() {
        assert_eq!(scored(&dhuhr(), at(12, 0)), 10.0);
    }

    #[test]
    fn before_the_window_scores_zero() {
        let w = dhuhr();
        assert_eq!(scored(&w, at(11, 59)), 0.0);
        assert_eq!(scored(&w, at(0, 0)), 0.0);
    }

    #[test]
    fn at_or_after_the_end_scores_zero() {
        let w = dhuhr();
        assert_eq!(scored(&w, at(15, 0)), 0.0);
        assert_eq!(scored(&w, at(23, 0)), 0.0);
    }

    #[test]
    fn mosque_is_always_ten() {
        let w = fajr();
        for t in [at(1, 0), at(5, 0), at(6, 45), at(7, 0), at(22, 0)] {
            let r = PrayerWindowEngine::score(&w, t, true);
            assert_eq!(r.score, 10.0);
            assert!(r.at_mosque);
        }
    }

    #[test]
    fn score_never_increases_through_the_window() {
        let w = dhuhr();
        let mut t = w.scheduled_start();
        let mut last = scored(&w, t);
        assert_eq!(last, 10.0);
        while t < w.scheduled_end() {
            let s = scored(&w, t);
            assert!(s <= last, "{} > {} at {}", s, last, t);
            assert!((0.0..=10.0).contains(&s));
            last = s;
            t += Duration::minutes(7);
        }
    }

    #[test]
    fn last_second_rounds_to_zero() {
        let w = fajr();
        assert_eq!(scored(&w, w.scheduled_end() - Duration::seconds(1)), 0.0);
    }

    #[test]
    fn rounds_to_one_decimal() {
        // 12:20 into a 3h window: 10 - 10/9 = 8.888..
        assert_eq!(scored(&dhuhr(), at(12, 20)), 8.9);
    }

    #[test]
    fn exact_half_tenths_round_up() {
        // 81 of 200 minutes gone: exactly 5.95
        let start = at(15, 0);
        let asr = PrayerWindow::new(PrayerType::Asr, start, start + Duration::minutes(200)).unwrap();
        assert_eq!(scored(&asr, start + Duration::minutes(81)), 6.0);

        // 3 of 40 minutes gone: exactly 9.25
        let short = PrayerWindow::new(PrayerType::Maghrib, start, start + Duration::minutes(40)).unwrap();
        assert_eq!(scored(&short, start + Duration::minutes(3)), 9.3);
    }

    #[test]
    fn every_whole_minute_matches_exact_rounding() {
        for width in [90_i64, 137, 200, 410, 599] {
            let start = at(12, 0);
            let w = PrayerWindow::new(PrayerType::Dhuhr, start, start + Duration::minutes(width))
                .unwrap();
            for elapsed in 0..width {
                let expected = (200 * (width - elapsed) + width) / (2 * width);
                let got = scored(&w, start + Duration::minutes(elapsed));
                assert_eq!(got, expected as f64 / 10.0, "{}/{} minutes", elapsed, width);
            }
        }
    }

    fn result(score: f64) -> PrayerScoreResult {
        PrayerScoreResult {
            prayer: PrayerType::Asr,
            scheduled_start: at(15, 0),
            registered_at: at(15, 0),
            at_mosque: false,
            score,
        }
    }

    #[test]
    fn daily_average_divides_by_five() {
        let full: Vec<_> = (0..5).map(|_| result(10.0)).collect();
        assert_eq!(PrayerWindowEngine::daily_average(&full), 10.0);

        let two = vec![result(10.0), result(10.0)];
        assert_eq!(PrayerWindowEngine::daily_average(&two), 4.0);

        assert_eq!(PrayerWindowEngine::daily_average(&[]), 0.0);
        assert_eq!(PrayerWindowEngine::daily_average(&[result(7.5), result(8.9)]), 3.3);
        // 0.1 + 0.2 + 0.2 = 0.5 in tenths, averaged to exactly 0.1
        assert_eq!(
            PrayerWindowEngine::daily_average(&[result(0.1), result(0.2), result(0.2)]),
            0.1
        );
        // 47.5 / 5 = 9.5
        let high = vec![result(10.0), result(10.0), result(10.0), result(10.0), result(7.5)];
        assert_eq!(PrayerWindowEngine::daily_average(&high), 9.5);
    }
}
