//! Calibration calendar.
//!
//! Pure date arithmetic driving two recurring decisions:
//! - **Reset date**: the day of month (the 3rd by default) on which the raw
//!   staging area is purged before new files are written.
//! - **Calibration window**: the end year/month bounding the fitting period of
//!   the drought-index stage.
//!
//! Nothing here reads the clock; callers pass "today" explicitly.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default reset day of month.
pub const DEFAULT_RESET_DAY: u32 = 3;

/// Lowercase three-letter month tokens, January first.
const MONTH_TOKENS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Errors raised when building a calendar.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    /// Reset day must exist in every month.
    #[error("invalid reset day {0}: must be between 1 and 28")]
    InvalidResetDay(u32),

    /// Date arithmetic left the representable range.
    #[error("date out of range while computing {0}")]
    OutOfRange(&'static str),
}

/// End of the statistical fitting period used by the drought-index stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationWindow {
    /// Calendar year the window ends in.
    pub end_year: i32,
    /// Lowercase three-letter month token (`"jan"` .. `"dec"`).
    pub end_month: String,
}

impl CalibrationWindow {
    fn new(end_year: i32, month: u32) -> Self {
        Self {
            end_year,
            end_month: month_token(month).to_string(),
        }
    }

    /// `mon_year` label used in product file names and reports.
    pub fn label(&self) -> String {
        format!("{}_{}", self.end_month, self.end_year)
    }
}

/// Returns the lowercase three-letter token for a 1-based month number.
pub fn month_token(month: u32) -> &'static str {
    MONTH_TOKENS[((month.clamp(1, 12)) - 1) as usize]
}

/// Calendar rules keyed on a fixed reset day of month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationCalendar {
    reset_day: u32,
}

impl Default for CalibrationCalendar {
    fn default() -> Self {
        Self {
            reset_day: DEFAULT_RESET_DAY,
        }
    }
}

impl CalibrationCalendar {
    /// Creates a calendar with a custom reset day.
    pub fn new(reset_day: u32) -> Result<Self, CalendarError> {
        if !(1..=28).contains(&reset_day) {
            return Err(CalendarError::InvalidResetDay(reset_day));
        }
        Ok(Self { reset_day })
    }

    /// Day of month on which the staging area resets.
    pub fn reset_day(&self) -> u32 {
        self.reset_day
    }

    /// Reset day of the month `today` falls in.
    fn current_cycle_boundary(&self, today: NaiveDate) -> NaiveDate {
        // reset_day <= 28 exists in every month
        NaiveDate::from_ymd_opt(today.year(), today.month(), self.reset_day).unwrap_or(today)
    }

    /// Next reset date: this month's reset day if it has not passed yet,
    /// otherwise the reset day of the following month.
    pub fn reset_date(&self, today: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let boundary = self.current_cycle_boundary(today);
        if today.day() < self.reset_day {
            Ok(boundary)
        } else {
            boundary
                .checked_add_months(Months::new(1))
                .ok_or(CalendarError::OutOfRange("reset date"))
        }
    }

    /// True only on the reset day itself, once per month.
    pub fn should_reset_today(&self, today: NaiveDate) -> bool {
        today == self.current_cycle_boundary(today)
    }

    /// Calibration window for a run executed on `today`.
    ///
    /// Before this month's reset day the window still ends at the previous
    /// month; in January that previous month is December of the prior year.
    /// From the reset day on, the window ends at the current month.
    pub fn calibration_window(&self, today: NaiveDate) -> CalibrationWindow {
        if today < self.current_cycle_boundary(today) {
            if today.month() == 1 {
                CalibrationWindow::new(today.year() - 1, 12)
            } else {
                CalibrationWindow::new(today.year(), today.month() - 1)
            }
        } else {
            CalibrationWindow::new(today.year(), today.month())
        }
    }

    /// Date fetched by a scheduled run, accounting for the product's
    /// publication lag.
    pub fn download_date(
        &self,
        today: NaiveDate,
        publication_lag_days: u64,
    ) -> Result<NaiveDate, CalendarError> {
        today
            .checked_sub_days(Days::new(publication_lag_days))
            .ok_or(CalendarError::OutOfRange("download date"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(year: i32, month: &str) -> CalibrationWindow {
        CalibrationWindow {
            end_year: year,
            end_month: month.to_string(),
        }
    }

    #[test]
    fn test_invalid_reset_day() {
        assert_eq!(
            CalibrationCalendar::new(0),
            Err(CalendarError::InvalidResetDay(0))
        );
        assert_eq!(
            CalibrationCalendar::new(29),
            Err(CalendarError::InvalidResetDay(29))
        );
        assert!(CalibrationCalendar::new(28).is_ok());
    }

    #[test]
    fn test_reset_date_before_and_after_boundary() {
        let cal = CalibrationCalendar::default();
        assert_eq!(cal.reset_date(d(2024, 3, 1)).unwrap(), d(2024, 3, 3));
        assert_eq!(cal.reset_date(d(2024, 3, 2)).unwrap(), d(2024, 3, 3));
        assert_eq!(cal.reset_date(d(2024, 3, 3)).unwrap(), d(2024, 4, 3));
        assert_eq!(cal.reset_date(d(2024, 3, 31)).unwrap(), d(2024, 4, 3));
        assert_eq!(cal.reset_date(d(2024, 12, 15)).unwrap(), d(2025, 1, 3));
    }

    #[test]
    fn test_should_reset_only_on_third() {
        let cal = CalibrationCalendar::default();
        assert!(cal.should_reset_today(d(2024, 4, 3)));
        assert!(!cal.should_reset_today(d(2024, 4, 4)));
        assert!(!cal.should_reset_today(d(2024, 4, 2)));

        let resets = (1..=31)
            .filter_map(|day| NaiveDate::from_ymd_opt(2024, 1, day))
            .filter(|date| cal.should_reset_today(*date))
            .count();
        assert_eq!(resets, 1);
    }

    #[test]
    fn test_calibration_window_fixtures() {
        let cal = CalibrationCalendar::default();
        assert_eq!(cal.calibration_window(d(2024, 3, 2)), window(2024, "feb"));
        assert_eq!(cal.calibration_window(d(2024, 3, 5)), window(2024, "mar"));
        assert_eq!(cal.calibration_window(d(2025, 1, 2)), window(2024, "dec"));
    }

    #[test]
    fn test_calibration_window_year_boundary() {
        let cal = CalibrationCalendar::default();
        assert_eq!(cal.calibration_window(d(2025, 1, 1)), window(2024, "dec"));
        assert_eq!(cal.calibration_window(d(2025, 1, 2)), window(2024, "dec"));
        assert_eq!(cal.calibration_window(d(2025, 1, 3)), window(2025, "jan"));
        assert_eq!(cal.calibration_window(d(2024, 12, 31)), window(2024, "dec"));
    }

    #[test]
    fn test_calibration_window_reset_day_is_inclusive() {
        let cal = CalibrationCalendar::default();
        assert_eq!(cal.calibration_window(d(2024, 7, 3)), window(2024, "jul"));
        assert_eq!(cal.calibration_window(d(2024, 7, 2)), window(2024, "jun"));
    }

    #[test]
    fn test_every_day_of_a_leap_year() {
        let cal = CalibrationCalendar::default();
        let mut date = d(2024, 1, 1);
        while date.year() == 2024 {
            let w = cal.calibration_window(date);
            let reset = cal.reset_date(date).unwrap();
            assert!(reset > date);
            if date.day() >= 3 {
                assert_eq!(w.end_month, month_token(date.month()));
                assert_eq!(w.end_year, 2024);
            }
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_pure_and_repeatable() {
        let cal = CalibrationCalendar::default();
        let today = d(2024, 3, 2);
        assert_eq!(cal.calibration_window(today), cal.calibration_window(today));
        assert_eq!(cal.reset_date(today), cal.reset_date(today));
        assert_eq!(cal.should_reset_today(today), cal.should_reset_today(today));
    }

    #[test]
    fn test_download_date_lag() {
        let cal = CalibrationCalendar::default();
        assert_eq!(cal.download_date(d(2024, 3, 1), 2).unwrap(), d(2024, 2, 28));
        assert_eq!(cal.download_date(d(2024, 3, 5), 0).unwrap(), d(2024, 3, 5));
    }

    #[test]
    fn test_custom_reset_day() {
        let cal = CalibrationCalendar::new(10).unwrap();
        assert!(cal.should_reset_today(d(2024, 5, 10)));
        assert_eq!(cal.calibration_window(d(2024, 1, 9)), window(2023, "dec"));
        assert_eq!(cal.reset_date(d(2024, 5, 9)).unwrap(), d(2024, 5, 10));
    }

    #[test]
    fn test_window_label_and_tokens() {
        assert_eq!(window(2024, "feb").label(), "feb_2024");
        assert_eq!(month_token(1), "jan");
        assert_eq!(month_token(12), "dec");
    }
}
