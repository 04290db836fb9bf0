//! US equity market calendar
//! Weekends and full-day NYSE holidays, computed by rule for any year; early closes are not modeled

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use std::collections::BTreeSet;

/// Full-day NYSE closures for `year`
pub fn exchange_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();

    // A Saturday New Year's Day is not moved back into the prior year
    if let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match new_year.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => days.extend(new_year.succ_opt()),
            _ => {
                days.insert(new_year);
            }
        }
    }
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    days.extend(easter_sunday(year).map(|easter| easter - Duration::days(2)));
    days.extend(last_weekday_of_month(year, 5, Weekday::Mon));
    if year >= 2022 {
        days.extend(observed(year, 6, 19));
    }
    days.extend(observed(year, 7, 4));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4));
    days.extend(observed(year, 12, 25));
    days
}

/// Saturday holidays close the Friday before, Sunday holidays the Monday after
fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    std::iter::successors(Some(last), |d| d.pred_opt())
        .take(7)
        .find(|d| d.weekday() == weekday)
}

/// Gregorian Easter (anonymous Gregorian computus)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Trading-day calendar
#[derive(Debug, Clone, Default)]
pub struct MarketCalendar {
    // Closures on top of the exchange rules
    extra: BTreeSet<NaiveDate>,
}

impl MarketCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add closures beyond the exchange rules
    pub fn with_holidays(mut self, extra: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.extra.extend(extra);
        self
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.extra.contains(&date) || exchange_holidays(date.year()).contains(&date)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// First open day of the month, looking at the first week only
    pub fn first_trading_day(&self, year: i32, month: u32) -> Option<NaiveDate> {
        (1..=7)
            .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
            .find(|d| self.is_trading_day(*d))
    }

    /// Last open day of the month, looking at the final week only
    pub fn last_trading_day(&self, year: i32, month: u32) -> Option<NaiveDate> {
        let last = last_day_of_month(year, month)?;
        std::iter::successors(Some(last), |d| d.pred_opt())
            .take(7)
            .find(|d| self.is_trading_day(*d))
    }

    pub fn is_first_trading_day(&self, date: NaiveDate) -> bool {
        self.first_trading_day(date.year(), date.month()) == Some(date)
    }

    pub fn is_last_trading_day(&self, date: NaiveDate) -> bool {
        self.last_trading_day(date.year(), date.month()) == Some(date)
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Wall-clock time in New York
pub fn now_eastern() -> DateTime<Tz> {
    to_eastern(Utc::now())
}

pub fn to_eastern(instant: DateTime<Utc>) -> DateTime<Tz> {
    instant.with_timezone(&New_York)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekends_and_holidays_are_closed() {
        let cal = MarketCalendar::new();
        assert!(!cal.is_trading_day(date(2025, 7, 4)));
        assert!(!cal.is_trading_day(date(2025, 7, 5)));
        assert!(!cal.is_trading_day(date(2026, 4, 3)));
        assert!(cal.is_trading_day(date(2025, 7, 7)));
    }

    #[test]
    fn test_first_trading_day_skips_holiday_and_weekend() {
        let cal = MarketCalendar::new();
        // Jan 1 2026 is a Thursday holiday
        assert_eq!(cal.first_trading_day(2026, 1), Some(date(2026, 1, 2)));
        // Nov 1 2025 is a Saturday
        assert_eq!(cal.first_trading_day(2025, 11), Some(date(2025, 11, 3)));
        assert!(cal.is_first_trading_day(date(2025, 11, 3)));
    }

    #[test]
    fn test_last_trading_day() {
        let cal = MarketCalendar::new();
        // May 31 2025 is a Saturday
        assert_eq!(cal.last_trading_day(2025, 5), Some(date(2025, 5, 30)));
        assert_eq!(cal.last_trading_day(2025, 12), Some(date(2025, 12, 31)));
        assert!(cal.is_last_trading_day(date(2026, 2, 27)));
    }

    #[test]
    fn test_extra_holidays() {
        // National day of mourning, 2025-01-09
        let cal = MarketCalendar::new().with_holidays([date(2025, 1, 9)]);
        assert!(!cal.is_trading_day(date(2025, 1, 9)));
        assert!(MarketCalendar::new().is_trading_day(date(2025, 1, 9)));
    }

    #[test]
    fn test_holiday_rules_match_published_schedules() {
        let expected_2025 = [
            date(2025, 1, 1),
            date(2025, 1, 20),
            date(2025, 2, 17),
            date(2025, 4, 18),
            date(2025, 5, 26),
            date(2025, 6, 19),
            date(2025, 7, 4),
            date(2025, 9, 1),
            date(2025, 11, 27),
            date(2025, 12, 25),
        ];
        assert_eq!(exchange_holidays(2025).into_iter().collect::<Vec<_>>(), expected_2025);

        let expected_2026 = [
            date(2026, 1, 1),
            date(2026, 1, 19),
            date(2026, 2, 16),
            date(2026, 4, 3),
            date(2026, 5, 25),
            date(2026, 6, 19),
            date(2026, 7, 3),
            date(2026, 9, 7),
            date(2026, 11, 26),
            date(2026, 12, 25),
        ];
        assert_eq!(exchange_holidays(2026).into_iter().collect::<Vec<_>>(), expected_2026);
    }

    #[test]
    fn test_2027_closures_and_observed_days() {
        let cal = MarketCalendar::new();
        // Friday New Year's Day
        assert!(!cal.is_trading_day(date(2027, 1, 1)));
        assert_eq!(cal.first_trading_day(2027, 1), Some(date(2027, 1, 4)));
        // Good Friday, Easter is March 28
        assert!(!cal.is_trading_day(date(2027, 3, 26)));
        // Juneteenth and Christmas fall on Saturday, Independence Day on Sunday
        assert!(!cal.is_trading_day(date(2027, 6, 18)));
        assert!(!cal.is_trading_day(date(2027, 7, 5)));
        assert!(!cal.is_trading_day(date(2027, 12, 24)));
        assert_eq!(cal.last_trading_day(2027, 12), Some(date(2027, 12, 31)));
    }

    #[test]
    fn test_saturday_new_year_is_not_observed_in_december() {
        let cal = MarketCalendar::new();
        // 2022-01-01 was a Saturday; Dec 31 2021 traded
        assert!(cal.is_trading_day(date(2021, 12, 31)));
        assert_eq!(cal.first_trading_day(2022, 1), Some(date(2022, 1, 3)));
    }

    #[test]
    fn test_eastern_conversion() {
        let utc = Utc.with_ymd_and_hms(2025, 7, 31, 19, 56, 0).unwrap();
        let et = to_eastern(utc);
        assert_eq!((et.hour(), et.minute()), (15, 56));
    }
}
