use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Weekend membership against the configured weekend set.
pub fn is_weekend(date: NaiveDate, weekend_days: &[Weekday]) -> bool {
    weekend_days.contains(&date.weekday())
}

/// Inclusive count of working days in a range, skipping weekend days only.
///
/// Holidays still count as working days here; payroll classifies holiday
/// records separately when it derives loss of pay. The two calendars are
/// deliberately kept apart.
pub fn working_days_between(start: NaiveDate, end: NaiveDate, weekend_days: &[Weekday]) -> u32 {
    let mut count = 0;
    let mut day = start;
    while day <= end {
        if !is_weekend(day, weekend_days) {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}

/// Every calendar date in the inclusive range.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        dates.push(day);
        day += Duration::days(1);
    }
    dates
}

pub fn days_in_month(month: u32, year: i32) -> u32 {
    let (first, next) = month_bounds_exclusive(month, year);
    (next - first).num_days() as u32
}

/// First and last calendar date of a month.
pub fn month_bounds(month: u32, year: i32) -> (NaiveDate, NaiveDate) {
    let (first, next) = month_bounds_exclusive(month, year);
    (first, next - Duration::days(1))
}

fn month_bounds_exclusive(month: u32, year: i32) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| panic!("invalid month {}-{}", year, month));
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    (first, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEKEND: [Weekday; 2] = [Weekday::Sat, Weekday::Sun];

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_count_skips_weekends() {
        // Mon 2026-07-06 .. Fri 2026-07-10
        assert_eq!(working_days_between(d(2026, 7, 6), d(2026, 7, 10), &WEEKEND), 5);
        // Fri .. Mon spans a weekend
        assert_eq!(working_days_between(d(2026, 7, 10), d(2026, 7, 13), &WEEKEND), 2);
        // A single Saturday
        assert_eq!(working_days_between(d(2026, 7, 11), d(2026, 7, 11), &WEEKEND), 0);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(6, 2026), 30);
        assert_eq!(days_in_month(7, 2026), 31);
        assert_eq!(days_in_month(2, 2026), 28);
        assert_eq!(days_in_month(2, 2028), 29);
        assert_eq!(days_in_month(12, 2026), 31);
    }

    #[test]
    fn bounds_are_inclusive() {
        let (first, last) = month_bounds(6, 2026);
        assert_eq!(first, d(2026, 6, 1));
        assert_eq!(last, d(2026, 6, 30));
    }

    #[test]
    fn date_range_is_inclusive() {
        let dates = dates_between(d(2026, 7, 6), d(2026, 7, 8));
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0], d(2026, 7, 6));
        assert_eq!(dates[2], d(2026, 7, 8));
    }
}
