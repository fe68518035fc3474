use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, Weekday};

/// Working days charged for a request.
///
/// A half day is always 0.5, whatever the date. Otherwise every Monday
/// through Friday in the inclusive range counts as one; public holidays are
/// not excluded.
pub fn business_days(start: NaiveDate, end: NaiveDate, half_day: bool) -> BigDecimal {
    if half_day {
        return BigDecimal::new(5.into(), 1);
    }

    let weekdays = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_weekday(*day))
        .count();
    BigDecimal::from(weekdays as u64)
}

fn is_weekday(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}
