//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! These algorithms are used in C++20's `<chrono>` library and provide:
//! - O(1) time complexity (no year iteration)
//! - Correct handling of leap years
//! - Valid for all dates in the proleptic Gregorian calendar
//!
//! Epoch values are 32-bit, so the usable range is 1970-01-01 through
//! 2106-02-07. Leap seconds are not modelled here.

use crate::time::{CalendarFields, DaylightSaving, EpochTime, Weekday};

const SECONDS_PER_DAY: u32 = 86_400;

/// Days from 0000-03-01 to 1970-01-01
const EPOCH_SHIFT_DAYS: i64 = 719_468;

/// Days before the first of each month in a common year
const CUMULATIVE_DAYS: [u16; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Check if year is a leap year (Gregorian calendar)
///
/// Correctly implements standard leap year rules:
/// - Divisible by 4: leap year
/// - EXCEPT divisible by 100: not a leap year
/// - EXCEPT divisible by 400: leap year
///
/// Examples:
/// - 2000: leap (divisible by 400)
/// - 1900: NOT leap (divisible by 100 but not 400)
/// - 2024: leap (divisible by 4, not by 100)
/// - 2100: NOT leap (divisible by 100 but not 400)
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`
pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Day of week for a Gregorian date, 0 = Sunday
///
/// Kim Larsson's congruence. January and February count as months 13 and 14
/// of the preceding year, which moves the leap day to the end of the
/// counting year.
pub fn day_of_week(year: u16, month: u8, day: u8) -> Weekday {
    let (mut y, mut m) = (year as u32, month as u32);
    if m < 3 {
        m += 12;
        y -= 1;
    }

    let index = (day as u32 + 1 + 2 * m + 3 * (m + 1) / 5 + y + y / 4 - y / 100 + y / 400) % 7;
    Weekday::from_index(index as u8)
}

/// Ordinal day within the year, 1 = January 1st
pub fn day_of_year(year: u16, month: u8, day: u8) -> u16 {
    let month_index = (month.clamp(1, 12) - 1) as usize;
    let mut yday = CUMULATIVE_DAYS[month_index] + day as u16;
    if month > 2 && is_leap_year(year) {
        yday += 1;
    }
    yday
}

/// Convert epoch seconds to calendar fields (UTC)
///
/// Daylight saving is reported as `Off`; no timezone is applied.
pub fn epoch_to_calendar(epoch: EpochTime) -> CalendarFields {
    let secs = epoch.as_secs();
    let days = secs / SECONDS_PER_DAY;
    let secs_today = secs % SECONDS_PER_DAY;

    let (year, month, day) = civil_from_days(days as i64);

    CalendarFields {
        year,
        month,
        day,
        // 1970-01-01 was a Thursday
        weekday: Weekday::from_index(((days + 4) % 7) as u8),
        day_of_year: day_of_year(year, month, day),
        hour: (secs_today / 3600) as u8,
        minute: ((secs_today % 3600) / 60) as u8,
        second: (secs_today % 60) as u8,
        daylight_saving: DaylightSaving::Off,
    }
}

/// Convert calendar fields to epoch seconds (UTC)
///
/// Like `mktime`, overflowing day/hour/minute/second values carry into the
/// next unit, so `23:59:60` lands on midnight of the next day. Weekday, day
/// of year and daylight saving are ignored. Results outside the 32-bit
/// range wrap.
pub fn calendar_to_epoch(fields: &CalendarFields) -> EpochTime {
    let days = days_from_civil(fields.year, fields.month, fields.day);
    let secs = days * SECONDS_PER_DAY as i64
        + fields.hour as i64 * 3600
        + fields.minute as i64 * 60
        + fields.second as i64;
    EpochTime::from_secs(secs as u32)
}

/// Convert days since Unix epoch to civil date (year, month, day)
///
/// Howard Hinnant's civil_from_days algorithm.
fn civil_from_days(days_since_epoch: i64) -> (u16, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 (March 1, year 0)
    // This makes the year start on March 1, placing leap day at end of year
    let z = days_since_epoch + EPOCH_SHIFT_DAYS;

    // Calculate era (400-year cycles)
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // day of era [0, 146096]

    // Calculate year of era [0, 399]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;

    let y = yoe as i64 + era * 400;

    // Calculate day of year [0, 365], March-based
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);

    // Calculate month [0, 11] where 0 = March, 11 = February
    let mp = (5 * doy + 2) / 153;

    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;

    // Adjust year for January and February
    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
///
/// Howard Hinnant's days_from_civil algorithm. `day` enters linearly, so an
/// out-of-range day simply offsets the result.
fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let y = year as i64;
    let m = month as i64;
    let d = day as i64;

    // Adjust year and month to make March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // year of era [0, 399]
    let doy = (153 * m + 2) / 5 + d - 1; // day of year [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // day of era [0, 146096]

    era * 146_097 + doe - EPOCH_SHIFT_DAYS
}
