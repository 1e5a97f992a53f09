//! Time value types shared by every backend

use core::fmt;

/// Millisecond instant used for session deadlines
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Millisecond duration used for session windows
pub type Duration = fugit::MillisDurationU64;

/// Seconds since 1970-01-01 00:00:00 UTC
///
/// Stored in 32 bits like the counter-style RTC, so it wraps in 2106.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EpochTime(u32);

impl EpochTime {
    /// 1970-01-01 00:00:00
    pub const ZERO: Self = Self(0);

    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u32 {
        self.0
    }

    /// Reassemble from the two 16-bit register halves
    pub const fn from_halves(high: u16, low: u16) -> Self {
        Self(((high as u32) << 16) | low as u32)
    }

    pub const fn high_half(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn low_half(self) -> u16 {
        self.0 as u16
    }

    /// Add seconds, wrapping like the hardware counter
    pub const fn wrapping_add_secs(self, secs: u32) -> Self {
        Self(self.0.wrapping_add(secs))
    }
}

impl fmt::Display for EpochTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Day of week, numbered from Sunday
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl Weekday {
    /// Map an index to a weekday, 0 = Sunday; values wrap modulo 7
    pub const fn from_index(index: u8) -> Self {
        match index % 7 {
            0 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            _ => Self::Saturday,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Hardware numbering: 1 = Monday .. 7 = Sunday
    pub const fn iso_number(self) -> u8 {
        match self {
            Self::Sunday => 7,
            other => other as u8,
        }
    }

    pub const fn from_iso_number(number: u8) -> Self {
        Self::from_index(number)
    }
}

/// Daylight-saving indicator, unknown unless a caller says otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DaylightSaving {
    #[default]
    Unknown,
    Off,
    On,
}

/// Broken-down calendar time
///
/// Year is absolute and month is 1-based. Fields are not validated; callers
/// supply consistent values. `second == 60` is accepted as a leap-second
/// placeholder and handled when the time is written to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarFields {
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    pub weekday: Weekday,
    /// 1-366
    pub day_of_year: u16,
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub minute: u8,
    /// 0-60
    pub second: u8,
    pub daylight_saving: DaylightSaving,
}

impl CalendarFields {
    /// Build fields for a date and time, deriving weekday and day of year
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday: crate::calendar::day_of_week(year, month, day),
            day_of_year: crate::calendar::day_of_year(year, month, day),
            hour,
            minute,
            second,
            daylight_saving: DaylightSaving::Unknown,
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS`
impl fmt::Display for CalendarFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
