//! Epoch-time backends over the two RTC register models
//!
//! [`CounterBackend`] drives a bare seconds counter and does all calendar
//! work in software. [`CalendarBackend`] drives native date/time registers
//! and converts at the boundary. Both present the same [`ClockBackend`]
//! contract so the alarm dispatcher, boot sequence and time-set session are
//! written once.

mod calendar;
mod counter;

pub use calendar::CalendarBackend;
pub use counter::CounterBackend;

use crate::error::RtcError;
use crate::time::{CalendarFields, EpochTime};

/// Epoch-based clock contract shared by both RTC families
pub trait ClockBackend {
    /// Program prescalers and formats after the oscillator is running
    fn configure(&mut self) -> Result<(), RtcError>;

    fn epoch(&mut self) -> Result<EpochTime, RtcError>;

    fn set_epoch(&mut self, epoch: EpochTime) -> Result<(), RtcError>;

    fn calendar(&mut self) -> Result<CalendarFields, RtcError>;

    /// Write calendar time
    ///
    /// A `second` of 60 stores :59 and then blocks for one real second.
    /// Callers sharing the backend with an interrupt handler hold it for
    /// that second.
    fn set_calendar(&mut self, fields: &CalendarFields) -> Result<(), RtcError>;

    /// Instant written when the backup domain starts cold
    fn reset_epoch(&self) -> EpochTime;

    /// Arm the single hardware alarm, replacing any previous target
    fn set_alarm(&mut self, target: EpochTime) -> Result<(), RtcError>;

    /// Armed alarm instant, `None` while the alarm interrupt is disabled
    fn alarm_epoch(&mut self) -> Result<Option<EpochTime>, RtcError>;

    fn disable_alarm(&mut self) -> Result<(), RtcError>;

    /// Clear a pending alarm match; returns whether one was pending
    fn take_alarm_flag(&mut self) -> bool;
}

/// Poll `ready` at most `limit` times
pub(crate) fn wait_until(limit: u32, mut ready: impl FnMut() -> bool) -> bool {
    (0..limit).any(|_| ready())
}

/// Replace a leap-second placeholder with :59
///
/// Returns the fields to store and whether the caller owes a one-second
/// delay after the write.
pub(crate) fn split_leap_second(fields: &CalendarFields) -> (CalendarFields, bool) {
    if fields.second == 60 {
        let mut stored = *fields;
        stored.second = 59;
        (stored, true)
    } else {
        (*fields, false)
    }
}
