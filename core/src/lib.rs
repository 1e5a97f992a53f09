//! Platform-agnostic RTC logic
//!
//! Everything above the register boundary lives here: calendar arithmetic,
//! oscillator selection with backup-register bookkeeping, the two clock
//! backends, the alarm dispatcher and the interactive time-set session.
//! Board crates supply `hal-abstractions` implementations and drive these
//! types from their RTIC tasks. The crate has NO PAC dependencies and its
//! tests run on the host against register simulators.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod alarm;
pub mod backend;
pub mod boot;
pub mod calendar;
pub mod clock_source;
pub mod config;
pub mod console;
pub mod error;
pub mod oscillator;
pub mod session;
pub mod time;

#[cfg(test)]
mod mock;

pub use alarm::{AlarmAction, AlarmHandler, AlarmState, AlarmSubsystem, LogAlarm};
pub use backend::{CalendarBackend, ClockBackend, CounterBackend};
pub use boot::{boot, BootReport};
pub use clock_source::{ClockSourceFlag, ClockSourceStore};
pub use config::{CalendarConfig, CounterConfig, OscillatorConfig, SessionConfig};
pub use console::{ConfirmKey, LineReader};
pub use error::RtcError;
pub use oscillator::OscillatorSelector;
pub use session::{parse_timestamp, SessionEvent, SessionState, TimeSetSession};
pub use time::{CalendarFields, DaylightSaving, Duration, EpochTime, Instant, Weekday};
