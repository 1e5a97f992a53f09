//! RTC configuration structures

use crate::time::Duration;

/// Upper bound on polls of a hardware status flag before giving up
///
/// Completion flags normally assert within a few RTC clock cycles; the bound
/// only matters when the peripheral is unclocked.
const DEFAULT_POLL_LIMIT: u32 = 0x0010_0000;

/// External oscillator start-up budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscillatorConfig {
    /// Number of ready-flag polls before falling back to the internal oscillator
    pub attempts: u16,
    /// Delay between polls in milliseconds
    pub interval_ms: u32,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            attempts: 200,
            interval_ms: 5,
        }
    }
}

/// Counter-style RTC configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CounterConfig {
    /// Prescaler reload; 0x7FFF divides 32.768 kHz down to 1 Hz
    pub prescaler: u32,
    /// Poll budget for RTOFF/RSF waits
    pub poll_limit: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            prescaler: 0x7FFF,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

/// Calendar-style RTC configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarConfig {
    /// Absolute year stored as hardware year 00
    ///
    /// Must be a multiple of 4 so the hardware's leap-year rule (year
    /// register divisible by 4) lines up with the Gregorian one.
    pub year_base: u16,
    /// Asynchronous prescaler (PREDIV_A)
    pub async_prescaler: u8,
    /// Synchronous prescaler (PREDIV_S); (0x7F + 1) * (0xFF + 1) = 32768
    pub sync_prescaler: u16,
    /// Poll budget for INITF/RSF/ALRAWF waits
    pub poll_limit: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            year_base: 2000,
            async_prescaler: 0x7F,
            sync_prescaler: 0xFF,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

/// Interactive time-set session windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the confirmation key
    pub confirm_window: Duration,
    /// How long to wait for a timestamp line once confirmed
    pub input_window: Duration,
    /// Sleep between polls when driven by a firmware task
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirm_window: Duration::millis(1_000),
            input_window: Duration::millis(10_000),
            poll_interval: Duration::millis(10),
        }
    }
}
