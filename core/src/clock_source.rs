//! Persisted record of the oscillator that clocks the RTC
//!
//! The flag lives in a backup-domain data register, so it survives a reset
//! but not a full power loss. Any value other than the two sentinels means
//! the backup domain started cold and the RTC content is meaningless.

use hal_abstractions::{BackupRegister, RtcClockSource};

const PRIMARY_SENTINEL: u16 = 0x8800;
const FALLBACK_SENTINEL: u16 = 0x8801;

/// Which oscillator last clocked the RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSourceFlag {
    /// Register holds no known sentinel
    Unset,
    /// External crystal (LSE)
    PrimaryOscillator,
    /// Internal RC oscillator (LSI)
    FallbackOscillator,
}

impl ClockSourceFlag {
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            PRIMARY_SENTINEL => Self::PrimaryOscillator,
            FALLBACK_SENTINEL => Self::FallbackOscillator,
            _ => Self::Unset,
        }
    }

    /// Register encoding; `Unset` clears the register
    pub const fn raw(self) -> u16 {
        match self {
            Self::Unset => 0,
            Self::PrimaryOscillator => PRIMARY_SENTINEL,
            Self::FallbackOscillator => FALLBACK_SENTINEL,
        }
    }

    /// True when the RTC kept running through the last reset
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub const fn source(self) -> Option<RtcClockSource> {
        match self {
            Self::Unset => None,
            Self::PrimaryOscillator => Some(RtcClockSource::External),
            Self::FallbackOscillator => Some(RtcClockSource::Internal),
        }
    }
}

impl From<RtcClockSource> for ClockSourceFlag {
    fn from(source: RtcClockSource) -> Self {
        match source {
            RtcClockSource::External => Self::PrimaryOscillator,
            RtcClockSource::Internal => Self::FallbackOscillator,
        }
    }
}

/// Reads and writes [`ClockSourceFlag`] through one backup register
pub struct ClockSourceStore<B> {
    register: B,
}

impl<B: BackupRegister> ClockSourceStore<B> {
    pub fn new(register: B) -> Self {
        Self { register }
    }

    pub fn read_flag(&self) -> ClockSourceFlag {
        ClockSourceFlag::from_raw(self.register.read())
    }

    /// Backup-domain write access must already be enabled
    pub fn write_flag(&mut self, flag: ClockSourceFlag) {
        self.register.write(flag.raw());
    }

    pub fn release(self) -> B {
        self.register
    }
}
