//! RTC error types

/// RTC operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError {
    /// Peripheral did not enter initialization/configuration mode
    InitTimeout,
    /// Write-complete flag never asserted after leaving configuration mode
    WriteTimeout,
    /// Shadow registers never resynchronized
    SyncTimeout,
    /// Year outside the window the calendar hardware can hold
    YearOutOfRange,
    /// Alarm registers never became writable
    AlarmUnavailable,
}

impl core::fmt::Display for RtcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InitTimeout => write!(f, "RTC initialization timeout"),
            Self::WriteTimeout => write!(f, "RTC write timeout"),
            Self::SyncTimeout => write!(f, "RTC register synchronization timeout"),
            Self::YearOutOfRange => write!(f, "Year out of range for RTC"),
            Self::AlarmUnavailable => write!(f, "RTC alarm not writable"),
        }
    }
}

impl core::error::Error for RtcError {}
