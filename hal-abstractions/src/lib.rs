//! Hardware abstraction traits for RTC firmware
//!
//! This crate defines the register-level surface that `rtc-core` drives.
//! BSPs implement these traits on top of their PAC; everything above the
//! register boundary (epoch arithmetic, write sequencing, bounded waits)
//! lives in `rtc-core` so it can be tested on the host.
//!
//! Two RTC families are covered:
//! - [`CounterRegisters`]: a free-running 32-bit seconds counter split across
//!   two 16-bit registers, with a matching alarm register pair (STM32F1 style)
//! - [`CalendarRegisters`]: native date/time registers with a two-digit year,
//!   1-based Monday-first weekday and a date-match alarm (STM32F2/F4 style)

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

/// Low-speed oscillator driving the RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcClockSource {
    /// External 32.768 kHz crystal (LSE)
    External,
    /// Internal RC oscillator (LSI)
    Internal,
}

/// A single backup-domain data register
///
/// Survives a processor reset, but not loss of both main and battery supply.
pub trait BackupRegister {
    fn read(&self) -> u16;
    fn write(&mut self, value: u16);
}

/// Low-speed clock tree control for the RTC
pub trait LowSpeedClocks {
    /// Lift backup-domain write protection (PWR DBP)
    fn enable_backup_access(&mut self);

    /// Switch the external oscillator on; readiness is polled separately
    fn start_external(&mut self);

    /// External oscillator ready flag (LSERDY)
    fn external_ready(&self) -> bool;

    /// Switch the internal oscillator on
    fn start_internal(&mut self);

    /// Route `source` to the RTC and enable the RTC clock
    fn select_rtc_source(&mut self, source: RtcClockSource);
}

/// Counter-style RTC register file
///
/// Writes to the counter, alarm and prescaler registers are only accepted
/// while configuration mode is active, and only take effect once the
/// write-complete flag reads back as set.
pub trait CounterRegisters {
    /// Enable backup-domain access and set CNF
    fn enter_config_mode(&mut self);
    /// Clear CNF; the peripheral starts committing the pending writes
    fn exit_config_mode(&mut self);
    /// RTOFF: last write operation has completed
    fn write_complete(&self) -> bool;

    /// Clear RSF so that [`Self::synchronized`] tracks the next APB resync
    fn clear_sync_flag(&mut self);
    /// RSF: shadow registers hold fresh values
    fn synchronized(&self) -> bool;

    /// 20-bit prescaler reload value (PRLH:PRLL)
    fn write_prescaler(&mut self, reload: u32);

    fn counter_high(&self) -> u16;
    fn counter_low(&self) -> u16;
    fn write_counter_high(&mut self, value: u16);
    fn write_counter_low(&mut self, value: u16);

    fn alarm_high(&self) -> u16;
    fn alarm_low(&self) -> u16;
    fn write_alarm_high(&mut self, value: u16);
    fn write_alarm_low(&mut self, value: u16);

    /// ALRF is set
    fn alarm_pending(&self) -> bool;
    /// Clear ALRF and the EXTI pending bit of the alarm line
    fn clear_alarm_flag(&mut self);
    /// ALRIE together with the EXTI rising-edge trigger of the alarm line
    fn set_alarm_interrupt(&mut self, enabled: bool);
    fn alarm_interrupt_enabled(&self) -> bool;
}

/// Date register content in hardware conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawDate {
    /// Two-digit year (0-99), offset from a fixed base year
    pub year: u8,
    /// Month (1-12)
    pub month: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Weekday (1 = Monday .. 7 = Sunday)
    pub weekday: u8,
}

/// Time register content, 24-hour format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// Alarm register content in date-match mode, no field masked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawAlarm {
    /// Day of month (1-31)
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// Calendar-style RTC register file
///
/// Date, time and prescaler registers are writable only while write
/// protection is lifted and initialization mode is active.
pub trait CalendarRegisters {
    /// Write the WPR unlock key sequence
    fn disable_write_protection(&mut self);
    /// Write a wrong key to WPR, re-arming protection
    fn enable_write_protection(&mut self);

    /// Request initialization mode (INIT)
    fn enter_init_mode(&mut self);
    /// INITF: the calendar is stopped and may be written
    fn init_mode_active(&self) -> bool;
    /// Leave initialization mode; the calendar restarts
    fn exit_init_mode(&mut self);

    /// Clear RSF so that [`Self::synchronized`] tracks the next shadow update
    fn clear_sync_flag(&mut self);
    /// RSF: shadow registers hold fresh values
    fn synchronized(&self) -> bool;

    /// Select 24-hour format with output disabled
    fn configure_format(&mut self);
    fn write_prescalers(&mut self, asynchronous: u8, synchronous: u16);

    fn read_date(&self) -> RawDate;
    fn read_time(&self) -> RawTime;
    fn write_date(&mut self, date: RawDate);
    fn write_time(&mut self, time: RawTime);

    /// Daylight-saving "stored operation" bit (CR.BKP)
    fn daylight_saving(&self) -> bool;
    fn set_daylight_saving(&mut self, on: bool);

    /// Clear ALRAE/ALRAIE so the alarm registers can be written
    fn disable_alarm(&mut self);
    /// ALRAWF: alarm registers accept writes
    fn alarm_writable(&self) -> bool;
    fn write_alarm(&mut self, alarm: RawAlarm);
    fn read_alarm(&self) -> RawAlarm;
    /// Set ALRAE/ALRAIE and the EXTI rising-edge trigger of the alarm line
    fn enable_alarm(&mut self);
    fn alarm_enabled(&self) -> bool;

    /// ALRAF is set
    fn alarm_pending(&self) -> bool;
    /// Clear ALRAF and the EXTI pending bit of the alarm line
    fn clear_alarm_flag(&mut self);
}
