//! Seconds-counter RTC backend (STM32F1 style)
//!
//! The hardware counter already counts seconds since the epoch, so reads and
//! writes move the 32-bit value straight through the 16-bit register pair.
//! Calendar views are computed with [`crate::calendar`].

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use hal_abstractions::CounterRegisters;

use super::{split_leap_second, wait_until, ClockBackend};
use crate::calendar::{calendar_to_epoch, epoch_to_calendar};
use crate::config::CounterConfig;
use crate::error::RtcError;
use crate::time::{CalendarFields, DaylightSaving, EpochTime};

/// Configuration mode held open for the lifetime of the guard
///
/// CNF is cleared on drop, so every exit path re-locks the peripheral.
struct ConfigWindow<'a, R: CounterRegisters> {
    regs: &'a mut R,
}

impl<'a, R: CounterRegisters> ConfigWindow<'a, R> {
    fn enter(regs: &'a mut R) -> Self {
        regs.enter_config_mode();
        Self { regs }
    }
}

impl<R: CounterRegisters> Deref for ConfigWindow<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.regs
    }
}

impl<R: CounterRegisters> DerefMut for ConfigWindow<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.regs
    }
}

impl<R: CounterRegisters> Drop for ConfigWindow<'_, R> {
    fn drop(&mut self) {
        self.regs.exit_config_mode();
    }
}

pub struct CounterBackend<R, D> {
    regs: R,
    delay: D,
    config: CounterConfig,
}

impl<R: CounterRegisters, D: DelayNs> CounterBackend<R, D> {
    pub fn new(regs: R, delay: D, config: CounterConfig) -> Self {
        Self {
            regs,
            delay,
            config,
        }
    }

    /// Run `write` inside a configuration window
    ///
    /// Waits for the previous write to finish, opens the window, writes,
    /// closes it and waits for the peripheral to commit.
    fn perform_write(&mut self, write: impl FnOnce(&mut R)) -> Result<(), RtcError> {
        let limit = self.config.poll_limit;
        if !wait_until(limit, || self.regs.write_complete()) {
            return Err(RtcError::WriteTimeout);
        }

        {
            let mut window = ConfigWindow::enter(&mut self.regs);
            write(&mut *window);
        }

        if !wait_until(limit, || self.regs.write_complete()) {
            return Err(RtcError::WriteTimeout);
        }
        Ok(())
    }

    fn read_counter(&self) -> EpochTime {
        // The low half can carry into the high half between the two reads
        let high = self.regs.counter_high();
        let low = self.regs.counter_low();
        let high_again = self.regs.counter_high();
        if high == high_again {
            EpochTime::from_halves(high, low)
        } else {
            EpochTime::from_halves(high_again, self.regs.counter_low())
        }
    }

    pub fn release(self) -> (R, D) {
        (self.regs, self.delay)
    }
}

impl<R: CounterRegisters, D: DelayNs> ClockBackend for CounterBackend<R, D> {
    fn configure(&mut self) -> Result<(), RtcError> {
        // Shadow registers are stale after a reset until RSF is set again
        self.regs.clear_sync_flag();
        if !wait_until(self.config.poll_limit, || self.regs.synchronized()) {
            return Err(RtcError::SyncTimeout);
        }

        let prescaler = self.config.prescaler;
        self.perform_write(|regs| regs.write_prescaler(prescaler))
            .map_err(|_| RtcError::InitTimeout)?;
        debug!("RTC prescaler set to {}", prescaler);
        Ok(())
    }

    fn epoch(&mut self) -> Result<EpochTime, RtcError> {
        Ok(self.read_counter())
    }

    fn set_epoch(&mut self, epoch: EpochTime) -> Result<(), RtcError> {
        self.perform_write(|regs| {
            regs.write_counter_low(epoch.low_half());
            regs.write_counter_high(epoch.high_half());
        })?;
        info!("RTC counter set to {}", epoch);
        Ok(())
    }

    fn calendar(&mut self) -> Result<CalendarFields, RtcError> {
        Ok(epoch_to_calendar(self.read_counter()))
    }

    fn set_calendar(&mut self, fields: &CalendarFields) -> Result<(), RtcError> {
        let (stored, leap_second) = split_leap_second(fields);
        if stored.daylight_saving == DaylightSaving::On {
            debug!("Counter RTC has no daylight-saving flag, ignoring");
        }

        self.set_epoch(calendar_to_epoch(&stored))?;
        if leap_second {
            self.delay.delay_ms(1_000);
        }
        Ok(())
    }

    fn reset_epoch(&self) -> EpochTime {
        EpochTime::ZERO
    }

    fn set_alarm(&mut self, target: EpochTime) -> Result<(), RtcError> {
        self.perform_write(|regs| {
            regs.write_alarm_low(target.low_half());
            regs.write_alarm_high(target.high_half());
        })?;
        self.regs.clear_alarm_flag();
        self.regs.set_alarm_interrupt(true);
        info!("RTC alarm set to {}", target);
        Ok(())
    }

    fn alarm_epoch(&mut self) -> Result<Option<EpochTime>, RtcError> {
        if !self.regs.alarm_interrupt_enabled() {
            return Ok(None);
        }
        Ok(Some(EpochTime::from_halves(
            self.regs.alarm_high(),
            self.regs.alarm_low(),
        )))
    }

    fn disable_alarm(&mut self) -> Result<(), RtcError> {
        self.regs.set_alarm_interrupt(false);
        self.regs.clear_alarm_flag();
        Ok(())
    }

    fn take_alarm_flag(&mut self) -> bool {
        let pending = self.regs.alarm_pending();
        if pending {
            self.regs.clear_alarm_flag();
        }
        pending
    }
}
