//! Calendar-register RTC backend (STM32F2/F4 style)
//!
//! The hardware advances date and time fields itself, so epoch values are
//! converted to fields on write and back on read. The boundary handles the
//! hardware's conventions: two-digit year offset from
//! [`CalendarConfig::year_base`], Monday-first 1-based weekday, and a
//! daylight-saving "stored operation" bit.

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use hal_abstractions::{CalendarRegisters, RawAlarm, RawDate, RawTime};

use super::{split_leap_second, wait_until, ClockBackend};
use crate::calendar::{calendar_to_epoch, day_of_year, days_in_month, epoch_to_calendar};
use crate::config::CalendarConfig;
use crate::error::RtcError;
use crate::time::{CalendarFields, DaylightSaving, EpochTime, Weekday};

/// Write protection lifted until drop
struct Unlocked<'a, R: CalendarRegisters> {
    regs: &'a mut R,
}

impl<'a, R: CalendarRegisters> Unlocked<'a, R> {
    fn new(regs: &'a mut R) -> Self {
        regs.disable_write_protection();
        Self { regs }
    }
}

impl<R: CalendarRegisters> Deref for Unlocked<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.regs
    }
}

impl<R: CalendarRegisters> DerefMut for Unlocked<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.regs
    }
}

impl<R: CalendarRegisters> Drop for Unlocked<'_, R> {
    fn drop(&mut self) {
        self.regs.enable_write_protection();
    }
}

/// Initialization mode with write protection lifted
///
/// Drop leaves init mode first, then re-arms write protection.
struct InitWindow<'a, R: CalendarRegisters> {
    unlocked: Unlocked<'a, R>,
}

impl<'a, R: CalendarRegisters> InitWindow<'a, R> {
    fn enter(regs: &'a mut R, poll_limit: u32) -> Result<Self, RtcError> {
        let mut unlocked = Unlocked::new(regs);
        unlocked.enter_init_mode();
        let window = Self { unlocked };
        if wait_until(poll_limit, || window.init_mode_active()) {
            Ok(window)
        } else {
            Err(RtcError::InitTimeout)
        }
    }
}

impl<R: CalendarRegisters> Deref for InitWindow<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.unlocked
    }
}

impl<R: CalendarRegisters> DerefMut for InitWindow<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.unlocked
    }
}

impl<R: CalendarRegisters> Drop for InitWindow<'_, R> {
    fn drop(&mut self) {
        self.unlocked.exit_init_mode();
    }
}

pub struct CalendarBackend<R, D> {
    regs: R,
    delay: D,
    config: CalendarConfig,
}

impl<R: CalendarRegisters, D: DelayNs> CalendarBackend<R, D> {
    pub fn new(regs: R, delay: D, config: CalendarConfig) -> Self {
        Self {
            regs,
            delay,
            config,
        }
    }

    /// Wait for the shadow registers to pick up the last write
    fn resync(&mut self) -> Result<(), RtcError> {
        let limit = self.config.poll_limit;
        let mut unlocked = Unlocked::new(&mut self.regs);
        unlocked.clear_sync_flag();
        if wait_until(limit, || unlocked.synchronized()) {
            Ok(())
        } else {
            Err(RtcError::SyncTimeout)
        }
    }

    fn year_offset(&self, year: u16) -> Result<u8, RtcError> {
        year.checked_sub(self.config.year_base)
            .filter(|offset| *offset <= 99)
            .map(|offset| offset as u8)
            .ok_or(RtcError::YearOutOfRange)
    }

    pub fn release(self) -> (R, D) {
        (self.regs, self.delay)
    }
}

impl<R: CalendarRegisters, D: DelayNs> ClockBackend for CalendarBackend<R, D> {
    fn configure(&mut self) -> Result<(), RtcError> {
        {
            let mut window = InitWindow::enter(&mut self.regs, self.config.poll_limit)?;
            window.configure_format();
            window.write_prescalers(self.config.async_prescaler, self.config.sync_prescaler);
        }
        debug!(
            "RTC prescalers set to {}/{}",
            self.config.async_prescaler,
            self.config.sync_prescaler
        );
        self.resync()
    }

    fn epoch(&mut self) -> Result<EpochTime, RtcError> {
        Ok(calendar_to_epoch(&self.calendar()?))
    }

    fn set_epoch(&mut self, epoch: EpochTime) -> Result<(), RtcError> {
        self.set_calendar(&epoch_to_calendar(epoch))
    }

    fn calendar(&mut self) -> Result<CalendarFields, RtcError> {
        // Reading the time register latches the date shadow until it is read
        let time = self.regs.read_time();
        let date = self.regs.read_date();
        let year = self.config.year_base + date.year as u16;

        Ok(CalendarFields {
            year,
            month: date.month,
            day: date.day,
            weekday: Weekday::from_iso_number(date.weekday),
            day_of_year: day_of_year(year, date.month, date.day),
            hour: time.hours,
            minute: time.minutes,
            second: time.seconds,
            daylight_saving: if self.regs.daylight_saving() {
                DaylightSaving::On
            } else {
                DaylightSaving::Off
            },
        })
    }

    fn set_calendar(&mut self, fields: &CalendarFields) -> Result<(), RtcError> {
        let (stored, leap_second) = split_leap_second(fields);
        let date = RawDate {
            year: self.year_offset(stored.year)?,
            month: stored.month,
            day: stored.day,
            weekday: stored.weekday.iso_number(),
        };
        let time = RawTime {
            hours: stored.hour,
            minutes: stored.minute,
            seconds: stored.second,
        };

        {
            let mut window = InitWindow::enter(&mut self.regs, self.config.poll_limit)?;
            window.write_date(date);
            window.write_time(time);
            window.set_daylight_saving(stored.daylight_saving == DaylightSaving::On);
        }
        self.resync()?;
        info!("RTC calendar set to {}", stored);

        if leap_second {
            self.delay.delay_ms(1_000);
        }
        Ok(())
    }

    fn reset_epoch(&self) -> EpochTime {
        if self.config.year_base <= 1970 {
            EpochTime::ZERO
        } else {
            calendar_to_epoch(&CalendarFields::new(self.config.year_base, 1, 1, 0, 0, 0))
        }
    }

    fn set_alarm(&mut self, target: EpochTime) -> Result<(), RtcError> {
        let fields = epoch_to_calendar(target);
        let alarm = RawAlarm {
            day: fields.day,
            hours: fields.hour,
            minutes: fields.minute,
            seconds: fields.second,
        };

        {
            let limit = self.config.poll_limit;
            let mut unlocked = Unlocked::new(&mut self.regs);
            unlocked.disable_alarm();
            if !wait_until(limit, || unlocked.alarm_writable()) {
                return Err(RtcError::AlarmUnavailable);
            }
            unlocked.write_alarm(alarm);
            unlocked.clear_alarm_flag();
            unlocked.enable_alarm();
        }
        info!("RTC alarm set to {}", fields);
        Ok(())
    }

    /// Next instant at or after now that matches the programmed alarm
    ///
    /// The hardware only stores day of month and time of day, so the month
    /// and year are reconstructed from the running calendar.
    fn alarm_epoch(&mut self) -> Result<Option<EpochTime>, RtcError> {
        if !self.regs.alarm_enabled() {
            return Ok(None);
        }
        let alarm = self.regs.read_alarm();
        let now = self.calendar()?;
        let now_epoch = calendar_to_epoch(&now);

        let (mut year, mut month) = (now.year, now.month);
        // Any day of month up to 31 recurs within a year
        for _ in 0..=12 {
            if alarm.day <= days_in_month(year, month) {
                let candidate = calendar_to_epoch(&CalendarFields::new(
                    year,
                    month,
                    alarm.day,
                    alarm.hours,
                    alarm.minutes,
                    alarm.seconds,
                ));
                if candidate >= now_epoch {
                    return Ok(Some(candidate));
                }
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        Ok(None)
    }

    fn disable_alarm(&mut self) -> Result<(), RtcError> {
        let mut unlocked = Unlocked::new(&mut self.regs);
        unlocked.disable_alarm();
        unlocked.clear_alarm_flag();
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
