//! Low-speed oscillator bring-up with fallback
//!
//! The external crystal is tried first with an attempt-bounded poll of its
//! ready flag. The budget counts polls rather than elapsed time, so the
//! outcome does not depend on the core clock. If the crystal never reports
//! ready the internal RC oscillator takes over; it has no usable ready
//! signal and is assumed to run.

use embedded_hal::delay::DelayNs;
use hal_abstractions::{BackupRegister, LowSpeedClocks, RtcClockSource};

use crate::clock_source::{ClockSourceFlag, ClockSourceStore};
use crate::config::OscillatorConfig;

pub struct OscillatorSelector<C, D> {
    clocks: C,
    delay: D,
    config: OscillatorConfig,
}

impl<C: LowSpeedClocks, D: DelayNs> OscillatorSelector<C, D> {
    pub fn new(clocks: C, delay: D, config: OscillatorConfig) -> Self {
        Self {
            clocks,
            delay,
            config,
        }
    }

    /// Pick the RTC clock source and record it in `store`
    ///
    /// Safe to call again; the source is re-selected and re-persisted.
    pub fn select_and_init<B: BackupRegister>(
        &mut self,
        store: &mut ClockSourceStore<B>,
    ) -> ClockSourceFlag {
        self.clocks.enable_backup_access();
        self.clocks.start_external();

        let source = match self.wait_external() {
            Some(polls) => {
                info!("LSE ready after {} polls", polls);
                RtcClockSource::External
            }
            None => {
                warn!(
                    "LSE not ready after {} polls, falling back to LSI",
                    self.config.attempts
                );
                self.clocks.start_internal();
                RtcClockSource::Internal
            }
        };

        self.clocks.select_rtc_source(source);
        let flag = ClockSourceFlag::from(source);
        store.write_flag(flag);
        flag
    }

    /// Poll the ready flag; returns the number of polls it took
    fn wait_external(&mut self) -> Option<u16> {
        for poll in 1..=self.config.attempts {
            if self.clocks.external_ready() {
                return Some(poll);
            }
            self.delay.delay_ms(self.config.interval_ms);
        }
        None
    }

    pub fn release(self) -> (C, D) {
        (self.clocks, self.delay)
    }
}
