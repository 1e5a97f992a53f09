//! Single-shot RTC alarm dispatch
//!
//! The interrupt path clears the pending status, calls the registered
//! handler and then either disables the hardware alarm or re-arms it for the
//! handler's next target. Time registers are never touched. Single-shot
//! delivery is also enforced in software so that it holds on date-match
//! hardware, where the same day/time fields match again a month later.

use crate::backend::ClockBackend;
use crate::error::RtcError;
use crate::time::EpochTime;

/// What to do after an alarm has been delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmAction {
    Disarm,
    /// Arm again for a new target
    Rearm(EpochTime),
}

/// Alarm callback, run in interrupt context
///
/// Must not block or allocate.
pub trait AlarmHandler {
    fn on_alarm(&mut self, now: EpochTime, target: EpochTime) -> AlarmAction;
}

impl<F> AlarmHandler for F
where
    F: FnMut(EpochTime, EpochTime) -> AlarmAction,
{
    fn on_alarm(&mut self, now: EpochTime, target: EpochTime) -> AlarmAction {
        self(now, target)
    }
}

/// Default handler: log and disarm
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlarm;

impl AlarmHandler for LogAlarm {
    fn on_alarm(&mut self, now: EpochTime, _target: EpochTime) -> AlarmAction {
        info!("Alarm! at {}", now);
        AlarmAction::Disarm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmState {
    pub configured: bool,
    pub target: EpochTime,
}

pub struct AlarmSubsystem<H = LogAlarm> {
    state: AlarmState,
    handler: H,
}

impl Default for AlarmSubsystem<LogAlarm> {
    fn default() -> Self {
        Self::new(LogAlarm)
    }
}

impl<H: AlarmHandler> AlarmSubsystem<H> {
    pub fn new(handler: H) -> Self {
        Self {
            state: AlarmState::default(),
            handler,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Arm for `target`, replacing any previous target
    pub fn configure<B: ClockBackend>(
        &mut self,
        backend: &mut B,
        target: EpochTime,
    ) -> Result<(), RtcError> {
        // Disarm first so a failed write never leaves the old target live
        self.state.configured = false;
        backend.set_alarm(target)?;
        self.state = AlarmState {
            configured: true,
            target,
        };
        Ok(())
    }

    pub fn cancel<B: ClockBackend>(&mut self, backend: &mut B) -> Result<(), RtcError> {
        self.state.configured = false;
        backend.disable_alarm()?;
        debug!("RTC alarm cancelled");
        Ok(())
    }

    /// Alarm interrupt entry point
    ///
    /// Returns `true` if the handler ran. Matches before the armed target are
    /// acknowledged and dropped. A match while disarmed also switches the
    /// hardware alarm off.
    pub fn on_interrupt<B: ClockBackend>(&mut self, backend: &mut B) -> Result<bool, RtcError> {
        if !backend.take_alarm_flag() {
            return Ok(false);
        }
        if !self.state.configured {
            trace!("Alarm match while disarmed");
            backend.disable_alarm()?;
            return Ok(false);
        }

        let now = backend.epoch()?;
        let target = self.state.target;
        if now < target {
            trace!("Early date match at {}, waiting for {}", now, target);
            return Ok(false);
        }

        self.state.configured = false;
        match self.handler.on_alarm(now, target) {
            AlarmAction::Disarm => backend.disable_alarm()?,
            AlarmAction::Rearm(next) => self.configure(backend, next)?,
        }
        Ok(true)
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CalendarBackend, CounterBackend};
    use crate::calendar::calendar_to_epoch;
    use crate::config::{CalendarConfig, CounterConfig};
    use crate::mock::{MockCalendar, MockCounter};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use crate::time::CalendarFields;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting(fired: &Rc<Cell<u32>>) -> impl FnMut(EpochTime, EpochTime) -> AlarmAction {
        let fired = fired.clone();
        move |_, _| {
            fired.set(fired.get() + 1);
            AlarmAction::Disarm
        }
    }

    fn counter_backend(regs: &MockCounter) -> CounterBackend<MockCounter, NoopDelay> {
        CounterBackend::new(regs.clone(), NoopDelay::new(), CounterConfig::default())
    }

    #[test]
    fn test_alarm_fires_exactly_once() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(1_000)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        alarm.configure(&mut rtc, EpochTime::from_secs(1_005)).unwrap();

        for _ in 0..20 {
            regs.advance_secs(1);
            alarm.on_interrupt(&mut rtc).unwrap();
        }

        assert_eq!(fired.get(), 1);
        assert!(!alarm.state().configured);
    }

    #[test]
    fn test_new_target_replaces_old() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(0)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        alarm.configure(&mut rtc, EpochTime::from_secs(3)).unwrap();
        alarm.configure(&mut rtc, EpochTime::from_secs(6)).unwrap();

        regs.advance_secs(3);
        assert!(!alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 0);

        regs.advance_secs(3);
        assert!(alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_cancel_suppresses_delivery() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(10)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        alarm.configure(&mut rtc, EpochTime::from_secs(12)).unwrap();
        alarm.cancel(&mut rtc).unwrap();

        regs.advance_secs(5);
        assert!(!alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 0);
        assert!(!regs.alarm_interrupt());
    }

    #[test]
    fn test_handler_can_rearm() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(100)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let seen = fired.clone();
        let mut alarm = AlarmSubsystem::new(move |now: EpochTime, _target: EpochTime| {
            seen.set(seen.get() + 1);
            if seen.get() < 3 {
                AlarmAction::Rearm(now.wrapping_add_secs(10))
            } else {
                AlarmAction::Disarm
            }
        });
        alarm.configure(&mut rtc, EpochTime::from_secs(110)).unwrap();

        for _ in 0..60 {
            regs.advance_secs(1);
            alarm.on_interrupt(&mut rtc).unwrap();
        }
        assert_eq!(fired.get(), 3);
        assert_eq!(alarm.state().target, EpochTime::from_secs(130));
        assert!(!alarm.state().configured);
    }

    #[test]
    fn test_calendar_early_match_ignored() {
        let regs = MockCalendar::new(2000);
        let mut rtc = CalendarBackend::new(
            regs.clone(),
            NoopDelay::new(),
            CalendarConfig::default(),
        );
        let start = calendar_to_epoch(&CalendarFields::new(2024, 8, 2, 8, 29, 59));
        rtc.set_epoch(start).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        // Same day-of-month and time one month out
        let target = calendar_to_epoch(&CalendarFields::new(2024, 9, 2, 8, 30, 0));
        alarm.configure(&mut rtc, target).unwrap();

        regs.advance_secs(1);
        assert!(!alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 0);
        assert!(alarm.state().configured);

        regs.preset(target.wrapping_add_secs(u32::MAX));
        regs.advance_secs(1);
        assert!(alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_default_handler_disarms() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(0)).unwrap();

        let mut alarm: AlarmSubsystem = AlarmSubsystem::default();
        alarm.configure(&mut rtc, EpochTime::from_secs(1)).unwrap();
        regs.advance_secs(1);
        assert!(alarm.on_interrupt(&mut rtc).unwrap());
        assert!(!alarm.state().configured);
    }

    #[test]
    fn test_delivery_switches_counter_alarm_off() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(500)).unwrap();

        let mut alarm: AlarmSubsystem = AlarmSubsystem::default();
        alarm.configure(&mut rtc, EpochTime::from_secs(501)).unwrap();
        assert_eq!(rtc.alarm_epoch().unwrap(), Some(EpochTime::from_secs(501)));

        regs.advance_secs(1);
        assert!(alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(rtc.alarm_epoch().unwrap(), None);
        assert!(!regs.alarm_interrupt());
    }

    #[test]
    fn test_delivery_switches_calendar_alarm_off() {
        let regs = MockCalendar::new(2000);
        let mut rtc = CalendarBackend::new(regs.clone(), NoopDelay::new(), CalendarConfig::default());
        let start = calendar_to_epoch(&CalendarFields::new(2024, 8, 2, 8, 29, 59));
        rtc.set_epoch(start).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        alarm.configure(&mut rtc, start.wrapping_add_secs(1)).unwrap();

        regs.advance_secs(1);
        assert!(alarm.on_interrupt(&mut rtc).unwrap());
        assert!(!alarm.state().configured);
        assert_eq!(rtc.alarm_epoch().unwrap(), None);

        // Same day and time next month stays quiet
        regs.preset(calendar_to_epoch(&CalendarFields::new(2024, 9, 2, 8, 29, 59)));
        regs.advance_secs(1);
        assert!(!alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_match_while_disarmed_switches_alarm_off() {
        let regs = MockCounter::new();
        let mut rtc = counter_backend(&regs);
        rtc.set_epoch(EpochTime::from_secs(10)).unwrap();
        rtc.set_alarm(EpochTime::from_secs(11)).unwrap();

        let fired = Rc::new(Cell::new(0));
        let mut alarm = AlarmSubsystem::new(counting(&fired));
        regs.advance_secs(1);
        assert!(!alarm.on_interrupt(&mut rtc).unwrap());
        assert_eq!(fired.get(), 0);
        assert_eq!(rtc.alarm_epoch().unwrap(), None);
    }
}
