//! Host-side simulators for the register traits and I/O seams
//!
//! Every mock is a cheap handle around shared state, so a test keeps one
//! clone for inspection while the code under test owns another.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use hal_abstractions::{
    BackupRegister, CalendarRegisters, CounterRegisters, LowSpeedClocks, RawAlarm, RawDate,
    RawTime, RtcClockSource,
};

use crate::calendar::{calendar_to_epoch, epoch_to_calendar};
use crate::time::{CalendarFields, EpochTime};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Polls a completion flag reads low after a write is started
const BUSY_POLLS: u32 = 2;

/// Something that advances with simulated time
pub trait Ticker {
    fn advance_ns(&self, ns: u64);
}

/// Delay that records elapsed time and optionally drives a simulated RTC
///
/// Tests that need neither use `embedded_hal_mock`'s `NoopDelay`.
#[derive(Clone, Default)]
pub struct MockDelay {
    elapsed_ns: Rc<Cell<u64>>,
    ticker: Option<Rc<dyn Ticker>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking<T: Ticker + 'static>(ticker: T) -> Self {
        Self {
            elapsed_ns: Rc::default(),
            ticker: Some(Rc::new(ticker)),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ns as u64);
        if let Some(ticker) = &self.ticker {
            ticker.advance_ns(ns as u64);
        }
    }
}

#[derive(Clone)]
pub struct MockBackup(Rc<Cell<u16>>);

impl MockBackup {
    pub fn new(value: u16) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn value(&self) -> u16 {
        self.0.get()
    }
}

impl BackupRegister for MockBackup {
    fn read(&self) -> u16 {
        self.0.get()
    }

    fn write(&mut self, value: u16) {
        self.0.set(value);
    }
}

#[derive(Default)]
struct ClocksState {
    backup_access: bool,
    external_started: bool,
    ready_after: Option<u32>,
    polls: u32,
    internal_started: bool,
    selected: Option<RtcClockSource>,
}

/// Oscillator control whose LSE ready bit asserts after N polls, or never
#[derive(Clone, Default)]
pub struct MockClocks(Rc<RefCell<ClocksState>>);

impl MockClocks {
    pub fn ready_after(polls: u32) -> Self {
        let clocks = Self::default();
        clocks.0.borrow_mut().ready_after = Some(polls);
        clocks
    }

    pub fn never_ready() -> Self {
        Self::default()
    }

    pub fn polls(&self) -> u32 {
        self.0.borrow().polls
    }

    pub fn backup_access(&self) -> bool {
        self.0.borrow().backup_access
    }

    pub fn internal_started(&self) -> bool {
        self.0.borrow().internal_started
    }

    pub fn selected(&self) -> Option<RtcClockSource> {
        self.0.borrow().selected
    }
}

impl LowSpeedClocks for MockClocks {
    fn enable_backup_access(&mut self) {
        self.0.borrow_mut().backup_access = true;
    }

    fn start_external(&mut self) {
        self.0.borrow_mut().external_started = true;
    }

    fn external_ready(&self) -> bool {
        let mut state = self.0.borrow_mut();
        state.polls += 1;
        let polls = state.polls;
        state.external_started && state.ready_after.is_some_and(|n| polls >= n)
    }

    fn start_internal(&mut self) {
        self.0.borrow_mut().internal_started = true;
    }

    fn select_rtc_source(&mut self, source: RtcClockSource) {
        self.0.borrow_mut().selected = Some(source);
    }
}

#[derive(Default)]
struct CounterState {
    config_mode: bool,
    busy_polls: u32,
    stuck: bool,
    synchronized: bool,
    counter: u32,
    alarm: u32,
    alarm_flag: bool,
    alarm_interrupt: bool,
    prescaler: u32,
    log: Vec<&'static str>,
    rejected: u32,
    last_counter: Option<u32>,
    sub_ns: u64,
    tick_after_high_reads: Option<u32>,
}

impl CounterState {
    fn tick(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        if self.alarm_interrupt && self.counter == self.alarm {
            self.alarm_flag = true;
        }
    }

    /// Record a write; false if configuration mode was not open
    fn accept(&mut self, name: &'static str) -> bool {
        self.log.push(name);
        if !self.config_mode {
            self.rejected += 1;
        }
        self.config_mode
    }
}

/// Seconds-counter register file with CNF/RTOFF handshake
#[derive(Clone, Default)]
pub struct MockCounter(Rc<RefCell<CounterState>>);

impl MockCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload the counter as if it kept running through a reset
    pub fn preset(&self, secs: u32) {
        self.0.borrow_mut().counter = secs;
    }

    pub fn advance_secs(&self, secs: u32) {
        let mut state = self.0.borrow_mut();
        for _ in 0..secs {
            state.tick();
        }
    }

    /// Tick once right after the `reads`-th read of the high half
    pub fn tick_after_high_reads(&self, reads: u32) {
        self.0.borrow_mut().tick_after_high_reads = Some(reads);
    }

    pub fn set_stuck(&self, stuck: bool) {
        self.0.borrow_mut().stuck = stuck;
    }

    pub fn write_log(&self) -> Vec<&'static str> {
        self.0.borrow().log.clone()
    }

    pub fn rejected_writes(&self) -> u32 {
        self.0.borrow().rejected
    }

    pub fn config_mode(&self) -> bool {
        self.0.borrow().config_mode
    }

    pub fn prescaler(&self) -> u32 {
        self.0.borrow().prescaler
    }

    pub fn last_written_counter(&self) -> Option<u32> {
        self.0.borrow().last_counter
    }

    pub fn alarm_interrupt(&self) -> bool {
        self.0.borrow().alarm_interrupt
    }
}

impl Ticker for MockCounter {
    fn advance_ns(&self, ns: u64) {
        let mut state = self.0.borrow_mut();
        state.sub_ns += ns;
        while state.sub_ns >= NANOS_PER_SEC {
            state.sub_ns -= NANOS_PER_SEC;
            state.tick();
        }
    }
}

impl CounterRegisters for MockCounter {
    fn enter_config_mode(&mut self) {
        self.0.borrow_mut().config_mode = true;
    }

    fn exit_config_mode(&mut self) {
        let mut state = self.0.borrow_mut();
        if state.config_mode {
            state.busy_polls = BUSY_POLLS;
        }
        state.config_mode = false;
    }

    fn write_complete(&self) -> bool {
        let mut state = self.0.borrow_mut();
        if state.stuck {
            return false;
        }
        if state.busy_polls > 0 {
            state.busy_polls -= 1;
            return false;
        }
        true
    }

    fn clear_sync_flag(&mut self) {
        self.0.borrow_mut().synchronized = false;
    }

    fn synchronized(&self) -> bool {
        let mut state = self.0.borrow_mut();
        let was = state.synchronized;
        state.synchronized = true;
        was
    }

    fn write_prescaler(&mut self, reload: u32) {
        let mut state = self.0.borrow_mut();
        if state.accept("PRL") {
            state.prescaler = reload & 0x000F_FFFF;
        }
    }

    fn counter_high(&self) -> u16 {
        let mut state = self.0.borrow_mut();
        let high = (state.counter >> 16) as u16;
        match state.tick_after_high_reads {
            Some(n) if n <= 1 => {
                state.tick_after_high_reads = None;
                state.tick();
            }
            Some(n) => state.tick_after_high_reads = Some(n - 1),
            None => {}
        }
        high
    }

    fn counter_low(&self) -> u16 {
        self.0.borrow().counter as u16
    }

    fn write_counter_high(&mut self, value: u16) {
        let mut state = self.0.borrow_mut();
        if state.accept("CNTH") {
            state.counter = (state.counter & 0x0000_FFFF) | ((value as u32) << 16);
            state.last_counter = Some(state.counter);
        }
    }

    fn write_counter_low(&mut self, value: u16) {
        let mut state = self.0.borrow_mut();
        if state.accept("CNTL") {
            state.counter = (state.counter & 0xFFFF_0000) | value as u32;
        }
    }

    fn alarm_high(&self) -> u16 {
        (self.0.borrow().alarm >> 16) as u16
    }

    fn alarm_low(&self) -> u16 {
        self.0.borrow().alarm as u16
    }

    fn write_alarm_high(&mut self, value: u16) {
        let mut state = self.0.borrow_mut();
        if state.accept("ALRH") {
            state.alarm = (state.alarm & 0x0000_FFFF) | ((value as u32) << 16);
        }
    }

    fn write_alarm_low(&mut self, value: u16) {
        let mut state = self.0.borrow_mut();
        if state.accept("ALRL") {
            state.alarm = (state.alarm & 0xFFFF_0000) | value as u32;
        }
    }

    fn alarm_pending(&self) -> bool {
        self.0.borrow().alarm_flag
    }

    fn clear_alarm_flag(&mut self) {
        self.0.borrow_mut().alarm_flag = false;
    }

    fn set_alarm_interrupt(&mut self, enabled: bool) {
        self.0.borrow_mut().alarm_interrupt = enabled;
    }

    fn alarm_interrupt_enabled(&self) -> bool {
        self.0.borrow().alarm_interrupt
    }
}

struct CalendarState {
    year_base: u16,
    protected: bool,
    init_requested: bool,
    init_polls: u32,
    init_stuck: bool,
    synchronized: bool,
    format_24h: bool,
    prescalers: Option<(u8, u16)>,
    date: RawDate,
    time: RawTime,
    dst: bool,
    alarm: RawAlarm,
    alarm_enabled: bool,
    alarm_flag: bool,
    last_date: Option<RawDate>,
    last_time: Option<RawTime>,
    rejected: u32,
    sub_ns: u64,
}

impl CalendarState {
    fn init_active(&self) -> bool {
        self.init_requested && self.init_polls == 0 && !self.init_stuck
    }

    /// Count a write attempted without the required unlock
    fn guard(&mut self, allowed: bool) -> bool {
        if !allowed {
            self.rejected += 1;
        }
        allowed
    }

    fn fields(&self) -> CalendarFields {
        CalendarFields::new(
            self.year_base + self.date.year as u16,
            self.date.month,
            self.date.day,
            self.time.hours,
            self.time.minutes,
            self.time.seconds,
        )
    }

    fn load(&mut self, epoch: EpochTime) {
        let fields = epoch_to_calendar(epoch);
        self.date = RawDate {
            year: (fields.year - self.year_base) as u8,
            month: fields.month,
            day: fields.day,
            weekday: fields.weekday.iso_number(),
        };
        self.time = RawTime {
            hours: fields.hour,
            minutes: fields.minute,
            seconds: fields.second,
        };
    }

    fn tick(&mut self) {
        let next = calendar_to_epoch(&self.fields()).wrapping_add_secs(1);
        self.load(next);
        let matched = self.date.day == self.alarm.day
            && self.time.hours == self.alarm.hours
            && self.time.minutes == self.alarm.minutes
            && self.time.seconds == self.alarm.seconds;
        if self.alarm_enabled && matched {
            self.alarm_flag = true;
        }
    }
}

/// Calendar register file with WPR lock, INIT/INITF handshake and date-match alarm
#[derive(Clone)]
pub struct MockCalendar(Rc<RefCell<CalendarState>>);

impl MockCalendar {
    /// Starts at January 1 of `year_base` (1970 at the earliest), write-protected
    pub fn new(year_base: u16) -> Self {
        let mut state = CalendarState {
            year_base,
            protected: true,
            init_requested: false,
            init_polls: 0,
            init_stuck: false,
            synchronized: false,
            format_24h: false,
            prescalers: None,
            date: RawDate::default(),
            time: RawTime::default(),
            dst: false,
            alarm: RawAlarm::default(),
            alarm_enabled: false,
            alarm_flag: false,
            last_date: None,
            last_time: None,
            rejected: 0,
            sub_ns: 0,
        };
        let start = year_base.max(1970);
        state.load(calendar_to_epoch(&CalendarFields::new(start, 1, 1, 0, 0, 0)));
        Self(Rc::new(RefCell::new(state)))
    }

    /// Set the running calendar as if it kept counting through a reset
    pub fn preset(&self, epoch: EpochTime) {
        self.0.borrow_mut().load(epoch);
    }

    pub fn advance_secs(&self, secs: u32) {
        let mut state = self.0.borrow_mut();
        for _ in 0..secs {
            state.tick();
        }
    }

    pub fn set_init_stuck(&self, stuck: bool) {
        self.0.borrow_mut().init_stuck = stuck;
    }

    pub fn write_protected(&self) -> bool {
        self.0.borrow().protected
    }

    pub fn init_mode(&self) -> bool {
        self.0.borrow().init_requested
    }

    pub fn format_24h(&self) -> bool {
        self.0.borrow().format_24h
    }

    pub fn prescalers(&self) -> Option<(u8, u16)> {
        self.0.borrow().prescalers
    }

    pub fn rejected_writes(&self) -> u32 {
        self.0.borrow().rejected
    }

    pub fn last_written_date(&self) -> Option<RawDate> {
        self.0.borrow().last_date
    }

    pub fn last_written_time(&self) -> Option<RawTime> {
        self.0.borrow().last_time
    }

    pub fn alarm(&self) -> RawAlarm {
        self.0.borrow().alarm
    }
}

impl Ticker for MockCalendar {
    fn advance_ns(&self, ns: u64) {
        let mut state = self.0.borrow_mut();
        state.sub_ns += ns;
        while state.sub_ns >= NANOS_PER_SEC {
            state.sub_ns -= NANOS_PER_SEC;
            state.tick();
        }
    }
}

impl CalendarRegisters for MockCalendar {
    fn disable_write_protection(&mut self) {
        self.0.borrow_mut().protected = false;
    }

    fn enable_write_protection(&mut self) {
        self.0.borrow_mut().protected = true;
    }

    fn enter_init_mode(&mut self) {
        let mut state = self.0.borrow_mut();
        let unlocked = !state.protected;
        if state.guard(unlocked) {
            state.init_requested = true;
            state.init_polls = BUSY_POLLS;
        }
    }

    fn init_mode_active(&self) -> bool {
        let mut state = self.0.borrow_mut();
        if state.init_stuck || !state.init_requested {
            return false;
        }
        if state.init_polls > 0 {
            state.init_polls -= 1;
            return false;
        }
        true
    }

    fn exit_init_mode(&mut self) {
        let mut state = self.0.borrow_mut();
        state.init_requested = false;
        state.synchronized = false;
    }

    fn clear_sync_flag(&mut self) {
        let mut state = self.0.borrow_mut();
        let unlocked = !state.protected;
        if state.guard(unlocked) {
            state.synchronized = false;
        }
    }

    fn synchronized(&self) -> bool {
        let mut state = self.0.borrow_mut();
        let was = state.synchronized;
        state.synchronized = true;
        was
    }

    fn configure_format(&mut self) {
        let mut state = self.0.borrow_mut();
        let allowed = !state.protected && state.init_active();
        if state.guard(allowed) {
            state.format_24h = true;
        }
    }

    fn write_prescalers(&mut self, asynchronous: u8, synchronous: u16) {
        let mut state = self.0.borrow_mut();
        let allowed = !state.protected && state.init_active();
        if state.guard(allowed) {
            state.prescalers = Some((asynchronous, synchronous));
        }
    }

    fn read_date(&self) -> RawDate {
        self.0.borrow().date
    }

    fn read_time(&self) -> RawTime {
        self.0.borrow().time
    }

    fn write_date(&mut self, date: RawDate) {
        let mut state = self.0.borrow_mut();
        let allowed = !state.protected && state.init_active();
        if state.guard(allowed) {
            state.date = date;
            state.last_date = Some(date);
        }
    }

    fn write_time(&mut self, time: RawTime) {
        let mut state = self.0.borrow_mut();
        let allowed = !state.protected && state.init_active();
        if state.guard(allowed) {
            state.time = time;
            state.last_time = Some(time);
        }
    }

    fn daylight_saving(&self) -> bool {
        self.0.borrow().dst
    }

    fn set_daylight_saving(&mut self, on: bool) {
        let mut state = self.0.borrow_mut();
        let unlocked = !state.protected;
        if state.guard(unlocked) {
            state.dst = on;
        }
    }

    fn disable_alarm(&mut self) {
        let mut state = self.0.borrow_mut();
        let unlocked = !state.protected;
        if state.guard(unlocked) {
            state.alarm_enabled = false;
        }
    }

    fn alarm_writable(&self) -> bool {
        !self.0.borrow().alarm_enabled
    }

    fn write_alarm(&mut self, alarm: RawAlarm) {
        let mut state = self.0.borrow_mut();
        let allowed = !state.protected && !state.alarm_enabled;
        if state.guard(allowed) {
            state.alarm = alarm;
        }
    }

    fn read_alarm(&self) -> RawAlarm {
        self.0.borrow().alarm
    }

    fn enable_alarm(&mut self) {
        let mut state = self.0.borrow_mut();
        let unlocked = !state.protected;
        if state.guard(unlocked) {
            state.alarm_enabled = true;
        }
    }

    fn alarm_enabled(&self) -> bool {
        self.0.borrow().alarm_enabled
    }

    fn alarm_pending(&self) -> bool {
        self.0.borrow().alarm_flag
    }

    fn clear_alarm_flag(&mut self) {
        self.0.borrow_mut().alarm_flag = false;
    }
}

#[derive(Default)]
struct SerialState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// Serial port with scripted input and captured output
#[derive(Clone, Default)]
pub struct MockSerial(Rc<RefCell<SerialState>>);

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self, input: &str) {
        self.feed_bytes(input.as_bytes());
    }

    pub fn feed_bytes(&self, input: &[u8]) {
        self.0.borrow_mut().rx.extend(input.iter().copied());
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow().tx).into_owned()
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = Infallible;
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.0.borrow_mut();
        let count = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.borrow_mut().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
