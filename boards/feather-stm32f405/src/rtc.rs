//! STM32F4 calendar RTC, backup register and LSE/LSI control
//!
//! Date, time and alarm registers are BCD; packing and unpacking happens
//! here so `rtc_core` only sees binary fields. Bits whose PAC accessor names
//! vary between metapac releases are addressed through the raw register
//! value.

use hal_abstractions::{
    BackupRegister, CalendarRegisters, LowSpeedClocks, RawAlarm, RawDate, RawTime, RtcClockSource,
};
use rtc_core::calendar::calendar_to_epoch;
use rtc_core::{CalendarConfig, CalendarFields};
use stm32_metapac as pac;
use stm32_metapac::rcc::vals::Rtcsel;

/// EXTI line wired to the RTC alarm
const ALARM_EXTI_LINE: usize = 17;

const CR_FMT: u32 = 1 << 6;
const CR_ALRAE: u32 = 1 << 8;
const CR_ALRAIE: u32 = 1 << 12;
const CR_BKP: u32 = 1 << 18;
const CR_OSEL: u32 = 0b11 << 21;

const ISR_ALRAWF: u32 = 1 << 0;
const ISR_ALRAF: u32 = 1 << 8;

fn to_bcd(value: u8) -> u32 {
    (((value / 10) as u32) << 4) | (value % 10) as u32
}

fn from_bcd(tens: u32, units: u32) -> u8 {
    (tens * 10 + units) as u8
}

/// Backup register BKP0R, holds the clock source flag
pub struct BackupFlag;

impl BackupRegister for BackupFlag {
    fn read(&self) -> u16 {
        pac::RTC.bkpr(0).read().0 as u16
    }

    fn write(&mut self, value: u16) {
        pac::RTC.bkpr(0).write(|w| w.0 = value as u32);
    }
}

/// RCC backup-domain control
pub struct LowSpeed;

impl LowSpeed {
    /// Clock PWR so the backup domain can be unlocked
    pub fn new() -> Self {
        pac::RCC.apb1enr().modify(|w| w.set_pwren(true));
        Self
    }
}

impl LowSpeedClocks for LowSpeed {
    fn enable_backup_access(&mut self) {
        pac::PWR.cr1().modify(|w| w.set_dbp(true));
    }

    fn start_external(&mut self) {
        pac::RCC.bdcr().modify(|w| w.set_lseon(true));
    }

    fn external_ready(&self) -> bool {
        pac::RCC.bdcr().read().lserdy()
    }

    fn start_internal(&mut self) {
        pac::RCC.csr().modify(|w| w.set_lsion(true));
    }

    fn select_rtc_source(&mut self, source: RtcClockSource) {
        let sel = match source {
            RtcClockSource::External => Rtcsel::LSE,
            RtcClockSource::Internal => Rtcsel::LSI,
        };
        pac::RCC.bdcr().modify(|w| {
            w.set_rtcsel(sel);
            w.set_rtcen(true);
        });
    }
}

/// RTC calendar and alarm A registers
pub struct CalendarRtc;

impl CalendarRegisters for CalendarRtc {
    fn disable_write_protection(&mut self) {
        pac::RTC.wpr().write(|w| w.set_key(0xCA));
        pac::RTC.wpr().write(|w| w.set_key(0x53));
    }

    fn enable_write_protection(&mut self) {
        pac::RTC.wpr().write(|w| w.set_key(0xFF));
    }

    fn enter_init_mode(&mut self) {
        pac::RTC.isr().modify(|w| w.set_init(true));
    }

    fn init_mode_active(&self) -> bool {
        pac::RTC.isr().read().initf()
    }

    fn exit_init_mode(&mut self) {
        pac::RTC.isr().modify(|w| w.set_init(false));
    }

    fn clear_sync_flag(&mut self) {
        pac::RTC.isr().modify(|w| w.set_rsf(false));
    }

    fn synchronized(&self) -> bool {
        pac::RTC.isr().read().rsf()
    }

    fn configure_format(&mut self) {
        pac::RTC.cr().modify(|w| w.0 &= !(CR_FMT | CR_OSEL));
    }

    fn write_prescalers(&mut self, asynchronous: u8, synchronous: u16) {
        // Two separate writes, synchronous first
        pac::RTC.prer().write(|w| w.0 = synchronous as u32 & 0x7FFF);
        pac::RTC
            .prer()
            .modify(|w| w.0 |= (asynchronous as u32 & 0x7F) << 16);
    }

    fn read_date(&self) -> RawDate {
        let dr = pac::RTC.dr().read().0;
        RawDate {
            year: from_bcd((dr >> 20) & 0xF, (dr >> 16) & 0xF),
            month: from_bcd((dr >> 12) & 0x1, (dr >> 8) & 0xF),
            day: from_bcd((dr >> 4) & 0x3, dr & 0xF),
            weekday: ((dr >> 13) & 0x7) as u8,
        }
    }

    fn read_time(&self) -> RawTime {
        let tr = pac::RTC.tr().read().0;
        RawTime {
            hours: from_bcd((tr >> 20) & 0x3, (tr >> 16) & 0xF),
            minutes: from_bcd((tr >> 12) & 0x7, (tr >> 8) & 0xF),
            seconds: from_bcd((tr >> 4) & 0x7, tr & 0xF),
        }
    }

    fn write_date(&mut self, date: RawDate) {
        let dr = to_bcd(date.year) << 16
            | (date.weekday as u32 & 0x7) << 13
            | to_bcd(date.month) << 8
            | to_bcd(date.day);
        pac::RTC.dr().write(|w| w.0 = dr);
    }

    fn write_time(&mut self, time: RawTime) {
        let tr = to_bcd(time.hours) << 16 | to_bcd(time.minutes) << 8 | to_bcd(time.seconds);
        pac::RTC.tr().write(|w| w.0 = tr);
    }

    fn daylight_saving(&self) -> bool {
        pac::RTC.cr().read().0 & CR_BKP != 0
    }

    fn set_daylight_saving(&mut self, on: bool) {
        pac::RTC.cr().modify(|w| {
            if on {
                w.0 |= CR_BKP;
            } else {
                w.0 &= !CR_BKP;
            }
        });
    }

    fn disable_alarm(&mut self) {
        pac::RTC.cr().modify(|w| w.0 &= !(CR_ALRAE | CR_ALRAIE));
    }

    fn alarm_writable(&self) -> bool {
        pac::RTC.isr().read().0 & ISR_ALRAWF != 0
    }

    fn write_alarm(&mut self, alarm: RawAlarm) {
        // WDSEL = 0 (day of month), all MSKx = 0
        let alrmar = to_bcd(alarm.day) << 24
            | to_bcd(alarm.hours) << 16
            | to_bcd(alarm.minutes) << 8
            | to_bcd(alarm.seconds);
        pac::RTC.alrmr(0).write(|w| w.0 = alrmar);
    }

    fn read_alarm(&self) -> RawAlarm {
        let alrmar = pac::RTC.alrmr(0).read().0;
        RawAlarm {
            day: from_bcd((alrmar >> 28) & 0x3, (alrmar >> 24) & 0xF),
            hours: from_bcd((alrmar >> 20) & 0x3, (alrmar >> 16) & 0xF),
            minutes: from_bcd((alrmar >> 12) & 0x7, (alrmar >> 8) & 0xF),
            seconds: from_bcd((alrmar >> 4) & 0x7, alrmar & 0xF),
        }
    }

    fn enable_alarm(&mut self) {
        pac::RTC.cr().modify(|w| w.0 |= CR_ALRAE | CR_ALRAIE);
        pac::EXTI.imr(0).modify(|w| w.set_line(ALARM_EXTI_LINE, true));
        pac::EXTI.rtsr(0).modify(|w| w.set_line(ALARM_EXTI_LINE, true));
    }

    fn alarm_enabled(&self) -> bool {
        pac::RTC.cr().read().0 & CR_ALRAIE != 0
    }

    fn alarm_pending(&self) -> bool {
        pac::RTC.isr().read().0 & ISR_ALRAF != 0
    }

    fn clear_alarm_flag(&mut self) {
        // rc_w0: writing the other flags back as read leaves them untouched
        pac::RTC.isr().modify(|w| w.0 &= !ISR_ALRAF);
        pac::EXTI.pr(0).write(|w| w.set_line(ALARM_EXTI_LINE, true));
    }
}

/// Calendar registers as epoch seconds for log timestamps
fn calendar_now() -> u32 {
    let rtc = CalendarRtc;
    // TR first: reading it freezes DR until DR is read
    let time = rtc.read_time();
    let date = rtc.read_date();
    let fields = CalendarFields::new(
        CalendarConfig::default().year_base + date.year as u16,
        date.month,
        date.day,
        time.hours,
        time.minutes,
        time.seconds,
    );
    calendar_to_epoch(&fields).as_secs()
}

defmt::timestamp!("{=u64:iso8601s}", { calendar_now() as u64 });
