//! STM32F1 RTC, backup domain and LSE/LSI control
//!
//! Zero-sized handles over the PAC register blocks. All sequencing (config
//! windows, RTOFF waits, epoch arithmetic) is done by `rtc_core`; this module
//! only maps trait calls onto register fields.

use hal_abstractions::{BackupRegister, CounterRegisters, LowSpeedClocks, RtcClockSource};
use stm32_metapac as pac;
use stm32_metapac::rcc::vals::Rtcsel;

/// EXTI line wired to the RTC alarm
const ALARM_EXTI_LINE: usize = 17;

/// Backup data register DR1, holds the clock source flag
pub struct BackupFlag;

impl BackupRegister for BackupFlag {
    fn read(&self) -> u16 {
        pac::BKP.dr(0).read().d()
    }

    fn write(&mut self, value: u16) {
        pac::BKP.dr(0).write(|w| w.set_d(value));
    }
}

/// RCC backup-domain control
pub struct LowSpeed;

impl LowSpeed {
    /// Clock PWR and BKP so the backup domain can be reached
    pub fn new() -> Self {
        pac::RCC.apb1enr().modify(|w| {
            w.set_pwren(true);
            w.set_bkpen(true);
        });
        Self
    }
}

impl LowSpeedClocks for LowSpeed {
    fn enable_backup_access(&mut self) {
        pac::PWR.cr().modify(|w| w.set_dbp(true));
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

/// RTC counter, prescaler and alarm registers
///
/// ALRH/ALRL are write-only, so the last programmed alarm is kept here.
pub struct CounterRtc {
    alarm: u32,
}

impl CounterRtc {
    pub fn new() -> Self {
        Self { alarm: u32::MAX }
    }
}

impl CounterRegisters for CounterRtc {
    fn enter_config_mode(&mut self) {
        pac::PWR.cr().modify(|w| w.set_dbp(true));
        pac::RTC.crl().modify(|w| w.set_cnf(true));
    }

    fn exit_config_mode(&mut self) {
        pac::RTC.crl().modify(|w| w.set_cnf(false));
    }

    fn write_complete(&self) -> bool {
        pac::RTC.crl().read().rtoff()
    }

    fn clear_sync_flag(&mut self) {
        pac::RTC.crl().modify(|w| w.set_rsf(false));
    }

    fn synchronized(&self) -> bool {
        pac::RTC.crl().read().rsf()
    }

    fn write_prescaler(&mut self, reload: u32) {
        pac::RTC.prlh().write(|w| w.set_prlh((reload >> 16) as u8 & 0x0F));
        pac::RTC.prll().write(|w| w.set_prll(reload as u16));
    }

    fn counter_high(&self) -> u16 {
        pac::RTC.cnth().read().cnth()
    }

    fn counter_low(&self) -> u16 {
        pac::RTC.cntl().read().cntl()
    }

    fn write_counter_high(&mut self, value: u16) {
        pac::RTC.cnth().write(|w| w.set_cnth(value));
    }

    fn write_counter_low(&mut self, value: u16) {
        pac::RTC.cntl().write(|w| w.set_cntl(value));
    }

    fn alarm_high(&self) -> u16 {
        (self.alarm >> 16) as u16
    }

    fn alarm_low(&self) -> u16 {
        self.alarm as u16
    }

    fn write_alarm_high(&mut self, value: u16) {
        pac::RTC.alrh().write(|w| w.set_alrh(value));
        self.alarm = (self.alarm & 0x0000_FFFF) | (value as u32) << 16;
    }

    fn write_alarm_low(&mut self, value: u16) {
        pac::RTC.alrl().write(|w| w.set_alrl(value));
        self.alarm = (self.alarm & 0xFFFF_0000) | value as u32;
    }

    fn alarm_pending(&self) -> bool {
        pac::RTC.crl().read().alrf()
    }

    fn clear_alarm_flag(&mut self) {
        pac::RTC.crl().modify(|w| w.set_alrf(false));
        pac::EXTI.pr(0).write(|w| w.set_line(ALARM_EXTI_LINE, true));
    }

    fn set_alarm_interrupt(&mut self, enabled: bool) {
        pac::RTC.crh().modify(|w| w.set_alrie(enabled));
        pac::EXTI.imr(0).modify(|w| w.set_line(ALARM_EXTI_LINE, enabled));
        pac::EXTI.rtsr(0).modify(|w| w.set_line(ALARM_EXTI_LINE, enabled));
    }

    fn alarm_interrupt_enabled(&self) -> bool {
        pac::RTC.crh().read().alrie()
    }
}

/// Seconds counter for log timestamps, consistent across a low-half carry
fn counter_now() -> u32 {
    loop {
        let high = pac::RTC.cnth().read().cnth();
        let low = pac::RTC.cntl().read().cntl();
        if pac::RTC.cnth().read().cnth() == high {
            return (high as u32) << 16 | low as u32;
        }
    }
}

defmt::timestamp!("{=u64:iso8601s}", { counter_now() as u64 });
