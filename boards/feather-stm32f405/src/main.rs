#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod rtc;
mod serial;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// Monotonic time at session resolution
fn now() -> rtc_core::Instant {
    rtc_core::Instant::from_ticks(Mono::now().duration_since_epoch().to_millis())
}

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2])]
mod app {
    use super::*;
    use defmt::{error, info, warn, Display2Format};
    use embassy_stm32::gpio::{Input, Pull};
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::usart::{self, Uart};
    use embassy_time::Delay;
    use rtic::mutex_prelude::*;

    use rtc_core::{
        boot, AlarmSubsystem, CalendarBackend, CalendarConfig, ClockBackend, ClockSourceStore,
        ConfirmKey, LineReader, OscillatorConfig, OscillatorSelector, SessionConfig,
        SessionState, TimeSetSession,
    };

    use crate::rtc::{BackupFlag, CalendarRtc, LowSpeed};
    use crate::serial::{ConsoleRx, ConsoleTx};

    type Backend = CalendarBackend<CalendarRtc, Delay>;

    #[shared]
    struct Shared {
        backend: Backend,
        alarm: AlarmSubsystem,
    }

    #[local]
    struct Local {
        key: ConfirmKey<Input<'static>>,
        reader: LineReader<ConsoleRx, 32>,
        console: ConsoleTx,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Feather RTC starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        // Leave the backup domain alone; the oscillator selector owns it
        config.rcc.ls = LsConfig::off();

        let p = embassy_stm32::init(config);
        info!("PLL configured: SYSCLK=84MHz");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let mut backend = CalendarBackend::new(CalendarRtc, Delay, CalendarConfig::default());
        let mut selector =
            OscillatorSelector::new(LowSpeed::new(), Delay, OscillatorConfig::default());
        let mut store = ClockSourceStore::new(BackupFlag);

        match boot(&mut backend, &mut selector, &mut store) {
            Ok(report) => info!("RTC boot: {}", report),
            Err(e) => {
                error!("RTC boot failed, halting");
                defmt::panic!("{}", e);
            }
        }

        let mut uart_config = usart::Config::default();
        uart_config.baudrate = 115_200;
        let uart = match Uart::new_blocking(p.USART3, p.PB11, p.PB10, uart_config) {
            Ok(uart) => uart,
            Err(e) => defmt::panic!("USART3 configuration rejected: {}", e),
        };
        let (tx, rx) = uart.split();

        // KEY0 on D5, to ground
        let key = Input::new(p.PC7, Pull::Up);

        time_set::spawn().ok();
        clock_display::spawn().ok();

        (
            Shared {
                backend,
                alarm: AlarmSubsystem::default(),
            },
            Local {
                key: ConfirmKey::new(key),
                reader: LineReader::new(ConsoleRx::new(rx)),
                console: ConsoleTx::new(tx),
            },
        )
    }

    /// Boot-time clock setting over USART3
    #[task(priority = 1, shared = [backend], local = [key, reader, console])]
    async fn time_set(mut cx: time_set::Context) {
        let config = SessionConfig::default();
        let mut session = TimeSetSession::new(config);
        session.start(now(), cx.local.console);

        while !session.is_finished() {
            let key = &mut *cx.local.key;
            let reader = &mut *cx.local.reader;
            let console = &mut *cx.local.console;
            // A leap-second entry blocks for 1 s inside this lock; the
            // ceiling masks rtc_alarm for that second and it runs late.
            if let Err(e) = cx
                .shared
                .backend
                .lock(|backend| session.step(now(), key, reader, backend, console))
            {
                warn!("Time-set session aborted: {}", e);
            }
            Mono::delay(config.poll_interval.to_millis().millis()).await;
        }

        if session.state() == SessionState::Completed {
            info!("Time-set session completed");
        }
    }

    /// Log the calendar time once per second
    #[task(priority = 1, shared = [backend])]
    async fn clock_display(mut cx: clock_display::Context) {
        loop {
            match cx.shared.backend.lock(|backend| backend.calendar()) {
                Ok(fields) => info!("{}", Display2Format(&fields)),
                Err(e) => warn!("RTC read failed: {}", e),
            }
            Mono::delay(1.secs()).await;
        }
    }

    /// RTC alarm A (EXTI line 17)
    #[task(binds = RTC_ALARM, priority = 2, shared = [backend, alarm])]
    fn rtc_alarm(cx: rtc_alarm::Context) {
        (cx.shared.backend, cx.shared.alarm).lock(|backend, alarm| {
            if let Err(e) = alarm.on_interrupt(backend) {
                error!("Alarm dispatch failed: {}", e);
            }
        });
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
