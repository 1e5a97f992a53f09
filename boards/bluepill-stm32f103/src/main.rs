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

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART2, USART3])]
mod app {
    use super::*;
    use defmt::{error, info, warn, Display2Format};
    use embassy_stm32::gpio::{Input, Pull};
    use embassy_stm32::time::Hertz;
    use embassy_stm32::usart::{self, Uart};
    use embassy_time::Delay;
    use rtic::mutex_prelude::*;

    use rtc_core::{
        boot, AlarmSubsystem, ClockBackend, ClockSourceStore, ConfirmKey, CounterBackend,
        CounterConfig, LineReader, OscillatorConfig, OscillatorSelector, SessionConfig,
        SessionState, TimeSetSession,
    };

    use crate::rtc::{BackupFlag, CounterRtc, LowSpeed};
    use crate::serial::{ConsoleRx, ConsoleTx};

    type Backend = CounterBackend<CounterRtc, Delay>;

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
        info!("Blue Pill RTC starting...");

        // Blue Pill: 8 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            config.rcc.pll = Some(Pll {
                src: PllSource::HSE,
                prediv: PllPreDiv::DIV1,
                mul: PllMul::MUL9, // 8 MHz * 9 = 72 MHz
            });
            config.rcc.sys = Sysclk::PLL1_P;
            config.rcc.ahb_pre = AHBPrescaler::DIV1; // 72 MHz
            config.rcc.apb1_pre = APBPrescaler::DIV2; // 36 MHz
            config.rcc.apb2_pre = APBPrescaler::DIV1; // 72 MHz
            // Leave the backup domain alone; the oscillator selector owns it
            config.rcc.ls = LsConfig::off();
        }
        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(72_000_000);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let mut backend = CounterBackend::new(CounterRtc::new(), Delay, CounterConfig::default());
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
        let uart = match Uart::new_blocking(p.USART1, p.PA10, p.PA9, uart_config) {
            Ok(uart) => uart,
            Err(e) => defmt::panic!("USART1 configuration rejected: {}", e),
        };
        let (tx, rx) = uart.split();

        // KEY0 to ground
        let key = Input::new(p.PB12, Pull::Up);

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

    /// Boot-time clock setting over USART1
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
            let result = cx
                .shared
                .backend
                .lock(|backend| session.step(now(), key, reader, backend, console));
            if let Err(e) = result {
                warn!("Time-set session aborted: {}", e);
            }
            Mono::delay(config.poll_interval.to_millis().millis()).await;
        }

        match session.state() {
            SessionState::Completed => info!("Time-set session completed"),
            _ => info!("Time-set session closed without change"),
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

    /// RTC alarm (EXTI line 17)
    #[task(binds = RTCALARM, priority = 2, shared = [backend, alarm])]
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
