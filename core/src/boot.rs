//! RTC start-up sequence
//!
//! Runs once from the firmware `init` before any task touches the clock:
//! note whether the backup domain survived, bring up the oscillator,
//! configure the backend and, on a cold start, restart the clock at the
//! backend's reset instant.

use embedded_hal::delay::DelayNs;
use hal_abstractions::{BackupRegister, LowSpeedClocks};

use crate::backend::ClockBackend;
use crate::calendar::epoch_to_calendar;
use crate::clock_source::{ClockSourceFlag, ClockSourceStore};
use crate::error::RtcError;
use crate::oscillator::OscillatorSelector;

/// Outcome of [`boot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    /// Oscillator now clocking the RTC
    pub source: ClockSourceFlag,
    /// The backup domain had lost power and the clock was reset
    pub cold_start: bool,
}

/// Bring the RTC up
///
/// Initialization failures are returned in every build profile; the caller
/// decides whether to halt.
pub fn boot<B, C, D, R>(
    backend: &mut B,
    selector: &mut OscillatorSelector<C, D>,
    store: &mut ClockSourceStore<R>,
) -> Result<BootReport, RtcError>
where
    B: ClockBackend,
    C: LowSpeedClocks,
    D: DelayNs,
    R: BackupRegister,
{
    // Must be read before selection overwrites it
    let previous = store.read_flag();
    let source = selector.select_and_init(store);

    if let Err(e) = backend.configure() {
        error!("RTC initialization failed: {}", e);
        return Err(e);
    }

    let cold_start = !previous.is_known();
    if cold_start {
        let start = backend.reset_epoch();
        backend.set_epoch(start)?;
        warn!("RTC reset, restarting at {}", epoch_to_calendar(start));
    } else {
        debug!("RTC kept running across reset ({:?})", previous);
    }

    info!("RTC ready, clock source {:?}", source);
    Ok(BootReport { source, cold_start })
}
