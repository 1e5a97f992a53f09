//! Operator input: confirmation key and serial line framing

use embedded_hal::digital::InputPin;
use embedded_io::{Read, ReadReady};
use heapless::{String, Vec};

/// Push button wired to ground with a pull-up; pressed reads low
pub struct ConfirmKey<P> {
    pin: P,
}

impl<P: InputPin> ConfirmKey<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn is_pressed(&mut self) -> Result<bool, P::Error> {
        self.pin.is_low()
    }
}

/// Non-blocking line reader over a serial port
///
/// Lines end on CR or LF; empty lines are skipped. Lines longer than `N`
/// bytes or not valid UTF-8 are dropped whole.
pub struct LineReader<S, const N: usize> {
    serial: S,
    buffer: Vec<u8, N>,
    overflow: bool,
}

impl<S: Read + ReadReady, const N: usize> LineReader<S, N> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            buffer: Vec::new(),
            overflow: false,
        }
    }

    /// Consume buffered input without blocking
    ///
    /// Returns the first complete line; bytes after it stay in the port.
    pub fn poll_line(&mut self) -> Result<Option<String<N>>, S::Error> {
        while self.serial.read_ready()? {
            let mut byte = [0u8; 1];
            if self.serial.read(&mut byte)? == 0 {
                break;
            }

            match byte[0] {
                b'\r' | b'\n' => {
                    if core::mem::take(&mut self.overflow) {
                        warn!("Serial line longer than {} bytes dropped", N);
                        self.buffer.clear();
                        continue;
                    }
                    if self.buffer.is_empty() {
                        continue;
                    }
                    match String::from_utf8(core::mem::take(&mut self.buffer)) {
                        Ok(line) => return Ok(Some(line)),
                        Err(_) => debug!("Non-UTF-8 serial line dropped"),
                    }
                }
                other => {
                    if self.buffer.push(other).is_err() {
                        self.overflow = true;
                    }
                }
            }
        }
        Ok(None)
    }

    pub fn release(self) -> S {
        self.serial
    }
}
