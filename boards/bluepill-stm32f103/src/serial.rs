//! USART1 console halves with `embedded-io` traits

use embassy_stm32::mode::Blocking;
use embassy_stm32::usart::{self, UartRx, UartTx};
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use stm32_metapac as pac;

fn kind(e: usart::Error) -> ErrorKind {
    match e {
        usart::Error::Framing | usart::Error::Noise | usart::Error::Parity => {
            ErrorKind::InvalidData
        }
        _ => ErrorKind::Other,
    }
}

pub struct ConsoleTx {
    tx: UartTx<'static, Blocking>,
}

impl ConsoleTx {
    pub fn new(tx: UartTx<'static, Blocking>) -> Self {
        Self { tx }
    }
}

impl ErrorType for ConsoleTx {
    type Error = ErrorKind;
}

impl Write for ConsoleTx {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.blocking_write(buf).map_err(kind)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.tx.blocking_flush().map_err(kind)
    }
}

pub struct ConsoleRx {
    rx: UartRx<'static, Blocking>,
}

impl ConsoleRx {
    pub fn new(rx: UartRx<'static, Blocking>) -> Self {
        Self { rx }
    }
}

impl ErrorType for ConsoleRx {
    type Error = ErrorKind;
}

impl Read for ConsoleRx {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(first) = buf.first_mut() else {
            return Ok(0);
        };
        self.rx
            .blocking_read(core::slice::from_mut(first))
            .map_err(kind)?;
        Ok(1)
    }
}

impl ReadReady for ConsoleRx {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(pac::USART1.sr().read().rxne())
    }
}
