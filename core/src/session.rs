//! Interactive boot-time clock setting
//!
//! ## Protocol
//! 1. Prompt for the confirmation key and wait up to
//!    [`SessionConfig::confirm_window`]. No key press ends the session
//!    silently.
//! 2. Prompt for a `YYYY-MM-DD HH:MM:SS` line and wait up to
//!    [`SessionConfig::input_window`]. Lines that do not parse are ignored
//!    until the deadline, which prints a timeout notice.
//! 3. The first valid line is written through the active backend in one
//!    call; the clock is either fully updated or left untouched.
//!
//! The session is a poll-driven state machine. Firmware calls
//! [`TimeSetSession::step`] from a cooperative task with the current time;
//! nothing here blocks. An event observed at or after a deadline counts as
//! late.

use core::fmt::Write as _;

use embedded_hal::digital::InputPin;
use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::backend::ClockBackend;
use crate::calendar::days_in_month;
use crate::config::SessionConfig;
use crate::console::{ConfirmKey, LineReader};
use crate::error::RtcError;
use crate::time::{CalendarFields, Instant};

const INPUT_PROMPT: &str = "Please input date & time, format: YYYY-MM-DD HH:MM:SS, wait";
const TIMEOUT_NOTICE: &str = "Wait input timeout. \r\n";
const DONE_NOTICE: &str = "Time set. \r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingConfirmation { deadline: Instant },
    AwaitingInput { deadline: Instant },
    Applying,
    Cancelled,
    Completed,
}

/// Operator input observed during one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent<'a> {
    Confirm,
    Line(&'a str),
}

pub struct TimeSetSession {
    state: SessionState,
    config: SessionConfig,
}

impl TimeSetSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Cancelled | SessionState::Completed)
    }

    /// Emit the confirmation prompt and open the confirmation window
    ///
    /// Has no effect once the session has left `Idle`.
    pub fn start<W: Write>(&mut self, now: Instant, console: &mut W) {
        if self.state != SessionState::Idle {
            return;
        }
        let mut prompt: String<64> = String::new();
        let _ = write!(
            prompt,
            "Press KEY0 to set time, wait {} seconds...\r\n",
            self.config.confirm_window.to_secs()
        );
        emit(console, &prompt);
        self.state = SessionState::AwaitingConfirmation {
            deadline: now + self.config.confirm_window,
        };
        debug!("Time-set session awaiting confirmation");
    }

    /// Advance the state machine with at most one event
    ///
    /// A failed write leaves the session `Cancelled` and returns the error.
    pub fn poll<B: ClockBackend, W: Write>(
        &mut self,
        now: Instant,
        event: Option<SessionEvent<'_>>,
        backend: &mut B,
        console: &mut W,
    ) -> Result<SessionState, RtcError> {
        match self.state {
            SessionState::AwaitingConfirmation { deadline } => {
                if now >= deadline {
                    info!("No confirmation, keeping current time");
                    self.state = SessionState::Cancelled;
                } else if event == Some(SessionEvent::Confirm) {
                    let mut prompt: String<80> = String::new();
                    let _ = write!(
                        prompt,
                        "{} {} seconds...\r\n",
                        INPUT_PROMPT,
                        self.config.input_window.to_secs()
                    );
                    emit(console, &prompt);
                    self.state = SessionState::AwaitingInput {
                        deadline: now + self.config.input_window,
                    };
                    debug!("Time-set session awaiting input");
                }
            }
            SessionState::AwaitingInput { deadline } => {
                if now >= deadline {
                    emit(console, TIMEOUT_NOTICE);
                    info!("Time input timed out, keeping current time");
                    self.state = SessionState::Cancelled;
                } else if let Some(SessionEvent::Line(line)) = event {
                    match parse_timestamp(line) {
                        Some(fields) => self.apply(&fields, backend, console)?,
                        None => debug!("Ignoring malformed time input"),
                    }
                }
            }
            SessionState::Idle
            | SessionState::Applying
            | SessionState::Cancelled
            | SessionState::Completed => {}
        }
        Ok(self.state)
    }

    /// Gather input for the current state, then [`poll`](Self::poll)
    ///
    /// The key is only read while awaiting confirmation and serial lines are
    /// only delivered while awaiting input. Lines completed before
    /// confirmation are dropped. Input errors are logged and treated as no
    /// input.
    pub fn step<P, S, const N: usize, B, W>(
        &mut self,
        now: Instant,
        key: &mut ConfirmKey<P>,
        reader: &mut LineReader<S, N>,
        backend: &mut B,
        console: &mut W,
    ) -> Result<SessionState, RtcError>
    where
        P: InputPin,
        S: Read + ReadReady,
        B: ClockBackend,
        W: Write,
    {
        let line;
        let event = match self.state {
            SessionState::AwaitingConfirmation { .. } => {
                // Only input typed after the date prompt counts
                if let Ok(Some(_)) = reader.poll_line() {
                    debug!("Discarding serial input before confirmation");
                }
                let pressed = key.is_pressed().unwrap_or_else(|_| {
                    warn!("Key read failed");
                    false
                });
                pressed.then_some(SessionEvent::Confirm)
            }
            SessionState::AwaitingInput { .. } => {
                line = reader.poll_line().unwrap_or_else(|_| {
                    warn!("Serial read failed");
                    None
                });
                line.as_deref().map(SessionEvent::Line)
            }
            _ => None,
        };
        self.poll(now, event, backend, console)
    }

    fn apply<B: ClockBackend, W: Write>(
        &mut self,
        fields: &CalendarFields,
        backend: &mut B,
        console: &mut W,
    ) -> Result<(), RtcError> {
        self.state = SessionState::Applying;
        match backend.set_calendar(fields) {
            Ok(()) => {
                emit(console, DONE_NOTICE);
                info!("Clock set to {}", fields);
                self.state = SessionState::Completed;
                Ok(())
            }
            Err(e) => {
                error!("Failed to set clock: {}", e);
                self.state = SessionState::Cancelled;
                Err(e)
            }
        }
    }
}

fn emit<W: Write>(console: &mut W, text: &str) {
    if console.write_all(text.as_bytes()).is_err() {
        warn!("Console write failed");
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS`, surrounding whitespace allowed
///
/// Returns `None` unless every field is present, zero-padded and in range.
/// Second 60 is accepted as a leap-second placeholder. The year must fall
/// within the 32-bit epoch (1970-2105).
pub fn parse_timestamp(line: &str) -> Option<CalendarFields> {
    let bytes = line.trim().as_bytes();
    if bytes.len() != 19 {
        return None;
    }
    let separators = [(4, b'-'), (7, b'-'), (10, b' '), (13, b':'), (16, b':')];
    if separators.iter().any(|&(i, sep)| bytes[i] != sep) {
        return None;
    }

    let year = digits(&bytes[0..4])?;
    let month = digits(&bytes[5..7])? as u8;
    let day = digits(&bytes[8..10])? as u8;
    let hour = digits(&bytes[11..13])? as u8;
    let minute = digits(&bytes[14..16])? as u8;
    let second = digits(&bytes[17..19])? as u8;

    let valid = (1970..=2105).contains(&year)
        && (1..=12).contains(&month)
        && (1..=days_in_month(year, month)).contains(&day)
        && hour <= 23
        && minute <= 59
        && second <= 60;

    valid.then(|| CalendarFields::new(year, month, day, hour, minute, second))
}

fn digits(field: &[u8]) -> Option<u16> {
    field.iter().try_fold(0u16, |acc, &c| {
        c.is_ascii_digit().then(|| acc * 10 + (c - b'0') as u16)
    })
}
