//! Operator console session
//!
//! One key selects a command; field commands then take an optional
//! decimal value terminated by CR/LF. A bare CR reads the field back, a
//! value writes it. ESC or backspace abandons a pending command.
//!
//! The session starts locked: nothing is accepted (or echoed) except a
//! DLE byte followed by the PIN digits and CR. After ~7s without input
//! an unlocked session locks itself again, so a console left connected
//! in the field cannot be driven by line noise.

use katabasis_core::config::Field;

/// Poll ticks of silence before an unlocked session relocks (7s at the
/// 10ms console cadence).
pub const IDLE_LOCK_TICKS: u16 = 700;

const DLE: u8 = 0x10;
const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 0x08;

/// Help screen, printed by the console task on `ConsoleEvent::Help`.
pub const HELP: &str = "\r\n\
Commands:\r\n\
\t1\tH-P1 (0.01s)\r\n\
\t2\tP1-P2 (0.01s)\r\n\
\tm\tMan (0.01s)\r\n\
\th\tH (0.01s)\r\n\
\tr\tH-Retry (0.01s)\r\n\
\tf\tFeed (minutes)\r\n\
\tn\tFeeds/week (0=off)\r\n\
\tp\tPIN\r\n\
\tv\tShow values\r\n\
\ts\tStatus\r\n\
\td\tLower\r\n\
\tu\tRaise\r\n\
\r\n";

/// Typed events the session emits to the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleEvent {
    /// PIN accepted; the session is now unlocked.
    Authenticated,
    /// Read a field back.
    Get(Field),
    /// Write a field (the control task persists it).
    Set(Field, u16),
    /// Show machine state and battery.
    Status,
    /// Show all tunables.
    Values,
    /// Force the gate up.
    Raise,
    /// Force the gate down.
    Lower,
    /// Print the help screen.
    Help,
}

/// What the console task should write back for one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    None,
    /// Echo the accepted byte (digit entry).
    Byte(u8),
    /// A fixed prompt or notice.
    Text(&'static str),
    /// CRLF.
    Newline,
}

/// Result of feeding one byte to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub event: Option<ConsoleEvent>,
    pub echo: Echo,
}

impl Step {
    const fn quiet() -> Self {
        Self { event: None, echo: Echo::None }
    }

    const fn echo(echo: Echo) -> Self {
        Self { event: None, echo }
    }

    const fn emit(event: ConsoleEvent, echo: Echo) -> Self {
        Self { event: Some(event), echo }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    /// DLE seen; PIN digits accumulating.
    Auth,
    /// Field key seen; value digits accumulating.
    Field(Field),
}

/// Console session state machine.
pub struct Session {
    unlocked: bool,
    pending: Pending,
    value: Option<u16>,
    idle_ticks: u16,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session starts locked.
    pub const fn new() -> Self {
        Self {
            unlocked: false,
            pending: Pending::None,
            value: None,
            idle_ticks: 0,
        }
    }

    /// Whether the session has been unlocked with the PIN.
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Feed one received byte. `pin` is the currently configured
    /// console PIN.
    pub fn feed(&mut self, byte: u8, pin: u16) -> Step {
        self.idle_ticks = 0;
        if self.unlocked {
            self.feed_unlocked(byte)
        } else {
            self.feed_locked(byte, pin)
        }
    }

    /// Count silent poll ticks. Returns true when the session just
    /// relocked so the task can print a notice.
    pub fn idle(&mut self, ticks: u16) -> bool {
        self.idle_ticks = self.idle_ticks.saturating_add(ticks);
        if self.unlocked && self.idle_ticks >= IDLE_LOCK_TICKS {
            self.lock();
            return true;
        }
        false
    }

    /// Drop back to the locked state.
    pub fn lock(&mut self) {
        self.unlocked = false;
        self.pending = Pending::None;
        self.value = None;
    }

    fn feed_locked(&mut self, byte: u8, pin: u16) -> Step {
        match self.pending {
            Pending::Auth => match byte {
                b'\r' | b'\n' => {
                    let matched = self.value == Some(pin);
                    self.pending = Pending::None;
                    self.value = None;
                    if matched {
                        self.unlocked = true;
                        Step::emit(ConsoleEvent::Authenticated, Echo::Text("\r\nOK\r\n"))
                    } else {
                        // Wrong PIN fails silently
                        Step::quiet()
                    }
                }
                b'0'..=b'9' => {
                    self.push_digit(byte);
                    Step::quiet()
                }
                _ => Step::quiet(),
            },
            _ => {
                if byte == DLE {
                    self.pending = Pending::Auth;
                    self.value = None;
                }
                Step::quiet()
            }
        }
    }

    fn feed_unlocked(&mut self, byte: u8) -> Step {
        match self.pending {
            Pending::Field(field) => match byte {
                ESC | BACKSPACE => {
                    self.pending = Pending::None;
                    self.value = None;
                    Step::echo(Echo::Newline)
                }
                b' ' => Step::quiet(),
                b'\r' | b'\n' => {
                    let event = match self.value.take() {
                        Some(value) => ConsoleEvent::Set(field, value),
                        None => ConsoleEvent::Get(field),
                    };
                    self.pending = Pending::None;
                    Step::emit(event, Echo::Newline)
                }
                b'0'..=b'9' => {
                    self.push_digit(byte);
                    Step::echo(Echo::Byte(byte))
                }
                _ => Step::quiet(),
            },
            _ => self.begin_command(byte),
        }
    }

    fn begin_command(&mut self, byte: u8) -> Step {
        if let Some((field, prompt)) = field_key(byte) {
            self.pending = Pending::Field(field);
            self.value = None;
            return Step::echo(Echo::Text(prompt));
        }
        match byte {
            b's' | b'S' => Step::emit(ConsoleEvent::Status, Echo::Newline),
            b'v' | b'V' => Step::emit(ConsoleEvent::Values, Echo::Newline),
            b'u' | b'U' => Step::emit(ConsoleEvent::Raise, Echo::Newline),
            b'd' | b'D' => Step::emit(ConsoleEvent::Lower, Echo::Newline),
            b'?' => Step::emit(ConsoleEvent::Help, Echo::None),
            _ => Step::quiet(),
        }
    }

    fn push_digit(&mut self, byte: u8) {
        let digit = u16::from(byte - b'0');
        self.value = Some(
            self.value
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit),
        );
    }
}

fn field_key(byte: u8) -> Option<(Field, &'static str)> {
    match byte {
        b'1' => Some((Field::P1Timeout, "H-P1? ")),
        b'2' => Some((Field::P2Timeout, "P1-P2? ")),
        b'm' | b'M' => Some((Field::ManualTimeout, "Man? ")),
        b'h' | b'H' => Some((Field::HomeTimeout, "H? ")),
        b'r' | b'R' => Some((Field::HomeRetry, "H-Retry? ")),
        b'f' | b'F' => Some((Field::FeedDuration, "Feed min? ")),
        b'n' | b'N' => Some((Field::FeedsPerWeek, "Feeds/week? ")),
        b'p' | b'P' => Some((Field::ConsolePin, "PIN? ")),
        _ => None,
    }
}
