//! Line based control protocol spoken with the bridge radio
//!
//! The bridge and the keyboard exchange short ASCII lines terminated by `\n`:
//!
//! | Direction        | Line  | Meaning                               |
//! |------------------|-------|---------------------------------------|
//! | keyboard → bridge | `ESB` | are you in radio mode?                |
//! | bridge → keyboard | `ESB` | radio mode confirmed                  |
//! | bridge → keyboard | `RST` | coordinated restart requested         |
//! | keyboard → bridge | `RST` | restart request acknowledged          |
//!
//! Bytes arrive in interrupt context. The [`ControlReceiver`](self::ControlReceiver) assembles them into
//! lines and hands finished [`ControlMessage`](self::ControlMessage)s over to task context through a
//! lock-free queue, where they drive the connection state machine.

use crate::constants::LINE_CAPACITY;
use arrayvec::ArrayVec;
use core::fmt;

mod parser;
mod queue;

pub use parser::*;
pub use queue::*;

/// Contents of a single control line without its terminator
pub type Line = ArrayVec<u8, LINE_CAPACITY>;

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ControlMessage {
    /// Bridge confirmed that it operates in radio mode
    Esb,
    /// Bridge requests a coordinated restart
    Rst,
    /// Anything else, kept around for diagnostics
    Unknown(Line),
}

impl ControlMessage {
    pub fn from_line(line: Line) -> Self {
        match &line[..] {
            b"ESB" => ControlMessage::Esb,
            b"RST" => ControlMessage::Rst,
            _ => ControlMessage::Unknown(line),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Esb => f.write_str("ESB"),
            ControlMessage::Rst => f.write_str("RST"),
            ControlMessage::Unknown(line) => match core::str::from_utf8(line) {
                Ok(text) => write!(f, "{:?}", text),
                Err(_) => write!(f, "{:02x?}", &line[..]),
            },
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlMessage {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ControlMessage::Esb => defmt::write!(f, "ESB"),
            ControlMessage::Rst => defmt::write!(f, "RST"),
            ControlMessage::Unknown(line) => defmt::write!(f, "Unknown({=[u8]})", &line[..]),
        }
    }
}
