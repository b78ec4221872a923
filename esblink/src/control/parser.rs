use super::Line;
use crate::constants::LINE_TERMINATOR;
use core::fmt;

const CARRIAGE_RETURN: u8 = b'\r';

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineTooLong;

impl fmt::Display for LineTooLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("control line exceeds the line buffer")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LineTooLong {}

/// Incremental assembler for newline terminated lines
///
/// Bounded and non-blocking so it can be fed byte by byte from an interrupt handler.
/// A line that does not fit into the buffer is reported once and then skipped up to
/// and including its terminator, so the next line starts from a clean slate.
///
/// A `\r` is held back until the following byte arrives. It only counts towards the
/// line when it is not part of a `\r\n` terminator.
pub struct LineParser {
    buffer: Line,
    discarding: bool,
    carriage_return: bool,
}

impl LineParser {
    pub const fn new() -> Self {
        Self {
            buffer: Line::new_const(),
            discarding: false,
            carriage_return: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> Result<Option<Line>, LineTooLong> {
        let pending_cr = core::mem::replace(&mut self.carriage_return, false);

        if byte == LINE_TERMINATOR {
            if self.discarding {
                self.discarding = false;
                return Ok(None);
            }

            return Ok(Some(core::mem::take(&mut self.buffer)));
        }

        if self.discarding {
            return Ok(None);
        }

        if pending_cr {
            self.append(CARRIAGE_RETURN)?;
        }

        if byte == CARRIAGE_RETURN {
            self.carriage_return = true;
            return Ok(None);
        }

        self.append(byte)?;
        Ok(None)
    }

    /// Drops any partially assembled line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
        self.carriage_return = false;
    }

    fn append(&mut self, byte: u8) -> Result<(), LineTooLong> {
        if self.buffer.try_push(byte).is_err() {
            self.buffer.clear();
            self.discarding = true;
            return Err(LineTooLong);
        }

        Ok(())
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}
