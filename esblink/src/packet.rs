//! Framing of HID reports for the bridge radio
//!
//! Every report travels as `[type:u8][length:u8][payload]` and the whole frame has to fit into
//! [`LINK_MTU`](crate::constants::LINK_MTU) bytes. Frames are assembled into a single buffer so
//! that they can be handed to the link in one write.

use crate::constants::{HEADER_LEN, LINK_MTU, MAX_PAYLOAD_LEN};
use arrayvec::ArrayVec;
use core::fmt;

/// Fully assembled frame, ready to be written to the link
pub type Frame = ArrayVec<u8, LINK_MTU>;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportKind {
    Keyboard = 1,
    Consumer = 2,
    Mouse = 3,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Header plus payload would exceed the link MTU
    PayloadTooLarge { length: usize },
    /// Truncated frame, overlong length field or unknown report type
    Malformed,
}

impl TryFrom<u8> for ReportKind {
    type Error = CodecError;

    fn try_from(src: u8) -> Result<Self, Self::Error> {
        use ReportKind::*;

        match src {
            1 => Ok(Keyboard),
            2 => Ok(Consumer),
            3 => Ok(Mouse),
            _ => Err(CodecError::Malformed),
        }
    }
}

impl From<ReportKind> for u8 {
    fn from(src: ReportKind) -> Self {
        src as u8
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::Keyboard => "keyboard",
            ReportKind::Consumer => "consumer",
            ReportKind::Mouse => "mouse",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::PayloadTooLarge { length } => write!(
                f,
                "payload of {} bytes exceeds the {} byte limit",
                length, MAX_PAYLOAD_LEN
            ),
            CodecError::Malformed => f.write_str("malformed frame"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

pub fn encode(kind: ReportKind, payload: &[u8]) -> Result<Frame, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            length: payload.len(),
        });
    }

    let mut frame = Frame::new();
    frame.push(kind.into());
    frame.push(payload.len() as u8);
    frame
        .try_extend_from_slice(payload)
        .map_err(|_| CodecError::PayloadTooLarge {
            length: payload.len(),
        })?;

    Ok(frame)
}

/// Splits a frame back into its report type and payload
///
/// Bytes trailing the declared payload are ignored.
pub fn decode(bytes: &[u8]) -> Result<(ReportKind, &[u8]), CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Malformed);
    }

    let kind = ReportKind::try_from(bytes[0])?;
    let length = bytes[1] as usize;
    let payload = bytes[HEADER_LEN..]
        .get(..length)
        .ok_or(CodecError::Malformed)?;

    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_keyboard_report() {
        let payload = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let frame = encode(ReportKind::Keyboard, &payload).unwrap();

        assert_eq!(frame.len(), 10);
        assert_eq!(&frame[..2], &[0x01, 0x08]);
        assert_eq!(&frame[2..], &payload);
    }

    #[test]
    fn decode_inverts_encode() {
        for kind in [ReportKind::Keyboard, ReportKind::Consumer, ReportKind::Mouse] {
            for length in 0..=MAX_PAYLOAD_LEN {
                let payload: ArrayVec<u8, MAX_PAYLOAD_LEN> = (0..length as u8).collect();
                let frame = encode(kind, &payload).unwrap();

                assert_eq!(frame.len(), HEADER_LEN + length);
                assert_eq!(decode(&frame), Ok((kind, &payload[..])));
            }
        }
    }

    #[test]
    fn rejects_every_payload_beyond_the_mtu() {
        let oversized = [0u8; 2 * LINK_MTU];

        for kind in [ReportKind::Keyboard, ReportKind::Consumer, ReportKind::Mouse] {
            for length in MAX_PAYLOAD_LEN + 1..=oversized.len() {
                assert_eq!(
                    encode(kind, &oversized[..length]),
                    Err(CodecError::PayloadTooLarge { length })
                );
            }
        }
    }

    #[test]
    fn rejects_oversized_payload() {
        assert_eq!(
            encode(ReportKind::Mouse, &[0; 31]),
            Err(CodecError::PayloadTooLarge { length: 31 })
        );
    }

    #[test]
    fn rejects_truncated_frames() {
        assert_eq!(decode(&[]), Err(CodecError::Malformed));
        assert_eq!(decode(&[0x01]), Err(CodecError::Malformed));
        assert_eq!(decode(&[0x01, 0x03, 0xAA, 0xBB]), Err(CodecError::Malformed));
    }

    #[test]
    fn rejects_unknown_report_type() {
        assert_eq!(decode(&[0x07, 0x00]), Err(CodecError::Malformed));
        assert_eq!(ReportKind::try_from(0), Err(CodecError::Malformed));
    }

    #[test]
    fn ignores_trailing_bytes() {
        let (kind, payload) = decode(&[0x03, 0x01, 0x42, 0xFF]).unwrap();
        assert_eq!(kind, ReportKind::Mouse);
        assert_eq!(payload, &[0x42]);
    }
}
