use crate::{
    connection::{ConnectionMachine, EventSink, LivenessPolicy},
    link::Link,
    packet::{self, CodecError, ReportKind},
};
use core::fmt;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError<E> {
    /// The bridge is not believed to be reachable, nothing was written
    NotConnected,
    /// The underlying byte stream is not ready, nothing was written
    LinkUnavailable,
    Codec(CodecError),
    Write(E),
}

impl<E> From<CodecError> for SendError<E> {
    fn from(src: CodecError) -> Self {
        SendError::Codec(src)
    }
}

impl<E: fmt::Debug> fmt::Display for SendError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotConnected => f.write_str("bridge radio is not connected"),
            SendError::LinkUnavailable => f.write_str("link is not ready"),
            SendError::Codec(e) => write!(f, "{}", e),
            SendError::Write(e) => write!(f, "link write failed: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for SendError<E> {}

/// Turns reports into frames and pushes them onto the link
pub struct ReportDispatcher<L: Link> {
    link: L,
}

impl<L: Link> ReportDispatcher<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    /// Sends a single report
    ///
    /// Success means the link accepted the frame, there is no acknowledgement from the peer.
    /// Failed reports are not queued, the caller drops or retries them.
    pub fn send<E: EventSink>(
        &mut self,
        connection: &mut ConnectionMachine<'_, E>,
        kind: ReportKind,
        payload: &[u8],
    ) -> Result<(), SendError<L::Error>> {
        if !connection.is_connected() && connection.policy() == LivenessPolicy::ControlOnly {
            return Err(SendError::NotConnected);
        }

        let frame = packet::encode(kind, payload).map_err(|e| {
            log::error!("HID packet too large: {} bytes", payload.len());
            SendError::Codec(e)
        })?;

        if !self.link.is_ready() {
            return Err(SendError::LinkUnavailable);
        }

        log::debug!(
            "sending ESB HID packet: type={}, len={}, total={}",
            kind,
            payload.len(),
            frame.len()
        );

        self.link.write_all(&frame).map_err(SendError::Write)?;
        connection.on_report_sent();

        Ok(())
    }

    /// Writes a raw control line, which has to include its terminator
    pub fn send_line(&mut self, line: &[u8]) -> Result<(), SendError<L::Error>> {
        if !self.link.is_ready() {
            return Err(SendError::LinkUnavailable);
        }

        self.link.write_all(line).map_err(SendError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionState, LivenessChanged};
    use crate::control::ControlMessage;
    use std::vec::Vec;

    #[derive(Default)]
    struct BufferLink {
        written: Vec<Vec<u8>>,
        offline: bool,
    }

    impl Link for BufferLink {
        type Error = ();

        fn is_ready(&self) -> bool {
            !self.offline
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.written.push(bytes.to_vec());
            Ok(())
        }
    }

    fn ignore(_: LivenessChanged) {}

    #[test]
    fn refuses_to_send_while_disconnected() {
        let state = ConnectionState::new();
        let mut connection = ConnectionMachine::new(&state, ignore, LivenessPolicy::ControlOnly);
        let mut dispatcher = ReportDispatcher::new(BufferLink::default());

        assert_eq!(
            dispatcher.send(&mut connection, ReportKind::Keyboard, &[0; 8]),
            Err(SendError::NotConnected)
        );
        assert!(dispatcher.link().written.is_empty());
    }

    #[test]
    fn writes_whole_frame_at_once() {
        let state = ConnectionState::new();
        let mut connection = ConnectionMachine::new(&state, ignore, LivenessPolicy::ControlOnly);
        let _ = connection.on_control(&ControlMessage::Esb);
        let mut dispatcher = ReportDispatcher::new(BufferLink::default());

        dispatcher
            .send(&mut connection, ReportKind::Consumer, &[0xE9, 0x00])
            .unwrap();

        assert_eq!(dispatcher.link().written, [vec![0x02, 0x02, 0xE9, 0x00]]);
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let state = ConnectionState::new();
        let mut connection = ConnectionMachine::new(&state, ignore, LivenessPolicy::ControlOnly);
        let _ = connection.on_control(&ControlMessage::Esb);
        let mut dispatcher = ReportDispatcher::new(BufferLink::default());

        assert_eq!(
            dispatcher.send(&mut connection, ReportKind::Mouse, &[0; 31]),
            Err(SendError::Codec(CodecError::PayloadTooLarge { length: 31 }))
        );
        assert!(dispatcher.link().written.is_empty());
    }

    #[test]
    fn unavailable_link_writes_nothing() {
        let state = ConnectionState::new();
        let mut connection = ConnectionMachine::new(&state, ignore, LivenessPolicy::ControlOnly);
        let _ = connection.on_control(&ControlMessage::Esb);
        let mut dispatcher = ReportDispatcher::new(BufferLink {
            offline: true,
            ..Default::default()
        });

        assert_eq!(
            dispatcher.send(&mut connection, ReportKind::Keyboard, &[0; 8]),
            Err(SendError::LinkUnavailable)
        );
        assert_eq!(dispatcher.send_line(b"ESB\n"), Err(SendError::LinkUnavailable));
        assert!(dispatcher.link().written.is_empty());
    }

    #[test]
    fn optimistic_send_marks_link_alive() {
        let state = ConnectionState::new();
        let mut connection =
            ConnectionMachine::new(&state, ignore, LivenessPolicy::OptimisticSend);
        let mut dispatcher = ReportDispatcher::new(BufferLink::default());

        dispatcher
            .send(&mut connection, ReportKind::Keyboard, &[0; 8])
            .unwrap();

        assert!(connection.is_connected());
        assert_eq!(dispatcher.into_inner().written.len(), 1);
    }
}
