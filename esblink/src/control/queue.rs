use super::{ControlMessage, LineParser, LineTooLong};
use crate::constants::CONTROL_QUEUE_DEPTH;
use heapless::spsc::{Consumer, Producer, Queue};

/// Ring buffer carrying control messages out of interrupt context
pub type ControlQueue = Queue<ControlMessage, CONTROL_QUEUE_DEPTH>;
pub type ControlProducer<'q> = Producer<'q, ControlMessage, CONTROL_QUEUE_DEPTH>;
pub type ControlConsumer<'q> = Consumer<'q, ControlMessage, CONTROL_QUEUE_DEPTH>;

/// Interrupt side of the control path
///
/// Owns the line parser and the producing end of the [`ControlQueue`](self::ControlQueue). It never touches
/// connection state or publishes events, it merely turns bytes into queued messages.
pub struct ControlReceiver<'q> {
    parser: LineParser,
    producer: ControlProducer<'q>,
    dropped: usize,
    overlong: usize,
}

impl<'q> ControlReceiver<'q> {
    pub fn new(producer: ControlProducer<'q>) -> Self {
        Self {
            parser: LineParser::new(),
            producer,
            dropped: 0,
            overlong: 0,
        }
    }

    pub fn on_byte(&mut self, byte: u8) {
        match self.parser.push(byte) {
            Ok(Some(line)) => {
                let message = ControlMessage::from_line(line);
                if let Err(message) = self.producer.enqueue(message) {
                    self.dropped = self.dropped.wrapping_add(1);
                    log::warn!("control queue full, dropping {}", message);
                }
            }
            Ok(None) => {}
            Err(LineTooLong) => {
                self.overlong = self.overlong.wrapping_add(1);
                log::warn!("discarding overlong control line");
            }
        }
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.on_byte(*byte);
        }
    }

    /// Messages lost because task context did not keep up
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Lines discarded for exceeding the line buffer
    pub fn overlong(&self) -> usize {
        self.overlong
    }
}

/// Splits a queue into its interrupt side receiver and task side consumer
pub fn split(queue: &mut ControlQueue) -> (ControlReceiver<'_>, ControlConsumer<'_>) {
    let (producer, consumer) = queue.split();
    (ControlReceiver::new(producer), consumer)
}
