use crate::{
    connection::{ConnectionMachine, ConnectionState, EventSink, LivenessPolicy, Reaction},
    constants::{QUERY_LINE, RESTART_ACK_LINE, RESTART_GRACE_MS},
    control::{ControlConsumer, ControlMessage},
    dispatch::{ReportDispatcher, SendError},
    link::{Link, ReportSource, Restart},
    packet::ReportKind,
};
use embedded_hal::blocking::delay::DelayMs;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Config {
    pub liveness: LivenessPolicy,
    pub restart_grace_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            liveness: LivenessPolicy::default(),
            restart_grace_ms: RESTART_GRACE_MS,
        }
    }
}

/// Task side of the ESB transport
///
/// Ties the connection state machine and the report dispatcher to the link, the delay used
/// for the restart grace period and the system restart primitive. The interrupt side lives in
/// [`ControlReceiver`](crate::control::ControlReceiver) and only talks to this type through the
/// control queue.
pub struct EsbTransport<'s, L, E, D, R>
where
    L: Link,
    E: EventSink,
{
    connection: ConnectionMachine<'s, E>,
    dispatcher: ReportDispatcher<L>,
    delay: D,
    restart: R,
    restart_grace_ms: u32,
}

impl<'s, L, E, D, R> EsbTransport<'s, L, E, D, R>
where
    L: Link,
    E: EventSink,
    D: DelayMs<u32>,
    R: Restart,
{
    pub fn new(
        state: &'s ConnectionState,
        link: L,
        sink: E,
        delay: D,
        restart: R,
        config: Config,
    ) -> Self {
        Self {
            connection: ConnectionMachine::new(state, sink, config.liveness),
            dispatcher: ReportDispatcher::new(link),
            delay,
            restart,
            restart_grace_ms: config.restart_grace_ms,
        }
    }

    /// Puts the link into its initial state and asks the bridge whether it is in radio mode
    ///
    /// The answer arrives asynchronously through the control path.
    pub fn start(&mut self) -> Result<(), SendError<L::Error>> {
        log::info!("initializing ESB transport");
        self.connection.reset();

        log::info!("querying bridge for ESB availability");
        self.dispatcher.send_line(QUERY_LINE)?;

        log::info!("ESB transport initialized, waiting for bridge response");
        Ok(())
    }

    /// Whether reports may currently be sent through this transport
    pub fn is_ready(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection(&self) -> &ConnectionMachine<'s, E> {
        &self.connection
    }

    pub fn link(&self) -> &L {
        self.dispatcher.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.dispatcher.link_mut()
    }

    /// Runs a single control message through the state machine
    ///
    /// Does not return if the bridge requested a restart.
    pub fn handle_control(&mut self, message: &ControlMessage) {
        if self.connection.on_control(message) == Reaction::Restart {
            self.restart_now();
        }
    }

    /// Drains all queued control messages, returning how many were processed
    pub fn poll_control(&mut self, consumer: &mut ControlConsumer<'_>) -> usize {
        let mut processed = 0;
        while let Some(message) = consumer.dequeue() {
            self.handle_control(&message);
            processed += 1;
        }
        processed
    }

    /// Acknowledges a restart request and restarts the system
    pub fn restart_now(&mut self) -> ! {
        if let Err(e) = self.dispatcher.send_line(RESTART_ACK_LINE) {
            log::warn!("failed to acknowledge restart: {}", e);
        }

        self.delay.delay_ms(self.restart_grace_ms);
        self.restart.restart()
    }

    pub fn send_report(
        &mut self,
        kind: ReportKind,
        payload: &[u8],
    ) -> Result<(), SendError<L::Error>> {
        self.dispatcher.send(&mut self.connection, kind, payload)
    }

    pub fn send_keyboard_report<S: ReportSource>(
        &mut self,
        source: &S,
    ) -> Result<(), SendError<L::Error>> {
        self.send_report(ReportKind::Keyboard, source.keyboard_report())
    }

    pub fn send_consumer_report<S: ReportSource>(
        &mut self,
        source: &S,
    ) -> Result<(), SendError<L::Error>> {
        self.send_report(ReportKind::Consumer, source.consumer_report())
    }

    pub fn send_mouse_report<S: ReportSource>(
        &mut self,
        source: &S,
    ) -> Result<(), SendError<L::Error>> {
        self.send_report(ReportKind::Mouse, source.mouse_report())
    }
}
