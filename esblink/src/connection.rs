//! Liveness tracking of the bridge radio

use crate::control::ControlMessage;
use core::cell::Cell;
use critical_section::Mutex;

/// Published whenever the believed liveness of the bridge changes
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LivenessChanged {
    pub connected: bool,
}

/// Receiver of liveness notifications, called synchronously at the point of transition
pub trait EventSink {
    fn publish(&mut self, event: LivenessChanged);
}

impl<F> EventSink for F
where
    F: FnMut(LivenessChanged),
{
    fn publish(&mut self, event: LivenessChanged) {
        self(event)
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl From<bool> for LinkState {
    fn from(connected: bool) -> Self {
        if connected {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}

/// What counts as evidence that the bridge is alive
///
/// Exactly one policy is active for a given machine.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LivenessPolicy {
    /// Only an `ESB` line from the bridge marks the link as connected
    #[default]
    ControlOnly,
    /// Provisional: a report accepted by the link while disconnected also marks it connected.
    /// Reports are attempted regardless of the current state.
    OptimisticSend,
}

/// Process wide connection flag, shared between interrupt and task context
pub struct ConnectionState {
    connected: Mutex<Cell<bool>>,
}

impl ConnectionState {
    pub const fn new() -> Self {
        Self {
            connected: Mutex::new(Cell::new(false)),
        }
    }

    pub fn is_connected(&self) -> bool {
        critical_section::with(|cs| self.connected.borrow(cs).get())
    }

    pub fn state(&self) -> LinkState {
        self.is_connected().into()
    }

    /// Stores `connected`, returning whether this changed the previous value
    fn swap(&self, connected: bool) -> bool {
        critical_section::with(|cs| self.connected.borrow(cs).replace(connected) != connected)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Follow-up the caller has to carry out after feeding the machine a control message
#[must_use]
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reaction {
    None,
    /// Acknowledge with `RST`, let the link drain, then restart the system
    Restart,
}

pub struct ConnectionMachine<'s, E: EventSink> {
    state: &'s ConnectionState,
    sink: E,
    policy: LivenessPolicy,
}

impl<'s, E: EventSink> ConnectionMachine<'s, E> {
    pub fn new(state: &'s ConnectionState, sink: E, policy: LivenessPolicy) -> Self {
        Self {
            state,
            sink,
            policy,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn state(&self) -> LinkState {
        self.state.state()
    }

    pub fn policy(&self) -> LivenessPolicy {
        self.policy
    }

    pub fn on_control(&mut self, message: &ControlMessage) -> Reaction {
        match message {
            ControlMessage::Esb => {
                log::info!("bridge confirmed radio mode");
                self.transition(true);
                Reaction::None
            }
            ControlMessage::Rst => {
                log::info!("bridge requested a coordinated restart");
                Reaction::Restart
            }
            ControlMessage::Unknown(_) => {
                log::warn!("unknown bridge message: {}", message);
                Reaction::None
            }
        }
    }

    /// Called after the link accepted a report
    pub fn on_report_sent(&mut self) {
        if self.policy == LivenessPolicy::OptimisticSend {
            self.transition(true);
        }
    }

    /// Forces the machine back into its initial state
    pub fn reset(&mut self) {
        self.transition(false);
    }

    /// Applies a new state and publishes it, unless the state did not actually change
    fn transition(&mut self, connected: bool) -> bool {
        let changed = self.state.swap(connected);

        if changed {
            log::info!(
                "ESB connection: {}",
                if connected { "ready" } else { "not ready" }
            );
            self.sink.publish(LivenessChanged { connected });
        }

        changed
    }
}
