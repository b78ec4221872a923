//! # Transport engine for ESB radio bridges
//!
//! A split keyboard forwards its HID reports over a UART to a bridge radio, which re-transmits them
//! to a dongle using Nordic's Enhanced ShockBurst. This crate implements the keyboard side of that link:
//!
//! - [`packet`](self::packet) frames reports as `[type][length][payload]`
//! - [`control`](self::control) assembles the newline terminated control lines sent by the bridge
//! - [`connection`](self::connection) tracks whether the bridge is alive and publishes changes
//! - [`dispatch`](self::dispatch) sends reports, gated by the connection state
//! - [`arbiter`](self::arbiter) decides between USB, BLE and ESB for outgoing reports
//!
//! ## Usage workflow
//!
//! 1. Place a [`ConnectionState`](self::ConnectionState) and a [`ControlQueue`](self::ControlQueue) somewhere with a long enough lifetime
//! 2. Split the queue, hand the [`ControlReceiver`](self::ControlReceiver) to the UART interrupt and feed it every received byte
//! 3. Build an [`EsbTransport`](self::EsbTransport) from your link, event sink, delay and restart primitive and call `start`
//! 4. Regularly call `poll_control` with the queue consumer from task context
//! 5. Send some reports!
//!
//! ## Feature flags
//!
//! | Flag | Features |
//! |--------|----------|
//! | `std` | `std::error::Error` impls and a critical section implementation for hosted targets |
//! | `serial` | [`SerialLink`](self::serial::SerialLink) for talking to a bridge from a desktop |
//! | `defmt` | `defmt::Format` implementations for on-target logging |

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "std")]
extern crate alloc;

pub mod constants;

pub mod arbiter;
pub mod connection;
pub mod control;
pub mod dispatch;
pub mod link;
pub mod packet;
mod transport;

#[cfg(feature = "serial")]
pub mod serial;

pub use arbiter::{Arbiter, ArbiterConfig, Channel, ChannelReadiness, PreferenceState};
pub use connection::{
    ConnectionMachine, ConnectionState, EventSink, LinkState, LivenessChanged, LivenessPolicy,
};
pub use control::{ControlConsumer, ControlMessage, ControlQueue, ControlReceiver};
pub use dispatch::{ReportDispatcher, SendError};
pub use link::{Link, ReportSource, Restart};
pub use packet::{decode, encode, CodecError, ReportKind};
pub use transport::{Config, EsbTransport};
