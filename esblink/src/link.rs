//! Capabilities the engine borrows from its surroundings

use core::fmt::Debug;

/// Outbound half of the byte stream towards the bridge radio
pub trait Link {
    type Error: Debug;

    /// Whether the underlying device can currently accept data
    fn is_ready(&self) -> bool {
        true
    }

    /// Writes `bytes` as one uninterrupted sequence
    ///
    /// Blocks until the sink accepted every byte. Nothing else may be spliced into the
    /// stream while a call is in progress.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

impl<L: Link + ?Sized> Link for &mut L {
    type Error = L::Error;

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_all(bytes)
    }
}

/// Full system restart, does not return
pub trait Restart {
    fn restart(&mut self) -> !;
}

/// Accessors for the most recent HID report bodies
pub trait ReportSource {
    fn keyboard_report(&self) -> &[u8];
    fn consumer_report(&self) -> &[u8];
    fn mouse_report(&self) -> &[u8];
}
