//! Selection of the channel outgoing reports are routed through
//!
//! Three channels compete for reports: the wired USB connection, regular Bluetooth LE and the
//! ESB radio bridge driven by this crate. BLE and ESB are never ready at the same time on real
//! hardware, but the selection stays deterministic if they are (ESB wins).
//!
//! | USB | wireless | outcome                                            |
//! |-----|----------|----------------------------------------------------|
//! | yes | none     | USB                                                |
//! | yes | ready    | preferred channel, configured default if unset     |
//! | no  | ready    | ESB before BLE                                     |
//! | no  | none     | configured default                                 |

use core::{cell::Cell, fmt};
use critical_section::Mutex;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Usb,
    Ble,
    Esb,
}

impl Channel {
    pub fn is_wireless(&self) -> bool {
        !matches!(self, Channel::Usb)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Usb => "USB",
            Channel::Ble => "BLE",
            Channel::Esb => "ESB",
        };
        f.write_str(name)
    }
}

/// Readiness of each channel, owned by the respective transport
///
/// The arbiter only ever reads these. Hardware mode detection can be plugged in by
/// implementing this trait without touching the arbiter.
pub trait ChannelReadiness {
    fn usb_ready(&self) -> bool;
    fn ble_ready(&self) -> bool;
    fn esb_ready(&self) -> bool;
}

/// Readiness backed by one predicate per channel
pub struct ReadinessFns<U, B, E> {
    pub usb: U,
    pub ble: B,
    pub esb: E,
}

impl<U, B, E> ChannelReadiness for ReadinessFns<U, B, E>
where
    U: Fn() -> bool,
    B: Fn() -> bool,
    E: Fn() -> bool,
{
    fn usb_ready(&self) -> bool {
        (self.usb)()
    }

    fn ble_ready(&self) -> bool {
        (self.ble)()
    }

    fn esb_ready(&self) -> bool {
        (self.esb)()
    }
}

/// Fixed readiness values, e.g. sampled once by a caller
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct ReadinessSnapshot {
    pub usb: bool,
    pub ble: bool,
    pub esb: bool,
}

impl ChannelReadiness for ReadinessSnapshot {
    fn usb_ready(&self) -> bool {
        self.usb
    }

    fn ble_ready(&self) -> bool {
        self.ble
    }

    fn esb_ready(&self) -> bool {
        self.esb
    }
}

/// The user's last explicit channel choice, shared process wide
pub struct PreferenceState {
    preferred: Mutex<Cell<Option<Channel>>>,
}

impl PreferenceState {
    pub const fn new() -> Self {
        Self {
            preferred: Mutex::new(Cell::new(None)),
        }
    }

    pub fn get(&self) -> Option<Channel> {
        critical_section::with(|cs| self.preferred.borrow(cs).get())
    }

    pub fn set(&self, channel: Channel) {
        critical_section::with(|cs| self.preferred.borrow(cs).set(Some(channel)))
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.preferred.borrow(cs).set(None))
    }
}

impl Default for PreferenceState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct ArbiterConfig {
    /// Used when nothing is ready, and as the preference until the user picks one
    pub default_channel: Channel,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            default_channel: Channel::Esb,
        }
    }
}

pub struct Arbiter<'s, R: ChannelReadiness> {
    readiness: R,
    preference: &'s PreferenceState,
    config: ArbiterConfig,
}

impl<'s, R: ChannelReadiness> Arbiter<'s, R> {
    pub fn new(readiness: R, preference: &'s PreferenceState, config: ArbiterConfig) -> Self {
        Self {
            readiness,
            preference,
            config,
        }
    }

    pub fn readiness(&self) -> &R {
        &self.readiness
    }

    pub fn preferred(&self) -> Option<Channel> {
        self.preference.get()
    }

    pub fn set_preferred(&self, channel: Channel) {
        log::info!("preferred channel set to {}", channel);
        self.preference.set(channel);
    }

    pub fn selected_channel(&self) -> Channel {
        let usb = self.readiness.usb_ready();

        match (usb, self.ready_wireless()) {
            (true, None) => Channel::Usb,
            (true, Some(wireless)) => {
                let preferred = self.preference.get().unwrap_or(self.config.default_channel);
                if preferred.is_wireless() {
                    wireless
                } else {
                    Channel::Usb
                }
            }
            (false, Some(wireless)) => wireless,
            (false, None) => self.config.default_channel,
        }
    }

    /// Flips the preference between USB and the ready wireless channel, returning the new selection
    ///
    /// The stored preference decides the direction, not the current selection, so the flip is
    /// recorded even while availability overrides it.
    pub fn toggle(&self) -> Channel {
        let current = self.preference.get().unwrap_or(self.config.default_channel);
        let next = if current.is_wireless() {
            Channel::Usb
        } else {
            self.ready_wireless()
                .unwrap_or_else(|| self.fallback_wireless())
        };

        self.set_preferred(next);
        self.selected_channel()
    }

    /// ESB takes priority should both wireless channels claim readiness
    fn ready_wireless(&self) -> Option<Channel> {
        if self.readiness.esb_ready() {
            Some(Channel::Esb)
        } else if self.readiness.ble_ready() {
            Some(Channel::Ble)
        } else {
            None
        }
    }

    fn fallback_wireless(&self) -> Channel {
        if self.config.default_channel.is_wireless() {
            self.config.default_channel
        } else {
            Channel::Esb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter(
        preference: &PreferenceState,
        usb: bool,
        ble: bool,
        esb: bool,
    ) -> Arbiter<'_, ReadinessSnapshot> {
        Arbiter::new(
            ReadinessSnapshot { usb, ble, esb },
            preference,
            ArbiterConfig::default(),
        )
    }

    #[test]
    fn wired_only() {
        let preference = PreferenceState::new();
        assert_eq!(arbiter(&preference, true, false, false).selected_channel(), Channel::Usb);
    }

    #[test]
    fn wired_and_wireless_follow_preference() {
        let preference = PreferenceState::new();
        let arbiter = arbiter(&preference, true, false, true);

        // Without a preference the configured default decides
        assert_eq!(arbiter.selected_channel(), Channel::Esb);

        arbiter.set_preferred(Channel::Usb);
        assert_eq!(arbiter.selected_channel(), Channel::Usb);
    }

    #[test]
    fn wireless_preference_maps_onto_ready_wireless_channel() {
        let preference = PreferenceState::new();
        preference.set(Channel::Esb);
        assert_eq!(arbiter(&preference, true, true, false).selected_channel(), Channel::Ble);
    }

    #[test]
    fn esb_wins_over_ble() {
        let preference = PreferenceState::new();
        assert_eq!(arbiter(&preference, false, true, true).selected_channel(), Channel::Esb);
        assert_eq!(arbiter(&preference, false, true, false).selected_channel(), Channel::Ble);
    }

    #[test]
    fn nothing_ready_uses_default() {
        let preference = PreferenceState::new();
        assert_eq!(arbiter(&preference, false, false, false).selected_channel(), Channel::Esb);

        let wired_default = Arbiter::new(
            ReadinessSnapshot::default(),
            &preference,
            ArbiterConfig {
                default_channel: Channel::Usb,
            },
        );
        assert_eq!(wired_default.selected_channel(), Channel::Usb);
    }

    #[test]
    fn toggle_round_trip() {
        let preference = PreferenceState::new();
        preference.set(Channel::Usb);
        let arbiter = arbiter(&preference, true, false, true);

        assert_eq!(arbiter.selected_channel(), Channel::Usb);
        assert_eq!(arbiter.toggle(), Channel::Esb);
        assert_eq!(arbiter.selected_channel(), Channel::Esb);
        assert_eq!(arbiter.preferred(), Some(Channel::Esb));
        assert_eq!(arbiter.toggle(), Channel::Usb);
        assert_eq!(arbiter.preferred(), Some(Channel::Usb));
    }

    #[test]
    fn toggle_without_wireless_records_intent() {
        let preference = PreferenceState::new();
        preference.set(Channel::Usb);
        let arbiter = arbiter(&preference, true, false, false);

        assert_eq!(arbiter.toggle(), Channel::Usb);
        assert_eq!(arbiter.preferred(), Some(Channel::Esb));
    }

    #[test]
    fn toggle_flips_wireless_preference_while_only_usb_is_ready() {
        let preference = PreferenceState::new();
        preference.set(Channel::Esb);
        let arbiter = arbiter(&preference, true, false, false);

        assert_eq!(arbiter.selected_channel(), Channel::Usb);
        assert_eq!(arbiter.toggle(), Channel::Usb);
        assert_eq!(arbiter.preferred(), Some(Channel::Usb));
    }

    #[test]
    fn toggle_flips_usb_preference_while_usb_is_unplugged() {
        let preference = PreferenceState::new();
        preference.set(Channel::Usb);
        let arbiter = arbiter(&preference, false, false, true);

        assert_eq!(arbiter.selected_channel(), Channel::Esb);
        assert_eq!(arbiter.toggle(), Channel::Esb);
        assert_eq!(arbiter.preferred(), Some(Channel::Esb));
    }

    #[test]
    fn toggle_without_preference_starts_from_default() {
        let preference = PreferenceState::new();
        let arbiter = arbiter(&preference, true, false, true);

        // The wireless default counts as the preference, so the first flip goes to USB
        assert_eq!(arbiter.toggle(), Channel::Usb);
        assert_eq!(arbiter.preferred(), Some(Channel::Usb));
    }

    #[test]
    fn cleared_preference_falls_back_to_default() {
        let preference = PreferenceState::new();
        let arbiter = arbiter(&preference, true, false, true);

        arbiter.set_preferred(Channel::Usb);
        assert_eq!(arbiter.selected_channel(), Channel::Usb);

        preference.clear();
        assert_eq!(arbiter.preferred(), None);
        assert_eq!(arbiter.selected_channel(), Channel::Esb);
    }

    #[test]
    fn predicates_are_read_live() {
        use core::sync::atomic::{AtomicBool, Ordering};

        let esb = AtomicBool::new(false);
        let preference = PreferenceState::new();
        let arbiter = Arbiter::new(
            ReadinessFns {
                usb: || true,
                ble: || false,
                esb: || esb.load(Ordering::Relaxed),
            },
            &preference,
            ArbiterConfig::default(),
        );

        assert_eq!(arbiter.selected_channel(), Channel::Usb);
        esb.store(true, Ordering::Relaxed);
        assert!(arbiter.readiness().esb_ready());
        assert_eq!(arbiter.selected_channel(), Channel::Esb);
    }
}
