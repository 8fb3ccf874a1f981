//! State shared between the engine thread, the reporter, and the D-Bus
//! surface.
//!
//! Everything crossing the concurrency boundary is a scalar: the committed
//! luminance, the confirmed finger count, and the connection status. The
//! engine thread is the only writer of the gesture fields and the reporter
//! the only writer of the connection fields, so plain relaxed atomics are
//! enough — readers tolerate a value that is one frame stale.

use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};
use std::sync::Mutex;

/// Device label shown before registration succeeds.
const OFFLINE_LABEL: &str = "Offline";

pub struct SharedState {
    /// Last committed luminance (0..=255). Held across hand loss.
    luminance: AtomicU8,
    /// Confirmed finger count, −1 while none is confirmed.
    confirmed: AtomicI8,
    connected: AtomicBool,
    device_label: Mutex<String>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            luminance: AtomicU8::new(0),
            confirmed: AtomicI8::new(-1),
            connected: AtomicBool::new(false),
            device_label: Mutex::new(OFFLINE_LABEL.to_string()),
        }
    }

    #[inline]
    pub fn luminance(&self) -> u8 {
        self.luminance.load(Ordering::Relaxed)
    }

    /// Engine thread only.
    pub(crate) fn set_luminance(&self, value: u8) {
        self.luminance.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn confirmed_fingers(&self) -> Option<u8> {
        let value = self.confirmed.load(Ordering::Relaxed);
        (value >= 0).then_some(value as u8)
    }

    /// Engine thread only.
    pub(crate) fn set_confirmed(&self, confirmed: Option<u8>) {
        let encoded = confirmed.map(|c| c as i8).unwrap_or(-1);
        self.confirmed.store(encoded, Ordering::Relaxed);
    }

    #[inline]
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Reporter only.
    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn device_label(&self) -> String {
        self.device_label
            .lock()
            .map(|label| label.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Reporter only.
    pub(crate) fn set_device_label(&self, label: &str) {
        if let Ok(mut guard) = self.device_label.lock() {
            *guard = label.to_string();
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SharedState::new();
        assert_eq!(state.luminance(), 0);
        assert_eq!(state.confirmed_fingers(), None);
        assert!(!state.connected());
        assert_eq!(state.device_label(), "Offline");
    }

    #[test]
    fn test_luminance_roundtrip() {
        let state = SharedState::new();
        state.set_luminance(204);
        assert_eq!(state.luminance(), 204);
    }

    #[test]
    fn test_confirmed_encoding() {
        let state = SharedState::new();
        state.set_confirmed(Some(5));
        assert_eq!(state.confirmed_fingers(), Some(5));
        state.set_confirmed(None);
        assert_eq!(state.confirmed_fingers(), None);
        state.set_confirmed(Some(0));
        assert_eq!(state.confirmed_fingers(), Some(0));
    }

    #[test]
    fn test_connection_fields() {
        let state = SharedState::new();
        state.set_connected(true);
        state.set_device_label("DeskLamp-3");
        assert!(state.connected());
        assert_eq!(state.device_label(), "DeskLamp-3");
    }
}
