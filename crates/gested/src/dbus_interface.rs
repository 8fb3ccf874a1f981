use crate::state::SharedState;
use std::sync::Arc;
use zbus::interface;

/// D-Bus status surface for display clients.
///
/// Bus name: org.geste.Daemon1
/// Object path: /org/geste/Daemon1
///
/// Strictly read-only: display consumers see the confirmed finger count,
/// the committed luminance, and the connection status; nothing feeds back
/// into the gesture pipeline.
pub struct DaemonInterface {
    state: Arc<SharedState>,
}

impl DaemonInterface {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }
}

#[interface(name = "org.geste.Daemon1")]
impl DaemonInterface {
    /// Current gesture and connection state as a JSON document.
    ///
    /// `fingers` is −1 while no count is confirmed (hand absent or still
    /// debouncing).
    async fn status(&self) -> String {
        let fingers = self
            .state
            .confirmed_fingers()
            .map(i16::from)
            .unwrap_or(-1);
        let luminance = self.state.luminance();

        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "fingers": fingers,
            "luminance": luminance,
            "percent": geste_core::luminance_percent(luminance),
            "connected": self.state.connected(),
            "device": self.state.device_label(),
        })
        .to_string()
    }

    /// The currently committed luminance value (0..=255).
    async fn luminance(&self) -> u8 {
        self.state.luminance()
    }
}

/// Serve the status surface on the session bus.
pub async fn serve(state: Arc<SharedState>) -> zbus::Result<zbus::Connection> {
    zbus::connection::Builder::session()?
        .name("org.geste.Daemon1")?
        .serve_at("/org/geste/Daemon1", DaemonInterface::new(state))?
        .build()
        .await
}
