//! Transport port: the abstract wireless capability set the session drives.
//!
//! Every method is non-blocking fire-and-forget. Completions and failures
//! come back as [`TransportEvent`]s pushed onto the session's single event
//! queue; no fault ever crosses the callback boundary as a panic or a
//! synchronous error.

use thiserror::Error;
use uuid::Uuid;

/// Opaque handle to a resolved peer characteristic. The session owns these
/// and hands them back to the transport per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHandle(pub Uuid);

/// A peer that matched the discovery name filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub name: String,
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The wireless stack itself is absent or disabled. Fatal until
    /// externally resolved.
    #[error("Bluetooth unavailable: {0}")]
    AdapterUnavailable(String),
    /// Runtime permissions were not granted. Fatal until externally resolved.
    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),
    #[error("scan failed: {0}")]
    Scan(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("service discovery failed: {0}")]
    Discovery(String),
    #[error("notification subscribe failed: {0}")]
    Subscribe(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// Asynchronous completions delivered by a [`Transport`] implementation.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ScanFailed(TransportError),
    DeviceFound(DiscoveredDevice),
    Connected,
    ConnectFailed(TransportError),
    Disconnected,
    /// Service discovery finished. Characteristics that were not found on
    /// the peer are reported as `None`, not as an error.
    CapabilitiesResolved {
        command: Option<CharacteristicHandle>,
        telemetry: Option<CharacteristicHandle>,
    },
    DiscoveryFailed(TransportError),
    Subscribed,
    SubscribeFailed(TransportError),
    /// One complete telemetry frame pushed by the peer.
    Telemetry(Vec<u8>),
    WriteFailed(TransportError),
}

/// The platform wireless adapter as seen by the session state machine.
pub trait Transport {
    /// Start scanning for a peer advertising exactly `name_filter`. Emits
    /// `DeviceFound` on first match or `ScanFailed`.
    fn start_scan(&mut self, name_filter: &str);

    /// Stop an in-progress scan. Idempotent.
    fn stop_scan(&mut self);

    /// Connect to a previously discovered peer. Emits `Connected` or
    /// `ConnectFailed`; a later peer-initiated drop emits `Disconnected`.
    fn connect(&mut self, device: &DiscoveredDevice);

    /// Resolve the rover service and its characteristics. Emits
    /// `CapabilitiesResolved` or `DiscoveryFailed`.
    fn discover_capabilities(&mut self);

    /// Enable notifications on `characteristic`. Emits `Subscribed` (then a
    /// stream of `Telemetry`) or `SubscribeFailed`.
    fn subscribe(&mut self, characteristic: CharacteristicHandle);

    /// Best-effort write, no delivery acknowledgment. Emits `WriteFailed`
    /// only on transport-level failure.
    fn write(&mut self, characteristic: CharacteristicHandle, payload: &[u8]);

    /// Tear down the connection and release local resources. Idempotent.
    fn disconnect(&mut self);
}
