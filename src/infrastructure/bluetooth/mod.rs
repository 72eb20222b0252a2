//! Bluetooth Module
//!
//! btleplug implementation of the transport port the session drives.
//!
//! ## Modules
//!
//! - [`protocol`] - Fixed rover service/characteristic identifiers
//! - [`scanner`] - Name-filtered BLE device discovery
//! - [`BleTransport`] - Connection, capability resolution, notifications and
//!   writes
//!
//! Every trait method spawns its work and returns immediately; completions
//! and failures are posted onto the session's event queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::session::SessionEvent;
use crate::domain::transport::{
    CharacteristicHandle, DiscoveredDevice, Transport, TransportError, TransportEvent,
};

pub mod protocol;
pub mod scanner;

use scanner::BleScanner;

pub struct BleTransport {
    events: mpsc::UnboundedSender<SessionEvent>,
    scanner: BleScanner,
    /// Peripheral matched by the scanner, consumed by `connect`.
    matched: Arc<Mutex<Option<Peripheral>>>,
    /// The active connection. Cleared synchronously on disconnect so stale
    /// platform reports no longer match.
    peripheral: Arc<Mutex<Option<Peripheral>>>,
    characteristics: Arc<Mutex<HashMap<Uuid, Characteristic>>>,
    notify_task: Option<JoinHandle<()>>,
    _disconnect_watcher: JoinHandle<()>,
}

impl BleTransport {
    /// Bind to the first Bluetooth adapter. An absent or powered-off stack
    /// and missing permissions are fatal here; everything later is reported
    /// through the event queue.
    pub async fn new(
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, TransportError> {
        let manager = Manager::new().await.map_err(adapter_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(adapter_error)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TransportError::AdapterUnavailable("no Bluetooth adapter present".to_string())
            })?;

        let matched = Arc::new(Mutex::new(None));
        let peripheral: Arc<Mutex<Option<Peripheral>>> = Arc::new(Mutex::new(None));
        let disconnect_watcher =
            spawn_disconnect_watcher(adapter.clone(), peripheral.clone(), events.clone());

        Ok(Self {
            scanner: BleScanner::new(adapter, events.clone(), matched.clone()),
            events,
            matched,
            peripheral,
            characteristics: Arc::new(Mutex::new(HashMap::new())),
            notify_task: None,
            _disconnect_watcher: disconnect_watcher,
        })
    }

    fn send(&self, event: TransportEvent) {
        let _ = self.events.send(SessionEvent::Transport(event));
    }

    fn active_peripheral(&self) -> Option<Peripheral> {
        self.peripheral.lock().unwrap().clone()
    }
}

impl Transport for BleTransport {
    fn start_scan(&mut self, name_filter: &str) {
        self.scanner.start(name_filter);
    }

    fn stop_scan(&mut self) {
        self.scanner.stop();
    }

    fn connect(&mut self, device: &DiscoveredDevice) {
        let Some(peripheral) = self.matched.lock().unwrap().take() else {
            self.send(TransportEvent::ConnectFailed(TransportError::Connect(
                format!("no discovered peripheral for '{}'", device.name),
            )));
            return;
        };
        *self.peripheral.lock().unwrap() = Some(peripheral.clone());

        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match peripheral.connect().await {
                Ok(()) => TransportEvent::Connected,
                Err(e) => {
                    TransportEvent::ConnectFailed(TransportError::Connect(e.to_string()))
                }
            };
            let _ = events.send(SessionEvent::Transport(event));
        });
    }

    fn discover_capabilities(&mut self) {
        let Some(peripheral) = self.active_peripheral() else {
            self.send(TransportEvent::DiscoveryFailed(TransportError::Discovery(
                "not connected".to_string(),
            )));
            return;
        };
        let events = self.events.clone();
        let characteristics = self.characteristics.clone();

        tokio::spawn(async move {
            if let Err(e) = peripheral.discover_services().await {
                let _ = events.send(SessionEvent::Transport(TransportEvent::DiscoveryFailed(
                    TransportError::Discovery(e.to_string()),
                )));
                return;
            }

            let mut command = None;
            let mut telemetry = None;
            let mut resolved = HashMap::new();

            for service in peripheral.services() {
                if service.uuid != protocol::SERVICE_UUID {
                    continue;
                }
                for characteristic in service.characteristics {
                    if characteristic.uuid == protocol::COMMAND_CHARACTERISTIC_UUID {
                        command = Some(CharacteristicHandle(characteristic.uuid));
                    } else if characteristic.uuid == protocol::TELEMETRY_CHARACTERISTIC_UUID {
                        if !characteristic
                            .descriptors
                            .iter()
                            .any(|descriptor| descriptor.uuid == protocol::CCCD_UUID)
                        {
                            warn!("telemetry characteristic has no client configuration descriptor");
                        }
                        telemetry = Some(CharacteristicHandle(characteristic.uuid));
                    }
                    resolved.insert(characteristic.uuid, characteristic);
                }
            }

            *characteristics.lock().unwrap() = resolved;
            info!(
                command = command.is_some(),
                telemetry = telemetry.is_some(),
                "service discovery finished"
            );
            let _ = events.send(SessionEvent::Transport(
                TransportEvent::CapabilitiesResolved { command, telemetry },
            ));
        });
    }

    fn subscribe(&mut self, characteristic: CharacteristicHandle) {
        let Some(peripheral) = self.active_peripheral() else {
            self.send(TransportEvent::SubscribeFailed(TransportError::Subscribe(
                "not connected".to_string(),
            )));
            return;
        };
        let Some(gatt_characteristic) = self
            .characteristics
            .lock()
            .unwrap()
            .get(&characteristic.0)
            .cloned()
        else {
            self.send(TransportEvent::SubscribeFailed(TransportError::Subscribe(
                format!("characteristic {} not resolved", characteristic.0),
            )));
            return;
        };

        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        let events = self.events.clone();
        self.notify_task = Some(tokio::spawn(async move {
            let send = |event: TransportEvent| {
                let _ = events.send(SessionEvent::Transport(event));
            };

            if let Err(e) = peripheral.subscribe(&gatt_characteristic).await {
                send(TransportEvent::SubscribeFailed(TransportError::Subscribe(
                    e.to_string(),
                )));
                return;
            }
            let mut notifications = match peripheral.notifications().await {
                Ok(stream) => stream,
                Err(e) => {
                    send(TransportEvent::SubscribeFailed(TransportError::Subscribe(
                        e.to_string(),
                    )));
                    return;
                }
            };
            send(TransportEvent::Subscribed);

            while let Some(notification) = notifications.next().await {
                if notification.uuid == characteristic.0 {
                    send(TransportEvent::Telemetry(notification.value));
                }
            }
            debug!("notification stream ended");
        }));
    }

    fn write(&mut self, characteristic: CharacteristicHandle, payload: &[u8]) {
        let Some(peripheral) = self.active_peripheral() else {
            self.send(TransportEvent::WriteFailed(TransportError::Write(
                "not connected".to_string(),
            )));
            return;
        };
        let Some(gatt_characteristic) = self
            .characteristics
            .lock()
            .unwrap()
            .get(&characteristic.0)
            .cloned()
        else {
            self.send(TransportEvent::WriteFailed(TransportError::Write(format!(
                "characteristic {} not resolved",
                characteristic.0
            ))));
            return;
        };

        let events = self.events.clone();
        let payload = payload.to_vec();
        tokio::spawn(async move {
            if let Err(e) = peripheral
                .write(&gatt_characteristic, &payload, WriteType::WithoutResponse)
                .await
            {
                let _ = events.send(SessionEvent::Transport(TransportEvent::WriteFailed(
                    TransportError::Write(e.to_string()),
                )));
            }
        });
    }

    fn disconnect(&mut self) {
        self.scanner.stop();
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        self.characteristics.lock().unwrap().clear();
        self.matched.lock().unwrap().take();

        // Clearing the slot first makes a late platform disconnect report a
        // no-op in the watcher.
        let Some(peripheral) = self.peripheral.lock().unwrap().take() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = peripheral.disconnect().await {
                debug!("disconnect: {e}");
            }
        });
    }
}

/// Forward peer-initiated disconnects of the active peripheral onto the
/// session queue. Reports for anything else are dropped.
fn spawn_disconnect_watcher(
    adapter: Adapter,
    peripheral: Arc<Mutex<Option<Peripheral>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("cannot watch connection state: {e}");
                return;
            }
        };
        while let Some(event) = stream.next().await {
            if let CentralEvent::DeviceDisconnected(id) = event {
                let is_active = peripheral
                    .lock()
                    .unwrap()
                    .as_ref()
                    .is_some_and(|active| active.id() == id);
                if is_active {
                    info!("peer connection lost");
                    peripheral.lock().unwrap().take();
                    let _ = events.send(SessionEvent::Transport(TransportEvent::Disconnected));
                }
            }
        }
    })
}

fn adapter_error(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::PermissionDenied => TransportError::PermissionDenied(
            "access to the Bluetooth adapter was denied".to_string(),
        ),
        other => TransportError::AdapterUnavailable(other.to_string()),
    }
}
