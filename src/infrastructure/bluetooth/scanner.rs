//! BLE device discovery.
//!
//! Watches the central's advertisement events for a peripheral whose
//! advertised local name matches the filter exactly, stores the matched
//! peripheral for the connect step and reports it once. The scan is stopped
//! explicitly by the session on first match or on timeout.

use std::sync::{Arc, Mutex};

use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::session::SessionEvent;
use crate::domain::transport::{DiscoveredDevice, TransportError, TransportEvent};

pub struct BleScanner {
    adapter: Adapter,
    events: mpsc::UnboundedSender<SessionEvent>,
    matched: Arc<Mutex<Option<Peripheral>>>,
    task: Option<JoinHandle<()>>,
}

impl BleScanner {
    pub fn new(
        adapter: Adapter,
        events: mpsc::UnboundedSender<SessionEvent>,
        matched: Arc<Mutex<Option<Peripheral>>>,
    ) -> Self {
        Self {
            adapter,
            events,
            matched,
            task: None,
        }
    }

    /// Start scanning for a peripheral advertising exactly `name_filter`.
    /// Failures surface as a `ScanFailed` event, never as a panic.
    pub fn start(&mut self, name_filter: &str) {
        self.stop();

        let adapter = self.adapter.clone();
        let sender = self.events.clone();
        let matched = self.matched.clone();
        let filter = name_filter.to_string();

        self.task = Some(tokio::spawn(async move {
            let send = |event: TransportEvent| {
                let _ = sender.send(SessionEvent::Transport(event));
            };

            let mut central_events = match adapter.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    send(TransportEvent::ScanFailed(scan_error(e)));
                    return;
                }
            };
            if let Err(e) = adapter.start_scan(ScanFilter::default()).await {
                send(TransportEvent::ScanFailed(scan_error(e)));
                return;
            }
            info!("scanning for '{filter}'");

            while let Some(event) = central_events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let name = peripheral
                    .properties()
                    .await
                    .ok()
                    .flatten()
                    .and_then(|properties| properties.local_name);
                if name.as_deref() == Some(filter.as_str()) {
                    info!("found '{filter}'");
                    *matched.lock().unwrap() = Some(peripheral);
                    send(TransportEvent::DeviceFound(DiscoveredDevice {
                        name: filter.clone(),
                    }));
                    return;
                }
            }
        }));
    }

    /// Stop scanning. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let adapter = self.adapter.clone();
            tokio::spawn(async move {
                if let Err(e) = adapter.stop_scan().await {
                    debug!("stop_scan: {e}");
                }
            });
        }
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan_error(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::PermissionDenied => {
            TransportError::PermissionDenied("scanning requires Bluetooth permissions".to_string())
        }
        other => TransportError::Scan(other.to_string()),
    }
}
