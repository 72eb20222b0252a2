//! Session state machine.
//!
//! Owns the connection lifecycle Idle → Scanning → Connecting → Discovering
//! → Ready → (Disconnecting) → Idle and drives the transport adapter. All
//! mutation happens on one logical execution context: transport completions,
//! the scan timer and user requests are marshaled onto a single event queue
//! and processed one at a time by [`Session::handle`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::command::Intent;
use crate::domain::models::{
    AppEvent, ControlPanel, MessageSeverity, OperatingMode, StatusMessage, DISTANCE_PLACEHOLDER,
    MOTOR_PLACEHOLDER,
};
use crate::domain::settings::Settings;
use crate::domain::telemetry;
use crate::domain::transport::{CharacteristicHandle, Transport, TransportEvent};

/// Lifecycle state of the single rover session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Ready,
    Disconnecting,
}

/// Resolution state of one peer characteristic. Both slots must be
/// `Resolved` for the session to reach `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Unresolved,
    Resolved(CharacteristicHandle),
}

impl Capability {
    fn handle(self) -> Option<CharacteristicHandle> {
        match self {
            Capability::Unresolved => None,
            Capability::Resolved(handle) => Some(handle),
        }
    }
}

/// Inputs to the state machine, in arrival order on the single queue.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ConnectRequested,
    DisconnectRequested,
    Intent(Intent),
    /// Posted by the scan timer task. `generation` identifies the scan
    /// attempt the timer belongs to; stale generations are discarded.
    ScanTimeout { generation: u64 },
    Transport(TransportEvent),
    /// Handled by the runner, not by the session.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Exact advertised name of the rover.
    pub device_name: String,
    pub scan_timeout: Duration,
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            device_name: settings.device_name.clone(),
            scan_timeout: Duration::from_secs(settings.scan_timeout_secs),
        }
    }
}

/// The single per-process rover session.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    command_capability: Capability,
    telemetry_capability: Capability,
    mode: OperatingMode,
    status: String,
    distance: String,
    motor: String,
    scan_generation: u64,
    scan_timer: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    app: mpsc::UnboundedSender<AppEvent>,
    last_panel: Option<ControlPanel>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        transport: T,
        config: SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
        app: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let mut session = Self {
            transport,
            config,
            state: SessionState::Idle,
            command_capability: Capability::Unresolved,
            telemetry_capability: Capability::Unresolved,
            mode: OperatingMode::Manual,
            status: "Disconnected".to_string(),
            distance: DISTANCE_PLACEHOLDER.to_string(),
            motor: MOTOR_PLACEHOLDER.to_string(),
            scan_generation: 0,
            scan_timer: None,
            events,
            app,
            last_panel: None,
        };
        session.publish();
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Derive the presentation snapshot from current state. The connect
    /// action is disabled only while a scan is in flight; the rover controls
    /// are enabled from the connected event onward, with left/right gated by
    /// mode at dispatch rather than disabled.
    pub fn panel(&self) -> ControlPanel {
        let controls = matches!(
            self.state,
            SessionState::Discovering | SessionState::Ready
        );
        ControlPanel {
            status: self.status.clone(),
            distance: self.distance.clone(),
            motor: self.motor.clone(),
            mode_label: self.mode.label(),
            connect_label: if matches!(self.state, SessionState::Idle | SessionState::Scanning) {
                "Connect"
            } else {
                "Disconnect"
            },
            connect_enabled: self.state != SessionState::Scanning,
            left_enabled: controls,
            right_enabled: controls,
            stop_enabled: controls,
            mode_toggle_enabled: controls,
        }
    }

    /// Process one queued event. Never panics and never blocks; every
    /// failure is absorbed into a transition plus a status update.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ConnectRequested => self.on_connect_requested(),
            SessionEvent::DisconnectRequested => self.on_disconnect_requested(),
            SessionEvent::Intent(intent) => self.on_intent(intent),
            SessionEvent::ScanTimeout { generation } => self.on_scan_timeout(generation),
            SessionEvent::Transport(transport_event) => self.on_transport(transport_event),
            SessionEvent::Shutdown => debug!("shutdown event reached the session; ignoring"),
        }
        self.publish();
    }

    fn on_connect_requested(&mut self) {
        if self.state != SessionState::Idle {
            // Only one connection attempt at a time.
            debug!("connect request ignored in {:?}", self.state);
            return;
        }
        info!("scanning for '{}'", self.config.device_name);
        self.scan_generation += 1;
        self.state = SessionState::Scanning;
        self.status = format!("Scanning for {}...", self.config.device_name);
        self.transport.start_scan(&self.config.device_name);
        self.start_scan_timer();
    }

    fn on_disconnect_requested(&mut self) {
        match self.state {
            SessionState::Idle => {
                debug!("disconnect request while idle; nothing to do");
            }
            SessionState::Scanning => {
                self.cancel_scan_timer();
                self.transport.stop_scan();
                self.reset_to_idle("Disconnected");
            }
            _ => {
                self.state = SessionState::Disconnecting;
                self.transport.disconnect();
                // Local state is forced to Idle immediately; a late transport
                // report for this connection is ignored once we are there.
                self.reset_to_idle("Disconnected");
            }
        }
    }

    fn on_intent(&mut self, intent: Intent) {
        if !matches!(
            self.state,
            SessionState::Discovering | SessionState::Ready
        ) {
            debug!("intent {intent:?} ignored in {:?}", self.state);
            return;
        }
        let Some(handle) = self.command_capability.handle() else {
            debug!("command capability unresolved; dropping intent {intent:?}");
            return;
        };
        match intent {
            Intent::MoveLeft | Intent::MoveRight if self.mode.is_auto() => {
                debug!("steering intent {intent:?} dropped in automatic mode");
            }
            Intent::SetMode(mode) => {
                self.transport.write(handle, intent.as_bytes());
                self.set_mode(mode);
            }
            _ => self.transport.write(handle, intent.as_bytes()),
        }
    }

    fn on_scan_timeout(&mut self, generation: u64) {
        if self.state != SessionState::Scanning || generation != self.scan_generation {
            debug!("stale scan timeout (generation {generation}) ignored");
            return;
        }
        self.scan_timer = None;
        self.transport.stop_scan();
        self.state = SessionState::Idle;
        self.status = format!("{} not found", self.config.device_name);
        self.log(MessageSeverity::Warning, self.status.clone());
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ScanFailed(err) => {
                if self.state == SessionState::Scanning {
                    self.cancel_scan_timer();
                    self.reset_to_idle(err.to_string());
                    self.log(MessageSeverity::Error, err.to_string());
                }
            }
            TransportEvent::DeviceFound(device) => {
                if self.state != SessionState::Scanning {
                    debug!("device '{}' reported outside of a scan; ignoring", device.name);
                    return;
                }
                // Cancel before anything else: the timer must not fire after
                // this transition.
                self.cancel_scan_timer();
                self.transport.stop_scan();
                info!("found '{}', connecting", device.name);
                self.state = SessionState::Connecting;
                self.status = format!("Connecting to {}...", device.name);
                self.transport.connect(&device);
            }
            TransportEvent::Connected => {
                if self.state != SessionState::Connecting {
                    debug!("connected event ignored in {:?}", self.state);
                    return;
                }
                info!("connected to '{}'", self.config.device_name);
                self.state = SessionState::Discovering;
                self.status = format!("Connected to {}", self.config.device_name);
                self.transport.discover_capabilities();
            }
            TransportEvent::ConnectFailed(err) => {
                if self.state == SessionState::Connecting {
                    self.reset_to_idle(err.to_string());
                    self.log(MessageSeverity::Error, err.to_string());
                }
            }
            TransportEvent::Disconnected => match self.state {
                SessionState::Connecting | SessionState::Discovering | SessionState::Ready => {
                    info!("peer disconnected");
                    self.reset_to_idle("Disconnected");
                }
                _ => debug!("stale disconnect report ignored in {:?}", self.state),
            },
            TransportEvent::CapabilitiesResolved { command, telemetry } => {
                if self.state != SessionState::Discovering {
                    debug!("capability report ignored in {:?}", self.state);
                    return;
                }
                match (command, telemetry) {
                    (Some(command), Some(telemetry)) => {
                        self.command_capability = Capability::Resolved(command);
                        self.telemetry_capability = Capability::Resolved(telemetry);
                        self.state = SessionState::Ready;
                        self.transport.subscribe(telemetry);
                    }
                    _ => {
                        // Without both characteristics the session could
                        // never send commands or receive telemetry. Bail out
                        // with a distinct status instead of stalling in
                        // Discovering.
                        warn!(
                            command = command.is_some(),
                            telemetry = telemetry.is_some(),
                            "peer is missing required characteristics"
                        );
                        self.state = SessionState::Disconnecting;
                        self.transport.disconnect();
                        let status = format!(
                            "{} is missing required characteristics",
                            self.config.device_name
                        );
                        self.log(MessageSeverity::Error, status.clone());
                        self.reset_to_idle(status);
                    }
                }
            }
            TransportEvent::DiscoveryFailed(err) => {
                if self.state == SessionState::Discovering {
                    self.state = SessionState::Disconnecting;
                    self.transport.disconnect();
                    self.reset_to_idle(err.to_string());
                    self.log(MessageSeverity::Error, err.to_string());
                }
            }
            TransportEvent::Subscribed => {
                info!("telemetry notifications active");
            }
            TransportEvent::SubscribeFailed(err) => {
                if self.state == SessionState::Ready {
                    // Commands still work; degrade instead of dropping the
                    // connection.
                    self.status = format!(
                        "Connected to {} (telemetry unavailable)",
                        self.config.device_name
                    );
                    self.log(MessageSeverity::Warning, err.to_string());
                }
            }
            TransportEvent::Telemetry(payload) => {
                // Ready implies both capabilities are resolved.
                if self.state == SessionState::Ready
                    && self.telemetry_capability.handle().is_some()
                {
                    self.apply_telemetry(&payload);
                }
            }
            TransportEvent::WriteFailed(err) => {
                // Writes are best-effort; report, keep the session up.
                self.log(MessageSeverity::Warning, err.to_string());
            }
        }
    }

    fn apply_telemetry(&mut self, payload: &[u8]) {
        let update = telemetry::decode(payload);
        if let Some(distance) = update.distance {
            self.distance = format!("{distance} cm");
        }
        if let Some(motor) = update.motor {
            self.motor = motor;
        }
        if let Some(mode) = update.mode {
            self.set_mode(mode);
        }
    }

    fn set_mode(&mut self, mode: OperatingMode) {
        if mode != self.mode {
            info!("operating mode changed to {}", mode.label());
            self.mode = mode;
            let _ = self.app.send(AppEvent::ModeChanged(mode));
        }
    }

    /// Recovery target for every teardown path: clear handles, reset mode
    /// and displays, and wait for a fresh user-initiated connect.
    fn reset_to_idle(&mut self, status: impl Into<String>) {
        self.cancel_scan_timer();
        self.state = SessionState::Idle;
        self.command_capability = Capability::Unresolved;
        self.telemetry_capability = Capability::Unresolved;
        self.set_mode(OperatingMode::Manual);
        self.distance = DISTANCE_PLACEHOLDER.to_string();
        self.motor = MOTOR_PLACEHOLDER.to_string();
        self.status = status.into();
    }

    fn start_scan_timer(&mut self) {
        let generation = self.scan_generation;
        let timeout = self.config.scan_timeout;
        let events = self.events.clone();
        self.scan_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::ScanTimeout { generation });
        }));
    }

    fn cancel_scan_timer(&mut self) {
        if let Some(timer) = self.scan_timer.take() {
            timer.abort();
        }
    }

    fn publish(&mut self) {
        let panel = self.panel();
        if self.last_panel.as_ref() != Some(&panel) {
            self.last_panel = Some(panel.clone());
            let _ = self.app.send(AppEvent::Panel(panel));
        }
    }

    fn log(&self, severity: MessageSeverity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            MessageSeverity::Error => tracing::error!("{message}"),
            MessageSeverity::Warning => warn!("{message}"),
            _ => info!("{message}"),
        }
        let _ = self.app.send(AppEvent::Log(StatusMessage { message, severity }));
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.cancel_scan_timer();
    }
}
