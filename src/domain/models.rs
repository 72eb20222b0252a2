//! Shared domain types exchanged between the session core and the
//! presentation boundary.

/// Rover operating mode.
///
/// In `Manual` the user steers directly; in `Auto` the rover self-drives and
/// local steering intents are dropped at the dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Manual,
    Auto,
}

impl OperatingMode {
    pub fn is_auto(self) -> bool {
        matches!(self, OperatingMode::Auto)
    }

    pub fn label(self) -> &'static str {
        match self {
            OperatingMode::Manual => "Manual",
            OperatingMode::Auto => "Automatic",
        }
    }
}

/// Placeholder shown while no distance telemetry has been received.
pub const DISTANCE_PLACEHOLDER: &str = "-- cm";
/// Placeholder shown while no motor telemetry has been received.
pub const MOTOR_PLACEHOLDER: &str = "--";

/// Snapshot of everything the presentation layer renders.
///
/// Re-derived from session state after every processed event; published only
/// when it differs from the previously published snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPanel {
    pub status: String,
    pub distance: String,
    pub motor: String,
    pub mode_label: &'static str,
    pub connect_label: &'static str,
    pub connect_enabled: bool,
    pub left_enabled: bool,
    pub right_enabled: bool,
    pub stop_enabled: bool,
    pub mode_toggle_enabled: bool,
}

/// Events published by the session to the presentation boundary.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Panel(ControlPanel),
    ModeChanged(OperatingMode),
    Log(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
