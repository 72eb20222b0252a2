//! Client-side controller for a BLE rover car.
//!
//! The rover exposes one custom GATT service with a command (write)
//! characteristic and a telemetry (notify) characteristic. This crate
//! provides the session state machine that discovers the rover by name,
//! connects, resolves the characteristics, subscribes to telemetry and
//! dispatches control intents, plus a btleplug transport adapter behind the
//! [`domain::transport::Transport`] port.

pub mod domain;
pub mod infrastructure;

pub use domain::command::Intent;
pub use domain::models::{AppEvent, ControlPanel, OperatingMode};
pub use domain::session::{Session, SessionConfig, SessionEvent, SessionState};
pub use domain::transport::{Transport, TransportError, TransportEvent};
