//! Domain core: the session state machine and the pure protocol pieces it
//! composes. Nothing in here talks to a platform Bluetooth stack directly;
//! that lives behind the [`transport::Transport`] port.

pub mod command;
pub mod models;
pub mod session;
pub mod settings;
pub mod telemetry;
pub mod transport;
