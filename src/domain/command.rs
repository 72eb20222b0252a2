//! Outbound command protocol for the rover.
//!
//! Each control intent maps to exactly one fixed ASCII token, written as a
//! whole to the command characteristic with no framing and no acknowledgment.
//! The tokens are bit-exact what the rover firmware matches on. Encoding is
//! total and pure; mode gating happens at the session's dispatch boundary,
//! never here.

use crate::domain::models::OperatingMode;

/// A discrete control intent submitted by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveLeft,
    MoveRight,
    Stop,
    SetMode(OperatingMode),
}

impl Intent {
    /// The wire token for this intent.
    pub fn token(self) -> &'static str {
        match self {
            Intent::MoveLeft => "IZQUIERDA",
            Intent::MoveRight => "DERECHA",
            Intent::Stop => "DETENER",
            Intent::SetMode(OperatingMode::Auto) => "MODO_AUTO",
            Intent::SetMode(OperatingMode::Manual) => "MODO_MANUAL",
        }
    }

    /// The token as payload bytes for a transport write.
    pub fn as_bytes(self) -> &'static [u8] {
        self.token().as_bytes()
    }
}
