//! Telemetry frame decoder.
//!
//! The rover pushes plain ASCII frames over the telemetry characteristic:
//! comma-separated `KEY:VALUE` segments, one complete frame per notification.
//! Known keys are `DISTANCIA` (unit-less distance reading), `MODO`
//! (`AUTO`/`MANUAL`) and `MOTOR` (free-form status). Telemetry is best-effort
//! status, so decoding never fails: segments without a colon, empty segments
//! and unknown keys are skipped. When a frame repeats a key, the last
//! occurrence wins.

use crate::domain::models::OperatingMode;
use tracing::trace;

/// The fields a single frame updated. Absent keys leave the prior value
/// untouched at the session level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryUpdate {
    /// Raw distance string, passed through without numeric validation.
    pub distance: Option<String>,
    pub mode: Option<OperatingMode>,
    /// Free-form motor status string.
    pub motor: Option<String>,
}

impl TelemetryUpdate {
    pub fn is_empty(&self) -> bool {
        self.distance.is_none() && self.mode.is_none() && self.motor.is_none()
    }
}

/// Decode one notification payload into a telemetry update.
pub fn decode(payload: &[u8]) -> TelemetryUpdate {
    let text = String::from_utf8_lossy(payload);
    let mut update = TelemetryUpdate::default();

    for segment in text.split(',') {
        let Some((key, value)) = segment.split_once(':') else {
            if !segment.is_empty() {
                trace!("skipping telemetry segment without separator: {segment:?}");
            }
            continue;
        };
        match key {
            "DISTANCIA" => update.distance = Some(value.to_string()),
            "MODO" => {
                update.mode = Some(if value == "AUTO" {
                    OperatingMode::Auto
                } else {
                    OperatingMode::Manual
                });
            }
            "MOTOR" => update.motor = Some(value.to_string()),
            other => trace!("skipping unknown telemetry key: {other:?}"),
        }
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_frame() {
        let update = decode(b"DISTANCIA:12,MODO:AUTO,MOTOR:ON");
        assert_eq!(update.distance.as_deref(), Some("12"));
        assert_eq!(update.mode, Some(OperatingMode::Auto));
        assert_eq!(update.motor.as_deref(), Some("ON"));
    }

    #[test]
    fn test_garbage_segment_is_skipped() {
        let update = decode(b"GARBAGE,MODO:MANUAL");
        assert_eq!(update.mode, Some(OperatingMode::Manual));
        assert!(update.distance.is_none());
        assert!(update.motor.is_none());
    }

    #[test]
    fn test_empty_frame_updates_nothing() {
        assert!(decode(b"").is_empty());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let update = decode(b"BATERIA:87,DISTANCIA:5");
        assert_eq!(update.distance.as_deref(), Some("5"));
        assert!(update.mode.is_none());
    }

    #[test]
    fn test_non_auto_mode_value_means_manual() {
        assert_eq!(decode(b"MODO:MANUAL").mode, Some(OperatingMode::Manual));
        assert_eq!(decode(b"MODO:whatever").mode, Some(OperatingMode::Manual));
        assert_eq!(decode(b"MODO:").mode, Some(OperatingMode::Manual));
    }

    #[test]
    fn test_malformed_distance_passes_through() {
        // No numeric validation: display decides what to do with it.
        let update = decode(b"DISTANCIA:1x2");
        assert_eq!(update.distance.as_deref(), Some("1x2"));
    }

    #[test]
    fn test_last_occurrence_of_a_key_wins() {
        let update = decode(b"DISTANCIA:1,DISTANCIA:2");
        assert_eq!(update.distance.as_deref(), Some("2"));
    }

    #[test]
    fn test_value_keeps_extra_colons() {
        let update = decode(b"MOTOR:ON:HIGH");
        assert_eq!(update.motor.as_deref(), Some("ON:HIGH"));
    }

    #[test]
    fn test_non_utf8_payload_does_not_panic() {
        let update = decode(&[0xFF, 0xFE, b',', b'M', b'O', b'D', b'O', b':', b'A', b'U', b'T', b'O']);
        assert_eq!(update.mode, Some(OperatingMode::Auto));
    }
}
