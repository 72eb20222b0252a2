//! Rover GATT protocol identifiers.
//!
//! Fixed 128-bit identifiers baked into the rover firmware. They must match
//! bit-exact for interoperability; they are never read from configuration.

use uuid::Uuid;

/// Custom rover control service.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x19B10000_E8F2_537E_4F6C_D104768A1214);

/// Write characteristic carrying ASCII command tokens.
pub const COMMAND_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x19B10001_E8F2_537E_4F6C_D104768A1214);

/// Notify characteristic carrying telemetry frames.
pub const TELEMETRY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x19B10002_E8F2_537E_4F6C_D104768A1214);

/// Client Characteristic Configuration Descriptor. The platform stack writes
/// the notification-enable value here on subscribe; we only verify the
/// descriptor exists on the telemetry characteristic.
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805F9B34FB);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_match_firmware_values() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "19b10000-e8f2-537e-4f6c-d104768a1214"
        );
        assert_eq!(
            COMMAND_CHARACTERISTIC_UUID.to_string(),
            "19b10001-e8f2-537e-4f6c-d104768a1214"
        );
        assert_eq!(
            TELEMETRY_CHARACTERISTIC_UUID.to_string(),
            "19b10002-e8f2-537e-4f6c-d104768a1214"
        );
        assert_eq!(CCCD_UUID.to_string(), "00002902-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_characteristics_share_the_service_namespace() {
        let service = SERVICE_UUID.as_u128();
        assert_eq!(COMMAND_CHARACTERISTIC_UUID.as_u128(), service + (1u128 << 96));
        assert_eq!(TELEMETRY_CHARACTERISTIC_UUID.as_u128(), service + (2u128 << 96));
    }
}
