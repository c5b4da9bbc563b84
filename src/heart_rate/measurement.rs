use uuid::Uuid;

pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Flags bit 0, set when the rate is sent as a u16
const HR_FORMAT_U16: u8 = 0b0000_0001;

/// Reads the BPM out of a Heart Rate Measurement payload.
///
/// Only the rate format flag is honored, the rest of the payload
/// (contact status, energy expended, RR intervals) is ignored.
pub fn parse_heart_rate(payload: &[u8]) -> Option<u16> {
    let (flags, rest) = payload.split_first()?;
    if flags & HR_FORMAT_U16 == 0 {
        rest.first().map(|bpm| *bpm as u16)
    } else {
        match rest {
            [low, high, ..] => Some(u16::from_le_bytes([*low, *high])),
            _ => None,
        }
    }
}

/// `None` if the update didn't come from the Heart Rate Measurement characteristic
/// or was too short to hold a rate.
pub fn extract_heart_rate(characteristic: Uuid, payload: &[u8]) -> Option<u16> {
    if characteristic != HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID {
        return None;
    }
    parse_heart_rate(payload)
}
