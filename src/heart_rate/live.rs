use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::measurement::extract_heart_rate;
use super::HeartbeatSample;

/// A raw notification from a connected peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicUpdate {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// The device the user picked, along with the notifications it sends.
///
/// Whatever is connected to the device (see `scan::ble_notification_thread`)
/// holds the sending half.
pub struct DeviceHandle {
    pub id: String,
    pub name: Option<String>,
    notifications: mpsc::Receiver<CharacteristicUpdate>,
}

impl DeviceHandle {
    pub fn new(
        id: String,
        name: Option<String>,
        notifications: mpsc::Receiver<CharacteristicUpdate>,
    ) -> Self {
        Self {
            id,
            name,
            notifications,
        }
    }

    pub fn channel(
        id: String,
        name: Option<String>,
        capacity: usize,
    ) -> (Self, mpsc::Sender<CharacteristicUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(id, name, rx), tx)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} [{}]", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Turns a device's Heart Rate Measurement notifications into samples.
pub struct LiveSource {
    device: DeviceHandle,
}

impl LiveSource {
    pub fn new(device: DeviceHandle) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub(super) async fn next_sample(&mut self) -> Option<HeartbeatSample> {
        loop {
            let update = self.device.notifications.recv().await?;
            let Some(bpm) = extract_heart_rate(update.uuid, &update.value) else {
                debug!(
                    "Ignoring update from {} ({} bytes)",
                    update.uuid,
                    update.value.len()
                );
                continue;
            };
            // Monitors report 0 while they have no skin contact
            if bpm == 0 {
                continue;
            }
            let sample = HeartbeatSample::now(bpm);
            if !sample.is_plausible() {
                warn!("Implausible heart rate from {}: {bpm} BPM", self.device);
            }
            return Some(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heart_rate::measurement::HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID;

    fn hr_update(value: &[u8]) -> CharacteristicUpdate {
        CharacteristicUpdate {
            uuid: HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID,
            value: value.to_vec(),
        }
    }

    #[tokio::test]
    async fn skips_undecodable_updates() {
        let (device, tx) = DeviceHandle::channel("AA:BB".into(), Some("Strap".into()), 8);
        let mut source = LiveSource::new(device);

        let battery_level = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
        tx.send(CharacteristicUpdate {
            uuid: battery_level,
            value: vec![0x06, 0x48],
        })
        .await
        .unwrap();
        tx.send(hr_update(&[0x01])).await.unwrap();
        tx.send(hr_update(&[0x06, 0x00])).await.unwrap();
        tx.send(hr_update(&[0x06, 0x48])).await.unwrap();
        tx.send(hr_update(&[0x01, 0x5A, 0x00])).await.unwrap();
        drop(tx);

        assert_eq!(source.next_sample().await.map(|s| s.value), Some(72));
        assert_eq!(source.next_sample().await.map(|s| s.value), Some(90));
        // Channel closed
        assert_eq!(source.next_sample().await, None);
    }

    #[test]
    fn display_prefers_name() {
        let (named, _tx) = DeviceHandle::channel("AA:BB".into(), Some("Strap".into()), 1);
        let (unnamed, _tx2) = DeviceHandle::channel("CC:DD".into(), None, 1);
        assert_eq!(named.to_string(), "Strap [AA:BB]");
        assert_eq!(unnamed.to_string(), "CC:DD");
    }
}
