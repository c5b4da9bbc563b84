use crate::errors::AppError;
use crate::heart_rate::measurement::{
    HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID, HEART_RATE_SERVICE_UUID,
};
use crate::heart_rate::CharacteristicUpdate;

use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: Option<String>,
    pub address: String,
    pub rssi: Option<i16>,
    pub has_hr_service: bool,
    pub device: Option<Peripheral>,
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("Unknown");
        let rssi = self
            .rssi
            .map(|rssi| format!("{rssi} dBm"))
            .unwrap_or_else(|| "? dBm".into());
        let hr = if self.has_hr_service { " (HR)" } else { "" };
        write!(f, "{name}{hr} | {} | {rssi}", self.address)
    }
}

/// Matches a device by name or address, ignoring case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelector(String);

impl DeviceSelector {
    pub fn new(query: &str) -> Option<Self> {
        let query = query.trim();
        (!query.is_empty()).then(|| Self(query.to_lowercase()))
    }

    pub fn matches(&self, name: Option<&str>, address: &str, id: &str) -> bool {
        name.is_some_and(|name| name.to_lowercase() == self.0)
            || address.to_lowercase() == self.0
            || id.to_lowercase() == self.0
    }

    pub fn pick<'a>(&self, devices: &'a [DiscoveredDevice]) -> Option<&'a DiscoveredDevice> {
        devices
            .iter()
            .find(|d| self.matches(d.name.as_deref(), &d.address, &d.id))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

async fn first_adapter() -> Result<Adapter, AppError> {
    let manager = Manager::new().await?;
    manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NoAdapter)
}

/// Scans for `duration`, returning every device that advertised at least one service.
///
/// Stops early if `selector` matches a device, or if cancelled.
pub async fn scan_devices(
    duration: Duration,
    selector: Option<&DeviceSelector>,
    cancel_token: CancellationToken,
) -> Result<Vec<DiscoveredDevice>, AppError> {
    let central = first_adapter().await?;
    central.start_scan(ScanFilter::default()).await?;
    let mut events = central.events().await?;
    info!("Scanning for {} seconds", duration.as_secs());

    let mut discovered: BTreeMap<String, DiscoveredDevice> = BTreeMap::new();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    'events: loop {
        tokio::select! {
            Some(event) = events.next() => {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue 'events,
                };
                let Ok(device) = central.peripheral(&id).await else {
                    continue 'events;
                };
                let properties = match device.properties().await {
                    Ok(properties) => properties.unwrap_or_else(PeripheralProperties::default),
                    Err(e) => {
                        debug!("Couldn't read properties of {id}: {e}");
                        continue 'events;
                    }
                };
                if properties.services.is_empty() {
                    continue 'events;
                }

                let found = DiscoveredDevice {
                    id: device.id().to_string(),
                    name: properties.local_name,
                    address: properties.address.to_string(),
                    rssi: properties.rssi,
                    has_hr_service: properties.services.contains(&HEART_RATE_SERVICE_UUID),
                    device: Some(device),
                };
                let is_match = selector
                    .is_some_and(|s| s.matches(found.name.as_deref(), &found.address, &found.id));
                discovered.insert(found.id.clone(), found);
                if is_match {
                    debug!("Found selected device, ending scan early");
                    break 'events;
                }
            }
            _ = &mut deadline => break 'events,
            _ = cancel_token.cancelled() => {
                info!("Scan cancelled");
                break 'events;
            }
        }
    }

    if let Err(e) = central.stop_scan().await {
        warn!("Failed to stop scan: {e}");
    }
    info!("Scan found {} devices", discovered.len());
    Ok(discovered.into_values().collect())
}

/// Stays connected to `peripheral`, forwarding every notification it sends to `tx`.
///
/// Reconnects after a drop or `no_packet_timeout` of silence, until cancelled
/// or the receiving side goes away.
pub async fn ble_notification_thread(
    peripheral: DiscoveredDevice,
    tx: mpsc::Sender<CharacteristicUpdate>,
    no_packet_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let Some(device) = peripheral.device.clone() else {
        error!("Missing device object for {peripheral}");
        return;
    };

    'connection: loop {
        if cancel_token.is_cancelled() || tx.is_closed() {
            break 'connection;
        }
        info!(
            "Connecting to Heart Rate Monitor! Name: {:?} | Address: {:?}",
            peripheral.name, peripheral.address
        );
        tokio::select! {
            result = connect_and_forward(&device, &tx, no_packet_timeout) => {
                match result {
                    Ok(()) => info!("Heart Rate Monitor stream closed!"),
                    Err(e) => error!("BLE Connection error: {e}"),
                }
                if device.is_connected().await.unwrap_or(false) {
                    if let Err(e) = device.disconnect().await {
                        warn!("Failed to disconnect: {e}");
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                if device.is_connected().await.unwrap_or(false) {
                    if let Err(e) = device.disconnect().await {
                        warn!("Failed to disconnect: {e}");
                    }
                }
                break 'connection;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    info!("Shutting down BLE notification thread!");
}

async fn connect_and_forward(
    device: &Peripheral,
    tx: &mpsc::Sender<CharacteristicUpdate>,
    no_packet_timeout: Duration,
) -> Result<(), AppError> {
    device.connect().await?;
    device.discover_services().await?;
    let characteristics = device.characteristics();
    debug!("Found {} characteristics", characteristics.len());

    let characteristic = characteristics
        .iter()
        .find(|c| c.uuid == HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID)
        .ok_or(AppError::MissingHrCharacteristic)?;
    device.subscribe(characteristic).await?;
    let mut notification_stream = device.notifications().await?;

    loop {
        tokio::select! {
            notification = notification_stream.next() => {
                let Some(data) = notification else {
                    return Ok(());
                };
                let update = CharacteristicUpdate {
                    uuid: data.uuid,
                    value: data.value,
                };
                if tx.send(update).await.is_err() {
                    info!("Notification receiver closed");
                    return Ok(());
                }
            }
            _ = tokio::time::sleep(no_packet_timeout) => {
                error!("No HR data received in {} seconds!", no_packet_timeout.as_secs());
                return Ok(());
            }
        }
    }
}
