//! BlueZ D-Bus backend.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, ScanError, ScanStart, Scanner, current_advertisements,
    short_uuid,
};
use crate::reading::Advertisement;
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use log::{debug, trace};
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Passive LE observer on the default adapter.
pub struct BluerScanner {
    // Keeps the D-Bus connection alive for the adapter
    _session: Session,
    adapter: Adapter,
}

impl BluerScanner {
    /// Connect to BlueZ and power on the default adapter.
    pub async fn new() -> Result<Self, ScanError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        adapter.set_powered(true).await?;
        debug!("using Bluetooth adapter {}", adapter.name());
        Ok(Self {
            _session: session,
            adapter,
        })
    }

    async fn start(&self) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
        self.adapter
            .set_discovery_filter(DiscoveryFilter {
                transport: DiscoveryTransport::Le,
                duplicate_data: true,
                ..Default::default()
            })
            .await?;

        // Re-emits DeviceAdded whenever a device's properties change, which is
        // how repeated advertisements from the same device show up.
        let events = self.adapter.discover_devices_with_changes().await?;
        let adapter = self.adapter.clone();
        let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

        tokio::spawn(async move {
            let mut events = std::pin::pin!(events);
            loop {
                tokio::select! {
                    // Receiver dropped: stop discovery by dropping the stream
                    _ = tx.closed() => break,
                    event = events.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            match read_advertisements(&adapter, address).await {
                                Ok(advertisements) => {
                                    for advertisement in advertisements {
                                        if tx.send(advertisement).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Err(e) => trace!("{address}: {e}"),
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!("discovery stopped");
        });

        Ok(rx)
    }
}

impl Scanner for BluerScanner {
    fn start_scan(&self) -> ScanStart<'_> {
        Box::pin(self.start())
    }
}

/// Read the current advertisement properties of a device.
///
/// BlueZ keys manufacturer data by company id, so one device can yield more
/// than one advertisement. Devices not heard in this discovery yield none.
async fn read_advertisements(
    adapter: &Adapter,
    address: Address,
) -> Result<Vec<Advertisement>, ScanError> {
    let device = adapter.device(address)?;

    let rssi = device.rssi().await?;
    if rssi.is_none() {
        trace!("{address}: no RSSI, skipping cached properties");
        return Ok(Vec::new());
    }
    let manufacturer_data = match device.manufacturer_data().await? {
        Some(data) => data,
        None => return Ok(Vec::new()),
    };

    let service_uuids: Vec<u16> = device
        .uuids()
        .await?
        .unwrap_or_default()
        .into_iter()
        .filter_map(|uuid| short_uuid(uuid.as_u128()))
        .collect();
    let name = device.name().await?.unwrap_or_default();

    Ok(current_advertisements(
        address.into(),
        rssi,
        manufacturer_data,
        &service_uuids,
        &name,
    ))
}
