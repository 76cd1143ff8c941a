//! BLE advertisement source.
//!
//! The rest of the crate only sees the [`Scanner`] trait: start a scan, get a
//! channel of [`Advertisement`]s, drop the receiver to stop. The BlueZ
//! implementation lives in [`bluer`] behind the `bluer` feature.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::mac_address::MacAddress;
use crate::reading::Advertisement;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel buffer size for received advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// The Bluetooth Base UUID with the 16-bit slot zeroed.
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Convenience alias for a pending scan start.
pub type ScanStart<'a> =
    Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + 'a>>;

/// Source of advertisements.
///
/// Scanning runs until the returned receiver is dropped, which is how the
/// dispatch cycle stops observation before it drains the fleet.
pub trait Scanner: Send + Sync {
    fn start_scan(&self) -> ScanStart<'_>;
}

/// Reduce a 128-bit UUID built on the Bluetooth Base UUID to its 16-bit form.
pub fn short_uuid(uuid: u128) -> Option<u16> {
    let short = (uuid >> 96) as u32;
    let base = uuid & !(0xFFFF_FFFFu128 << 96);
    (base == BLUETOOTH_BASE_UUID && short <= u32::from(u16::MAX)).then_some(short as u16)
}

/// Re-join a manufacturer data entry with its company id.
///
/// BlueZ splits the first two bytes off as a little-endian company id; the
/// decoders expect the payload as it was sent over the air.
pub fn join_manufacturer_data(company_id: u16, data: &[u8]) -> Vec<u8> {
    let mut joined = Vec::with_capacity(data.len() + 2);
    joined.extend_from_slice(&company_id.to_le_bytes());
    joined.extend_from_slice(data);
    joined
}

/// Build the advertisements of one device, one per manufacturer data entry.
///
/// A device without an RSSI has not been heard since discovery started; its
/// properties are left over from an earlier discovery and yield nothing.
pub fn current_advertisements(
    mac: MacAddress,
    rssi: Option<i16>,
    manufacturer_data: impl IntoIterator<Item = (u16, Vec<u8>)>,
    service_uuids: &[u16],
    name: &str,
) -> Vec<Advertisement> {
    let Some(rssi) = rssi else {
        return Vec::new();
    };
    manufacturer_data
        .into_iter()
        .map(|(company_id, data)| Advertisement {
            mac,
            manufacturer_data: join_manufacturer_data(company_id, &data),
            service_uuids: service_uuids.to_vec(),
            rssi,
            name: name.to_string(),
        })
        .collect()
}
