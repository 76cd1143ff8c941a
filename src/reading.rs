//! Inbound advertisements and the readings decoded from them.

use crate::mac_address::MacAddress;

/// One received BLE advertisement, as delivered by a [`Scanner`](crate::scanner::Scanner).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Advertisement {
    /// Sender address
    pub mac: MacAddress,
    /// Manufacturer-specific data including the leading 2-byte company id slot.
    /// Empty when the advertisement carried none.
    pub manufacturer_data: Vec<u8>,
    /// Advertised 16-bit service UUIDs
    pub service_uuids: Vec<u16>,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Advertised display name, possibly empty
    pub name: String,
}

/// A decoded sensor reading.
///
/// Temperature and humidity are rounded to the precision of the model that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Temperature in Celsius
    pub celsius: f64,
    /// Temperature in Fahrenheit, derived from `celsius`
    pub fahrenheit: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Remaining battery in percent (0-100)
    pub battery: u8,
    /// Signal strength of the advertisement in dBm
    pub rssi: i16,
    /// Advertised name of the device
    pub name: String,
}
