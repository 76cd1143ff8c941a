//! Configured devices, keyed by MAC address.

use crate::mac_address::MacAddress;
use crate::model::{Model, Quantity};
use std::collections::BTreeMap;

/// Configuration of one monitored device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub mac: MacAddress,
    pub model: Model,
    webhooks: BTreeMap<Quantity, String>,
}

impl DeviceConfig {
    pub fn new(mac: MacAddress, model: Model) -> Self {
        Self {
            mac,
            model,
            webhooks: BTreeMap::new(),
        }
    }

    /// Publish `quantity` to the accessory `id`. Empty ids are ignored.
    pub fn with_webhook(mut self, quantity: Quantity, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.webhooks.insert(quantity, id);
        }
        self
    }

    /// Accessory id for `quantity`, if it is published.
    pub fn webhook(&self, quantity: Quantity) -> Option<&str> {
        self.webhooks.get(&quantity).map(String::as_str)
    }

    /// Published quantities with their accessory ids, in publishing order.
    pub fn webhooks(&self) -> impl Iterator<Item = (Quantity, &str)> {
        self.webhooks.iter().map(|(q, id)| (*q, id.as_str()))
    }
}

/// Read-only map of configured devices.
///
/// Built once at startup and shared behind an `Arc`; it is never mutated
/// afterwards, so lookups need no synchronization.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<MacAddress, DeviceConfig>,
}

impl DeviceRegistry {
    pub fn new(devices: impl IntoIterator<Item = DeviceConfig>) -> Self {
        Self {
            devices: devices.into_iter().map(|d| (d.mac, d)).collect(),
        }
    }

    pub fn lookup(&self, mac: &MacAddress) -> Option<&DeviceConfig> {
        self.devices.get(mac)
    }

    /// Devices in MAC order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
