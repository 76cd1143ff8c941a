//! Per-device aggregation windows shared between the advertisement feed and
//! the dispatch cycle.

use crate::decode;
use crate::mac_address::MacAddress;
use crate::reading::{Advertisement, Reading};
use crate::registry::DeviceRegistry;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Readings accumulated for one device since the last reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    /// Readings in arrival order
    pub readings: Vec<Reading>,
    /// Most recently advertised name
    pub name: Option<String>,
}

impl Window {
    pub fn push(&mut self, reading: Reading) {
        self.name = Some(reading.name.clone());
        self.readings.push(reading);
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Aggregation windows of every configured device.
///
/// Windows are created up front for each registered MAC and cleared in place
/// on every drain; the map itself is never replaced.
#[derive(Debug)]
pub struct FleetState {
    registry: Arc<DeviceRegistry>,
    windows: Mutex<HashMap<MacAddress, Window>>,
}

impl FleetState {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        let windows = registry
            .devices()
            .map(|device| (device.mac, Window::default()))
            .collect();
        Self {
            registry,
            windows: Mutex::new(windows),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Append `reading` to the window of `mac`. Unregistered addresses are ignored.
    pub fn record(&self, mac: MacAddress, reading: Reading) -> bool {
        match self.windows.lock().get_mut(&mac) {
            Some(window) => {
                window.push(reading);
                true
            }
            None => false,
        }
    }

    /// Decode `advertisement` with its configured model and record the result.
    ///
    /// Returns `true` if a reading was recorded. Advertisements from
    /// unconfigured devices are dropped before any decoding.
    pub fn observe(&self, advertisement: &Advertisement) -> bool {
        let Some(device) = self.registry.lookup(&advertisement.mac) else {
            return false;
        };

        match decode::decode(device.model, advertisement) {
            Ok(reading) => {
                debug!(
                    "{} c={:.2} f={:.2} h={:.2}% b={}% rssi={} name='{}'",
                    device.mac,
                    reading.celsius,
                    reading.fahrenheit,
                    reading.humidity,
                    reading.battery,
                    reading.rssi,
                    reading.name
                );
                trace!(
                    "{} mfg_data='{}'",
                    device.mac,
                    hex(&advertisement.manufacturer_data)
                );
                self.record(device.mac, reading)
            }
            Err(e) => {
                trace!("{}: skipped advertisement: {}", device.mac, e);
                false
            }
        }
    }

    /// Take the accumulated windows of all configured devices and reset them.
    ///
    /// Devices that produced nothing are still present with an empty window.
    pub fn drain_and_reset(&self) -> BTreeMap<MacAddress, Window> {
        self.windows
            .lock()
            .iter_mut()
            .map(|(mac, window)| (*mac, std::mem::take(window)))
            .collect()
    }
}

/// Space separated lower-case hex, e.g. `88 ec 00`.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
