//! Discovery scan: find every supported sensor in range and summarize what
//! it sent.
//!
//! Unlike the dispatch cycle this does not need a registry. Devices are
//! recognized by vendor prefix (see [`decode::identify`]) and summarized with
//! min/max/average statistics rather than the latest reading.

use crate::decode;
use crate::fleet::Window;
use crate::mac_address::MacAddress;
use crate::model::Model;
use crate::reading::Advertisement;
use crate::reduce::{self, Stats};
use crate::scanner::{ScanError, Scanner};
use crate::webhook::format_number;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A device seen during a discovery scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredDevice {
    pub model: Model,
    pub window: Window,
}

/// Accumulates readings of every recognized, non-ignored device.
#[derive(Debug, Default)]
pub struct Discovery {
    ignore: BTreeSet<MacAddress>,
    devices: BTreeMap<MacAddress, DiscoveredDevice>,
}

impl Discovery {
    pub fn new(ignore: impl IntoIterator<Item = MacAddress>) -> Self {
        Self {
            ignore: ignore.into_iter().collect(),
            devices: BTreeMap::new(),
        }
    }

    /// Record `advertisement` if it comes from a supported sensor.
    pub fn observe(&mut self, advertisement: &Advertisement) -> bool {
        if self.ignore.contains(&advertisement.mac) {
            return false;
        }
        let Some(model) = decode::identify(advertisement) else {
            return false;
        };
        match decode::decode(model, advertisement) {
            Ok(reading) => {
                self.devices
                    .entry(advertisement.mac)
                    .or_insert_with(|| DiscoveredDevice {
                        model,
                        window: Window::default(),
                    })
                    .window
                    .push(reading);
                true
            }
            Err(e) => {
                trace!("{}: {e}", advertisement.mac);
                false
            }
        }
    }

    pub fn devices(&self) -> &BTreeMap<MacAddress, DiscoveredDevice> {
        &self.devices
    }

    pub fn into_devices(self) -> BTreeMap<MacAddress, DiscoveredDevice> {
        self.devices
    }
}

/// Scan for `time`, or until cancelled, and return what was found.
///
/// Cancelling ends the scan early but still returns the devices seen so far.
pub async fn discover(
    scanner: &dyn Scanner,
    time: Duration,
    ignore: impl IntoIterator<Item = MacAddress>,
    cancel: &CancellationToken,
) -> Result<BTreeMap<MacAddress, DiscoveredDevice>, ScanError> {
    let mut discovery = Discovery::new(ignore);
    let mut advertisements = scanner.start_scan().await?;

    let deadline = tokio::time::sleep(time);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = cancel.cancelled() => {
                debug!("scan interrupted");
                break;
            }
            received = advertisements.recv() => match received {
                Some(advertisement) => {
                    discovery.observe(&advertisement);
                }
                None => {
                    // Source ended early; still honor the requested duration
                    tokio::select! {
                        _ = &mut deadline => {}
                        _ = cancel.cancelled() => {}
                    }
                    break;
                }
            },
        }
    }

    Ok(discovery.into_devices())
}

const ROWS: [(&str, Row); 5] = [
    ("Temperature (C)", Row::Celsius),
    ("Temperature (F)", Row::Fahrenheit),
    ("   Humidity (%)", Row::Humidity),
    ("    Battery (%)", Row::Battery),
    ("     RSSI (dBm)", Row::Rssi),
];

#[derive(Debug, Clone, Copy)]
enum Row {
    Celsius,
    Fahrenheit,
    Humidity,
    Battery,
    Rssi,
}

fn format_stats(stats: &Stats, integral: bool) -> String {
    let value = |v: f64| {
        if integral {
            format!("{v:.0}")
        } else {
            format_number(v)
        }
    };
    format!(
        "lo={} hi={} avg={:.2} count={}",
        value(stats.lo),
        value(stats.hi),
        stats.avg,
        stats.count
    )
}

/// Print the human-readable summary of a discovery scan.
pub fn write_report(
    devices: &BTreeMap<MacAddress, DiscoveredDevice>,
    out: &mut dyn Write,
) -> io::Result<()> {
    match devices.len() {
        0 => return writeln!(out, "No devices found"),
        1 => writeln!(out, "Found 1 device:")?,
        n => writeln!(out, "Found {n} devices:")?,
    }

    for (mac, device) in devices {
        let Some(summary) = reduce::summarize(&device.window.readings) else {
            continue;
        };
        writeln!(
            out,
            "  mac={mac}  model='{}'  name='{}'",
            device.model,
            device.window.name.as_deref().unwrap_or_default()
        )?;
        for (label, row) in ROWS {
            let line = match row {
                Row::Celsius => format_stats(&summary.celsius, false),
                Row::Fahrenheit => format_stats(&summary.fahrenheit, false),
                Row::Humidity => format_stats(&summary.humidity, false),
                Row::Battery => format_stats(&summary.battery, true),
                Row::Rssi => format_stats(&summary.rssi, true),
            };
            writeln!(out, "    {label} : {line}")?;
        }
    }
    Ok(())
}
