use crate::decode::GOVEE_SERVICE_UUID;
use crate::mac_address::MacAddress;
use crate::reading::{Advertisement, Reading};
use crate::scanner::{ScanError, ScanStart, Scanner};
use crate::webhook::{Notifier, Param, WebhookError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Stable addresses for unit tests, inside the vendor prefixes.
pub const GOVEE_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x01, 0x02, 0x03]);
pub const GOVEE_MAC_2: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x0A, 0x0B, 0x0C]);
pub const INKBIRD_MAC: MacAddress = MacAddress([0x49, 0x42, 0x08, 0x00, 0x12, 0x34]);
pub const OTHER_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Encode a Govee H5075 manufacturer payload.
pub fn govee_payload(celsius: f64, humidity: f64, battery: u8) -> Vec<u8> {
    let temperature = (celsius.abs() * 10.0).round() as u32 * 1000;
    let humidity = (humidity * 10.0).round() as u32;
    let mut packed = temperature + humidity;
    if celsius < 0.0 {
        packed |= 0x80_0000;
    }
    let [_, a, b, c] = packed.to_be_bytes();
    vec![0x88, 0xec, 0x00, a, b, c, battery, 0x00]
}

/// Encode an Inkbird IBS-TH2 manufacturer payload from hundredths.
pub fn inkbird_payload(centi_celsius: i16, centi_humidity: i16, battery: u8) -> Vec<u8> {
    let [t0, t1] = centi_celsius.to_le_bytes();
    let [h0, h1] = centi_humidity.to_le_bytes();
    vec![t0, t1, h0, h1, 0x00, 0x00, 0x00, battery, 0x08]
}

/// A Govee advertisement carrying the reading service UUID.
pub fn govee_advertisement(manufacturer_data: Vec<u8>) -> Advertisement {
    Advertisement {
        mac: GOVEE_MAC,
        manufacturer_data,
        service_uuids: vec![GOVEE_SERVICE_UUID],
        rssi: -60,
        name: "GVH5075_0203".to_string(),
    }
}

/// Build a reading with only the fields most tests care about.
pub fn reading(celsius: f64, humidity: f64, battery: u8) -> Reading {
    Reading {
        celsius,
        fahrenheit: celsius * 1.8 + 32.0,
        humidity,
        battery,
        rssi: -60,
        name: String::new(),
    }
}

/// A scanner that hands out one pre-built batch of advertisements per scan.
///
/// Senders are kept so the test can check that every scan was stopped, i.e.
/// its receiver dropped.
#[derive(Debug, Default)]
pub struct FakeScanner {
    batches: Mutex<VecDeque<Vec<Advertisement>>>,
    senders: Mutex<Vec<mpsc::Sender<Advertisement>>>,
    fail: bool,
}

impl FakeScanner {
    pub fn new(batches: Vec<Vec<Advertisement>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Number of scans started.
    pub fn starts(&self) -> usize {
        self.senders.lock().len()
    }

    /// Number of scans whose receiver is still alive.
    pub fn active(&self) -> usize {
        self.senders.lock().iter().filter(|tx| !tx.is_closed()).count()
    }
}

impl Scanner for FakeScanner {
    fn start_scan(&self) -> ScanStart<'_> {
        Box::pin(async move {
            if self.fail {
                return Err(ScanError::Bluetooth("No default adapter".to_string()));
            }
            let batch = self.batches.lock().pop_front().unwrap_or_default();
            let (tx, rx) = mpsc::channel(batch.len().max(1));
            for advertisement in batch {
                tx.try_send(advertisement).unwrap();
            }
            self.senders.lock().push(tx);
            Ok(rx)
        })
    }
}

/// A notifier that records every call, failing for selected accessory ids.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, Param, Instant)>>,
    failing: Vec<String>,
}

impl RecordingNotifier {
    pub fn failing<const N: usize>(ids: [&str; N]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, Param)> {
        self.calls
            .lock()
            .iter()
            .map(|(id, param, _)| (id.clone(), param.clone()))
            .collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, _, at)| *at).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        accessory_id: &'a str,
        param: &'a Param,
    ) -> Pin<Box<dyn Future<Output = Result<(), WebhookError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .push((accessory_id.to_string(), param.clone(), Instant::now()));
            if self.failing.iter().any(|id| id == accessory_id) {
                return Err(WebhookError::Status {
                    url: format!("http://127.0.0.1:51828/?accessoryId={accessory_id}"),
                    status: 500,
                });
            }
            Ok(())
        })
    }
}
