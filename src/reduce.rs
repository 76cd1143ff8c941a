//! Reduction policies turning a window of readings into something to report.
//!
//! Two policies exist side by side:
//! - [`latest`] is what the dispatch cycle publishes: the most recent decoded
//!   reading, not an average.
//! - [`summarize`] is what the scan report prints: min/max/average per quantity.

use crate::reading::Reading;

/// The most recently recorded reading.
pub fn latest(readings: &[Reading]) -> Option<&Reading> {
    readings.last()
}

/// Low/high/average of one quantity over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub lo: f64,
    pub hi: f64,
    pub avg: f64,
    pub count: usize,
}

impl Stats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0;
        let mut sum = 0.0;
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for value in values {
            count += 1;
            sum += value;
            lo = lo.min(value);
            hi = hi.max(value);
        }
        (count > 0).then(|| Stats {
            lo,
            hi,
            avg: sum / count as f64,
            count,
        })
    }
}

/// Per-quantity statistics of a non-empty window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub celsius: Stats,
    pub fahrenheit: Stats,
    pub humidity: Stats,
    pub battery: Stats,
    pub rssi: Stats,
}

/// Summarize a window. Returns `None` for an empty window.
pub fn summarize(readings: &[Reading]) -> Option<Summary> {
    let stats = |f: fn(&Reading) -> f64| Stats::from_values(readings.iter().map(f));
    Some(Summary {
        celsius: stats(|r: &Reading| r.celsius)?,
        fahrenheit: stats(|r: &Reading| r.fahrenheit)?,
        humidity: stats(|r: &Reading| r.humidity)?,
        battery: stats(|r: &Reading| f64::from(r.battery))?,
        rssi: stats(|r: &Reading| f64::from(r.rssi))?,
    })
}
