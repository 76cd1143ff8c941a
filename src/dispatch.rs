//! The observe → drain → publish cycle.
//!
//! Observation and publication never overlap: the advertisement source is
//! stopped, and the task feeding it into the fleet has finished, before the
//! windows are drained. Publishing therefore reads a private snapshot and
//! needs no lock.

use crate::fleet::{FleetState, Window};
use crate::mac_address::MacAddress;
use crate::model::Quantity;
use crate::reading::{Advertisement, Reading};
use crate::reduce;
use crate::scanner::Scanner;
use crate::webhook::{Notifier, Param};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shortest accepted observation interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Fleet-wide low battery alert.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryAlert {
    /// Accessory id switched on when the alert fires
    pub id: String,
    /// Alert when the lowest battery is strictly below this percentage (1-100)
    pub threshold: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// How long to observe advertisements per cycle
    pub interval: Duration,
    /// Pause after every webhook call
    pub delay: Duration,
    pub battery_alert: Option<BatteryAlert>,
}

/// Where the scheduler currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Observing,
    Draining,
    Publishing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::Observing => "observing",
            Phase::Draining => "draining",
            Phase::Publishing => "publishing",
        })
    }
}

/// What one publishing phase did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    /// Devices with at least one reading
    pub devices: usize,
    /// Webhook calls issued, including the alert
    pub calls: usize,
    /// Calls that failed
    pub failures: usize,
    /// Lowest battery among devices with readings
    pub min_battery: Option<u8>,
    pub alert_sent: bool,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Cycle {
    Published(PublishReport),
    /// Cancelled while observing; nothing was drained or published.
    Cancelled,
}

/// Drives the dispatch cycle against a fleet and a notifier.
pub struct Dispatcher<'a> {
    fleet: Arc<FleetState>,
    notifier: &'a dyn Notifier,
    settings: DispatchSettings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        fleet: Arc<FleetState>,
        notifier: &'a dyn Notifier,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            fleet,
            notifier,
            settings,
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, scanner: &dyn Scanner, cancel: &CancellationToken) {
        info!(
            "dispatching every {}s for {} device(s)",
            self.settings.interval.as_secs(),
            self.fleet.registry().len()
        );
        loop {
            match self.run_cycle(scanner, cancel).await {
                Cycle::Published(report) => log_report(&report),
                Cycle::Cancelled => break,
            }
        }
        transition(Phase::Idle);
        info!("dispatch stopped");
    }

    /// One full cycle. Cancellation is honored only while observing; once
    /// draining has started the collected readings are published.
    pub async fn run_cycle(&self, scanner: &dyn Scanner, cancel: &CancellationToken) -> Cycle {
        if !self.observe(scanner, cancel).await {
            return Cycle::Cancelled;
        }

        transition(Phase::Draining);
        let windows = self.fleet.drain_and_reset();

        transition(Phase::Publishing);
        Cycle::Published(self.publish(&windows).await)
    }

    /// Observe for one interval. Returns `false` if cancelled.
    async fn observe(&self, scanner: &dyn Scanner, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        transition(Phase::Observing);

        let feeder = match scanner.start_scan().await {
            Ok(receiver) => Some(self.spawn_feeder(receiver)),
            Err(e) => {
                error!("failed to start scanning, skipping this interval: {e}");
                None
            }
        };

        let completed = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.interval) => true,
        };

        // Dropping the receiver stops the source; waiting for the task makes
        // sure no reading is still being recorded.
        if let Some(feeder) = feeder {
            feeder.abort();
            let _ = feeder.await;
        }
        completed
    }

    fn spawn_feeder(&self, mut receiver: mpsc::Receiver<Advertisement>) -> JoinHandle<()> {
        let fleet = Arc::clone(&self.fleet);
        tokio::spawn(async move {
            while let Some(advertisement) = receiver.recv().await {
                fleet.observe(&advertisement);
            }
        })
    }

    /// Publish the latest reading of every device that reported, then the
    /// battery alert if due.
    pub async fn publish(&self, windows: &BTreeMap<MacAddress, Window>) -> PublishReport {
        let mut report = PublishReport::default();

        for (mac, window) in windows {
            let Some(reading) = reduce::latest(&window.readings) else {
                continue;
            };
            let Some(device) = self.fleet.registry().lookup(mac) else {
                continue;
            };
            report.devices += 1;

            for (quantity, accessory_id) in device.webhooks() {
                self.send(accessory_id, &value_of(reading, quantity), &mut report)
                    .await;
            }

            report.min_battery = Some(
                report
                    .min_battery
                    .map_or(reading.battery, |lowest| lowest.min(reading.battery)),
            );
        }

        if let Some(alert) = &self.settings.battery_alert
            && let Some(lowest) = report.min_battery
            && lowest < alert.threshold
        {
            warn!(
                "lowest battery {lowest}% is below {}%, alerting '{}'",
                alert.threshold, alert.id
            );
            self.send(&alert.id, &Param::State(true), &mut report).await;
            report.alert_sent = true;
        }

        report
    }

    async fn send(&self, accessory_id: &str, param: &Param, report: &mut PublishReport) {
        debug!("notify accessoryId={accessory_id} {param}");
        if let Err(e) = self.notifier.notify(accessory_id, param).await {
            error!("{e}");
            report.failures += 1;
        }
        report.calls += 1;
        tokio::time::sleep(self.settings.delay).await;
    }
}

fn value_of(reading: &Reading, quantity: Quantity) -> Param {
    match quantity {
        Quantity::Temperature => Param::number(reading.celsius),
        Quantity::Humidity => Param::number(reading.humidity),
        Quantity::Battery => Param::Value(reading.battery.to_string()),
    }
}

fn transition(phase: Phase) {
    debug!("phase: {phase}");
}

fn log_report(report: &PublishReport) {
    if report.devices == 0 {
        warn!("no readings received during this interval");
        return;
    }
    info!(
        "published {} call(s) for {} device(s), {} failed, lowest battery {}%",
        report.calls,
        report.devices,
        report.failures,
        report.min_battery.unwrap_or_default()
    );
}
