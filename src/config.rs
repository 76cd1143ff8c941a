//! TOML configuration for the bridge.
//!
//! ```toml
//! [global]
//! interval = 60
//! url_timeout = 5.0
//!
//! [webhooks]
//! host = "127.0.0.1"
//! port = 51828
//! delay = 0.2
//!
//! [battery]
//! id = "low_battery"
//! threshold = 50
//!
//! [bt."A4:C1:38:12:34:56"]
//! model = "gvh5075"
//! temperature = "t_living"
//! humidity = "h_living"
//! battery = "b_living"
//! ```
//!
//! Every section and key is optional. Validation happens once, here, so the
//! rest of the program only sees well-formed settings.

use crate::dispatch::{BatteryAlert, DispatchSettings, MIN_INTERVAL};
use crate::mac_address::{MacAddress, ParseMacError};
use crate::model::{Model, Quantity, UnknownModel};
use crate::registry::{DeviceConfig, DeviceRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "bt-temp-webhook.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Mac(#[from] ParseMacError),

    #[error("device {mac}: {source}")]
    Model {
        mac: MacAddress,
        #[source]
        source: UnknownModel,
    },

    #[error("device {0} is configured more than once")]
    DuplicateDevice(MacAddress),

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

// ── Raw TOML structure ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    global: RawGlobal,
    webhooks: RawWebhooks,
    battery: RawBattery,
    bt: BTreeMap<String, RawDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawGlobal {
    interval: u64,
    url_timeout: f64,
}

impl Default for RawGlobal {
    fn default() -> Self {
        Self {
            interval: 60,
            url_timeout: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawWebhooks {
    host: String,
    port: u16,
    delay: f64,
}

impl Default for RawWebhooks {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 51828,
            delay: 0.2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawBattery {
    id: String,
    threshold: i64,
}

impl Default for RawBattery {
    fn default() -> Self {
        Self {
            id: String::new(),
            threshold: 50,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDevice {
    model: Option<String>,
    temperature: String,
    humidity: String,
    battery: String,
}

// ── Validated configuration ─────────────────────────────────────────

/// Webhook receiver location and pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSettings {
    pub host: String,
    pub port: u16,
    /// Pause after every webhook call
    pub delay: Duration,
    /// Upper bound for a single call
    pub timeout: Duration,
}

/// Validated bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub interval: Duration,
    pub webhooks: WebhookSettings,
    pub battery: Option<BatteryAlert>,
    pub registry: DeviceRegistry,
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    /// Settings for the dispatch loop.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            interval: self.interval,
            delay: self.webhooks.delay,
            battery_alert: self.battery.clone(),
        }
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.global.interval < MIN_INTERVAL.as_secs() {
            return Err(invalid(
                "global.interval",
                format!("must be at least {} second(s)", MIN_INTERVAL.as_secs()),
            ));
        }
        let timeout = seconds("global.url_timeout", raw.global.url_timeout)?;
        if timeout.is_zero() {
            return Err(invalid("global.url_timeout", "must be greater than zero"));
        }

        if !(1..=100).contains(&raw.battery.threshold) {
            return Err(invalid(
                "battery.threshold",
                format!("'{}' is not within 1..=100", raw.battery.threshold),
            ));
        }
        let battery_id = raw.battery.id.trim();
        let battery = (!battery_id.is_empty()).then(|| BatteryAlert {
            id: battery_id.to_string(),
            threshold: raw.battery.threshold as u8,
        });

        if raw.webhooks.host.trim().is_empty() {
            return Err(invalid("webhooks.host", "must not be empty"));
        }

        let mut devices: BTreeMap<MacAddress, DeviceConfig> = BTreeMap::new();
        for (key, device) in raw.bt {
            let mac: MacAddress = key.parse()?;
            let model = match device.model.as_deref() {
                Some(name) => name
                    .parse::<Model>()
                    .map_err(|source| ConfigError::Model { mac, source })?,
                None => Model::default(),
            };
            let config = DeviceConfig::new(mac, model)
                .with_webhook(Quantity::Temperature, device.temperature)
                .with_webhook(Quantity::Humidity, device.humidity)
                .with_webhook(Quantity::Battery, device.battery);
            if devices.insert(mac, config).is_some() {
                return Err(ConfigError::DuplicateDevice(mac));
            }
        }

        Ok(Self {
            interval: Duration::from_secs(raw.global.interval),
            webhooks: WebhookSettings {
                host: raw.webhooks.host.trim().to_string(),
                port: raw.webhooks.port,
                delay: seconds("webhooks.delay", raw.webhooks.delay)?,
                timeout,
            },
            battery,
            registry: DeviceRegistry::new(devices.into_values()),
        })
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_raw(toml::from_str(s)?)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| invalid(field, format!("'{value}' is not a valid number of seconds")))
}

/// One `section.key = value` line per setting, for verbose startup output.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "global.interval = {}", self.interval.as_secs())?;
        writeln!(f, "global.url_timeout = {:?}", self.webhooks.timeout)?;
        writeln!(f, "webhooks.host = {}", self.webhooks.host)?;
        writeln!(f, "webhooks.port = {}", self.webhooks.port)?;
        writeln!(f, "webhooks.delay = {:?}", self.webhooks.delay)?;
        match &self.battery {
            Some(alert) => {
                writeln!(f, "battery.id = {}", alert.id)?;
                writeln!(f, "battery.threshold = {}", alert.threshold)?;
            }
            None => writeln!(f, "battery.id = (disabled)")?,
        }
        for device in self.registry.devices() {
            write!(f, "bt.{} = model={}", device.mac, device.model)?;
            for (quantity, id) in device.webhooks() {
                write!(f, " {quantity}={id}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
