//! `bt-temp-webhook` library.
//!
//! The binary (`src/main.rs`) is responsible for logging setup, signal
//! handling and process exit codes. Everything else lives here, with the
//! Bluetooth source and the webhook receiver behind traits so the dispatch
//! cycle can be tested deterministically.

pub mod app;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod fleet;
pub mod mac_address;
pub mod model;
pub mod reading;
pub mod reduce;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod webhook;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use config::{Config, ConfigError};
pub use decode::{DecodeError, decode, identify};
pub use dispatch::{Dispatcher, DispatchSettings};
pub use fleet::{FleetState, Window};
pub use mac_address::MacAddress;
pub use model::{Model, Quantity};
pub use reading::{Advertisement, Reading};
pub use registry::{DeviceConfig, DeviceRegistry};
pub use scanner::{ScanError, Scanner};
pub use webhook::{Notifier, Param, WebhookClient, WebhookError};
