//! Supported sensor models and the quantities they publish.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A supported sensor model.
///
/// The set is closed: configuration naming anything else is rejected when it
/// is loaded, so decoding never has to deal with an unknown model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Model {
    /// Govee H5075 hygrometer.
    #[default]
    Gvh5075,
    /// Inkbird IBS-TH2 temperature/humidity probe.
    Ibsth2,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::Gvh5075, Model::Ibsth2];

    /// Decimal digits kept for temperature and humidity.
    pub fn precision(self) -> i32 {
        match self {
            Model::Gvh5075 => 1,
            Model::Ibsth2 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Gvh5075 => "gvh5075",
            Model::Ibsth2 => "ibsth2",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown model '{0}' (supported: gvh5075, ibsth2)")]
pub struct UnknownModel(pub String);

impl FromStr for Model {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gvh5075" => Ok(Model::Gvh5075),
            "ibsth2" => Ok(Model::Ibsth2),
            _ => Err(UnknownModel(s.to_string())),
        }
    }
}

/// A quantity that can be pushed to a webhook accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quantity {
    Temperature,
    Humidity,
    Battery,
}

impl Quantity {
    /// Publishing order within one device.
    pub const ALL: [Quantity; 3] = [Quantity::Temperature, Quantity::Humidity, Quantity::Battery];

    pub fn as_str(self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::Battery => "battery",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
