//! Manufacturer data decoders for the supported sensor models.
//!
//! Both decoders are pure functions over an [`Advertisement`]. An `Err` means
//! the advertisement does not carry a reading for that model; callers are
//! expected to skip it, never to treat it as fatal.

use crate::model::Model;
use crate::reading::{Advertisement, Reading};
use thiserror::Error;

/// Service UUID under which the Govee H5075 advertises its readings.
/// The same device also sends advertisements without readings.
pub const GOVEE_SERVICE_UUID: u16 = 0xEC88;

/// Vendor prefix of Govee H5075 addresses.
pub const GOVEE_MAC_PREFIX: [u8; 3] = [0xA4, 0xC1, 0x38];

/// Vendor prefix of Inkbird IBS-TH2 addresses.
pub const INKBIRD_MAC_PREFIX: [u8; 3] = [0x49, 0x42, 0x08];

/// Exact manufacturer data length of an IBS-TH2 reading.
pub const INKBIRD_DATA_LEN: usize = 9;

const GOVEE_MIN_DATA_LEN: usize = 7;
const GOVEE_SIGN_BIT: u32 = 0x80_0000;

/// Reasons an advertisement does not yield a reading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("{model}: service UUID {uuid:#06x} not advertised")]
    MissingServiceUuid { model: Model, uuid: u16 },
    #[error("{model}: manufacturer data is {actual} bytes, expected {expected}")]
    InvalidLength {
        model: Model,
        expected: usize,
        actual: usize,
    },
    #[error("{model}: manufacturer data is {actual} bytes, expected at least {min}")]
    TooShort {
        model: Model,
        min: usize,
        actual: usize,
    },
}

type Decoder = fn(&Advertisement) -> Result<Reading, DecodeError>;

fn decoder_for(model: Model) -> Decoder {
    match model {
        Model::Gvh5075 => decode_gvh5075,
        Model::Ibsth2 => decode_ibsth2,
    }
}

/// Decode an advertisement with the decoder of `model`.
pub fn decode(model: Model, advertisement: &Advertisement) -> Result<Reading, DecodeError> {
    decoder_for(model)(advertisement)
}

/// Guess the model of an unconfigured device from its address and payload.
///
/// Only used for discovery; configured devices are always decoded with their
/// configured model.
pub fn identify(advertisement: &Advertisement) -> Option<Model> {
    if advertisement.manufacturer_data.is_empty() {
        return None;
    }
    let mac = advertisement.mac;
    if mac.has_prefix(GOVEE_MAC_PREFIX) && advertisement.service_uuids.contains(&GOVEE_SERVICE_UUID)
    {
        Some(Model::Gvh5075)
    } else if mac.has_prefix(INKBIRD_MAC_PREFIX)
        && advertisement.manufacturer_data.len() == INKBIRD_DATA_LEN
    {
        Some(Model::Ibsth2)
    } else {
        None
    }
}

/// Round `value` to `digits` decimal places.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

fn reading(model: Model, celsius: f64, humidity: f64, battery: u8, ad: &Advertisement) -> Reading {
    let digits = model.precision();
    let celsius = round_to(celsius, digits);
    Reading {
        celsius,
        fahrenheit: round_to(celsius * 1.8 + 32.0, digits),
        humidity: round_to(humidity, digits),
        battery,
        rssi: ad.rssi,
        name: ad.name.clone(),
    }
}

/// Govee H5075 layout:
///
/// | Bytes | Field                                  |
/// |-------|----------------------------------------|
/// | 0-1   | company id slot (`88 ec`)              |
/// | 2     | unknown, always zero                   |
/// | 3-5   | packed temperature/humidity, big-endian |
/// | 6     | battery percent                        |
/// | 7     | unknown                                |
///
/// The packed value is not two's complement. Bit 23 is a sign flag for the
/// temperature, and the remaining 23 bits hold `temp * 10000 + hum * 10`
/// as a decimal number, e.g. 23.4 °C / 40.9 % is `234409`.
fn decode_gvh5075(ad: &Advertisement) -> Result<Reading, DecodeError> {
    let model = Model::Gvh5075;
    if !ad.service_uuids.contains(&GOVEE_SERVICE_UUID) {
        return Err(DecodeError::MissingServiceUuid {
            model,
            uuid: GOVEE_SERVICE_UUID,
        });
    }
    let data = &ad.manufacturer_data;
    if data.len() < GOVEE_MIN_DATA_LEN {
        return Err(DecodeError::TooShort {
            model,
            min: GOVEE_MIN_DATA_LEN,
            actual: data.len(),
        });
    }

    let raw = u32::from_be_bytes([0, data[3], data[4], data[5]]);
    let packed = raw & !GOVEE_SIGN_BIT;
    let humidity = packed % 1000;
    // 23 bits always fit an i32
    let mut temperature = (packed - humidity) as i32;
    if raw & GOVEE_SIGN_BIT != 0 {
        temperature = -temperature;
    }

    Ok(reading(
        model,
        f64::from(temperature) / 10000.0,
        f64::from(humidity) / 10.0,
        data[6],
        ad,
    ))
}

/// Inkbird IBS-TH2 layout, little-endian, exactly nine bytes:
/// `i16 celsius*100`, `i16 humidity*100`, three unknown bytes,
/// `u8 battery percent`, one unknown byte.
fn decode_ibsth2(ad: &Advertisement) -> Result<Reading, DecodeError> {
    let model = Model::Ibsth2;
    let data = &ad.manufacturer_data;
    if data.len() != INKBIRD_DATA_LEN {
        return Err(DecodeError::InvalidLength {
            model,
            expected: INKBIRD_DATA_LEN,
            actual: data.len(),
        });
    }

    let celsius = i16::from_le_bytes([data[0], data[1]]);
    let humidity = i16::from_le_bytes([data[2], data[3]]);

    Ok(reading(
        model,
        f64::from(celsius) / 100.0,
        f64::from(humidity) / 100.0,
        data[7],
        ad,
    ))
}
