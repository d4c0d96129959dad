//! Parsing of health measurement characteristic values.
//!
//! All multi-byte fields are little-endian. Medical values use the
//! IEEE-11073 16-bit SFLOAT and 32-bit FLOAT encodings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characteristic parse errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GattParseError {
    #[error("Value truncated: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("Special value in field {field}: {kind}")]
    SpecialValue {
        field: &'static str,
        kind: &'static str,
    },

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

pub type GattResult<T> = Result<T, GattParseError>;

// Heart Rate Measurement flags
const HR_FORMAT_U16: u8 = 0x01;
const HR_CONTACT_DETECTED: u8 = 0x02;
const HR_CONTACT_SUPPORTED: u8 = 0x04;
const HR_ENERGY_PRESENT: u8 = 0x08;
const HR_RR_PRESENT: u8 = 0x10;

// Blood Pressure Measurement flags
const BP_UNIT_KPA: u8 = 0x01;
const BP_TIMESTAMP_PRESENT: u8 = 0x02;
const BP_PULSE_PRESENT: u8 = 0x04;

// Temperature Measurement flags
const TEMP_UNIT_FAHRENHEIT: u8 = 0x01;

/// Length of a GATT date-time field.
const DATE_TIME_LEN: usize = 7;

const KPA_TO_MMHG: f32 = 7.500_615;

/// Decoded Heart Rate Measurement (0x2A37).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateMeasurement {
    /// Beats per minute
    pub bpm: u16,
    /// Skin contact, when the sensor reports it
    pub sensor_contact: Option<bool>,
    /// Energy expended in kilojoules
    pub energy_expended: Option<u16>,
    /// RR intervals in 1/1024 second units
    pub rr_intervals: Vec<u16>,
}

/// Pressure unit reported by the cuff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnit {
    MmHg,
    KPa,
}

/// Decoded Blood Pressure Measurement (0x2A35).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressureMeasurement {
    pub systolic: f32,
    pub diastolic: f32,
    pub mean_arterial: Option<f32>,
    pub unit: PressureUnit,
    pub pulse_rate: Option<f32>,
}

impl BloodPressureMeasurement {
    /// Systolic/diastolic pair in mmHg, rounded to whole units.
    pub fn mmhg(&self) -> (u16, u16) {
        let factor = match self.unit {
            PressureUnit::MmHg => 1.0,
            PressureUnit::KPa => KPA_TO_MMHG,
        };
        (
            (self.systolic * factor).round() as u16,
            (self.diastolic * factor).round() as u16,
        )
    }
}

/// Temperature unit reported by the thermometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Decoded Temperature Measurement (0x2A1C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureMeasurement {
    pub value: f32,
    pub unit: TemperatureUnit,
}

impl TemperatureMeasurement {
    /// Temperature in degrees Fahrenheit.
    pub fn fahrenheit(&self) -> f32 {
        match self.unit {
            TemperatureUnit::Fahrenheit => self.value,
            TemperatureUnit::Celsius => self.value * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Cursor over a characteristic value.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> GattResult<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(GattParseError::Truncated {
                needed: end,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> GattResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> GattResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> GattResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Decode an IEEE-11073 16-bit SFLOAT.
pub fn decode_sfloat(raw: u16, field: &'static str) -> GattResult<f32> {
    let special = |kind| Err(GattParseError::SpecialValue { field, kind });
    match raw {
        0x07FF => return special("NaN"),
        0x0800 => return special("NRes"),
        0x07FE => return special("+INFINITY"),
        0x0802 => return special("-INFINITY"),
        0x0801 => return special("reserved"),
        _ => {}
    }

    let mut mantissa = (raw & 0x0FFF) as i32;
    if mantissa >= 0x0800 {
        mantissa -= 0x1000;
    }
    let mut exponent = ((raw >> 12) & 0x0F) as i32;
    if exponent >= 0x08 {
        exponent -= 0x10;
    }
    Ok(mantissa as f32 * 10f32.powi(exponent))
}

/// Decode an IEEE-11073 32-bit FLOAT.
pub fn decode_float(raw: u32, field: &'static str) -> GattResult<f32> {
    let special = |kind| Err(GattParseError::SpecialValue { field, kind });
    match raw {
        0x007F_FFFF => return special("NaN"),
        0x0080_0000 => return special("NRes"),
        0x007F_FFFE => return special("+INFINITY"),
        0x0080_0002 => return special("-INFINITY"),
        0x0080_0001 => return special("reserved"),
        _ => {}
    }

    let mut mantissa = (raw & 0x00FF_FFFF) as i32;
    if mantissa >= 0x0080_0000 {
        mantissa -= 0x0100_0000;
    }
    let exponent = (raw >> 24) as u8 as i8 as i32;
    Ok(mantissa as f32 * 10f32.powi(exponent))
}

/// Parse a Heart Rate Measurement value.
///
/// The value width comes from flag bit 0: an 8-bit reading when clear, a
/// 16-bit reading when set.
pub fn parse_heart_rate_measurement(data: &[u8]) -> GattResult<HeartRateMeasurement> {
    let mut reader = Reader::new(data);
    let flags = reader.u8()?;

    let bpm = if flags & HR_FORMAT_U16 != 0 {
        reader.u16()?
    } else {
        reader.u8()? as u16
    };

    let sensor_contact = if flags & HR_CONTACT_SUPPORTED != 0 {
        Some(flags & HR_CONTACT_DETECTED != 0)
    } else {
        None
    };

    let energy_expended = if flags & HR_ENERGY_PRESENT != 0 {
        Some(reader.u16()?)
    } else {
        None
    };

    let mut rr_intervals = Vec::new();
    if flags & HR_RR_PRESENT != 0 {
        while reader.remaining() >= 2 {
            rr_intervals.push(reader.u16()?);
        }
    }

    Ok(HeartRateMeasurement {
        bpm,
        sensor_contact,
        energy_expended,
        rr_intervals,
    })
}

/// Parse a Blood Pressure Measurement value.
pub fn parse_blood_pressure_measurement(data: &[u8]) -> GattResult<BloodPressureMeasurement> {
    let mut reader = Reader::new(data);
    let flags = reader.u8()?;

    let systolic = decode_sfloat(reader.u16()?, "systolic")?;
    let diastolic = decode_sfloat(reader.u16()?, "diastolic")?;
    // Cuffs that skip MAP send NaN here
    let mean_arterial = decode_sfloat(reader.u16()?, "mean_arterial").ok();

    if flags & BP_TIMESTAMP_PRESENT != 0 {
        reader.take(DATE_TIME_LEN)?;
    }

    let pulse_rate = if flags & BP_PULSE_PRESENT != 0 {
        decode_sfloat(reader.u16()?, "pulse_rate").ok()
    } else {
        None
    };

    let unit = if flags & BP_UNIT_KPA != 0 {
        PressureUnit::KPa
    } else {
        PressureUnit::MmHg
    };

    if systolic < diastolic {
        return Err(GattParseError::OutOfRange(format!(
            "systolic {} below diastolic {}",
            systolic, diastolic
        )));
    }

    Ok(BloodPressureMeasurement {
        systolic,
        diastolic,
        mean_arterial,
        unit,
        pulse_rate,
    })
}

/// Parse a Temperature Measurement value.
pub fn parse_temperature_measurement(data: &[u8]) -> GattResult<TemperatureMeasurement> {
    let mut reader = Reader::new(data);
    let flags = reader.u8()?;
    let value = decode_float(reader.u32()?, "temperature")?;

    let unit = if flags & TEMP_UNIT_FAHRENHEIT != 0 {
        TemperatureUnit::Fahrenheit
    } else {
        TemperatureUnit::Celsius
    };

    Ok(TemperatureMeasurement { value, unit })
}

/// Parse a Battery Level value (percentage).
pub fn parse_battery_level(data: &[u8]) -> GattResult<u8> {
    let level = Reader::new(data).u8()?;
    if level > 100 {
        return Err(GattParseError::OutOfRange(format!(
            "battery level {}%",
            level
        )));
    }
    Ok(level)
}
