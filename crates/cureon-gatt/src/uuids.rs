//! Assigned numbers for the health services used by smartwatches.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bluetooth base UUID (`0000xxxx-0000-1000-8000-00805F9B34FB`).
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Expand a 16-bit assigned number into its full 128-bit UUID.
pub const fn bluetooth_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

// Services
pub const HEART_RATE_SERVICE: Uuid = bluetooth_uuid(0x180D);
pub const BLOOD_PRESSURE_SERVICE: Uuid = bluetooth_uuid(0x1810);
pub const HEALTH_THERMOMETER_SERVICE: Uuid = bluetooth_uuid(0x1809);
pub const BATTERY_SERVICE: Uuid = bluetooth_uuid(0x180F);
pub const DEVICE_INFORMATION_SERVICE: Uuid = bluetooth_uuid(0x180A);

// Characteristics
pub const HEART_RATE_MEASUREMENT: Uuid = bluetooth_uuid(0x2A37);
pub const BLOOD_PRESSURE_MEASUREMENT: Uuid = bluetooth_uuid(0x2A35);
pub const TEMPERATURE_MEASUREMENT: Uuid = bluetooth_uuid(0x2A1C);
pub const BATTERY_LEVEL: Uuid = bluetooth_uuid(0x2A19);

/// Optional health services a watch may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthService {
    HeartRate,
    BloodPressure,
    HealthThermometer,
    Battery,
}

impl HealthService {
    /// Every service probed during discovery, in discovery order.
    pub const ALL: [HealthService; 4] = [
        HealthService::HeartRate,
        HealthService::BloodPressure,
        HealthService::HealthThermometer,
        HealthService::Battery,
    ];

    /// Service UUID.
    pub fn uuid(self) -> Uuid {
        match self {
            HealthService::HeartRate => HEART_RATE_SERVICE,
            HealthService::BloodPressure => BLOOD_PRESSURE_SERVICE,
            HealthService::HealthThermometer => HEALTH_THERMOMETER_SERVICE,
            HealthService::Battery => BATTERY_SERVICE,
        }
    }

    /// The measurement characteristic read from this service.
    pub fn measurement(self) -> Uuid {
        match self {
            HealthService::HeartRate => HEART_RATE_MEASUREMENT,
            HealthService::BloodPressure => BLOOD_PRESSURE_MEASUREMENT,
            HealthService::HealthThermometer => TEMPERATURE_MEASUREMENT,
            HealthService::Battery => BATTERY_LEVEL,
        }
    }
}

/// Name prefixes of the watches the app offers in the device picker.
pub const KNOWN_NAME_PREFIXES: [&str; 6] = ["boAt", "Mi", "Amazfit", "Fitbit", "Galaxy", "Apple"];

/// Watch family, inferred from the advertised name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchFamily {
    AppleWatch,
    Fitbit,
    SamsungGalaxyWatch,
    MiBand,
    Other,
}

impl WatchFamily {
    /// Infer the family from an advertised device name.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("Apple") {
            WatchFamily::AppleWatch
        } else if name.starts_with("Fitbit") {
            WatchFamily::Fitbit
        } else if name.starts_with("Galaxy") {
            WatchFamily::SamsungGalaxyWatch
        } else if name.starts_with("Mi") {
            WatchFamily::MiBand
        } else {
            WatchFamily::Other
        }
    }
}

/// Whether a device should be offered: it advertises heart rate or
/// carries one of the known name prefixes.
pub fn matches_device_filter(name: Option<&str>, advertised: &[Uuid]) -> bool {
    if advertised.contains(&HEART_RATE_SERVICE) {
        return true;
    }
    name.map(|n| KNOWN_NAME_PREFIXES.iter().any(|p| n.starts_with(p)))
        .unwrap_or(false)
}
