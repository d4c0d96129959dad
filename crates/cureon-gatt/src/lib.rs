//! Bluetooth LE GATT codecs for smartwatch health data.
//!
//! This crate turns raw characteristic values from the standard health
//! services (heart rate, blood pressure, health thermometer, battery) into
//! typed measurements. It has no transport of its own; the client core feeds
//! it bytes read from whatever Bluetooth stack the platform provides.

pub mod characteristics;
pub mod uuids;

pub use characteristics::*;
pub use uuids::*;
