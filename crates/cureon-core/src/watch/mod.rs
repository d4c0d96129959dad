//! Smartwatch health sync.
//!
//! A [`GattPeripheral`] is the platform's BLE connection to one watch.
//! [`SmartwatchSession`] discovers the optional health services, reads and
//! monitors them, and turns raw characteristic bytes into [`HealthReading`]s.
//! Readings are queued in the local outbox and pushed in batches by
//! [`ReadingUploader`].
//!
//! [`HealthReading`]: crate::models::HealthReading

mod import;
mod session;
mod uploader;

pub use import::*;
pub use session::*;
pub use uploader::*;

use async_trait::async_trait;
use cureon_gatt::{GattParseError, HealthService};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::api::ApiError;
use crate::db::DbError;
use crate::models::ReadingError;

/// Errors reported by the platform BLE stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeripheralError {
    #[error("GATT server disconnected")]
    Disconnected,

    #[error("Bluetooth permission denied")]
    PermissionDenied,

    #[error("GATT operation failed: {0}")]
    Operation(String),
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch not connected")]
    NotConnected,

    #[error("{0:?} service not available on this watch")]
    ServiceUnavailable(HealthService),

    #[error(transparent)]
    Peripheral(#[from] PeripheralError),

    #[error("Bad characteristic value: {0}")]
    Parse(#[from] GattParseError),

    #[error("Rejected reading: {0}")]
    Reading(#[from] ReadingError),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Local store error: {0}")]
    Store(#[from] DbError),

    #[error("Local store lock poisoned")]
    StoreLock,

    #[error("Upload failed: {0}")]
    Upload(#[from] ApiError),
}

pub type WatchResult<T> = Result<T, WatchError>;

/// Discovered primary service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub handle: u16,
}

/// Link-level notifications from the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected,
}

/// BLE connection to a single watch.
#[async_trait]
pub trait GattPeripheral: Send + Sync {
    /// Stable platform identifier.
    fn id(&self) -> String;

    /// Advertised name, if any.
    fn name(&self) -> Option<String>;

    async fn connect(&self) -> Result<(), PeripheralError>;

    async fn disconnect(&self) -> Result<(), PeripheralError>;

    /// Look up a primary service; `None` when the watch does not expose it.
    async fn primary_service(&self, uuid: Uuid) -> Result<Option<GattService>, PeripheralError>;

    async fn read(&self, service: &GattService, characteristic: Uuid) -> Result<Vec<u8>, PeripheralError>;

    /// Enable notifications; values arrive on the returned channel until
    /// unsubscribed or disconnected.
    async fn subscribe(
        &self,
        service: &GattService,
        characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, PeripheralError>;

    async fn unsubscribe(&self, service: &GattService, characteristic: Uuid) -> Result<(), PeripheralError>;

    fn link_events(&self) -> broadcast::Receiver<LinkEvent>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory watch used by the session and uploader tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub struct FakeWatch {
        pub name: Option<String>,
        pub values: Mutex<HashMap<Uuid, Vec<u8>>>,
        pub services: Vec<Uuid>,
        pub connected: Mutex<bool>,
        pub notify: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
        pub links: broadcast::Sender<LinkEvent>,
        pub fail_reads: Mutex<Vec<Uuid>>,
    }

    impl FakeWatch {
        pub fn new(name: &str, services: &[HealthService]) -> Self {
            let (links, _) = broadcast::channel(8);
            Self {
                name: Some(name.to_string()),
                values: Mutex::new(HashMap::new()),
                services: services.iter().map(|s| s.uuid()).collect(),
                connected: Mutex::new(false),
                notify: Mutex::new(None),
                links,
                fail_reads: Mutex::new(Vec::new()),
            }
        }

        pub fn with_value(self, characteristic: Uuid, bytes: &[u8]) -> Self {
            self.values.lock().unwrap().insert(characteristic, bytes.to_vec());
            self
        }

        /// Simulate the watch walking out of range.
        pub fn drop_link(&self) {
            *self.connected.lock().unwrap() = false;
            self.notify.lock().unwrap().take();
            let _ = self.links.send(LinkEvent::Disconnected);
        }

        pub async fn push(&self, bytes: &[u8]) -> bool {
            let tx = self.notify.lock().unwrap().clone();
            match tx {
                Some(tx) => tx.send(bytes.to_vec()).await.is_ok(),
                None => false,
            }
        }

        pub fn is_subscribed(&self) -> bool {
            self.notify.lock().unwrap().is_some()
        }
    }

    #[async_trait]
    impl GattPeripheral for FakeWatch {
        fn id(&self) -> String {
            "AA:BB:CC:DD".to_string()
        }

        fn name(&self) -> Option<String> {
            self.name.clone()
        }

        async fn connect(&self) -> Result<(), PeripheralError> {
            *self.connected.lock().unwrap() = true;
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), PeripheralError> {
            *self.connected.lock().unwrap() = false;
            self.notify.lock().unwrap().take();
            Ok(())
        }

        async fn primary_service(&self, uuid: Uuid) -> Result<Option<GattService>, PeripheralError> {
            if !*self.connected.lock().unwrap() {
                return Err(PeripheralError::Disconnected);
            }
            Ok(self
                .services
                .iter()
                .position(|s| *s == uuid)
                .map(|i| GattService {
                    uuid,
                    handle: i as u16 + 1,
                }))
        }

        async fn read(&self, _service: &GattService, characteristic: Uuid) -> Result<Vec<u8>, PeripheralError> {
            if self.fail_reads.lock().unwrap().contains(&characteristic) {
                return Err(PeripheralError::Operation("read not permitted".into()));
            }
            self.values
                .lock()
                .unwrap()
                .get(&characteristic)
                .cloned()
                .ok_or_else(|| PeripheralError::Operation("no value".into()))
        }

        async fn subscribe(
            &self,
            _service: &GattService,
            _characteristic: Uuid,
        ) -> Result<mpsc::Receiver<Vec<u8>>, PeripheralError> {
            let (tx, rx) = mpsc::channel(16);
            *self.notify.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn unsubscribe(&self, _service: &GattService, _characteristic: Uuid) -> Result<(), PeripheralError> {
            self.notify.lock().unwrap().take();
            Ok(())
        }

        fn link_events(&self) -> broadcast::Receiver<LinkEvent> {
            self.links.subscribe()
        }
    }
}
