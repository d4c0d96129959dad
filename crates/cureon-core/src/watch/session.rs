use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use cureon_gatt::{
    parse_battery_level, parse_blood_pressure_measurement, parse_heart_rate_measurement,
    parse_temperature_measurement, HealthService, WatchFamily,
};
use tokio::sync::{broadcast, mpsc};

use super::{GattPeripheral, GattService, LinkEvent, WatchError, WatchResult};
use crate::models::{DeviceSource, DeviceType, HealthReading, ReadingType};

/// Live heart-rate notifications, parsed into readings.
pub struct HeartRateMonitor {
    rx: mpsc::Receiver<Vec<u8>>,
    source: DeviceSource,
}

impl HeartRateMonitor {
    /// Next notification. `None` once monitoring stops or the link drops.
    pub async fn next(&mut self) -> Option<WatchResult<HealthReading>> {
        let bytes = self.rx.recv().await?;
        Some(heart_rate_reading(&bytes, &self.source))
    }
}

fn heart_rate_reading(bytes: &[u8], source: &DeviceSource) -> WatchResult<HealthReading> {
    let measurement = parse_heart_rate_measurement(bytes)?;
    Ok(HealthReading::single(
        ReadingType::HeartRate,
        f64::from(measurement.bpm),
        source.clone(),
        Utc::now(),
    )?)
}

/// A connected watch and the services discovered on it.
pub struct SmartwatchSession<P> {
    peripheral: Arc<P>,
    source: DeviceSource,
    services: HashMap<HealthService, GattService>,
    links: broadcast::Receiver<LinkEvent>,
    connected: bool,
    monitoring: bool,
}

impl<P: GattPeripheral> SmartwatchSession<P> {
    /// Connect and discover whichever health services the watch exposes.
    pub async fn connect(peripheral: Arc<P>) -> WatchResult<Self> {
        let links = peripheral.link_events();
        peripheral.connect().await?;

        let name = peripheral.name();
        let family = name
            .as_deref()
            .map(WatchFamily::from_name)
            .unwrap_or(WatchFamily::Other);
        let source = DeviceSource {
            device_type: DeviceType::from(family),
            device_model: Some(name.unwrap_or_else(|| "Unknown".to_string())),
            device_id: Some(peripheral.id()),
        };

        let mut session = Self {
            peripheral,
            source,
            services: HashMap::new(),
            links,
            connected: true,
            monitoring: false,
        };
        session.discover().await;
        tracing::info!(
            device = ?session.source.device_model,
            services = session.services.len(),
            "watch connected"
        );
        Ok(session)
    }

    async fn discover(&mut self) {
        self.services.clear();
        for service in HealthService::ALL {
            match self.peripheral.primary_service(service.uuid()).await {
                Ok(Some(handle)) => {
                    self.services.insert(service, handle);
                }
                Ok(None) => tracing::debug!(?service, "service not present"),
                Err(e) => tracing::debug!(?service, error = %e, "service lookup failed"),
            }
        }
    }

    pub fn source(&self) -> &DeviceSource {
        &self.source
    }

    pub fn has_service(&self, service: HealthService) -> bool {
        self.services.contains_key(&service)
    }

    /// Connected as of the last observed link event.
    pub fn is_connected(&mut self) -> bool {
        self.poll_link();
        self.connected
    }

    fn reset(&mut self) {
        self.services.clear();
        self.monitoring = false;
        self.connected = false;
    }

    fn poll_link(&mut self) {
        loop {
            match self.links.try_recv() {
                Ok(LinkEvent::Disconnected) => {
                    if self.connected {
                        tracing::info!("watch disconnected");
                    }
                    self.reset();
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    fn service(&mut self, service: HealthService) -> WatchResult<GattService> {
        self.poll_link();
        if !self.connected {
            return Err(WatchError::NotConnected);
        }
        self.services
            .get(&service)
            .copied()
            .ok_or(WatchError::ServiceUnavailable(service))
    }

    async fn read_measurement(&mut self, service: HealthService) -> WatchResult<Vec<u8>> {
        let handle = self.service(service)?;
        Ok(self.peripheral.read(&handle, service.measurement()).await?)
    }

    /// Subscribe to heart-rate notifications. Restarting replaces the
    /// previous subscription.
    pub async fn start_heart_rate_monitoring(&mut self) -> WatchResult<HeartRateMonitor> {
        let handle = self.service(HealthService::HeartRate)?;
        let characteristic = HealthService::HeartRate.measurement();
        if self.monitoring {
            self.peripheral.unsubscribe(&handle, characteristic).await?;
        }

        let rx = self.peripheral.subscribe(&handle, characteristic).await?;
        self.monitoring = true;
        tracing::debug!("heart rate monitoring started");
        Ok(HeartRateMonitor {
            rx,
            source: self.source.clone(),
        })
    }

    /// Unsubscribe if monitoring. Safe to call repeatedly or after a disconnect.
    pub async fn stop_heart_rate_monitoring(&mut self) -> WatchResult<()> {
        self.poll_link();
        if !self.monitoring {
            return Ok(());
        }
        self.monitoring = false;
        if let Some(handle) = self.services.get(&HealthService::HeartRate).copied() {
            self.peripheral
                .unsubscribe(&handle, HealthService::HeartRate.measurement())
                .await?;
        }
        tracing::debug!("heart rate monitoring stopped");
        Ok(())
    }

    pub async fn read_heart_rate(&mut self) -> WatchResult<HealthReading> {
        let bytes = self.read_measurement(HealthService::HeartRate).await?;
        heart_rate_reading(&bytes, &self.source)
    }

    /// Blood pressure in mmHg.
    pub async fn read_blood_pressure(&mut self) -> WatchResult<HealthReading> {
        let bytes = self.read_measurement(HealthService::BloodPressure).await?;
        let measurement = parse_blood_pressure_measurement(&bytes)?;
        let (systolic, diastolic) = measurement.mmhg();
        Ok(HealthReading::blood_pressure(
            f64::from(systolic),
            f64::from(diastolic),
            self.source.clone(),
            Utc::now(),
        )?)
    }

    /// Body temperature in °F.
    pub async fn read_temperature(&mut self) -> WatchResult<HealthReading> {
        let bytes = self.read_measurement(HealthService::HealthThermometer).await?;
        let measurement = parse_temperature_measurement(&bytes)?;
        let fahrenheit = (f64::from(measurement.fahrenheit()) * 10.0).round() / 10.0;
        Ok(HealthReading::single(
            ReadingType::Temperature,
            fahrenheit,
            self.source.clone(),
            Utc::now(),
        )?)
    }

    /// Battery percentage, `None` when the watch has no battery service or
    /// the read fails.
    pub async fn read_battery_level(&mut self) -> WatchResult<Option<u8>> {
        let bytes = match self.read_measurement(HealthService::Battery).await {
            Ok(bytes) => bytes,
            Err(WatchError::NotConnected) => return Err(WatchError::NotConnected),
            Err(e) => {
                tracing::debug!(error = %e, "battery level unavailable");
                return Ok(None);
            }
        };
        match parse_battery_level(&bytes) {
            Ok(level) => Ok(Some(level)),
            Err(e) => {
                tracing::debug!(error = %e, "bad battery value");
                Ok(None)
            }
        }
    }

    /// Read every vital the watch offers, skipping the ones it cannot give.
    pub async fn sync_all(&mut self) -> WatchResult<Vec<HealthReading>> {
        self.poll_link();
        if !self.connected {
            return Err(WatchError::NotConnected);
        }

        let mut readings = Vec::new();
        for service in [
            HealthService::HeartRate,
            HealthService::BloodPressure,
            HealthService::HealthThermometer,
        ] {
            if !self.has_service(service) {
                continue;
            }
            let result = match service {
                HealthService::HeartRate => self.read_heart_rate().await,
                HealthService::BloodPressure => self.read_blood_pressure().await,
                _ => self.read_temperature().await,
            };
            match result {
                Ok(reading) => readings.push(reading),
                Err(WatchError::NotConnected) => return Err(WatchError::NotConnected),
                Err(e) => tracing::warn!(?service, error = %e, "skipping reading"),
            }
        }

        tracing::info!(count = readings.len(), "watch sync read");
        Ok(readings)
    }

    pub async fn disconnect(&mut self) -> WatchResult<()> {
        if let Err(e) = self.stop_heart_rate_monitoring().await {
            tracing::debug!(error = %e, "unsubscribe during disconnect failed");
        }
        let was_connected = self.connected;
        self.reset();
        if was_connected {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    /// Re-establish the link and rediscover services.
    pub async fn reconnect(&mut self) -> WatchResult<()> {
        self.links = self.peripheral.link_events();
        self.peripheral.connect().await?;
        self.connected = true;
        self.monitoring = false;
        self.discover().await;
        tracing::info!(services = self.services.len(), "watch reconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingValue;
    use crate::watch::fake::FakeWatch;
    use cureon_gatt::{
        BATTERY_LEVEL, BLOOD_PRESSURE_MEASUREMENT, HEART_RATE_MEASUREMENT,
        TEMPERATURE_MEASUREMENT,
    };

    fn full_watch() -> FakeWatch {
        FakeWatch::new("Galaxy Watch5", &HealthService::ALL)
            .with_value(HEART_RATE_MEASUREMENT, &[0x00, 72])
            // mmHg, 120/80, MAP 93
            .with_value(BLOOD_PRESSURE_MEASUREMENT, &[0x00, 120, 0, 80, 0, 93, 0])
            // 37.0 C as FLOAT 370 * 10^-1
            .with_value(TEMPERATURE_MEASUREMENT, &[0x00, 0x72, 0x01, 0x00, 0xFF])
            .with_value(BATTERY_LEVEL, &[85])
    }

    #[tokio::test]
    async fn test_connect_infers_source() {
        let watch = Arc::new(full_watch());
        let session = SmartwatchSession::connect(watch).await.unwrap();
        assert_eq!(session.source().device_type, DeviceType::SamsungGalaxyWatch);
        assert_eq!(session.source().device_model.as_deref(), Some("Galaxy Watch5"));
        assert!(session.has_service(HealthService::BloodPressure));
    }

    #[tokio::test]
    async fn test_sync_all_full_watch() {
        let watch = Arc::new(full_watch());
        let mut session = SmartwatchSession::connect(watch).await.unwrap();

        let readings = session.sync_all().await.unwrap();
        let types: Vec<_> = readings.iter().map(|r| r.reading_type).collect();
        assert_eq!(
            types,
            vec![
                ReadingType::HeartRate,
                ReadingType::BloodPressure,
                ReadingType::Temperature
            ]
        );
        assert_eq!(readings[2].value, ReadingValue::Single { single: 98.6 });
        assert_eq!(session.read_battery_level().await.unwrap(), Some(85));
    }

    #[tokio::test]
    async fn test_sync_all_heart_rate_and_battery_only() {
        let watch = FakeWatch::new("boAt Storm", &[HealthService::HeartRate, HealthService::Battery])
            .with_value(HEART_RATE_MEASUREMENT, &[0x00, 64])
            .with_value(BATTERY_LEVEL, &[40]);
        let mut session = SmartwatchSession::connect(Arc::new(watch)).await.unwrap();

        let readings = session.sync_all().await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].reading_type, ReadingType::HeartRate);
        assert_eq!(readings[0].value, ReadingValue::Single { single: 64.0 });
        assert_eq!(readings[0].source.device_type, DeviceType::Other);

        assert!(matches!(
            session.read_blood_pressure().await,
            Err(WatchError::ServiceUnavailable(HealthService::BloodPressure))
        ));
    }

    #[tokio::test]
    async fn test_sync_all_skips_failed_reads() {
        let watch = full_watch();
        watch.fail_reads.lock().unwrap().push(BLOOD_PRESSURE_MEASUREMENT);
        watch
            .values
            .lock()
            .unwrap()
            .insert(TEMPERATURE_MEASUREMENT, vec![0x00, 0x01]);
        let mut session = SmartwatchSession::connect(Arc::new(watch)).await.unwrap();

        let readings = session.sync_all().await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].reading_type, ReadingType::HeartRate);
    }

    #[tokio::test]
    async fn test_battery_missing_is_none() {
        let watch = FakeWatch::new("Mi Band", &[HealthService::HeartRate]);
        let mut session = SmartwatchSession::connect(Arc::new(watch)).await.unwrap();
        assert_eq!(session.read_battery_level().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_heart_rate_monitoring() {
        let watch = Arc::new(full_watch());
        let mut session = SmartwatchSession::connect(watch.clone()).await.unwrap();

        let mut monitor = session.start_heart_rate_monitoring().await.unwrap();
        assert!(watch.push(&[0x01, 0x2C, 0x01]).await);
        let reading = monitor.next().await.unwrap().unwrap();
        assert_eq!(reading.value, ReadingValue::Single { single: 300.0 });

        // Truncated notification surfaces as an error, stream continues
        assert!(watch.push(&[0x01, 0x2C]).await);
        assert!(matches!(monitor.next().await, Some(Err(WatchError::Parse(_)))));

        session.stop_heart_rate_monitoring().await.unwrap();
        session.stop_heart_rate_monitoring().await.unwrap();
        assert!(!watch.is_subscribed());
        assert!(monitor.next().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_resets_until_reconnect() {
        let watch = Arc::new(full_watch());
        let mut session = SmartwatchSession::connect(watch.clone()).await.unwrap();
        let mut monitor = session.start_heart_rate_monitoring().await.unwrap();

        watch.drop_link();
        assert!(monitor.next().await.is_none());
        assert!(matches!(session.read_heart_rate().await, Err(WatchError::NotConnected)));
        assert!(matches!(session.sync_all().await, Err(WatchError::NotConnected)));
        assert!(!session.is_connected());
        assert!(!session.has_service(HealthService::HeartRate));
        session.stop_heart_rate_monitoring().await.unwrap();

        session.reconnect().await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.sync_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_disconnect() {
        let watch = Arc::new(full_watch());
        let mut session = SmartwatchSession::connect(watch.clone()).await.unwrap();
        session.start_heart_rate_monitoring().await.unwrap();

        session.disconnect().await.unwrap();
        assert!(!watch.is_subscribed());
        assert!(!*watch.connected.lock().unwrap());
        assert!(matches!(session.read_temperature().await, Err(WatchError::NotConnected)));
        session.disconnect().await.unwrap();
    }
}
