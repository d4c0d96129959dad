use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use super::{GattPeripheral, SmartwatchSession, WatchError, WatchResult};
use crate::api::HealthApi;
use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::db::Database;
use crate::models::{HealthAlert, HealthReading};

/// Outcome of one outbox flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub uploaded: usize,
    pub batches: usize,
    pub alerts: Vec<HealthAlert>,
}

/// Pushes queued readings to the backend in batches.
pub struct ReadingUploader<H> {
    api: Arc<H>,
    db: Arc<Mutex<Database>>,
    batch_size: usize,
}

impl<H: HealthApi> ReadingUploader<H> {
    pub fn new(api: Arc<H>, db: Arc<Mutex<Database>>, config: &SyncConfig) -> Self {
        Self {
            api,
            db,
            batch_size: config.batch_size.max(1),
        }
    }

    fn db(&self) -> WatchResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| WatchError::StoreLock)
    }

    /// Queue readings for the next flush.
    pub fn record(&self, readings: &[HealthReading]) -> WatchResult<Vec<String>> {
        let ids = self.db()?.enqueue_readings(readings)?;
        tracing::debug!(queued = ids.len(), "readings queued");
        Ok(ids)
    }

    pub fn pending(&self) -> WatchResult<usize> {
        Ok(self.db()?.pending_reading_count()?)
    }

    /// Upload everything queued, oldest first. A failed batch stays queued
    /// and ends the flush.
    pub async fn flush(&self) -> WatchResult<FlushReport> {
        let mut report = FlushReport::default();
        loop {
            let batch = self.db()?.pending_readings(self.batch_size)?;
            if batch.is_empty() {
                break;
            }

            let readings: Vec<HealthReading> = batch.iter().map(|q| q.reading.clone()).collect();
            let response = match self.api.post_readings_bulk(&readings).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        batch = readings.len(),
                        uploaded = report.uploaded,
                        error = %e,
                        "reading upload failed, batch left queued"
                    );
                    return Err(e.into());
                }
            };

            let ids: Vec<String> = batch.into_iter().map(|q| q.id).collect();
            let now = Utc::now();
            {
                let mut db = self.db()?;
                db.mark_readings_uploaded(&ids, now)?;
                db.set_last_health_sync(now)?;
            }

            for alert in response.critical_alerts() {
                tracing::warn!(kind = alert.reading_type.as_str(), message = %alert.message, "critical reading");
            }
            report.uploaded += ids.len();
            report.batches += 1;
            report.alerts.extend(response.alerts);

            if ids.len() < self.batch_size {
                break;
            }
        }

        if report.uploaded > 0 {
            tracing::info!(uploaded = report.uploaded, batches = report.batches, "readings synced");
        }
        Ok(report)
    }

    /// One sync pass: read the watch if it is connected, then flush.
    pub async fn sync_once<P: GattPeripheral>(
        &self,
        session: &mut SmartwatchSession<P>,
    ) -> WatchResult<FlushReport> {
        if session.is_connected() {
            match session.sync_all().await {
                Ok(readings) => {
                    self.record(&readings)?;
                }
                Err(e) => tracing::warn!(error = %e, "watch read failed"),
            }
        }
        self.flush().await
    }

    /// Sync on every `interval` tick until cancelled. Tick failures are
    /// logged and retried on the next tick.
    pub async fn run_periodic_sync<P: GattPeripheral>(
        &self,
        session: &mut SmartwatchSession<P>,
        interval: Duration,
        cancel: &CancelToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once(session).await {
                        tracing::warn!(error = %e, "periodic sync failed");
                    }
                }
            }
        }
        tracing::debug!("periodic sync stopped");
    }
}
