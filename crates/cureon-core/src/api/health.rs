use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiResult};
use crate::models::{
    BulkSyncResponse, HealthReading, ReadingAlert, ReadingQuery, ReadingStats, ReadingType,
    RecordedReading,
};

#[async_trait]
pub trait HealthApi: Send + Sync {
    /// Upload one reading; the backend may answer with an alert.
    async fn post_reading(&self, reading: &HealthReading) -> ApiResult<Option<ReadingAlert>>;

    async fn post_readings_bulk(&self, readings: &[HealthReading]) -> ApiResult<BulkSyncResponse>;

    /// Reading history, newest first.
    async fn readings(&self, query: &ReadingQuery) -> ApiResult<Vec<RecordedReading>>;

    async fn reading_stats(
        &self,
        reading_type: Option<ReadingType>,
        days: u32,
    ) -> ApiResult<ReadingStats>;
}

#[derive(Deserialize)]
struct ReadingReceipt {
    #[serde(default)]
    alert: Option<ReadingAlert>,
}

#[derive(Serialize)]
struct BulkBody<'a> {
    readings: &'a [HealthReading],
}

#[derive(Deserialize)]
struct ReadingList {
    #[serde(default)]
    readings: Vec<RecordedReading>,
}

#[derive(Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    stats: ReadingStats,
}

#[derive(Serialize)]
struct StatsQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    reading_type: Option<ReadingType>,
    days: u32,
}

#[async_trait]
impl HealthApi for ApiClient {
    async fn post_reading(&self, reading: &HealthReading) -> ApiResult<Option<ReadingAlert>> {
        let receipt: ReadingReceipt = self
            .send(
                self.request(Method::POST, "health/reading").json(reading),
                "record reading",
            )
            .await?;
        if let Some(alert) = &receipt.alert {
            tracing::warn!(kind = ?alert.kind, severity = ?alert.severity, "reading raised an alert");
        }
        Ok(receipt.alert)
    }

    async fn post_readings_bulk(&self, readings: &[HealthReading]) -> ApiResult<BulkSyncResponse> {
        let resp: BulkSyncResponse = self
            .send(
                self.request(Method::POST, "health/readings/bulk")
                    .json(&BulkBody { readings }),
                "sync readings",
            )
            .await?;
        if !resp.alerts.is_empty() {
            tracing::warn!(alerts = resp.alerts.len(), "backend raised health alerts");
        }
        Ok(resp)
    }

    async fn readings(&self, query: &ReadingQuery) -> ApiResult<Vec<RecordedReading>> {
        let list: ReadingList = self
            .send(
                self.request(Method::GET, "health/readings").query(query),
                "load readings",
            )
            .await?;
        Ok(list.readings)
    }

    async fn reading_stats(
        &self,
        reading_type: Option<ReadingType>,
        days: u32,
    ) -> ApiResult<ReadingStats> {
        let env: StatsEnvelope = self
            .send(
                self.request(Method::GET, "health/readings/stats")
                    .query(&StatsQuery { reading_type, days }),
                "load reading stats",
            )
            .await?;
        Ok(env.stats)
    }
}
