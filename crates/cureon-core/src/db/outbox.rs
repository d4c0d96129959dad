//! Health reading outbox: readings queued locally until a bulk upload succeeds.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{Database, DbError, DbResult};
use crate::models::HealthReading;

/// A queued reading with its local outbox id.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedReading {
    pub id: String,
    pub reading: HealthReading,
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed width so the column sorts chronologically
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Database {
    /// Queue readings for upload in one transaction. Returns their outbox ids.
    pub fn enqueue_readings(&mut self, readings: &[HealthReading]) -> DbResult<Vec<String>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(readings.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO reading_outbox (id, reading_type, payload, recorded_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for reading in readings {
                let id = Uuid::new_v4().to_string();
                let payload = serde_json::to_string(reading)?;
                stmt.execute(params![
                    id,
                    reading.reading_type.as_str(),
                    payload,
                    timestamp(reading.timestamp),
                ])?;
                ids.push(id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Oldest queued readings first, at most `limit`.
    pub fn pending_readings(&self, limit: usize) -> DbResult<Vec<QueuedReading>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, payload FROM reading_outbox
            WHERE uploaded_at IS NULL
            ORDER BY recorded_at ASC, created_at ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut queued = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            let reading = serde_json::from_str(&payload)
                .map_err(|e| DbError::Corrupt(format!("Corrupt outbox entry {}: {}", id, e)))?;
            queued.push(QueuedReading { id, reading });
        }
        Ok(queued)
    }

    pub fn pending_reading_count(&self) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reading_outbox WHERE uploaded_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Mark a batch uploaded. Returns how many rows changed.
    pub fn mark_readings_uploaded(&mut self, ids: &[String], at: DateTime<Utc>) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE reading_outbox SET uploaded_at = ?2 WHERE id = ?1 AND uploaded_at IS NULL",
            )?;
            let at = timestamp(at);
            for id in ids {
                changed += stmt.execute(params![id, at])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Delete uploaded readings recorded before `before`.
    pub fn prune_uploaded_readings(&self, before: DateTime<Utc>) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "DELETE FROM reading_outbox WHERE uploaded_at IS NOT NULL AND recorded_at < ?",
            [timestamp(before)],
        )?;
        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceSource, DeviceType, ReadingType};
    use chrono::Duration;

    fn reading(bpm: f64, at: DateTime<Utc>) -> HealthReading {
        HealthReading::single(
            ReadingType::HeartRate,
            bpm,
            DeviceSource::new(DeviceType::Fitbit, "Charge 5", "dev-1"),
            at,
        )
        .unwrap()
    }

    #[test]
    fn test_enqueue_and_list_in_order() {
        let mut db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.enqueue_readings(&[reading(80.0, now), reading(70.0, now - Duration::minutes(5))])
            .unwrap();

        let pending = db.pending_readings(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].reading.value, crate::models::ReadingValue::Single { single: 70.0 });
        assert_eq!(db.pending_readings(1).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_uploaded() {
        let mut db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let ids = db
            .enqueue_readings(&[reading(80.0, now), reading(81.0, now)])
            .unwrap();

        assert_eq!(db.mark_readings_uploaded(&ids[..1], now).unwrap(), 1);
        // Already uploaded rows are left alone
        assert_eq!(db.mark_readings_uploaded(&ids[..1], now).unwrap(), 0);
        assert_eq!(db.pending_reading_count().unwrap(), 1);
        assert_eq!(db.pending_readings(10).unwrap()[0].id, ids[1]);
    }

    #[test]
    fn test_prune_keeps_queued() {
        let mut db = Database::open_in_memory().unwrap();
        let old = Utc::now() - Duration::days(40);
        let ids = db.enqueue_readings(&[reading(80.0, old), reading(90.0, old)]).unwrap();
        db.mark_readings_uploaded(&ids[..1], Utc::now()).unwrap();

        assert_eq!(db.prune_uploaded_readings(Utc::now() - Duration::days(30)).unwrap(), 1);
        assert_eq!(db.pending_reading_count().unwrap(), 1);
    }
}
