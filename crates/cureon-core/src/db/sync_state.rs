//! Key/value sync bookkeeping.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};

/// Timestamp of the last successful health upload.
pub const LAST_HEALTH_SYNC: &str = "last_health_sync";

impl Database {
    /// Get sync state value.
    pub fn get_sync_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM sync_state WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Set sync state value.
    pub fn set_sync_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Last successful health upload, `None` if never synced.
    pub fn last_health_sync(&self) -> DbResult<Option<DateTime<Utc>>> {
        match self.get_sync_state(LAST_HEALTH_SYNC)? {
            Some(value) if !value.is_empty() => DateTime::parse_from_rfc3339(&value)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| DbError::Corrupt(format!("Bad {} value {}: {}", LAST_HEALTH_SYNC, value, e))),
            _ => Ok(None),
        }
    }

    pub fn set_last_health_sync(&self, at: DateTime<Utc>) -> DbResult<()> {
        self.set_sync_state(LAST_HEALTH_SYNC, &at.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state() {
        let db = Database::open_in_memory().unwrap();

        // Seeded by the schema
        assert_eq!(db.get_sync_state(LAST_HEALTH_SYNC).unwrap(), Some(String::new()));
        assert_eq!(db.get_sync_state("missing").unwrap(), None);

        db.set_sync_state("custom", "v1").unwrap();
        assert_eq!(db.get_sync_state("custom").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn test_last_health_sync() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.last_health_sync().unwrap(), None);

        let at = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        db.set_last_health_sync(at).unwrap();
        assert_eq!(db.last_health_sync().unwrap(), Some(at));

        db.set_sync_state(LAST_HEALTH_SYNC, "yesterday").unwrap();
        assert!(db.last_health_sync().is_err());
    }
}
