//! SQLite schema definition.

/// Local client state: session, sync bookkeeping and the reading outbox.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Session (single row)
-- ============================================================================

CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    token TEXT NOT NULL,
    user_json TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Health Reading Outbox (append-only until uploaded)
-- ============================================================================

CREATE TABLE IF NOT EXISTS reading_outbox (
    id TEXT PRIMARY KEY,                         -- UUID v4
    reading_type TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- JSON HealthReading
    recorded_at TEXT NOT NULL,                   -- reading timestamp (RFC 3339)
    uploaded_at TEXT,                            -- NULL while queued
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_outbox_pending ON reading_outbox(uploaded_at, recorded_at);

-- ============================================================================
-- Sync State
-- ============================================================================

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO sync_state (key, value) VALUES ('last_health_sync', '');
"#;
