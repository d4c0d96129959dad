//! Persisted login session.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Session;

impl Database {
    /// Store the session, replacing any previous one.
    pub fn save_session(&self, session: &Session) -> DbResult<()> {
        let user_json = serde_json::to_string(&session.user)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO session (id, token, user_json, created_at)
            VALUES (1, ?1, ?2, datetime('now'))
            "#,
            params![session.token, user_json],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> DbResult<Option<Session>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT token, user_json FROM session WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(token, user_json)| {
            Ok(Session {
                token,
                user: serde_json::from_str(&user_json)?,
            })
        })
        .transpose()
    }

    /// Drop the stored session. Returns whether one existed.
    pub fn clear_session(&self) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM session", [])?;
        Ok(rows_affected > 0)
    }
}
