use super::{check_sequence, FormStore, TranscriptStore};
use crate::error::StoreError;
use crate::form::FormRecord;
use crate::transcript::{Message, Role};
use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    subject  TEXT    NOT NULL,
    sequence INTEGER NOT NULL,
    role     TEXT    NOT NULL,
    content  TEXT    NOT NULL,
    PRIMARY KEY (subject, sequence)
);
CREATE TABLE IF NOT EXISTS forms (
    subject              TEXT PRIMARY KEY,
    record_json          TEXT,
    onboarding_completed INTEGER NOT NULL DEFAULT 0
);
";

/// SQLite-backed store, one database file for all subjects
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{:?}: {}", parent, e)))?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `~/.local/share/renta/renta.db` (or the platform equivalent)
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("renta").join("renta.db"))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

impl TranscriptStore for SqliteStore {
    fn append(&self, subject: &str, message: &Message) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let last: Option<i64> = tx.query_row(
            "SELECT MAX(sequence) FROM messages WHERE subject = ?1",
            params![subject],
            |row| row.get(0),
        )?;
        check_sequence(last.map(|s| s as u64), message)?;

        tx.execute(
            "INSERT INTO messages (subject, sequence, role, content) VALUES (?1, ?2, ?3, ?4)",
            params![
                subject,
                message.sequence as i64,
                message.role.as_str(),
                message.content
            ],
        )?;
        tx.commit()?;
        Ok(message.sequence)
    }

    fn load(&self, subject: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT sequence, role, content FROM messages WHERE subject = ?1 ORDER BY sequence",
        )?;
        let rows = stmt.query_map(params![subject], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (sequence, role, content) = row?;
            let role = Role::from_str(&role)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown role {:?}", role)))?;
            messages.push(Message {
                role,
                content,
                sequence: sequence as u64,
            });
        }
        Ok(messages)
    }
}

impl FormStore for SqliteStore {
    fn load_form(&self, subject: &str) -> Result<Option<FormRecord>, StoreError> {
        let conn = self.conn()?;
        let json: Option<Option<String>> = conn
            .query_row(
                "SELECT record_json FROM forms WHERE subject = ?1",
                params![subject],
                |row| row.get(0),
            )
            .optional()?;

        match json.flatten() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_form(&self, subject: &str, record: &FormRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        self.conn()?.execute(
            "INSERT INTO forms (subject, record_json) VALUES (?1, ?2)
             ON CONFLICT(subject) DO UPDATE SET record_json = excluded.record_json",
            params![subject, json],
        )?;
        Ok(())
    }

    fn onboarding_completed(&self, subject: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT onboarding_completed FROM forms WHERE subject = ?1",
                params![subject],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(0) != 0)
    }

    fn set_onboarding_completed(&self, subject: &str, completed: bool) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO forms (subject, onboarding_completed) VALUES (?1, ?2)
             ON CONFLICT(subject) DO UPDATE SET onboarding_completed = excluded.onboarding_completed",
            params![subject, completed as i64],
        )?;
        Ok(())
    }
}
