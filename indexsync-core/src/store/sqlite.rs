//! Embedded document store: one JSON document per row

use super::DocumentStore;
use crate::document::{FieldPatch, TypeCollection};
use crate::error::SyncError;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> crate::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store that lives only as long as this value
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> crate::Result<()> {
        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version == SCHEMA_VERSION {
            return Ok(());
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_id ON documents(id);
            ",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl DocumentStore for SqliteStore {
    fn create(&self, kind: TypeCollection, id: &str, body: &Value) -> crate::Result<()> {
        let body = serde_json::to_string(body)?;
        let inserted = self.lock().execute(
            "INSERT INTO documents (kind, id, body) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), id, body],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(SyncError::DuplicateDocument {
                kind: kind.as_str(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, kind: TypeCollection, id: &str) -> crate::Result<bool> {
        let found: bool = self.lock().query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE kind = ?1 AND id = ?2)",
            params![kind.as_str(), id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn patch(&self, kind: TypeCollection, id: &str, patch: &FieldPatch) -> crate::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM documents WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Err(SyncError::DocumentNotFound {
                kind: kind.as_str(),
                id: id.to_string(),
            });
        };

        let mut doc: Value = serde_json::from_str(&body)?;
        patch.apply_to(&mut doc);
        tx.execute(
            "UPDATE documents SET body = ?3 WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id, serde_json::to_string(&doc)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, kind: TypeCollection, id: &str) -> crate::Result<bool> {
        let removed = self.lock().execute(
            "DELETE FROM documents WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
        )?;
        Ok(removed > 0)
    }

    fn remove_by_prefix(&self, prefix: &str) -> crate::Result<u64> {
        // substr comparison rather than LIKE so '%' and '_' in paths stay literal
        let under = if prefix == "/" {
            "/".to_string()
        } else {
            format!("{}/", prefix)
        };
        let removed = self.lock().execute(
            "DELETE FROM documents
             WHERE id = ?1 OR substr(id, 1, length(?2)) = ?2",
            params![prefix, under],
        )?;
        Ok(removed as u64)
    }

    fn get(&self, kind: TypeCollection, id: &str) -> crate::Result<Option<Value>> {
        let body: Option<String> = self
            .lock()
            .query_row(
                "SELECT body FROM documents WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(SyncError::from)
    }

    fn count(&self, kind: TypeCollection) -> crate::Result<u64> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM documents WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
