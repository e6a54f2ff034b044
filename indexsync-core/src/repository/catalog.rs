//! Read-only repository backend over a SQLite copy of the repository catalog

use super::{Entry, RawAcl, RepositoryReader, SessionFactory};
use crate::config::RepositoryConfig;
use crate::document::MetadataTriple;
use crate::error::SyncError;
use crate::path::canonicalize;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

/// Catalog layout the backend reads. Kept in step with the repository's
/// catalog export; indexsync never writes to it.
pub const CATALOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS collections (
        path TEXT PRIMARY KEY,
        parent_path TEXT,
        owner_name TEXT NOT NULL,
        create_ts TEXT NOT NULL,
        modify_ts TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_collections_parent ON collections(parent_path);

    CREATE TABLE IF NOT EXISTS data_objects (
        path TEXT PRIMARY KEY,
        coll_path TEXT NOT NULL,
        owner_name TEXT NOT NULL,
        data_size INTEGER NOT NULL DEFAULT 0,
        data_type TEXT NOT NULL DEFAULT '',
        create_ts TEXT NOT NULL,
        modify_ts TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_data_objects_coll ON data_objects(coll_path);

    CREATE TABLE IF NOT EXISTS access (
        path TEXT NOT NULL,
        user_name TEXT NOT NULL,
        user_zone TEXT,
        access_name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_access_path ON access(path);

    CREATE TABLE IF NOT EXISTS metadata (
        path TEXT NOT NULL,
        attribute TEXT NOT NULL,
        value TEXT NOT NULL,
        unit TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX IF NOT EXISTS idx_metadata_path ON metadata(path);
";

/// Create (or open) a writable catalog with the expected schema.
///
/// Used by tooling and tests that seed a catalog; sessions never call it.
pub fn init_catalog(path: &Path) -> crate::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(CATALOG_SCHEMA)?;
    Ok(conn)
}

/// Opens one read-only catalog connection per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogRepository;

impl SessionFactory for CatalogRepository {
    type Session = CatalogSession;

    fn open(&self, config: &RepositoryConfig) -> crate::Result<CatalogSession> {
        let open_err = |e: rusqlite::Error| {
            SyncError::SessionOpen(format!("{}: {}", config.catalog_path.display(), e))
        };
        let conn = Connection::open_with_flags(
            &config.catalog_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(open_err)?;
        conn.busy_timeout(config.busy_timeout())
            .map_err(open_err)?;

        tracing::trace!(catalog = %config.catalog_path.display(), "repository session opened");
        Ok(CatalogSession {
            conn,
            zone: config.zone.clone(),
        })
    }
}

/// A single catalog connection. Closed when dropped.
pub struct CatalogSession {
    conn: Connection,
    zone: String,
}

impl CatalogSession {
    fn timestamp(&self, path: &str, column: &str) -> crate::Result<String> {
        let path = canonicalize(path);
        let sql = format!(
            "SELECT {column} FROM collections WHERE path = ?1
             UNION ALL
             SELECT {column} FROM data_objects WHERE path = ?1
             LIMIT 1"
        );
        self.conn
            .query_row(&sql, params![path], |row| row.get::<_, String>(0))
            .optional()?
            .ok_or_else(|| SyncError::EntityNotFound(path.clone()))
    }
}

fn collection_from_row(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    Ok(Entry::collection(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
    ))
}

fn data_object_from_row(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    let size: i64 = row.get(2)?;
    Ok(Entry::data_object(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        size.max(0) as u64,
        row.get::<_, String>(3)?,
    ))
}

impl RepositoryReader for CatalogSession {
    fn exists(&self, path: &str) -> crate::Result<bool> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE path = ?1)
                 OR EXISTS(SELECT 1 FROM data_objects WHERE path = ?1)",
            params![canonicalize(path)],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn stat(&self, path: &str) -> crate::Result<Entry> {
        let path = canonicalize(path);
        let collection = self
            .conn
            .query_row(
                "SELECT path, owner_name FROM collections WHERE path = ?",
                params![path],
                collection_from_row,
            )
            .optional()?;
        if let Some(entry) = collection {
            return Ok(entry);
        }

        self.conn
            .query_row(
                "SELECT path, owner_name, data_size, data_type FROM data_objects WHERE path = ?",
                params![path],
                data_object_from_row,
            )
            .optional()?
            .ok_or_else(|| SyncError::EntityNotFound(path.clone()))
    }

    fn acl_of(&self, path: &str) -> crate::Result<Vec<RawAcl>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_name, user_zone, access_name FROM access WHERE path = ?")?;
        let acl = stmt
            .query_map(params![canonicalize(path)], |row| {
                let zone: Option<String> = row.get(1)?;
                Ok(RawAcl {
                    user: row.get(0)?,
                    zone: zone
                        .filter(|z| !z.is_empty())
                        .unwrap_or_else(|| self.zone.clone()),
                    access: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(acl)
    }

    fn created_date(&self, path: &str) -> crate::Result<String> {
        self.timestamp(path, "create_ts")
    }

    fn modified_date(&self, path: &str) -> crate::Result<String> {
        self.timestamp(path, "modify_ts")
    }

    fn metadata_of(&self, path: &str) -> crate::Result<Vec<MetadataTriple>> {
        let mut stmt = self
            .conn
            .prepare("SELECT attribute, value, unit FROM metadata WHERE path = ?")?;
        let triples = stmt
            .query_map(params![canonicalize(path)], |row| {
                Ok(MetadataTriple {
                    attribute: row.get(0)?,
                    value: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(triples)
    }

    fn child_collections(&self, path: &str) -> crate::Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, owner_name FROM collections WHERE parent_path = ? ORDER BY path",
        )?;
        let entries = stmt
            .query_map(params![canonicalize(path)], collection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn child_data_objects(&self, path: &str) -> crate::Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, owner_name, data_size, data_type FROM data_objects
             WHERE coll_path = ? ORDER BY path",
        )?;
        let entries = stmt
            .query_map(params![canonicalize(path)], data_object_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
