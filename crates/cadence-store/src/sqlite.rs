use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use crate::db::init_db;
use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::tree::{get_in, merge_in, remove_in, set_in, split_path};

/// Document store persisted to SQLite, one row per `collection/id` document.
///
/// Paths deeper than two segments address fields inside a document; the
/// document is read, edited as JSON and written back under the same lock.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let segs = split_path(path)?;
        let conn = self.conn()?;
        match segs.as_slice() {
            [collection] => {
                let children = load_collection(&conn, collection)?;
                if children.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::Object(children)))
                }
            }
            [collection, id, rest @ ..] => {
                let Some(doc) = load_doc(&conn, collection, id)? else {
                    return Ok(None);
                };
                Ok(get_in(&doc, rest).filter(|v| !v.is_null()).cloned())
            }
            [] => Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let segs = split_path(path)?;
        let mut conn = self.conn()?;
        if value.is_null() {
            return remove_at(&conn, &segs);
        }
        match segs.as_slice() {
            [collection] => {
                let Value::Object(children) = value else {
                    return Err(StoreError::NotAnObject {
                        path: path.to_string(),
                    });
                };
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM documents WHERE collection = ?1", [collection])?;
                for (id, doc) in children {
                    save_doc(&tx, collection, &id, &doc)?;
                }
                tx.commit()?;
                Ok(())
            }
            [collection, id, rest @ ..] => {
                let mut doc = if rest.is_empty() {
                    Value::Null
                } else {
                    load_doc(&conn, collection, id)?.unwrap_or_else(|| Value::Object(Map::new()))
                };
                set_in(&mut doc, rest, value);
                save_doc(&conn, collection, id, &doc)
            }
            [] => Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    async fn update(&self, path: &str, partial: Value) -> Result<()> {
        let segs = split_path(path)?;
        let mut conn = self.conn()?;
        match segs.as_slice() {
            [collection] => {
                let Value::Object(entries) = partial else {
                    return Err(StoreError::NotAnObject {
                        path: path.to_string(),
                    });
                };
                let tx = conn.transaction()?;
                for (key, value) in entries {
                    let mut target = vec![*collection];
                    target.extend(split_path(&key)?);
                    if value.is_null() {
                        remove_at(&tx, &target)?;
                    } else {
                        set_at(&tx, &target, value)?;
                    }
                }
                tx.commit()?;
                Ok(())
            }
            [collection, id, rest @ ..] => {
                let mut doc =
                    load_doc(&conn, collection, id)?.unwrap_or_else(|| Value::Object(Map::new()));
                merge_in(&mut doc, rest, partial, path)?;
                save_doc(&conn, collection, id, &doc)
            }
            [] => Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let segs = split_path(path)?;
        let conn = self.conn()?;
        remove_at(&conn, &segs)
    }
}

fn load_collection(conn: &Connection, collection: &str) -> Result<Map<String, Value>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut children = Map::new();
    for (id, body) in rows {
        children.insert(id, serde_json::from_str(&body)?);
    }
    Ok(children)
}

fn load_doc(conn: &Connection, collection: &str, id: &str) -> Result<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
}

fn save_doc(conn: &Connection, collection: &str, id: &str, doc: &Value) -> Result<()> {
    let body = serde_json::to_string(doc)?;
    conn.execute(
        "INSERT INTO documents (collection, id, body, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (collection, id) DO UPDATE SET body = ?3, updated_at = ?4",
        rusqlite::params![collection, id, body, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Write below collection level (`collection/id/...`).
fn set_at(conn: &Connection, segs: &[&str], value: Value) -> Result<()> {
    let [collection, id, rest @ ..] = segs else {
        return Err(StoreError::InvalidPath(segs.join("/")));
    };
    let mut doc = if rest.is_empty() {
        Value::Null
    } else {
        load_doc(conn, collection, id)?.unwrap_or_else(|| Value::Object(Map::new()))
    };
    set_in(&mut doc, rest, value);
    save_doc(conn, collection, id, &doc)
}

fn remove_at(conn: &Connection, segs: &[&str]) -> Result<()> {
    match segs {
        [collection] => {
            let n = conn.execute("DELETE FROM documents WHERE collection = ?1", [collection])?;
            debug!(collection, removed = n, "collection cleared");
        }
        [collection, id] => {
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
            )?;
        }
        [collection, id, rest @ ..] => {
            if let Some(mut doc) = load_doc(conn, collection, id)? {
                remove_in(&mut doc, rest);
                save_doc(conn, collection, id, &doc)?;
            }
        }
        [] => return Err(StoreError::InvalidPath(String::new())),
    }
    Ok(())
}
