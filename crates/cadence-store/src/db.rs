use rusqlite::Connection;

use crate::error::Result;

/// Initialise the document schema in `conn`.
///
/// One row per document; collection-level reads scan by the primary key prefix.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT    NOT NULL,
            id          TEXT    NOT NULL,
            body        TEXT    NOT NULL,   -- JSON document
            updated_at  TEXT    NOT NULL,
            PRIMARY KEY (collection, id)
        ) STRICT;
        ",
    )?;
    Ok(())
}
