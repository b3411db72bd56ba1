use crate::domain::error::DomainError;
use rusqlite::{params, Connection, OptionalExtension};

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS writers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            notable_works TEXT NOT NULL DEFAULT '[]',
            description TEXT NOT NULL,
            embedding BLOB,
            embedding_marker TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_writers_full_name ON writers(full_name);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

/// Record the vector dimension on first open; refuse a database built for another one.
pub fn ensure_dimension(conn: &Connection, dimension: usize) -> Result<(), DomainError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'dimension'",
            [],
            |r| r.get(0),
        )
        .optional()?;

    match stored {
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('dimension', ?1)",
                params![dimension.to_string()],
            )?;
            Ok(())
        }
        Some(value) => {
            let stored_dim: usize = value
                .parse()
                .map_err(|_| DomainError::Database(format!("Corrupt stored dimension: {value}")))?;
            if stored_dim != dimension {
                return Err(DomainError::Validation(format!(
                    "Database holds {stored_dim}-dimensional vectors but {dimension} is configured"
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_dimension_is_pinned() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        ensure_dimension(&conn, 384).unwrap();
        ensure_dimension(&conn, 384).unwrap();
        assert!(matches!(
            ensure_dimension(&conn, 512),
            Err(DomainError::Validation(_))
        ));
    }
}
