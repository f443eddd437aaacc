use rusqlite::{Connection, Result};

/// Initialize complete database schema for the flock book
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Schema version table for future migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Check if schema already exists
    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create the complete schema (version 1)
fn create_schema(conn: &Connection) -> Result<()> {
    // Table: flocks
    conn.execute(
        "CREATE TABLE IF NOT EXISTS flocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            number_of_ducks INTEGER NOT NULL CHECK(number_of_ducks > 0),
            description TEXT NOT NULL DEFAULT '',
            started_date TEXT NOT NULL,
            culled_date TEXT,
            is_culled INTEGER NOT NULL DEFAULT 0 CHECK(is_culled IN (0,1)),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Indexes for flocks
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flocks_title ON flocks(title)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flocks_started_date ON flocks(started_date)",
        [],
    )?;

    // Trigger for updated_at in flocks
    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_flocks_timestamp
         AFTER UPDATE ON flocks
         BEGIN
            UPDATE flocks SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    // Table: stats (daily production entries per flock).
    // The unique indexes on (flock_id, date) and (flock_id, day) are the
    // storage-level backstop for the uniqueness checks the validators run;
    // a losing racer gets a constraint error instead of a silent duplicate.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            flock_id INTEGER NOT NULL,
            day INTEGER NOT NULL CHECK(day > 0),
            date TEXT NOT NULL,
            harvested INTEGER NOT NULL DEFAULT 0 CHECK(harvested >= 0),
            percentage REAL NOT NULL DEFAULT 0 CHECK(percentage >= 0 AND percentage <= 100),
            mortality INTEGER NOT NULL DEFAULT 0 CHECK(mortality >= 0),
            feed_consumed REAL NOT NULL DEFAULT 0 CHECK(feed_consumed >= 0),
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (flock_id) REFERENCES flocks(id) ON DELETE CASCADE,
            UNIQUE(flock_id, date),
            UNIQUE(flock_id, day)
        )",
        [],
    )?;

    // Indexes for stats
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stats_flock_id ON stats(flock_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_stats_date ON stats(flock_id, date DESC)",
        [],
    )?;

    // Trigger for updated_at in stats
    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_stats_timestamp
         AFTER UPDATE ON stats
         BEGIN
            UPDATE stats SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_unique_index_on_flock_and_date() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO flocks (title, number_of_ducks, started_date) VALUES ('F', 10, '2024-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO stats (flock_id, day, date) VALUES (1, 1, '2024-01-01')",
            [],
        )
        .unwrap();

        let dup_date = conn.execute(
            "INSERT INTO stats (flock_id, day, date) VALUES (1, 2, '2024-01-01')",
            [],
        );
        assert!(dup_date.is_err());

        let dup_day = conn.execute(
            "INSERT INTO stats (flock_id, day, date) VALUES (1, 1, '2024-01-02')",
            [],
        );
        assert!(dup_day.is_err());
    }

    #[test]
    fn test_cascade_delete_removes_stats() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO flocks (title, number_of_ducks, started_date) VALUES ('F', 10, '2024-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO stats (flock_id, day, date) VALUES (1, 1, '2024-01-01')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM flocks WHERE id = 1", []).unwrap();

        let remaining: i32 = conn
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
