pub mod schema;

use crate::error::AppError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Default on-disk location of the database.
pub fn get_database_path() -> PathBuf {
    PathBuf::from("./data/flockbook.db")
}

/// Opens (creating if needed) the database at `path` and brings the
/// schema up to date.
pub fn init_database_at(path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;

    log::debug!("database ready at {}", path.display());
    Ok(conn)
}

/// Opens the database at the default path.
pub fn init_database() -> Result<Connection, AppError> {
    init_database_at(&get_database_path())
}

/// In-memory database with full schema, for tests and scratch work.
pub fn open_in_memory() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    Ok(conn)
}
