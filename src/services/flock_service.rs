use crate::error::AppError;
use crate::models::Flock;
use crate::validators::validate_flock;
use rusqlite::{params, Connection, OptionalExtension};

/// Sort order for flock listings. Defaults to the started date, oldest
/// flock first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlockSort {
    TitleAsc,
    TitleDesc,
    #[default]
    StartedDateAsc,
    StartedDateDesc,
}

impl FlockSort {
    fn order_clause(self) -> &'static str {
        match self {
            FlockSort::TitleAsc => "title",
            FlockSort::TitleDesc => "title DESC",
            FlockSort::StartedDateAsc => "started_date",
            FlockSort::StartedDateDesc => "started_date DESC",
        }
    }
}

/// Filter options for [`list_flocks`].
#[derive(Debug, Clone, Default)]
pub struct FlockFilter {
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
    /// Some(true): only active flocks; Some(false): only culled ones.
    pub active: Option<bool>,
    pub sort: FlockSort,
}

/// Creates a new flock. Validates first, then derives `is_culled` from
/// `culled_date` and persists; the assigned id is written back.
pub fn create_flock(conn: &Connection, flock: &mut Flock) -> Result<i64, AppError> {
    validate_flock(conn, flock)?;
    flock.apply_culled_state();

    conn.execute(
        "INSERT INTO flocks (title, number_of_ducks, description, started_date, culled_date, is_culled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &flock.title,
            flock.number_of_ducks,
            &flock.description,
            flock.started_date,
            flock.culled_date,
            flock.is_culled,
        ],
    )?;

    let id = conn.last_insert_rowid();
    flock.id = Some(id);
    log::info!("created flock {} ({})", id, flock.title);
    Ok(id)
}

/// Updates an existing flock. The same validation as create, plus the
/// checks that only apply once stats exist (date window, size floor).
pub fn update_flock(conn: &Connection, flock: &mut Flock) -> Result<(), AppError> {
    let id = flock
        .id
        .ok_or_else(|| AppError::NotFound("Flock has no id".to_string()))?;

    validate_flock(conn, flock)?;
    flock.apply_culled_state();

    let rows_affected = conn.execute(
        "UPDATE flocks
         SET title = ?1, number_of_ducks = ?2, description = ?3,
             started_date = ?4, culled_date = ?5, is_culled = ?6
         WHERE id = ?7",
        params![
            &flock.title,
            flock.number_of_ducks,
            &flock.description,
            flock.started_date,
            flock.culled_date,
            flock.is_culled,
            id,
        ],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Flock {}", id)));
    }

    log::info!("updated flock {} ({})", id, flock.title);
    Ok(())
}

/// Loads a flock, or None if it does not exist.
pub fn find_flock(conn: &Connection, id: i64) -> Result<Option<Flock>, AppError> {
    let flock = conn
        .query_row(
            "SELECT id, title, number_of_ducks, description, started_date, culled_date, is_culled
             FROM flocks WHERE id = ?1",
            params![id],
            |row| Flock::try_from(row),
        )
        .optional()?;
    Ok(flock)
}

/// Loads a flock by id.
pub fn get_flock(conn: &Connection, id: i64) -> Result<Flock, AppError> {
    find_flock(conn, id)?.ok_or_else(|| AppError::NotFound(format!("Flock {}", id)))
}

/// Deletes a flock; its stats entries go with it (ON DELETE CASCADE).
pub fn delete_flock(conn: &Connection, id: i64) -> Result<(), AppError> {
    let rows_affected = conn.execute("DELETE FROM flocks WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Flock {}", id)));
    }

    log::info!("deleted flock {}", id);
    Ok(())
}

/// Lists flocks matching the filter.
pub fn list_flocks(conn: &Connection, filter: &FlockFilter) -> Result<Vec<Flock>, AppError> {
    let mut query = String::from(
        "SELECT id, title, number_of_ducks, description, started_date, culled_date, is_culled
         FROM flocks",
    );
    let mut clauses: Vec<&str> = Vec::new();

    let title = filter.title.as_deref().map(str::trim).unwrap_or("");
    if !title.is_empty() {
        clauses.push("title LIKE '%' || ?1 || '%'");
    }
    match filter.active {
        Some(true) => clauses.push("culled_date IS NULL"),
        Some(false) => clauses.push("culled_date IS NOT NULL"),
        None => {}
    }

    if !clauses.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
    }
    query.push_str(" ORDER BY ");
    query.push_str(filter.sort.order_clause());

    let mut stmt = conn.prepare(&query)?;
    let params: Vec<&str> = if title.is_empty() { vec![] } else { vec![title] };

    let flocks = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Flock::try_from(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(flocks)
}
