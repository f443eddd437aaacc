use crate::error::AppError;
use crate::models::Stats;
use crate::services::flock_service;
use crate::validators::validate_stats_entry;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

const STATS_COLUMNS: &str =
    "id, flock_id, day, date, harvested, percentage, mortality, feed_consumed, notes";

/// Sort order for stats listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsSort {
    #[default]
    DayAsc,
    DayDesc,
}

impl StatsSort {
    fn order_clause(self) -> &'static str {
        match self {
            StatsSort::DayAsc => "day, id",
            StatsSort::DayDesc => "day DESC, id DESC",
        }
    }
}

/// Filter options for [`list_stats`]. A date filter takes precedence
/// over `max_day`, and an inverted date range drops the end bound.
#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_day: Option<i64>,
    pub sort: StatsSort,
}

impl StatsFilter {
    /// Resolves the precedence rules into effective bounds.
    fn effective(&self) -> (Option<NaiveDate>, Option<NaiveDate>, Option<i64>) {
        let mut end = self.end_date;
        if let (Some(start), Some(e)) = (self.start_date, end) {
            if e < start {
                end = None;
            }
        }
        let max_day = if self.start_date.is_some() || end.is_some() {
            None
        } else {
            self.max_day
        };
        (self.start_date, end, max_day)
    }
}

/// Saves a new stats entry. Validation, day assignment and the
/// percentage recomputation happen inside one transaction so two
/// concurrent inserts for the same flock cannot both claim the same
/// day number or date; the unique indexes catch whoever loses anyway.
pub fn add_stats(conn: &Connection, stats: &mut Stats) -> Result<i64, AppError> {
    let tx = conn.unchecked_transaction()?;

    validate_stats_entry(&tx, stats)?;
    let flock = flock_service::get_flock(&tx, stats.flock_id)?;

    if stats.day.is_none() {
        stats.day = Some(next_day(&tx, stats.flock_id)?);
    }
    stats.compute_percentage(flock.number_of_ducks);

    tx.execute(
        "INSERT INTO stats (flock_id, day, date, harvested, percentage, mortality, feed_consumed, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            stats.flock_id,
            stats.day,
            stats.date,
            stats.harvested,
            stats.percentage,
            stats.mortality,
            stats.feed_consumed,
            &stats.notes,
        ],
    )
    .map_err(AppError::from_insert)?;

    let id = tx.last_insert_rowid();
    tx.commit()?;

    stats.id = Some(id);
    log::debug!(
        "added stats entry {} for flock {} (day {:?})",
        id,
        stats.flock_id,
        stats.day
    );
    Ok(id)
}

/// Next day number for a flock: one past the highest assigned so far.
/// Must run inside the same transaction as the insert that uses it.
fn next_day(conn: &Connection, flock_id: i64) -> Result<i64, AppError> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(day), 0) + 1 FROM stats WHERE flock_id = ?1",
        params![flock_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Updates an existing entry. The date is immutable (the validator
/// rejects changes); every other field is editable, and the percentage
/// is recomputed from the edited harvest.
pub fn update_stats(conn: &Connection, stats: &mut Stats) -> Result<(), AppError> {
    let id = stats
        .id
        .ok_or_else(|| AppError::NotFound("Stats entry has no id".to_string()))?;

    validate_stats_entry(conn, stats)?;
    let flock = flock_service::get_flock(conn, stats.flock_id)?;
    stats.compute_percentage(flock.number_of_ducks);

    let rows_affected = conn.execute(
        "UPDATE stats
         SET harvested = ?1, percentage = ?2, mortality = ?3, feed_consumed = ?4, notes = ?5
         WHERE id = ?6",
        params![
            stats.harvested,
            stats.percentage,
            stats.mortality,
            stats.feed_consumed,
            &stats.notes,
            id,
        ],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Stats entry {}", id)));
    }

    Ok(())
}

/// Loads a stats entry by id.
pub fn get_stats(conn: &Connection, id: i64) -> Result<Stats, AppError> {
    let stats = conn
        .query_row(
            &format!("SELECT {} FROM stats WHERE id = ?1", STATS_COLUMNS),
            params![id],
            |row| Stats::try_from(row),
        )
        .optional()?;

    stats.ok_or_else(|| AppError::NotFound(format!("Stats entry {}", id)))
}

/// Deletes one entry. Day numbers of the surviving entries are left as
/// they are; the sequence simply keeps a hole.
pub fn delete_stats(conn: &Connection, id: i64) -> Result<(), AppError> {
    let rows_affected = conn.execute("DELETE FROM stats WHERE id = ?1", params![id])?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Stats entry {}", id)));
    }

    Ok(())
}

/// Lists a flock's entries, filtered and sorted.
pub fn list_stats(
    conn: &Connection,
    flock_id: i64,
    filter: &StatsFilter,
) -> Result<Vec<Stats>, AppError> {
    let (start, end, max_day) = filter.effective();

    let mut query = format!("SELECT {} FROM stats WHERE flock_id = ?1", STATS_COLUMNS);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(flock_id)];

    if let Some(start) = start {
        params.push(Box::new(start));
        query.push_str(&format!(" AND date >= ?{}", params.len()));
    }
    if let Some(end) = end {
        params.push(Box::new(end));
        query.push_str(&format!(" AND date <= ?{}", params.len()));
    }
    if let Some(max_day) = max_day {
        params.push(Box::new(max_day));
        query.push_str(&format!(" AND day <= ?{}", params.len()));
    }
    query.push_str(" ORDER BY ");
    query.push_str(filter.sort.order_clause());

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            |row| Stats::try_from(row),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// The entry for the same flock with the largest date strictly before
/// this one, or None for the first entry.
pub fn previous_entry(conn: &Connection, stats: &Stats) -> Result<Option<Stats>, AppError> {
    let prev = conn
        .query_row(
            &format!(
                "SELECT {} FROM stats
                 WHERE flock_id = ?1 AND date < ?2
                 ORDER BY date DESC LIMIT 1",
                STATS_COLUMNS
            ),
            params![stats.flock_id, stats.date],
            |row| Stats::try_from(row),
        )
        .optional()?;
    Ok(prev)
}

/// Change in harvest against the previous entry; None for the first.
pub fn harvested_delta(conn: &Connection, stats: &Stats) -> Result<Option<i64>, AppError> {
    Ok(previous_entry(conn, stats)?.map(|prev| stats.harvested - prev.harvested))
}

/// Relative change in harvest against the previous entry, in percent.
/// None for the first entry or when the previous harvest was zero.
pub fn harvested_delta_pct(conn: &Connection, stats: &Stats) -> Result<Option<f64>, AppError> {
    let Some(prev) = previous_entry(conn, stats)? else {
        return Ok(None);
    };
    if prev.harvested == 0 {
        return Ok(None);
    }
    Ok(Some(
        (stats.harvested - prev.harvested) as f64 / prev.harvested as f64 * 100.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::error::ViolationKind;
    use crate::models::Flock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Connection, i64) {
        let _ = env_logger::builder().is_test(true).try_init();
        let conn = database::open_in_memory().unwrap();
        let mut flock = Flock::new("Stats Test Flock", 100, date(2024, 1, 1));
        let id = flock_service::create_flock(&conn, &mut flock).unwrap();
        (conn, id)
    }

    fn add_entry(conn: &Connection, flock_id: i64, d: NaiveDate, harvested: i64) -> Stats {
        let mut stats = Stats::new(flock_id, d);
        stats.harvested = harvested;
        add_stats(conn, &mut stats).unwrap();
        stats
    }

    #[test]
    fn test_day_sequence_assigned_in_order() {
        let (conn, flock_id) = setup();

        for (i, day) in (1..=4).enumerate() {
            let entry = add_entry(&conn, flock_id, date(2024, 1, day), 10 + i as i64);
            assert_eq!(entry.day, Some(day as i64));
        }
    }

    #[test]
    fn test_percentage_computed_on_save() {
        let (conn, flock_id) = setup();

        let first = add_entry(&conn, flock_id, date(2024, 1, 1), 10);
        assert_eq!(first.day, Some(1));
        assert_eq!(first.percentage, 10.0);

        let second = add_entry(&conn, flock_id, date(2024, 1, 2), 15);
        assert_eq!(second.day, Some(2));
        assert_eq!(second.percentage, 15.0);
    }

    #[test]
    fn test_supplied_percentage_not_trusted() {
        let (conn, flock_id) = setup();
        let mut stats = Stats::new(flock_id, date(2024, 1, 1));
        stats.harvested = 20;
        stats.percentage = 99.0;
        add_stats(&conn, &mut stats).unwrap();

        assert_eq!(stats.percentage, 20.0);
        assert_eq!(get_stats(&conn, stats.id.unwrap()).unwrap().percentage, 20.0);
    }

    #[test]
    fn test_explicit_day_is_kept() {
        let (conn, flock_id) = setup();
        let mut stats = Stats::new(flock_id, date(2024, 1, 1));
        stats.harvested = 10;
        stats.day = Some(7);
        add_stats(&conn, &mut stats).unwrap();

        assert_eq!(get_stats(&conn, stats.id.unwrap()).unwrap().day, Some(7));

        // the counter continues from the explicit value
        let next = add_entry(&conn, flock_id, date(2024, 1, 2), 10);
        assert_eq!(next.day, Some(8));
    }

    #[test]
    fn test_add_rejects_invalid_entry() {
        let (conn, flock_id) = setup();
        let mut stats = Stats::new(flock_id, date(2024, 1, 1));
        stats.harvested = 101;

        match add_stats(&conn, &mut stats) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("harvested", ViolationKind::HarvestExceedsFlock));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let entries = list_stats(&conn, flock_id, &StatsFilter::default()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_update_edits_harvest_and_recomputes_percentage() {
        let (conn, flock_id) = setup();
        let mut stats = add_entry(&conn, flock_id, date(2024, 1, 1), 10);

        stats.harvested = 25;
        stats.notes = "recount".to_string();
        update_stats(&conn, &mut stats).unwrap();

        let loaded = get_stats(&conn, stats.id.unwrap()).unwrap();
        assert_eq!(loaded.harvested, 25);
        assert_eq!(loaded.percentage, 25.0);
        assert_eq!(loaded.notes, "recount");
    }

    #[test]
    fn test_update_rejects_date_change() {
        let (conn, flock_id) = setup();
        let mut stats = add_entry(&conn, flock_id, date(2024, 1, 1), 10);

        stats.date = date(2024, 1, 2);
        match update_stats(&conn, &mut stats) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.has("date", ViolationKind::DateImmutable));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_keeps_other_day_numbers() {
        let (conn, flock_id) = setup();
        let first = add_entry(&conn, flock_id, date(2024, 1, 1), 10);
        let second = add_entry(&conn, flock_id, date(2024, 1, 2), 12);
        let third = add_entry(&conn, flock_id, date(2024, 1, 3), 14);

        delete_stats(&conn, second.id.unwrap()).unwrap();

        let remaining = list_stats(&conn, flock_id, &StatsFilter::default()).unwrap();
        let days: Vec<Option<i64>> = remaining.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![first.day, third.day]);
    }

    #[test]
    fn test_list_stats_filters() {
        let (conn, flock_id) = setup();
        for day in 1..=5 {
            add_entry(&conn, flock_id, date(2024, 1, day), 10);
        }

        let range = list_stats(
            &conn,
            flock_id,
            &StatsFilter {
                start_date: Some(date(2024, 1, 2)),
                end_date: Some(date(2024, 1, 4)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(range.len(), 3);

        // date filter suppresses max_day
        let mixed = list_stats(
            &conn,
            flock_id,
            &StatsFilter {
                start_date: Some(date(2024, 1, 4)),
                max_day: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(mixed.len(), 2);

        // inverted range: end bound dropped
        let inverted = list_stats(
            &conn,
            flock_id,
            &StatsFilter {
                start_date: Some(date(2024, 1, 3)),
                end_date: Some(date(2024, 1, 1)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(inverted.len(), 3);

        let by_day = list_stats(
            &conn,
            flock_id,
            &StatsFilter {
                max_day: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_day.len(), 2);

        let desc = list_stats(
            &conn,
            flock_id,
            &StatsFilter {
                sort: StatsSort::DayDesc,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(desc[0].day, Some(5));
    }

    #[test]
    fn test_previous_and_deltas() {
        let (conn, flock_id) = setup();
        let first = add_entry(&conn, flock_id, date(2024, 1, 1), 10);
        let second = add_entry(&conn, flock_id, date(2024, 1, 2), 15);

        assert!(previous_entry(&conn, &first).unwrap().is_none());
        assert_eq!(
            previous_entry(&conn, &second).unwrap().unwrap().id,
            first.id
        );

        assert_eq!(harvested_delta(&conn, &first).unwrap(), None);
        assert_eq!(harvested_delta(&conn, &second).unwrap(), Some(5));

        assert_eq!(harvested_delta_pct(&conn, &first).unwrap(), None);
        let pct = harvested_delta_pct(&conn, &second).unwrap().unwrap();
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_delta_pct_none_when_previous_zero() {
        let (conn, flock_id) = setup();
        add_entry(&conn, flock_id, date(2024, 1, 1), 0);
        let second = add_entry(&conn, flock_id, date(2024, 1, 2), 15);

        assert_eq!(harvested_delta(&conn, &second).unwrap(), Some(15));
        assert_eq!(harvested_delta_pct(&conn, &second).unwrap(), None);
    }
}
