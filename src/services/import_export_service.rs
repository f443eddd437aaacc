//! CSV import/export of a flock's stats entries.
//!
//! Import is two-phase: a dry run validates every row against the same
//! invariants as a single-entry save (minus the date-gap rule, which
//! historical backfill is allowed to ignore), and only a fully clean
//! batch is committed, inside one transaction. A batch with any bad row
//! commits nothing.

use crate::error::{AppError, RowError};
use crate::models::{ImportRow, Stats};
use crate::services::{flock_service, stats_service};
use crate::settings::Settings;
use crate::validators::validate_import_row;
use rusqlite::{params, Connection};
use std::collections::HashSet;

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
}

/// Exports a flock's stats as CSV, dates rendered in the primary
/// configured format. Columns match the import shape.
pub fn export_stats_csv(
    conn: &Connection,
    flock_id: i64,
    filter: &stats_service::StatsFilter,
    settings: &Settings,
) -> Result<String, AppError> {
    // existence check so exporting a bogus flock id is an error, not an
    // empty file
    flock_service::get_flock(conn, flock_id)?;
    let entries = stats_service::list_stats(conn, flock_id, filter)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "date",
            "harvested",
            "percentage",
            "mortality",
            "feed_consumed",
            "notes",
        ])
        .map_err(|e| AppError::Other(e.to_string()))?;

    for entry in &entries {
        writer
            .write_record([
                settings.format_date(entry.date),
                entry.harvested.to_string(),
                format!("{:.2}", entry.percentage),
                entry.mortality.to_string(),
                entry.feed_consumed.to_string(),
                entry.notes.clone(),
            ])
            .map_err(|e| AppError::Other(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Other(e.to_string()))
}

/// Imports stats rows from CSV text into a flock.
///
/// Fails with [`AppError::MissingFlockContext`] when the flock does not
/// exist, [`AppError::DatasetParse`] when the file itself cannot be
/// read, and [`AppError::Import`] carrying `(row, field, message)`
/// triples when any row fails the dry run. Only a clean batch commits,
/// and it commits atomically.
pub fn import_stats_csv(
    conn: &Connection,
    flock_id: i64,
    raw: &str,
    settings: &Settings,
) -> Result<ImportReport, AppError> {
    let Some(flock) = flock_service::find_flock(conn, flock_id)? else {
        return Err(AppError::MissingFlockContext);
    };

    let rows = parse_dataset(raw, settings)?;

    // Dry run: every row against store state and the rest of the batch.
    let mut errors: Vec<RowError> = Vec::new();
    let mut batch_dates: HashSet<chrono::NaiveDate> = HashSet::new();
    for (index, parsed) in rows.iter().enumerate() {
        let row_number = index + 1;
        match parsed {
            Ok(row) => {
                let row_errors = validate_import_row(conn, row, &flock, &batch_dates)?;
                for (field, field_errors) in row_errors.iter() {
                    for err in field_errors {
                        errors.push(RowError {
                            row: row_number,
                            field: field.to_string(),
                            message: err.message.clone(),
                        });
                    }
                }
                batch_dates.insert(row.date);
            }
            Err((field, message)) => errors.push(RowError {
                row: row_number,
                field: field.clone(),
                message: message.clone(),
            }),
        }
    }

    if !errors.is_empty() {
        log::warn!(
            "import into flock {} rejected: {} row error(s)",
            flock_id,
            errors.len()
        );
        return Err(AppError::Import(errors));
    }

    // Commit pass: one transaction, rolled back entirely on any failure.
    let tx = conn.unchecked_transaction()?;
    let mut day_counter: i64 = tx.query_row(
        "SELECT COALESCE(MAX(day), 0) + 1 FROM stats WHERE flock_id = ?1",
        params![flock_id],
        |row| row.get(0),
    )?;

    let mut imported = 0;
    for row in rows.iter().filter_map(|parsed| parsed.as_ref().ok()) {
        let day = match row.day {
            Some(day) => day,
            None => {
                let assigned = day_counter;
                day_counter += 1;
                assigned
            }
        };

        let mut stats = Stats {
            id: None,
            flock_id,
            day: Some(day),
            date: row.date,
            harvested: row.harvested,
            percentage: 0.0,
            mortality: row.mortality,
            feed_consumed: row.feed_consumed,
            notes: row.notes.clone(),
        };
        // the file's percentage column is never trusted
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
        imported += 1;
    }

    tx.commit()?;
    log::info!("imported {} stats rows into flock {}", imported, flock_id);
    Ok(ImportReport { imported })
}

type ParsedRow = Result<ImportRow, (String, String)>;

/// Decodes and parses the CSV text. Structural problems (encoding,
/// malformed CSV, missing date column) abort before any row-level
/// validation; bad values inside a row become that row's error.
fn parse_dataset(raw: &str, settings: &Settings) -> Result<Vec<ParsedRow>, AppError> {
    // tolerate a UTF-8 byte-order mark from spreadsheet exports
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(raw.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::DatasetParse(e.to_string()))?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    // `id` and `flock` columns are ignored outright
    let date_col = column("date")
        .ok_or_else(|| AppError::DatasetParse("missing 'date' column".to_string()))?;
    let harvested_col = column("harvested");
    let percentage_col = column("percentage");
    let mortality_col = column("mortality");
    let feed_col = column("feed_consumed");
    let notes_col = column("notes");
    let day_col = column("day");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::DatasetParse(e.to_string()))?;
        rows.push(parse_record(
            &record,
            settings,
            date_col,
            harvested_col,
            percentage_col,
            mortality_col,
            feed_col,
            notes_col,
            day_col,
        ));
    }

    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
fn parse_record(
    record: &csv::StringRecord,
    settings: &Settings,
    date_col: usize,
    harvested_col: Option<usize>,
    percentage_col: Option<usize>,
    mortality_col: Option<usize>,
    feed_col: Option<usize>,
    notes_col: Option<usize>,
    day_col: Option<usize>,
) -> ParsedRow {
    let cell = |col: Option<usize>| col.and_then(|i| record.get(i)).unwrap_or("").trim();

    let date_raw = cell(Some(date_col));
    if date_raw.is_empty() {
        return Err(("date".to_string(), "Date is required.".to_string()));
    }
    let date = settings
        .parse_date(date_raw)
        .map_err(|msg| ("date".to_string(), msg))?;

    let parse_int = |col: Option<usize>, field: &str| -> Result<i64, (String, String)> {
        let value = cell(col);
        if value.is_empty() {
            return Ok(0);
        }
        value
            .parse::<i64>()
            .map_err(|_| (field.to_string(), format!("'{}' is not a whole number.", value)))
    };
    let parse_float = |col: Option<usize>, field: &str| -> Result<f64, (String, String)> {
        let value = cell(col);
        if value.is_empty() {
            return Ok(0.0);
        }
        value
            .parse::<f64>()
            .map_err(|_| (field.to_string(), format!("'{}' is not a number.", value)))
    };

    let percentage = {
        let value = cell(percentage_col);
        if value.is_empty() {
            None
        } else {
            Some(value.parse::<f64>().map_err(|_| {
                (
                    "percentage".to_string(),
                    format!("'{}' is not a number.", value),
                )
            })?)
        }
    };
    let day = {
        let value = cell(day_col);
        if value.is_empty() {
            None
        } else {
            Some(
                value
                    .parse::<i64>()
                    .map_err(|_| ("day".to_string(), format!("'{}' is not a whole number.", value)))?,
            )
        }
    };

    Ok(ImportRow {
        date,
        day,
        harvested: parse_int(harvested_col, "harvested")?,
        percentage,
        mortality: parse_int(mortality_col, "mortality")?,
        feed_consumed: parse_float(feed_col, "feed_consumed")?,
        notes: cell(notes_col).to_string(),
    })
}
