//! The invariant checks behind every flock and stats save, and the
//! relaxed per-row rule set used by bulk import.
//!
//! Each validator runs its full list of checks and accumulates
//! violations into a field-keyed [`ValidationErrors`] map before
//! raising. Stopping at the first failure would hide unrelated
//! violations from the caller and force repeated round trips.

use crate::error::{AppError, ValidationErrors, ViolationKind};
use crate::models::{Flock, ImportRow, Stats};
use crate::settings::display_date;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

// ==================================================
// Flock validators
// ==================================================

/// Validates a flock candidate against its own dates and, for persisted
/// flocks, against its existing stats entries.
pub fn validate_flock(conn: &Connection, flock: &Flock) -> Result<(), AppError> {
    let mut errors = ValidationErrors::new();

    check_culled_after_started(flock, &mut errors);
    check_stats_against_flock_dates(conn, flock, &mut errors)?;
    check_flock_size(conn, flock, &mut errors)?;

    errors.into_result()
}

fn check_culled_after_started(flock: &Flock, errors: &mut ValidationErrors) {
    if let Some(culled) = flock.culled_date {
        if culled <= flock.started_date {
            errors.add(
                "culled_date",
                ViolationKind::DateOrder,
                format!(
                    "Culled date ({}) cannot be before or equal to started date ({}).",
                    display_date(culled),
                    display_date(flock.started_date)
                ),
            );
        }
    }
}

fn check_stats_against_flock_dates(
    conn: &Connection,
    flock: &Flock,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    // Nothing to check until the flock has been persisted.
    let Some(flock_id) = flock.id else {
        return Ok(());
    };

    if let Some(culled) = flock.culled_date {
        let beyond: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM stats WHERE flock_id = ?1 AND date > ?2)",
            params![flock_id, culled],
            |row| row.get(0),
        )?;
        if beyond {
            errors.add(
                "culled_date",
                ViolationKind::BoundaryViolation,
                format!(
                    "Stats entries exist beyond the culled date ({}).",
                    display_date(culled)
                ),
            );
        }
    }

    let before: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM stats WHERE flock_id = ?1 AND date < ?2)",
        params![flock_id, flock.started_date],
        |row| row.get(0),
    )?;
    if before {
        errors.add(
            "started_date",
            ViolationKind::BoundaryViolation,
            format!(
                "Stats entries exist before the started date ({}).",
                display_date(flock.started_date)
            ),
        );
    }

    Ok(())
}

fn check_flock_size(
    conn: &Connection,
    flock: &Flock,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    let Some(flock_id) = flock.id else {
        return Ok(());
    };

    let max_harvested: i64 = conn.query_row(
        "SELECT COALESCE(MAX(harvested), 0) FROM stats WHERE flock_id = ?1",
        params![flock_id],
        |row| row.get(0),
    )?;

    if max_harvested > flock.number_of_ducks {
        errors.add(
            "number_of_ducks",
            ViolationKind::SizeViolation,
            format!(
                "The flock's number of ducks ({}) cannot be less than the maximum \
                 harvested value ({}) recorded in its stats.",
                flock.number_of_ducks, max_harvested
            ),
        );
    }

    Ok(())
}

// ==================================================
// Stats validators
// ==================================================

/// Validates a stats entry against its owning flock and the flock's
/// existing entries. A stats entry cannot be validated in isolation:
/// when the referenced flock does not exist this is a no-op.
///
/// The checks run in a fixed order and all of them run, so the caller
/// sees every violation at once.
pub fn validate_stats_entry(conn: &Connection, stats: &Stats) -> Result<(), AppError> {
    let Some(flock) = crate::services::flock_service::find_flock(conn, stats.flock_id)? else {
        return Ok(());
    };

    let mut errors = ValidationErrors::new();

    check_harvested(stats, &flock, &mut errors);
    check_percentage_bounds(stats.percentage, &mut errors);
    check_positive_fields(stats, &mut errors);
    check_unique_date(conn, stats, &mut errors)?;
    check_date_bounds(stats.date, &flock, &mut errors);
    check_date_immutability(conn, stats, &mut errors)?;
    check_date_gap(conn, stats, &mut errors)?;

    errors.into_result()
}

fn check_harvested(stats: &Stats, flock: &Flock, errors: &mut ValidationErrors) {
    if stats.harvested > flock.number_of_ducks {
        errors.add(
            "harvested",
            ViolationKind::HarvestExceedsFlock,
            format!(
                "Harvested ({}) cannot exceed the flock's number of ducks ({}).",
                stats.harvested, flock.number_of_ducks
            ),
        );
    }
}

fn check_percentage_bounds(percentage: f64, errors: &mut ValidationErrors) {
    const MIN_PERCENTAGE: f64 = 0.0;
    const MAX_PERCENTAGE: f64 = 100.0;

    if percentage < MIN_PERCENTAGE || percentage > MAX_PERCENTAGE {
        errors.add(
            "percentage",
            ViolationKind::PercentageRange,
            format!(
                "Percentage ({}) must be between {} and {}.",
                percentage, MIN_PERCENTAGE, MAX_PERCENTAGE
            ),
        );
    }
}

fn check_positive_fields(stats: &Stats, errors: &mut ValidationErrors) {
    let fields: [(&str, &str, f64); 4] = [
        ("harvested", "Harvested", stats.harvested as f64),
        ("percentage", "Percentage", stats.percentage),
        ("mortality", "Mortality", stats.mortality as f64),
        ("feed_consumed", "Feed consumed", stats.feed_consumed),
    ];

    for (field, label, value) in fields {
        if value < 0.0 {
            errors.add(
                field,
                ViolationKind::NegativeValue,
                format!("{} ({}) cannot be negative.", label, value),
            );
        }
    }
}

fn check_unique_date(
    conn: &Connection,
    stats: &Stats,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    // Exclude the entry itself when editing.
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM stats
            WHERE flock_id = ?1 AND date = ?2 AND id != COALESCE(?3, -1)
         )",
        params![stats.flock_id, stats.date, stats.id],
        |row| row.get(0),
    )?;

    if exists {
        errors.add(
            "date",
            ViolationKind::DuplicateDate,
            format!(
                "A stat entry for {} already exists for this flock.",
                display_date(stats.date)
            ),
        );
    }

    Ok(())
}

fn check_date_bounds(date: NaiveDate, flock: &Flock, errors: &mut ValidationErrors) {
    if date < flock.started_date {
        errors.add(
            "date",
            ViolationKind::BeforeStart,
            format!(
                "Date ({}) cannot be before the flock's started date ({}).",
                display_date(date),
                display_date(flock.started_date)
            ),
        );
    }

    if let Some(culled) = flock.culled_date {
        if date > culled {
            errors.add(
                "date",
                ViolationKind::AfterCull,
                format!(
                    "This entry cannot be added because the flock ({}) has been culled.",
                    flock
                ),
            );
        }
    }
}

fn check_date_immutability(
    conn: &Connection,
    stats: &Stats,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    let Some(id) = stats.id else {
        return Ok(());
    };

    let original: Option<NaiveDate> = conn
        .query_row("SELECT date FROM stats WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;

    if let Some(original_date) = original {
        if stats.date != original_date {
            errors.add(
                "date",
                ViolationKind::DateImmutable,
                "Date cannot be changed on edit.".to_string(),
            );
        }
    }

    Ok(())
}

/// Only enforced when inserting a new entry: the date must follow the
/// flock's latest entry by at most one day. Edits and bulk imports skip
/// this rule (historical backfill intentionally spans wide ranges).
fn check_date_gap(
    conn: &Connection,
    stats: &Stats,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    if stats.id.is_some() {
        return Ok(());
    }

    let last_date: Option<NaiveDate> = conn
        .query_row(
            "SELECT date FROM stats WHERE flock_id = ?1 ORDER BY date DESC LIMIT 1",
            params![stats.flock_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(last_date) = last_date else {
        return Ok(());
    };

    let gap_days = (stats.date - last_date).num_days();
    if gap_days > 1 {
        errors.add(
            "date",
            ViolationKind::DateGap,
            format!(
                "There is a gap of {} day(s) after the last entry on {}. \
                 Please fill in missing dates before adding this entry.",
                gap_days - 1,
                display_date(last_date)
            ),
        );
    }

    Ok(())
}

// ==================================================
// Import validators
// ==================================================

/// The relaxed rule set applied per row during an import dry run: date
/// window and uniqueness (against the store and the rest of the batch),
/// upper bounds, and non-negativity. The date-gap rule is deliberately
/// not applied here.
pub fn validate_import_row(
    conn: &Connection,
    row: &ImportRow,
    flock: &Flock,
    batch_dates: &HashSet<NaiveDate>,
) -> Result<ValidationErrors, AppError> {
    let mut errors = ValidationErrors::new();

    check_import_date(conn, row, flock, batch_dates, &mut errors)?;
    check_import_harvested(row, flock, &mut errors);
    if let Some(percentage) = row.percentage {
        check_percentage_bounds(percentage, &mut errors);
    }
    check_import_mortality(row, flock, &mut errors);
    check_import_feed_consumed(row, &mut errors);

    Ok(errors)
}

fn check_import_date(
    conn: &Connection,
    row: &ImportRow,
    flock: &Flock,
    batch_dates: &HashSet<NaiveDate>,
    errors: &mut ValidationErrors,
) -> Result<(), AppError> {
    check_date_bounds(row.date, flock, errors);

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM stats WHERE flock_id = ?1 AND date = ?2)",
        params![flock.id, row.date],
        |row| row.get(0),
    )?;
    if exists {
        errors.add(
            "date",
            ViolationKind::DuplicateDate,
            format!(
                "A stat entry for {} already exists for this flock.",
                display_date(row.date)
            ),
        );
    }

    if batch_dates.contains(&row.date) {
        errors.add(
            "date",
            ViolationKind::DuplicateDate,
            format!(
                "Duplicate date {} within the imported file.",
                display_date(row.date)
            ),
        );
    }

    Ok(())
}

fn check_import_harvested(row: &ImportRow, flock: &Flock, errors: &mut ValidationErrors) {
    if row.harvested > flock.number_of_ducks {
        errors.add(
            "harvested",
            ViolationKind::HarvestExceedsFlock,
            format!(
                "Harvested ({}) cannot exceed the flock's number of ducks ({}).",
                row.harvested, flock.number_of_ducks
            ),
        );
    }

    if row.harvested < 0 {
        errors.add(
            "harvested",
            ViolationKind::NegativeValue,
            format!("Harvested ({}) cannot be negative.", row.harvested),
        );
    }
}

fn check_import_mortality(row: &ImportRow, flock: &Flock, errors: &mut ValidationErrors) {
    if row.mortality > flock.number_of_ducks {
        errors.add(
            "mortality",
            ViolationKind::ExceedsFlockSize,
            format!(
                "Mortality ({}) cannot exceed the flock's number of ducks ({}).",
                row.mortality, flock.number_of_ducks
            ),
        );
    }

    if row.mortality < 0 {
        errors.add(
            "mortality",
            ViolationKind::NegativeValue,
            format!("Mortality ({}) cannot be negative.", row.mortality),
        );
    }
}

fn check_import_feed_consumed(row: &ImportRow, errors: &mut ValidationErrors) {
    if row.feed_consumed < 0.0 {
        errors.add(
            "feed_consumed",
            ViolationKind::NegativeValue,
            format!("Feed consumed ({}) cannot be negative.", row.feed_consumed),
        );
    }
}
