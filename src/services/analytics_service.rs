use crate::error::AppError;
use crate::services::stats_service::StatsFilter;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;

/// Lifetime aggregates for one flock. All fields are zero-valued when
/// the flock has no stats entries yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlockAggregates {
    pub days_recorded: i64,
    pub total_harvested: i64,
    /// Floor division of the total by the number of recorded days.
    pub avg_harvested: i64,
    pub total_mortality: i64,
    pub average_percentage: f64,
    pub total_feed_consumed: f64,
    pub avg_daily_feed_consumed: f64,
}

/// Computes the aggregate block for a flock's detail/summary view.
pub fn flock_aggregates(conn: &Connection, flock_id: i64) -> Result<FlockAggregates, AppError> {
    let mut stmt = conn.prepare(
        "SELECT
            COUNT(*) as count,
            SUM(harvested) as total_harvested,
            SUM(mortality) as total_mortality,
            AVG(percentage) as average_percentage,
            SUM(feed_consumed) as total_feed_consumed
         FROM stats
         WHERE flock_id = ?1",
    )?;

    let (count, harvested, mortality, percentage, feed) = stmt.query_row(
        params![flock_id],
        |row| {
            let count: i64 = row.get(0)?;
            let harvested: Option<i64> = row.get(1)?;
            let mortality: Option<i64> = row.get(2)?;
            let percentage: Option<f64> = row.get(3)?;
            let feed: Option<f64> = row.get(4)?;
            Ok((count, harvested, mortality, percentage, feed))
        },
    )?;

    let total_harvested = harvested.unwrap_or(0);
    let total_feed_consumed = feed.unwrap_or(0.0);

    Ok(FlockAggregates {
        days_recorded: count,
        total_harvested,
        avg_harvested: if count > 0 { total_harvested / count } else { 0 },
        total_mortality: mortality.unwrap_or(0),
        average_percentage: percentage.unwrap_or(0.0),
        total_feed_consumed,
        avg_daily_feed_consumed: if count > 0 {
            total_feed_consumed / count as f64
        } else {
            0.0
        },
    })
}

/// Earliest and latest stats dates for a flock, None/None when empty.
pub fn date_bounds(
    conn: &Connection,
    flock_id: i64,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AppError> {
    let bounds = conn.query_row(
        "SELECT MIN(date), MAX(date) FROM stats WHERE flock_id = ?1",
        params![flock_id],
        |row| {
            let min: Option<NaiveDate> = row.get(0)?;
            let max: Option<NaiveDate> = row.get(1)?;
            Ok((min, max))
        },
    )?;
    Ok(bounds)
}

/// One chart point per recorded day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub day: i64,
    pub date: NaiveDate,
    pub harvested: i64,
    pub percentage: f64,
    pub mortality: i64,
    pub feed_consumed: f64,
}

/// The production series a chart renders, honoring the same filter
/// rules as the stats listing.
pub fn production_series(
    conn: &Connection,
    flock_id: i64,
    filter: &StatsFilter,
) -> Result<Vec<SeriesPoint>, AppError> {
    let entries = crate::services::stats_service::list_stats(conn, flock_id, filter)?;

    Ok(entries
        .into_iter()
        .map(|s| SeriesPoint {
            day: s.day.unwrap_or(0),
            date: s.date,
            harvested: s.harvested,
            percentage: s.percentage,
            mortality: s.mortality,
            feed_consumed: s.feed_consumed,
        })
        .collect())
}

/// The series as JSON, ready to hand to a chart widget.
pub fn production_series_json(
    conn: &Connection,
    flock_id: i64,
    filter: &StatsFilter,
) -> Result<serde_json::Value, AppError> {
    let series = production_series(conn, flock_id, filter)?;
    serde_json::to_value(series)
        .map_err(|e| AppError::Other(format!("Series serialization failed: {}", e)))
}
