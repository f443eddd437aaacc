use chrono::NaiveDate;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One day of production figures for a flock.
///
/// `day` is a 1-based sequence number assigned at insert time and
/// `percentage` is recomputed from `harvested` on every save; neither is
/// accepted from external input as authoritative. `date` is fixed once
/// the entry has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub id: Option<i64>,
    pub flock_id: i64,
    /// Assigned on first save: one past the flock's highest day so far.
    pub day: Option<i64>,
    pub date: NaiveDate,
    pub harvested: i64,
    /// harvested / number_of_ducks * 100, two decimal places.
    pub percentage: f64,
    pub mortality: i64,
    /// Feed consumed (sacks)
    pub feed_consumed: f64,
    pub notes: String,
}

impl Stats {
    pub fn new(flock_id: i64, date: NaiveDate) -> Self {
        Self {
            id: None,
            flock_id,
            day: None,
            date,
            harvested: 0,
            percentage: 0.0,
            mortality: 0,
            feed_consumed: 0.0,
            notes: String::new(),
        }
    }

    /// Recomputes the laying percentage against the flock size. A flock
    /// of zero ducks yields 0 rather than dividing by zero.
    pub(crate) fn compute_percentage(&mut self, number_of_ducks: i64) {
        self.percentage = if number_of_ducks > 0 {
            round2(self.harvested as f64 / number_of_ducks as f64 * 100.0)
        } else {
            0.0
        };
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let day = self
            .day
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(f, "Day {}: {} harvested", day, self.harvested)
    }
}

impl<'r> TryFrom<&Row<'r>> for Stats {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let id: i64 = row.get(0)?;
        let flock_id: i64 = row.get(1)?;
        let day: i64 = row.get(2)?;
        let date: NaiveDate = row.get(3)?;
        let harvested: i64 = row.get(4)?;
        let percentage: f64 = row.get(5)?;
        let mortality: i64 = row.get(6)?;
        let feed_consumed: f64 = row.get(7)?;
        let notes: String = row.get(8)?;

        Ok(Stats {
            id: Some(id),
            flock_id,
            day: Some(day),
            date,
            harvested,
            percentage,
            mortality,
            feed_consumed,
            notes,
        })
    }
}

/// One parsed row from a bulk import dataset. `id` and `flock` columns
/// are never carried over; `day` is honored only when the file supplies
/// one explicitly, and `percentage` is recomputed on commit regardless.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub date: NaiveDate,
    pub day: Option<i64>,
    pub harvested: i64,
    pub percentage: Option<f64>,
    pub mortality: i64,
    pub feed_consumed: f64,
    pub notes: String,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
