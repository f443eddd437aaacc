use crate::settings::display_date;
use chrono::NaiveDate;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A batch of ducks raised together. Owns its daily stats entries and is
/// the authority for their validity window: no entry may fall before
/// `started_date` or, once the flock is culled, after `culled_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flock {
    pub id: Option<i64>,
    pub title: String,
    pub number_of_ducks: i64,
    pub description: String,
    pub started_date: NaiveDate,
    /// Set when the flock has been slaughtered; closes the date window.
    pub culled_date: Option<NaiveDate>,
    /// Derived from `culled_date` on every save, never set directly.
    pub is_culled: bool,
}

impl Flock {
    pub fn new(title: impl Into<String>, number_of_ducks: i64, started_date: NaiveDate) -> Self {
        Self {
            id: None,
            title: title.into(),
            number_of_ducks,
            description: String::new(),
            started_date,
            culled_date: None,
            is_culled: false,
        }
    }

    /// New flock started today.
    pub fn started_today(title: impl Into<String>, number_of_ducks: i64) -> Self {
        Self::new(title, number_of_ducks, chrono::Local::now().date_naive())
    }

    /// Re-derives `is_culled`. Called by the services before every write so
    /// the flag can never contradict `culled_date`.
    pub(crate) fn apply_culled_state(&mut self) {
        self.is_culled = self.culled_date.is_some();
    }
}

impl fmt::Display for Flock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cull = match self.culled_date {
            Some(date) => display_date(date),
            None => "Ongoing".to_string(),
        };
        write!(
            f,
            "{} ({} - {})",
            self.title,
            display_date(self.started_date),
            cull
        )
    }
}

impl<'r> TryFrom<&Row<'r>> for Flock {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let id: i64 = row.get(0)?;
        let title: String = row.get(1)?;
        let number_of_ducks: i64 = row.get(2)?;
        let description: String = row.get(3)?;
        let started_date: NaiveDate = row.get(4)?;
        let culled_date: Option<NaiveDate> = row.get(5)?;
        let is_culled: bool = row.get(6)?;

        Ok(Flock {
            id: Some(id),
            title,
            number_of_ducks,
            description,
            started_date,
            culled_date,
            is_culled,
        })
    }
}
