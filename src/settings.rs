use crate::error::AppError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Format used when a date appears inside a user-facing message.
pub const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y";

/// Date formats accepted on import. The first entry is the primary
/// format and is the one used when exporting.
pub const DEFAULT_DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Runtime configuration, loadable from a TOML file. Everything has a
/// compiled-in default so the library works without any config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Accepted date formats for CSV import, tried in order.
    pub date_input_formats: Vec<String>,
    /// Format for dates embedded in error messages.
    pub display_date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            date_input_formats: DEFAULT_DATE_INPUT_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            display_date_format: DISPLAY_DATE_FORMAT.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| AppError::Other(format!("Invalid settings file: {}", e)))
    }

    /// The format dates are rendered in on export.
    pub fn primary_date_format(&self) -> &str {
        self.date_input_formats
            .first()
            .map(String::as_str)
            .unwrap_or("%Y-%m-%d")
    }

    /// Tries every configured format in order. The error message names the
    /// rejected value and the accepted formats; import reports it as a
    /// row-level error on the `date` field.
    pub fn parse_date(&self, value: &str) -> Result<NaiveDate, String> {
        for fmt in &self.date_input_formats {
            if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
                return Ok(date);
            }
        }
        Err(format!(
            "Date '{}' does not match any of the formats: {:?}",
            value, self.date_input_formats
        ))
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(self.primary_date_format()).to_string()
    }
}

/// Renders a date the way validation messages expect it.
pub fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_all_configured_formats() {
        let settings = Settings::default();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        assert_eq!(settings.parse_date("2024-01-15").unwrap(), expected);
        assert_eq!(settings.parse_date("01/15/2024").unwrap(), expected);
        assert_eq!(settings.parse_date("15.01.2024").unwrap(), expected);
    }

    #[test]
    fn test_parse_date_rejects_unknown_format() {
        let settings = Settings::default();
        let err = settings.parse_date("Jan 15 2024").unwrap_err();
        assert!(err.contains("Jan 15 2024"));
    }

    #[test]
    fn test_export_uses_primary_format() {
        let settings = Settings::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(settings.format_date(date), "2024-01-15");
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: Settings =
            toml::from_str("date_input_formats = [\"%d/%m/%Y\"]").unwrap();
        assert_eq!(settings.primary_date_format(), "%d/%m/%Y");
        // unset fields keep their defaults
        assert_eq!(settings.display_date_format, DISPLAY_DATE_FORMAT);
    }

    #[test]
    fn test_display_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(display_date(date), "Jan 02, 2024");
    }
}
