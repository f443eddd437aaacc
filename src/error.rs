use std::collections::BTreeMap;
use std::fmt;

/// How many row errors an import failure message shows before truncating.
const IMPORT_ERROR_DISPLAY_LIMIT: usize = 5;

/// The rule a field value violated. One variant per invariant the
/// validators enforce, so callers can match on the cause instead of
/// parsing message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Culled date is not strictly after the started date.
    DateOrder,
    /// Existing stats entries fall outside the flock's date window.
    BoundaryViolation,
    /// Flock size reduced below the historical maximum harvest.
    SizeViolation,
    /// Harvested exceeds the flock's number of ducks.
    HarvestExceedsFlock,
    /// Percentage outside [0, 100].
    PercentageRange,
    /// A count or quantity is negative.
    NegativeValue,
    /// Another stats entry already exists for this flock and date.
    DuplicateDate,
    /// Stats date before the flock's started date.
    BeforeStart,
    /// Stats date after the flock's culled date.
    AfterCull,
    /// Attempt to change the date of a persisted stats entry.
    DateImmutable,
    /// New entry leaves a gap of more than one day after the latest entry.
    DateGap,
    /// Upper bound exceeded on an import-only field (e.g. mortality).
    ExceedsFlockSize,
}

/// A single violation on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub kind: ViolationKind,
    pub message: String,
}

/// Accumulated validation failures, keyed by field name. The validators
/// run every check and only raise once all violations are collected, so
/// a caller rendering a form can show every problem at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, kind: ViolationKind, message: String) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(FieldError { kind, message });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All violations recorded for one field (empty if the field is clean).
    pub fn field(&self, name: &str) -> &[FieldError] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.field(field).iter().any(|e| e.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldError])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The `{field_name: [messages]}` structure the presentation layer
    /// consumes.
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        self.fields
            .iter()
            .map(|(field, errs)| {
                (
                    field.clone(),
                    errs.iter().map(|e| e.message.clone()).collect(),
                )
            })
            .collect()
    }

    /// Ok if no violations were recorded, otherwise the accumulated set
    /// wrapped in an [`AppError`].
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (field, errs) in &self.fields {
            for err in errs {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, err.message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// One rejected row from a bulk import dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based data row number (header row excluded).
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Row {}: {}: {}", self.row, self.field, self.message)
    }
}

/// Central error type for the flock book.
#[derive(Debug)]
pub enum AppError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Field-level validation failures on a flock or stats entry
    Validation(ValidationErrors),
    /// Resource not found
    NotFound(String),
    /// Bulk import attempted without a flock to attach rows to
    MissingFlockContext,
    /// The uploaded dataset could not be decoded or parsed at all
    DatasetParse(String),
    /// One or more rows failed the import dry run; nothing was committed
    Import(Vec<RowError>),
    /// A storage-level unique constraint fired (e.g. two concurrent
    /// inserts racing for the same date). Not retried automatically.
    Constraint(String),
    /// General error
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Validation(errors) => write!(f, "Validation error: {}", errors),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::MissingFlockContext => {
                write!(f, "Flock must be set before import")
            }
            AppError::DatasetParse(msg) => write!(f, "Could not read CSV file: {}", msg),
            AppError::Import(errors) => {
                write!(f, "Import failed:")?;
                for err in errors.iter().take(IMPORT_ERROR_DISPLAY_LIMIT) {
                    write!(f, "\n{}", err)?;
                }
                if errors.len() > IMPORT_ERROR_DISPLAY_LIMIT {
                    write!(
                        f,
                        "\n... and {} more error(s)",
                        errors.len() - IMPORT_ERROR_DISPLAY_LIMIT
                    )?;
                }
                Ok(())
            }
            AppError::Constraint(msg) => write!(f, "Constraint violation: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl AppError {
    /// Maps SQLite unique/check constraint failures to [`AppError::Constraint`]
    /// so a race that slips past the in-transaction checks is reported as
    /// such rather than as a generic database error.
    pub(crate) fn from_insert(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, msg)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Constraint(
                    msg.clone()
                        .unwrap_or_else(|| "unique constraint violated".to_string()),
                )
            }
            _ => AppError::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("date", ViolationKind::DuplicateDate, "dup".to_string());
        errors.add("date", ViolationKind::BeforeStart, "early".to_string());
        errors.add(
            "harvested",
            ViolationKind::NegativeValue,
            "negative".to_string(),
        );

        assert_eq!(errors.field("date").len(), 2);
        assert!(errors.has("date", ViolationKind::BeforeStart));
        assert!(!errors.has("harvested", ViolationKind::DuplicateDate));

        let messages = errors.messages();
        assert_eq!(messages["date"], vec!["dup", "early"]);
        assert_eq!(messages["harvested"], vec!["negative"]);
    }

    #[test]
    fn test_empty_errors_convert_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_import_display_caps_row_list() {
        let errors: Vec<RowError> = (1..=8)
            .map(|i| RowError {
                row: i,
                field: "date".to_string(),
                message: "bad".to_string(),
            })
            .collect();
        let text = AppError::Import(errors).to_string();

        assert!(text.contains("Row 5"));
        assert!(!text.contains("Row 6"));
        assert!(text.contains("and 3 more error(s)"));
    }
}
