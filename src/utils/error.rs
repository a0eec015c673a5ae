use thiserror::Error;

#[derive(Error, Debug)]
pub enum UniverseError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("{entity} '{name}' not found")]
    NotFound { entity: String, name: String },

    #[error("Input not found: {path}")]
    MissingInput { path: String },

    #[error("Database '{path}' already exists")]
    DatabaseExists { path: String },

    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Phase '{phase}' failed: {details}")]
    PhaseFailed { phase: String, details: String },

    #[error("Operation cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Input,
    Configuration,
    Data,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl UniverseError {
    pub fn not_found(entity: &str, name: &str) -> Self {
        UniverseError::NotFound {
            entity: entity.to_string(),
            name: name.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            UniverseError::DatabaseError(_)
            | UniverseError::DatabaseExists { .. }
            | UniverseError::UnknownColumn { .. } => ErrorCategory::Storage,
            UniverseError::CsvError(_)
            | UniverseError::IoError(_)
            | UniverseError::SerializationError(_)
            | UniverseError::ZipError(_)
            | UniverseError::MissingInput { .. } => ErrorCategory::Input,
            UniverseError::ConfigValidationError { .. }
            | UniverseError::InvalidConfigValueError { .. }
            | UniverseError::MissingConfigError { .. } => ErrorCategory::Configuration,
            UniverseError::NotFound { .. }
            | UniverseError::ValidationError { .. }
            | UniverseError::ProcessingError { .. }
            | UniverseError::PhaseFailed { .. } => ErrorCategory::Data,
            UniverseError::Cancelled => ErrorCategory::User,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            UniverseError::Cancelled => ErrorSeverity::Low,
            UniverseError::NotFound { .. }
            | UniverseError::ValidationError { .. }
            | UniverseError::DatabaseExists { .. } => ErrorSeverity::Medium,
            UniverseError::DatabaseError(_) | UniverseError::ZipError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            UniverseError::DatabaseError(_) => {
                "Check that the database file is writable and was created with `universe-db init`"
            }
            UniverseError::CsvError(_) => "Check the CSV header row and column count of the input file",
            UniverseError::IoError(_) => "Check file permissions and that the path exists",
            UniverseError::SerializationError(_) => "Check that the input is valid JSON",
            UniverseError::ZipError(_) => "Check free disk space in the export directory",
            UniverseError::ConfigValidationError { .. }
            | UniverseError::InvalidConfigValueError { .. }
            | UniverseError::MissingConfigError { .. } => {
                "Review the configuration file and command line arguments"
            }
            UniverseError::NotFound { .. } => {
                "Run the earlier import phases first so the referenced rows exist"
            }
            UniverseError::MissingInput { .. } => "Check the input path and file names",
            UniverseError::DatabaseExists { .. } => "Pass --yes to overwrite the existing database",
            UniverseError::UnknownColumn { .. } => "Use `universe-db check-schema` to list valid columns",
            UniverseError::ValidationError { .. } => "Inspect the database with `universe-db validate`",
            UniverseError::ProcessingError { .. } => "Re-run with --verbose to see the failing record",
            UniverseError::PhaseFailed { .. } => "Fix the failing phase and re-run with --only",
            UniverseError::Cancelled => "Nothing was changed",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            UniverseError::DatabaseError(e) => format!("The database rejected an operation: {}", e),
            UniverseError::MissingInput { path } => format!("Could not find '{}'", path),
            UniverseError::DatabaseExists { path } => {
                format!("Database '{}' already exists and was left untouched", path)
            }
            UniverseError::Cancelled => "Operation cancelled by user".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UniverseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_and_category() {
        let err = UniverseError::not_found("Corporation", "Nexus Enraenra");
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert_eq!(err.to_string(), "Corporation 'Nexus Enraenra' not found");

        assert_eq!(UniverseError::Cancelled.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_user_friendly_message() {
        let err = UniverseError::MissingInput {
            path: "data/identities.csv".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Could not find 'data/identities.csv'");
        assert_eq!(err.category(), ErrorCategory::Input);
    }
}
