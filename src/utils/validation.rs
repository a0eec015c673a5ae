use crate::utils::error::{Result, UniverseError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(UniverseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(UniverseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UniverseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Column and table names are spliced into SQL text, so only plain identifiers pass.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if !valid {
        return Err(UniverseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Only letters, digits and underscores are allowed".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(UniverseError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| UniverseError::MissingConfigError {
        field: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("database.path", "universe.db").is_ok());
        assert!(validate_path("database.path", "").is_err());
        assert!(validate_path("database.path", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("column", "character_name").is_ok());
        assert!(validate_identifier("column", "_private2").is_ok());
        assert!(validate_identifier("column", "name; DROP TABLE characters").is_err());
        assert!(validate_identifier("column", "1st").is_err());
        assert!(validate_identifier("column", "").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("event_year", 2020, 1, 9999).is_ok());
        assert!(validate_range("event_year", 0, 1, 9999).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("identities.json".to_string());
        let missing: Option<String> = None;
        assert!(validate_required_field("input", &present).is_ok());
        assert!(validate_required_field("input", &missing).is_err());
    }
}
