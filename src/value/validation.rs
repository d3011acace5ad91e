//! Validation errors for documents and requests.

use std::fmt;
use thiserror::Error;

/// ValidationError describes malformed input rejected before any merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{path}: duplicate field")]
    DuplicateField { path: String },

    #[error("{path}: field is used both as a value and as a mapping")]
    InconsistentType { path: String },

    #[error("{path}: empty field name")]
    EmptyFieldName { path: String },

    #[error("empty field path")]
    EmptyPath,

    #[error("{field}: must not be empty")]
    MissingValue { field: String },
}

impl ValidationError {
    /// Creates a duplicate field error.
    pub fn duplicate_field(path: impl Into<String>) -> Self {
        ValidationError::DuplicateField { path: path.into() }
    }

    /// Creates an inconsistent type error.
    pub fn inconsistent_type(path: impl Into<String>) -> Self {
        ValidationError::InconsistentType { path: path.into() }
    }

    /// Creates an empty field name error.
    pub fn empty_field_name(path: impl Into<String>) -> Self {
        ValidationError::EmptyFieldName { path: path.into() }
    }

    /// Creates an error for a required request attribute left empty.
    pub fn missing_value(field: impl Into<String>) -> Self {
        ValidationError::MissingValue {
            field: field.into(),
        }
    }
}

/// ValidationErrors is a collection of validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates a new empty ValidationErrors.
    pub fn new() -> Self {
        ValidationErrors { errors: Vec::new() }
    }

    /// Adds an error.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Extends with another ValidationErrors.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Returns true if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::inconsistent_type("data.key");
        assert_eq!(
            err.to_string(),
            "data.key: field is used both as a value and as a mapping"
        );
    }

    #[test]
    fn test_validation_errors_collection() {
        let mut errs = ValidationErrors::new();
        assert!(errs.is_empty());

        errs.add(ValidationError::duplicate_field("data.key"));
        errs.add(ValidationError::missing_value("manager"));
        assert_eq!(errs.len(), 2);
        assert_eq!(
            errs.to_string(),
            "data.key: duplicate field\nmanager: must not be empty"
        );
    }
}
