//! Errors returned by the engine.

use crate::merge::Conflicts;
use crate::store::ResourceIdentity;
use crate::value::ValidationErrors;
use thiserror::Error;

/// EngineError is the error type of every engine operation.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(ResourceIdentity),

    #[error("{0} already exists")]
    AlreadyExists(ResourceIdentity),

    #[error("apply failed with conflicts:\n{0}")]
    Conflict(Conflicts),

    #[error("invalid request:\n{0}")]
    Invalid(ValidationErrors),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, EngineError::AlreadyExists(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }

    /// Returns the conflicts if this is a conflict error.
    pub fn conflicts(&self) -> Option<&Conflicts> {
        match self {
            EngineError::Conflict(conflicts) => Some(conflicts),
            _ => None,
        }
    }
}

impl From<Conflicts> for EngineError {
    fn from(conflicts: Conflicts) -> Self {
        EngineError::Conflict(conflicts)
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errors: ValidationErrors) -> Self {
        EngineError::Invalid(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::Path;
    use crate::merge::Conflict;

    #[test]
    fn test_conflict_error_message() {
        let mut conflicts = Conflicts::new();
        conflicts.add(Conflict::new("alice", Path::parse("data.key").unwrap(), None));
        let err = EngineError::from(conflicts);

        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "apply failed with conflicts:\nconflict with \"alice\": .data.key");
        assert_eq!(err.conflicts().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_not_found_message() {
        let err = EngineError::NotFound(ResourceIdentity::new("ConfigMap", "default", "cm"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "ConfigMap default/cm not found");
    }
}
