//! Engine configuration.

use crate::engine::{Engine, EngineBuilder};
use crate::fieldpath::{Path, Set};
use crate::value::ValidationError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use thiserror::Error;

/// ConfigError is returned when a configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("ignoredFields.{kind}: {source}")]
    InvalidPath {
        kind: String,
        #[source]
        source: ValidationError,
    },
}

/// EngineConfig holds the options an [`Engine`] is built from.
///
/// ```yaml
/// skipNoopCommits: true
/// ignoredFields:
///   Deployment:
///     - status
///     - metadata.generation
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    pub skip_noop_commits: bool,
    /// Dotted field paths per resource kind.
    pub ignored_fields: BTreeMap<String, Vec<String>>,
}

impl EngineConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Returns an EngineBuilder carrying these options.
    pub fn builder(&self) -> Result<EngineBuilder, ConfigError> {
        let mut builder = Engine::builder().skip_noop_commits(self.skip_noop_commits);
        for (kind, paths) in &self.ignored_fields {
            let fields = paths
                .iter()
                .map(|dotted| Path::parse(dotted))
                .collect::<Result<Set, _>>()
                .map_err(|source| ConfigError::InvalidPath {
                    kind: kind.clone(),
                    source,
                })?;
            builder = builder.ignored_fields(kind.clone(), fields);
        }
        Ok(builder)
    }
}

impl Engine {
    /// Builds an Engine from a configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Engine, ConfigError> {
        Ok(config.builder()?.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResourceIdentity;
    use crate::value::document_from_yaml;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config() {
        let config = EngineConfig::from_yaml(
            "skipNoopCommits: true\nignoredFields:\n  Deployment:\n    - status\n    - metadata.generation\n",
        )
        .unwrap();
        assert!(config.skip_noop_commits);
        assert_eq!(
            config.ignored_fields.get("Deployment"),
            Some(&vec!["status".to_string(), "metadata.generation".to_string()])
        );
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(EngineConfig::from_yaml("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_yaml("skipNoop: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_ignored_path() {
        let config = EngineConfig::from_yaml("ignoredFields:\n  ConfigMap:\n    - a..b\n").unwrap();
        let err = Engine::from_config(&config).unwrap_err();
        assert!(err.to_string().starts_with("ignoredFields.ConfigMap: "));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_engine_from_config_ignores_fields() {
        let config = EngineConfig::from_yaml("ignoredFields:\n  ConfigMap:\n    - status\n").unwrap();
        let engine = Engine::from_config(&config).unwrap();
        let id = ResourceIdentity::new("ConfigMap", "default", "cm");

        let doc = document_from_yaml("data:\n  key: value\nstatus:\n  phase: Ready\n").unwrap();
        let resource = engine.apply(&id, &doc, "alice", false).unwrap();
        assert_eq!(resource.value, doc);
        assert_eq!(resource.managed_fields.paths_owned_by("alice").len(), 1);
    }
}
