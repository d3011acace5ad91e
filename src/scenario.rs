//! Scripted runs against an engine.
//!
//! A scenario is a YAML list of steps executed in order. Only the last step
//! that was asked for decides whether the run failed; earlier failures are
//! logged and recorded in the step reports.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::store::{Resource, ResourceIdentity};
use crate::value::Map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("requested {requested} steps but the scenario has {available}")]
    StepsOutOfRange { requested: usize, available: usize },

    #[error("step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: EngineError,
    },
}

/// StepOp is the engine operation a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOp {
    Apply,
    Create,
    Update,
    Delete,
    Get,
}

impl fmt::Display for StepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepOp::Apply => "apply",
            StepOp::Create => "create",
            StepOp::Update => "update",
            StepOp::Delete => "delete",
            StepOp::Get => "get",
        };
        f.write_str(s)
    }
}

/// Step is one operation of a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Step {
    #[serde(default)]
    pub title: Option<String>,
    pub op: StepOp,
    pub kind: String,
    pub name: String,
    /// Defaults to the scenario namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub manager: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub document: Map,
}

/// Scenario is an ordered script of steps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub namespace: String,
    pub steps: Vec<Step>,
}

/// StepReport records what one executed step returned.
#[derive(Debug)]
pub struct StepReport {
    /// 1-based position in the scenario.
    pub index: usize,
    pub op: StepOp,
    pub identity: ResourceIdentity,
    pub result: Result<Option<Resource>, EngineError>,
}

impl StepReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

impl Scenario {
    /// Parses a scenario from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a scenario file.
    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    fn identity(&self, step: &Step) -> ResourceIdentity {
        let namespace = step.namespace.as_deref().unwrap_or(&self.namespace);
        ResourceIdentity::new(step.kind.as_str(), namespace, step.name.as_str())
    }

    /// Returns every identity the scenario touches, in first-use order.
    pub fn identities(&self) -> Vec<ResourceIdentity> {
        let mut out: Vec<ResourceIdentity> = Vec::new();
        for step in &self.steps {
            let identity = self.identity(step);
            if !out.contains(&identity) {
                out.push(identity);
            }
        }
        out
    }

    /// Runs the first `steps` steps, or all of them.
    ///
    /// Returns the reports of every executed step, or the error of the last
    /// one if it failed.
    pub fn run(&self, engine: &Engine, steps: Option<usize>) -> Result<Vec<StepReport>, ScenarioError> {
        let count = steps.unwrap_or(self.steps.len());
        if count > self.steps.len() {
            return Err(ScenarioError::StepsOutOfRange {
                requested: count,
                available: self.steps.len(),
            });
        }

        let mut reports = Vec::with_capacity(count);
        for (i, step) in self.steps.iter().take(count).enumerate() {
            let index = i + 1;
            let identity = self.identity(step);
            let title = step.title.as_deref().unwrap_or_default();
            info!(index, op = %step.op, %identity, "step {}", title);

            let result = execute(engine, &identity, step);
            if let Err(err) = &result {
                if index == count {
                    return Err(ScenarioError::Step {
                        index,
                        source: err.clone(),
                    });
                }
                warn!(index, "step failed: {}", err);
            }
            reports.push(StepReport {
                index,
                op: step.op,
                identity,
                result,
            });
        }
        Ok(reports)
    }
}

fn execute(
    engine: &Engine,
    identity: &ResourceIdentity,
    step: &Step,
) -> Result<Option<Resource>, EngineError> {
    match step.op {
        StepOp::Apply => engine
            .apply(identity, &step.document, &step.manager, step.force)
            .map(Some),
        StepOp::Create => engine.create(identity, &step.document, &step.manager).map(Some),
        StepOp::Update => engine.update(identity, &step.document, &step.manager).map(Some),
        StepOp::Delete => engine.delete(identity).map(|()| None),
        StepOp::Get => engine.get(identity).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::{Path, Set};
    use crate::value::document_from_yaml;
    use pretty_assertions::assert_eq;

    const DEMO: &str = include_str!("../demos/ssa-demo.yaml");

    fn demo() -> Scenario {
        Scenario::from_yaml(DEMO).unwrap()
    }

    fn set(paths: &[&str]) -> Set {
        paths.iter().map(|s| Path::parse(s).unwrap()).collect()
    }

    fn run_until(steps: usize) -> (Engine, Result<Vec<StepReport>, ScenarioError>) {
        let engine = Engine::new();
        let result = demo().run(&engine, Some(steps));
        (engine, result)
    }

    fn test_cm() -> ResourceIdentity {
        ResourceIdentity::new("ConfigMap", "ssa-demo", "test-cm")
    }

    #[test]
    fn test_parse_demo() {
        let scenario = demo();
        assert_eq!(scenario.namespace, "ssa-demo");
        assert_eq!(scenario.steps.len(), 10);
        assert_eq!(scenario.steps[4].op, StepOp::Apply);
        assert!(scenario.steps[4].force);
        assert_eq!(scenario.steps[6].op, StepOp::Delete);
        assert_eq!(scenario.identities(), vec![test_cm()]);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let err = Scenario::from_yaml("steps:\n  - op: patch\n    kind: ConfigMap\n    name: x\n").unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[test]
    fn test_too_many_steps() {
        let (_, result) = run_until(11);
        assert!(matches!(
            result,
            Err(ScenarioError::StepsOutOfRange { requested: 11, available: 10 })
        ));
    }

    #[test]
    fn test_disjoint_managers() {
        let (engine, result) = run_until(2);
        assert_eq!(result.unwrap().len(), 2);

        let resource = engine.get(&test_cm()).unwrap();
        assert_eq!(
            resource.value,
            document_from_yaml("data:\n  key: value\n  my-key: my-value\n").unwrap()
        );
        assert_eq!(resource.managed_fields.paths_owned_by("alice"), &set(&["data.key"]));
        assert_eq!(resource.managed_fields.paths_owned_by("bob"), &set(&["data.my-key"]));
    }

    #[test]
    fn test_last_step_conflict_fails_the_run() {
        let (engine, result) = run_until(3);
        match result {
            Err(ScenarioError::Step { index, source }) => {
                assert_eq!(index, 3);
                assert!(source.is_conflict());
            }
            other => panic!("expected step failure, got {other:?}"),
        }
        assert_eq!(engine.get(&test_cm()).unwrap().version, 2);
    }

    #[test]
    fn test_earlier_failure_is_recorded() {
        let (engine, result) = run_until(4);
        let reports = result.unwrap();
        assert!(!reports[2].succeeded());
        assert!(reports[3].succeeded());

        // bob agreed with alice, so alice keeps key.
        let resource = engine.get(&test_cm()).unwrap();
        assert_eq!(resource.managed_fields.paths_owned_by("alice"), &set(&["data.key"]));
        assert_eq!(resource.managed_fields.paths_owned_by("bob"), &set(&["data.my-key"]));
    }

    #[test]
    fn test_force_takes_over() {
        let (engine, result) = run_until(5);
        result.unwrap();

        let resource = engine.get(&test_cm()).unwrap();
        assert!(!resource.managed_fields.contains("alice"));
        assert_eq!(
            resource.managed_fields.paths_owned_by("bob"),
            &set(&["data.key", "data.my-key"])
        );
    }

    #[test]
    fn test_force_with_omission_removes_field() {
        let (engine, result) = run_until(6);
        result.unwrap();

        let resource = engine.get(&test_cm()).unwrap();
        assert_eq!(resource.value, document_from_yaml("data:\n  key: value\n").unwrap());
        assert_eq!(resource.managed_fields.paths_owned_by("bob"), &set(&["data.key"]));
    }

    #[test]
    fn test_recreate_and_reapply() {
        let (engine, result) = run_until(9);
        let reports = result.unwrap();
        assert!(reports[6].result.as_ref().unwrap().is_none());

        let resource = engine.get(&test_cm()).unwrap();
        assert_eq!(resource.version, 2);
        assert_eq!(resource.managed_fields.len(), 1);
        assert_eq!(resource.managed_fields.paths_owned_by("alice"), &set(&["data.key"]));
        assert_eq!(
            resource.value,
            document_from_yaml("data:\n  key: different value\n").unwrap()
        );
    }

    #[test]
    fn test_full_run() {
        let (engine, result) = run_until(10);
        assert_eq!(result.unwrap().len(), 10);

        let resource = engine.get(&test_cm()).unwrap();
        assert_eq!(
            resource.value,
            document_from_yaml("data:\n  another-key: value\n").unwrap()
        );
        assert_eq!(
            resource.managed_fields.paths_owned_by("alice"),
            &set(&["data.another-key"])
        );
    }
}
