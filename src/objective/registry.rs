//! Dynamic objective loading (spec §4.4 step 2, §6 "Objective loader
//! protocol", §9 "Dynamic objective loading").
//!
//! The reference solver resolves `objectiveClass` to a factory at
//! runtime by reflection. Per spec §9 this crate replaces that with a
//! compile-time-populated, string-keyed factory table — no reflective
//! class loading.

use std::collections::HashMap;
use std::sync::LazyLock;

use derive_more::{Display, Error};

use crate::E;
use crate::objective::Objective;
use crate::objective::examples::{FixtureQuadraticObjective, SimpleObjective, SimplexCouplingObjective};

/// The inner primal sub-problem family, set by `--driver.projectionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionType {
    /// Probability-simplex blocks: inner argmax is a one-hot vertex pick.
    #[default]
    Simplex,
    /// Box blocks: coordinate-wise argmin (spec glossary "Greedy
    /// projection").
    Greedy,
}

impl std::str::FromStr for ProjectionType {
    type Err = ObjectiveLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Simplex" => Ok(ProjectionType::Simplex),
            "Greedy" => Ok(ProjectionType::Greedy),
            other => Err(ObjectiveLoadError::UnknownProjectionType(other.to_string())),
        }
    }
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ObjectiveLoadError {
    #[display("objective class '{_0}' is not registered")]
    UnknownObjectiveClass(String),
    #[display("unknown projection type '{_0}'")]
    UnknownProjectionType(String),
}

/// Arguments passed through to an objective factory: whatever CLI flags
/// the driver's own parser didn't recognize (spec §6 "Unknown flags are
/// ignored (passed through to objective-specific parsers)").
pub type ObjectiveArgs = HashMap<String, String>;

type ObjectiveFactory = fn(gamma: E, projection: ProjectionType, args: &ObjectiveArgs) -> Box<dyn Objective>;

static REGISTRY: LazyLock<HashMap<&'static str, ObjectiveFactory>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, ObjectiveFactory> = HashMap::new();
    map.insert("dualip.objective.SimpleObjective", |_gamma, _proj, _args| {
        Box::new(SimpleObjective::new())
    });
    map.insert("dualip.objective.FixtureQuadraticObjective", |_gamma, _proj, _args| {
        Box::new(FixtureQuadraticObjective::new())
    });
    map.insert("dualip.objective.SimplexCouplingObjective", |gamma, _proj, args| {
        let n_blocks = args
            .get("n_blocks")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10usize);
        let block_dim = args
            .get("block_dim")
            .and_then(|v| v.parse().ok())
            .unwrap_or(10usize);
        Box::new(SimplexCouplingObjective::synthetic(n_blocks, block_dim, gamma))
    });
    map
});

/// Resolves `objective_class` to a factory and instantiates it (spec §6
/// "Failure to resolve is fatal with a descriptive error message").
pub fn instantiate(
    objective_class: &str,
    gamma: E,
    projection: ProjectionType,
    args: &ObjectiveArgs,
) -> Result<Box<dyn Objective>, ObjectiveLoadError> {
    REGISTRY
        .get(objective_class)
        .map(|factory| factory(gamma, projection, args))
        .ok_or_else(|| ObjectiveLoadError::UnknownObjectiveClass(objective_class.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_objective_classes() {
        let args = ObjectiveArgs::new();
        let obj = instantiate("dualip.objective.SimpleObjective", 1e-3, ProjectionType::Simplex, &args);
        assert!(obj.is_ok());
    }

    #[test]
    fn unknown_objective_class_is_an_error() {
        let args = ObjectiveArgs::new();
        let err = instantiate("nonexistent.Objective", 1e-3, ProjectionType::Simplex, &args).unwrap_err();
        assert_eq!(err, ObjectiveLoadError::UnknownObjectiveClass("nonexistent.Objective".to_string()));
    }

    #[test]
    fn projection_type_parses_known_values_only() {
        assert_eq!("Simplex".parse::<ProjectionType>().unwrap(), ProjectionType::Simplex);
        assert_eq!("Greedy".parse::<ProjectionType>().unwrap(), ProjectionType::Greedy);
        assert!("Bogus".parse::<ProjectionType>().is_err());
    }
}
