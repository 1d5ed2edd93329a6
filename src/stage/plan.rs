// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static Stage Graph
//!
//! The dependency graph of a provisioning run is small and fixed by the
//! cluster shape. It is declared here, once, instead of being implied by the
//! order of `await` calls in the orchestrator:
//!
//! ```text
//! Credentials
//! Network             ◄── Credentials
//! ArtifactPreparation
//! RoleResolution      ◄── Network
//! LoadBalancer        ◄── Network, RoleResolution, Credentials
//! SharedHome          ◄── RoleResolution, ArtifactPreparation, Credentials
//! Database            ◄── RoleResolution, Credentials
//! DatabaseStart       ◄── Database, LoadBalancer
//! Node(i)             ◄── RoleResolution, ArtifactPreparation, SharedHome, Credentials
//! ```
//!
//! A standalone cluster drops the load balancer and shared home; its
//! database start awaits role resolution instead of the load balancer.
//!
//! A plan is valid when every input of a stage appears earlier in the plan.
//! Submitting stages in plan order therefore never awaits a stage that has
//! not been submitted, which makes the graph acyclic by construction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::{ProvisioningError, ProvisioningResult};

/// Named stage of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    Credentials,
    Network,
    ArtifactPreparation,
    RoleResolution,
    LoadBalancer,
    SharedHome,
    Database,
    DatabaseStart,
    Node(usize),
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageId::Credentials => write!(f, "credentials"),
            StageId::Network => write!(f, "provision stack"),
            StageId::ArtifactPreparation => write!(f, "prepare artifacts"),
            StageId::RoleResolution => write!(f, "resolve roles"),
            StageId::LoadBalancer => write!(f, "provision load balancer"),
            StageId::SharedHome => write!(f, "provision shared home"),
            StageId::Database => write!(f, "database"),
            StageId::DatabaseStart => write!(f, "start database"),
            StageId::Node(index) => write!(f, "provision node {}", index + 1),
        }
    }
}

/// One stage and the stages it awaits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub id: StageId,
    pub inputs: Vec<StageId>,
}

/// Ordered, acyclic set of stages for one cluster shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<PlannedStage>,
}

impl StagePlan {
    /// Load-balanced nodes sharing a home directory
    pub fn data_center(nodes: usize) -> Self {
        use StageId::*;

        let mut stages = vec![
            planned(Credentials, &[]),
            planned(Network, &[Credentials]),
            planned(ArtifactPreparation, &[]),
            planned(RoleResolution, &[Network]),
            planned(LoadBalancer, &[Network, RoleResolution, Credentials]),
            planned(SharedHome, &[RoleResolution, ArtifactPreparation, Credentials]),
            planned(Database, &[RoleResolution, Credentials]),
            planned(DatabaseStart, &[Database, LoadBalancer]),
        ];
        stages.extend((0..nodes).map(|i| {
            planned(
                Node(i),
                &[RoleResolution, ArtifactPreparation, SharedHome, Credentials],
            )
        }));
        Self { stages }
    }

    /// A single node talking straight to its database
    pub fn standalone() -> Self {
        use StageId::*;

        Self {
            stages: vec![
                planned(Credentials, &[]),
                planned(Network, &[Credentials]),
                planned(ArtifactPreparation, &[]),
                planned(RoleResolution, &[Network]),
                planned(Database, &[RoleResolution, Credentials]),
                planned(DatabaseStart, &[Database, RoleResolution]),
                planned(Node(0), &[RoleResolution, ArtifactPreparation, Credentials]),
            ],
        }
    }

    /// Declared inputs of a stage, `None` if the stage is not planned
    pub fn inputs(&self, id: StageId) -> Option<&[StageId]> {
        self.stages
            .iter()
            .find(|stage| stage.id == id)
            .map(|stage| stage.inputs.as_slice())
    }

    pub fn stages(&self) -> impl Iterator<Item = &PlannedStage> {
        self.stages.iter()
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.inputs(id).is_some()
    }

    /// Every (awaiter, awaited) edge, i.e. every suspension point
    pub fn suspension_points(&self) -> Vec<(StageId, StageId)> {
        self.stages
            .iter()
            .flat_map(|stage| stage.inputs.iter().map(move |input| (stage.id, *input)))
            .collect()
    }

    /// Check that the plan can be submitted in order without deadlock
    ///
    /// # Invariants
    /// - No stage appears twice
    /// - Every input appears before the stage that awaits it
    pub fn validate(&self) -> ProvisioningResult<()> {
        let mut seen = HashSet::new();
        for stage in &self.stages {
            for input in &stage.inputs {
                if !seen.contains(input) {
                    return Err(ProvisioningError::Configuration(format!(
                        "stage '{}' awaits '{}' which is not submitted before it",
                        stage.id, input
                    )));
                }
            }
            if !seen.insert(stage.id) {
                return Err(ProvisioningError::Configuration(format!(
                    "stage '{}' is planned twice",
                    stage.id
                )));
            }
        }
        Ok(())
    }
}

fn planned(id: StageId, inputs: &[StageId]) -> PlannedStage {
    PlannedStage {
        id,
        inputs: inputs.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1 ; "one node")]
    #[test_case(2 ; "two nodes")]
    #[test_case(8 ; "eight nodes")]
    fn test_data_center_plan_is_valid(nodes: usize) {
        let plan = StagePlan::data_center(nodes);
        plan.validate().unwrap();
        assert!(plan.contains(StageId::Node(nodes - 1)));
        assert!(!plan.contains(StageId::Node(nodes)));
    }

    #[test]
    fn test_standalone_plan_is_valid() {
        let plan = StagePlan::standalone();
        plan.validate().unwrap();
        assert!(!plan.contains(StageId::LoadBalancer));
        assert!(!plan.contains(StageId::SharedHome));
    }

    #[test]
    fn test_subsystems_do_not_await_each_other() {
        let plan = StagePlan::data_center(2);
        for id in [StageId::LoadBalancer, StageId::SharedHome, StageId::Database] {
            let inputs = plan.inputs(id).unwrap();
            assert!(!inputs.contains(&StageId::LoadBalancer));
            assert!(!inputs.contains(&StageId::SharedHome));
            assert!(!inputs.contains(&StageId::Database));
        }
    }

    #[test]
    fn test_nodes_await_artifacts() {
        let plan = StagePlan::data_center(3);
        let points = plan.suspension_points();
        for i in 0..3 {
            assert!(points.contains(&(StageId::Node(i), StageId::ArtifactPreparation)));
            assert!(points.contains(&(StageId::Node(i), StageId::SharedHome)));
        }
    }

    #[test]
    fn test_out_of_order_plan_is_rejected() {
        let plan = StagePlan {
            stages: vec![
                planned(StageId::Network, &[StageId::Credentials]),
                planned(StageId::Credentials, &[]),
            ],
        };
        assert!(matches!(
            plan.validate(),
            Err(ProvisioningError::Configuration(_))
        ));
    }
}
