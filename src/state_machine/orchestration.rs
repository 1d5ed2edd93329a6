// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestration Lifecycle State Machine
//!
//! # States
//!
//! - NetworkPending: stack creation submitted
//! - RolesResolved: machines classified into roles
//! - SubsystemsProvisioning: load balancer, shared home and database submitted
//! - NodesProvisioned: every node installed, none started
//! - NodesStarted: every node started
//! - HealthGated: load balancer reports all targets healthy
//! - Live: cluster assembled (terminal)
//! - Failed: first fatal error (terminal)
//!
//! # Inputs
//!
//! - NetworkResolved: NetworkPending → RolesResolved
//! - SubsystemsSubmitted: RolesResolved → SubsystemsProvisioning
//! - NodesProvisioned: SubsystemsProvisioning → NodesProvisioned
//! - NodesStarted: NodesProvisioned → NodesStarted
//! - HealthConfirmed: NodesStarted → HealthGated
//! - ClusterAssembled: HealthGated → Live
//! - Fail: any non-terminal state → Failed

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError};

/// Phase of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestrationState {
    NetworkPending,
    RolesResolved,
    SubsystemsProvisioning,
    NodesProvisioned,
    NodesStarted,
    HealthGated,
    Live,
    Failed(String),
}

/// Progress reported by the orchestrator (FSM input)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrchestrationEvent {
    NetworkResolved,
    SubsystemsSubmitted,
    NodesProvisioned,
    NodesStarted,
    HealthConfirmed,
    ClusterAssembled,
    Fail(String),
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationState::Failed(reason) => write!(f, "Failed({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Display for OrchestrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl StateMachine for OrchestrationState {
    type Input = OrchestrationEvent;

    fn transition(&self, input: &OrchestrationEvent) -> Result<Self, TransitionError> {
        use OrchestrationEvent as E;
        use OrchestrationState as S;

        if self.is_terminal() {
            return Err(TransitionError::Terminal(self.to_string()));
        }

        let next = match (self, input) {
            (_, E::Fail(reason)) => S::Failed(reason.clone()),
            (S::NetworkPending, E::NetworkResolved) => S::RolesResolved,
            (S::RolesResolved, E::SubsystemsSubmitted) => S::SubsystemsProvisioning,
            (S::SubsystemsProvisioning, E::NodesProvisioned) => S::NodesProvisioned,
            (S::NodesProvisioned, E::NodesStarted) => S::NodesStarted,
            (S::NodesStarted, E::HealthConfirmed) => S::HealthGated,
            (S::HealthGated, E::ClusterAssembled) => S::Live,
            (from, input) => {
                return Err(TransitionError::InvalidTransition {
                    from: from.to_string(),
                    input: input.to_string(),
                })
            }
        };
        Ok(next)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OrchestrationState::Live | OrchestrationState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::History;
    use chrono::Utc;

    fn happy_path() -> Vec<OrchestrationEvent> {
        use OrchestrationEvent::*;
        vec![
            NetworkResolved,
            SubsystemsSubmitted,
            NodesProvisioned,
            NodesStarted,
            HealthConfirmed,
            ClusterAssembled,
        ]
    }

    #[test]
    fn test_happy_path_reaches_live() {
        let mut history = History::new(OrchestrationState::NetworkPending);
        for event in happy_path() {
            history.record(event, Utc::now()).unwrap();
        }
        assert_eq!(*history.state(), OrchestrationState::Live);
        assert_eq!(history.transitions().len(), 6);
    }

    #[test]
    fn test_any_live_phase_can_fail() {
        let mut state = OrchestrationState::NetworkPending;
        for event in happy_path() {
            let failed = state
                .transition(&OrchestrationEvent::Fail("boom".into()))
                .unwrap();
            assert_eq!(failed, OrchestrationState::Failed("boom".into()));
            state = state.transition(&event).unwrap();
        }
    }

    #[test]
    fn test_health_gate_requires_started_nodes() {
        let result = OrchestrationState::NodesProvisioned
            .transition(&OrchestrationEvent::HealthConfirmed);
        assert!(matches!(
            result,
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for state in [
            OrchestrationState::Live,
            OrchestrationState::Failed("x".into()),
        ] {
            assert!(state.is_terminal());
            assert!(!state.accepts(&OrchestrationEvent::Fail("again".into())));
        }
    }
}
