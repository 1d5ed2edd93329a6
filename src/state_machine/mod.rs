// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machines
//!
//! Lifecycles are modelled as pure transition functions over typed states:
//!
//! ```text
//! (State, Input) → State | TransitionError
//! ```
//!
//! The driver performs the side effects and then reports the matching input.
//! A rejected input means the driver skipped or repeated a phase.
//!
//! [`History`] keeps the current state together with every accepted
//! transition, so a run can report how far it got when it failed.

pub mod orchestration;

pub use orchestration::{OrchestrationEvent, OrchestrationState};

use chrono::{DateTime, Utc};

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The input is not accepted in the current state
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// The machine already reached a terminal state
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// A finite state machine over `Self` as the state
pub trait StateMachine: Sized + Clone {
    type Input;

    /// Next state for `input`, or why it is rejected
    fn transition(&self, input: &Self::Input) -> Result<Self, TransitionError>;

    /// Whether no further transition is possible
    fn is_terminal(&self) -> bool;

    fn accepts(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }
}

/// One accepted transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// Current state plus the transitions that led to it
#[derive(Debug, Clone)]
pub struct History<M: StateMachine> {
    state: M,
    transitions: Vec<TransitionRecord<M, M::Input>>,
}

impl<M> History<M>
where
    M: StateMachine,
    M::Input: Clone,
{
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            transitions: Vec::new(),
        }
    }

    /// Apply `input`; a rejected input leaves no trace
    pub fn record(&mut self, input: M::Input, at: DateTime<Utc>) -> Result<&M, TransitionError> {
        let next = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, next);
        self.transitions.push(TransitionRecord {
            from,
            to: self.state.clone(),
            input,
            at,
        });
        Ok(&self.state)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn transitions(&self) -> &[TransitionRecord<M, M::Input>] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord<M, M::Input>> {
        self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a node that can be started once and stopped once
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Node {
        Stopped,
        Running,
        Retired,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Command {
        Start,
        Stop,
    }

    impl StateMachine for Node {
        type Input = Command;

        fn transition(&self, input: &Command) -> Result<Self, TransitionError> {
            match (self, input) {
                (Node::Stopped, Command::Start) => Ok(Node::Running),
                (Node::Running, Command::Stop) => Ok(Node::Retired),
                (Node::Retired, _) => Err(TransitionError::Terminal("Retired".into())),
                (from, input) => Err(TransitionError::InvalidTransition {
                    from: format!("{:?}", from),
                    input: format!("{:?}", input),
                }),
            }
        }

        fn is_terminal(&self) -> bool {
            *self == Node::Retired
        }
    }

    #[test]
    fn test_history_records_accepted_transitions() {
        let mut history = History::new(Node::Stopped);
        assert!(!history.state().accepts(&Command::Stop));

        history.record(Command::Start, Utc::now()).unwrap();
        let state = history.record(Command::Stop, Utc::now()).unwrap();
        assert!(state.is_terminal());

        let steps: Vec<(Node, Node)> = history
            .transitions()
            .iter()
            .map(|t| (t.from.clone(), t.to.clone()))
            .collect();
        assert_eq!(
            steps,
            vec![(Node::Stopped, Node::Running), (Node::Running, Node::Retired)]
        );
    }

    #[test]
    fn test_rejected_input_leaves_no_trace() {
        let mut history = History::new(Node::Stopped);
        assert!(matches!(
            history.record(Command::Stop, Utc::now()),
            Err(TransitionError::InvalidTransition { .. })
        ));
        assert_eq!(*history.state(), Node::Stopped);
        assert!(history.transitions().is_empty());
    }
}
